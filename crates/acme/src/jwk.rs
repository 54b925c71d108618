use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{Signature as P256Signature, VerifyingKey as P256VerifyingKey};
use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey as RsaVerifyingKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde_json::Value;
use sha2::{Digest, Sha256};
use signature::Verifier;
use std::convert::TryFrom;
use thiserror::Error;

/// RSA hesap anahtarları için izin verilen en küçük modül boyutu (bayt).
pub const MIN_RSA_KEY_BYTES: usize = 256;

/// Sunucunun kabul ettiği asimetrik JWS imza algoritmaları.
///
/// `none` ve tüm MAC tabanlı (`HS*`) algoritmalar bu listenin dışındadır ve
/// doğrulayıcı tarafından `badSignatureAlgorithm` ile reddedilir.
pub const ACCEPTED_ALGORITHMS: &[&str] = &[
    "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256", "ES384", "ES512", "EdDSA",
];

/// Algoritmanın asimetrik imza politikasına uygun olup olmadığını bildirir.
#[must_use]
pub fn algorithm_is_acceptable(alg: &str) -> bool {
    ACCEPTED_ALGORITHMS.contains(&alg)
}

/// JWK anahtar türünün algoritma ailesiyle eşleşip eşleşmediğini bildirir.
///
/// EC anahtarları `ES*`, RSA anahtarları `RS*`/`PS*`, OKP anahtarları yalnızca
/// `EdDSA` ile kullanılabilir.
#[must_use]
pub fn key_type_matches_algorithm(kty: &str, alg: &str) -> bool {
    match kty {
        "EC" => alg.starts_with("ES"),
        "RSA" => alg.starts_with("RS") || alg.starts_with("PS"),
        "OKP" => alg == "EdDSA",
        _ => false,
    }
}

/// Ham JWK değerinden `kty` üyesini okur.
#[must_use]
pub fn header_key_type(jwk: &Value) -> Option<&str> {
    jwk.get("kty").and_then(Value::as_str)
}

/// Ham RSA JWK değerinden modül uzunluğunu (bayt) okur.
///
/// Değer RSA değilse veya `n` üyesi çözülemiyorsa `None` döner; yapısal
/// denetim bu durumda anahtarı ayrıştırma aşamasına bırakır.
#[must_use]
pub fn header_rsa_modulus_len(jwk: &Value) -> Option<usize> {
    let n = jwk.get("n").and_then(Value::as_str)?;
    URL_SAFE_NO_PAD.decode(n).ok().map(|bytes| bytes.len())
}

/// JWK ayrıştırma hataları.
#[derive(Debug, Error)]
pub enum JwkError {
    /// `kty` üyesi eksik.
    #[error("jwk is missing the kty member")]
    MissingKeyType,
    /// Anahtar türü desteklenmiyor.
    #[error("unsupported jwk key type: {kty}")]
    UnsupportedKeyType {
        /// Karşılaşılan anahtar türü.
        kty: String,
    },
    /// Eğri desteklenmiyor.
    #[error("unsupported jwk curve: {crv}")]
    UnsupportedCurve {
        /// Karşılaşılan eğri adı.
        crv: String,
    },
    /// Zorunlu bir üye eksik veya base64url olarak çözülemedi.
    #[error("jwk member {member} is missing or not base64url")]
    InvalidMember {
        /// Sorunlu üye adı.
        member: &'static str,
    },
    /// Çözülen anahtar materyali geçersiz.
    #[error("jwk key material is invalid: {reason}")]
    InvalidKeyMaterial {
        /// Reddedilme nedeni.
        reason: String,
    },
}

/// JWS imza doğrulama hataları.
#[derive(Debug, Error)]
pub enum JwsVerifyError {
    /// İmza baytları beklenen biçimde değil.
    #[error("signature could not be decoded for {alg}")]
    MalformedSignature {
        /// Doğrulama için kullanılan algoritma.
        alg: String,
    },
    /// Algoritma bu anahtar ile doğrulanamaz.
    #[error("algorithm {alg} cannot be verified with a {kty} account key")]
    UnsupportedCombination {
        /// İstenen algoritma.
        alg: String,
        /// Anahtarın türü.
        kty: &'static str,
    },
    /// Kriptografik doğrulama başarısız oldu.
    #[error("error in cryptographic primitive")]
    Invalid,
}

/// Hesap anahtarının doğrulama materyali.
#[derive(Debug, Clone)]
enum AccountKeyMaterial {
    Ed25519(Ed25519VerifyingKey),
    EcdsaP256(P256VerifyingKey),
    Rsa(RsaVerifyingKey<Sha256>),
}

/// Bir ACME hesabını kimliklendiren public JWK.
///
/// Korumalı başlıktan ayrıştırılır; RFC 7638 thumbprint değeri hesap
/// anahtarı kimliği olarak kullanılır.
#[derive(Debug, Clone)]
pub struct AccountJwk {
    key: AccountKeyMaterial,
    algorithm: Option<String>,
    thumbprint: String,
}

impl AccountJwk {
    /// Korumalı başlıktaki ham JWK değerini ayrıştırır.
    ///
    /// # Errors
    ///
    /// Anahtar türü/eğrisi desteklenmiyorsa veya anahtar materyali geçersizse
    /// `JwkError` döner.
    pub fn from_value(value: &Value) -> Result<Self, JwkError> {
        let kty = header_key_type(value).ok_or(JwkError::MissingKeyType)?;
        let algorithm = value
            .get("alg")
            .and_then(Value::as_str)
            .filter(|alg| !alg.is_empty())
            .map(ToOwned::to_owned);

        match kty {
            "OKP" => {
                let crv = required_member(value, "crv")?;
                if crv != "Ed25519" {
                    return Err(JwkError::UnsupportedCurve {
                        crv: crv.to_owned(),
                    });
                }
                let x = decode_member(value, "x")?;
                let bytes: [u8; 32] =
                    <[u8; 32]>::try_from(x.as_slice()).map_err(|_| JwkError::InvalidKeyMaterial {
                        reason: "ed25519 public key must be 32 bytes".to_owned(),
                    })?;
                let key = Ed25519VerifyingKey::from_bytes(&bytes).map_err(|err| {
                    JwkError::InvalidKeyMaterial {
                        reason: err.to_string(),
                    }
                })?;
                let thumbprint = compute_thumbprint(&[
                    ("crv", crv),
                    ("kty", kty),
                    ("x", member_str(value, "x")?),
                ]);
                Ok(Self {
                    key: AccountKeyMaterial::Ed25519(key),
                    algorithm,
                    thumbprint,
                })
            }
            "EC" => {
                let crv = required_member(value, "crv")?;
                if crv != "P-256" {
                    return Err(JwkError::UnsupportedCurve {
                        crv: crv.to_owned(),
                    });
                }
                let x = decode_member(value, "x")?;
                let y = decode_member(value, "y")?;
                if x.len() != 32 || y.len() != 32 {
                    return Err(JwkError::InvalidKeyMaterial {
                        reason: "p-256 coordinates must be 32 bytes".to_owned(),
                    });
                }
                let mut sec1 = Vec::with_capacity(1 + x.len() + y.len());
                sec1.push(0x04);
                sec1.extend_from_slice(&x);
                sec1.extend_from_slice(&y);
                let key = P256VerifyingKey::from_sec1_bytes(&sec1).map_err(|err| {
                    JwkError::InvalidKeyMaterial {
                        reason: err.to_string(),
                    }
                })?;
                let thumbprint = compute_thumbprint(&[
                    ("crv", crv),
                    ("kty", kty),
                    ("x", member_str(value, "x")?),
                    ("y", member_str(value, "y")?),
                ]);
                Ok(Self {
                    key: AccountKeyMaterial::EcdsaP256(key),
                    algorithm,
                    thumbprint,
                })
            }
            "RSA" => {
                let n = decode_member(value, "n")?;
                let e = decode_member(value, "e")?;
                let public = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
                    .map_err(|err| JwkError::InvalidKeyMaterial {
                        reason: err.to_string(),
                    })?;
                let thumbprint = compute_thumbprint(&[
                    ("e", member_str(value, "e")?),
                    ("kty", kty),
                    ("n", member_str(value, "n")?),
                ]);
                Ok(Self {
                    key: AccountKeyMaterial::Rsa(RsaVerifyingKey::<Sha256>::new(public)),
                    algorithm,
                    thumbprint,
                })
            }
            other => Err(JwkError::UnsupportedKeyType {
                kty: other.to_owned(),
            }),
        }
    }

    /// Anahtarın RFC 7638 thumbprint değeri; hesap anahtar kimliğidir.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.thumbprint
    }

    /// JWK içinde beyan edilen `alg` üyesi.
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    /// Anahtarın JOSE `kty` değeri.
    #[must_use]
    pub const fn key_type(&self) -> &'static str {
        match self.key {
            AccountKeyMaterial::Ed25519(_) => "OKP",
            AccountKeyMaterial::EcdsaP256(_) => "EC",
            AccountKeyMaterial::Rsa(_) => "RSA",
        }
    }

    /// RSA anahtarları için modül uzunluğu (bayt).
    #[must_use]
    pub fn rsa_modulus_len(&self) -> Option<usize> {
        match &self.key {
            AccountKeyMaterial::Rsa(key) => Some(key.as_ref().size()),
            AccountKeyMaterial::Ed25519(_) | AccountKeyMaterial::EcdsaP256(_) => None,
        }
    }

    /// İmzalama girdisini verilen algoritma ile doğrular.
    ///
    /// ECDSA imzaları RFC 7515 gereği ham `r‖s` biçiminde beklenir.
    ///
    /// # Errors
    ///
    /// İmza çözülemezse, algoritma bu anahtarla doğrulanamıyorsa veya imza
    /// geçersizse `JwsVerifyError` döner.
    pub fn verify(
        &self,
        alg: &str,
        signing_input: &[u8],
        signature: &[u8],
    ) -> Result<(), JwsVerifyError> {
        match (&self.key, alg) {
            (AccountKeyMaterial::Ed25519(key), "EdDSA") => {
                let signature = Ed25519Signature::try_from(signature).map_err(|_| {
                    JwsVerifyError::MalformedSignature {
                        alg: alg.to_owned(),
                    }
                })?;
                key.verify_strict(signing_input, &signature)
                    .map_err(|_| JwsVerifyError::Invalid)
            }
            (AccountKeyMaterial::EcdsaP256(key), "ES256") => {
                let signature = P256Signature::try_from(signature).map_err(|_| {
                    JwsVerifyError::MalformedSignature {
                        alg: alg.to_owned(),
                    }
                })?;
                key.verify(signing_input, &signature)
                    .map_err(|_| JwsVerifyError::Invalid)
            }
            (AccountKeyMaterial::Rsa(key), "RS256") => {
                let signature = RsaSignature::try_from(signature).map_err(|_| {
                    JwsVerifyError::MalformedSignature {
                        alg: alg.to_owned(),
                    }
                })?;
                key.verify(signing_input, &signature)
                    .map_err(|_| JwsVerifyError::Invalid)
            }
            _ => Err(JwsVerifyError::UnsupportedCombination {
                alg: alg.to_owned(),
                kty: self.key_type(),
            }),
        }
    }
}

fn required_member<'a>(value: &'a Value, member: &'static str) -> Result<&'a str, JwkError> {
    value
        .get(member)
        .and_then(Value::as_str)
        .ok_or(JwkError::InvalidMember { member })
}

fn member_str<'a>(value: &'a Value, member: &'static str) -> Result<&'a str, JwkError> {
    required_member(value, member)
}

fn decode_member(value: &Value, member: &'static str) -> Result<Vec<u8>, JwkError> {
    let encoded = required_member(value, member)?;
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| JwkError::InvalidMember { member })
}

/// RFC 7638 thumbprint değerini hesaplar.
///
/// Üyeler sözlük sırasına dizilip boşluksuz JSON olarak serileştirilir,
/// SHA-256 özeti base64url kodlanır.
fn compute_thumbprint(entries: &[(&str, &str)]) -> String {
    let mut sorted = entries.to_vec();
    sorted.sort_unstable_by(|lhs, rhs| lhs.0.cmp(rhs.0));
    let mut serialized = String::from("{");
    for (index, (name, value)) in sorted.iter().enumerate() {
        if index > 0 {
            serialized.push(',');
        }
        serialized.push('"');
        serialized.push_str(name);
        serialized.push_str("\":\"");
        serialized.push_str(value);
        serialized.push('"');
    }
    serialized.push('}');
    let digest = Sha256::digest(serialized.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer as _, SigningKey};
    use p256::ecdsa::{signature::Signer as _, Signature as P256Sig, SigningKey as P256SigningKey};
    use p256::SecretKey as P256SecretKey;
    use pretty_assertions::assert_eq;
    use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
    use rsa::pkcs1v15::SigningKey as RsaSigningKey;
    use rsa::RsaPrivateKey;
    use serde_json::json;

    use super::*;

    fn ed25519_jwk(signing: &SigningKey) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(signing.verifying_key().as_bytes()),
        })
    }

    fn p256_jwk(signing: &P256SigningKey) -> Value {
        let point = signing.verifying_key().to_encoded_point(false);
        json!({
            "kty": "EC",
            "crv": "P-256",
            "x": URL_SAFE_NO_PAD.encode(point.x().expect("x koordinatı")),
            "y": URL_SAFE_NO_PAD.encode(point.y().expect("y koordinatı")),
        })
    }

    fn rsa_jwk(private: &RsaPrivateKey) -> Value {
        let public = private.to_public_key();
        json!({
            "kty": "RSA",
            "n": URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        })
    }

    #[test]
    fn acceptable_algorithms_exclude_mac_and_none() {
        assert!(algorithm_is_acceptable("ES256"));
        assert!(algorithm_is_acceptable("RS256"));
        assert!(algorithm_is_acceptable("EdDSA"));
        assert!(!algorithm_is_acceptable("none"));
        assert!(!algorithm_is_acceptable("HS256"));
        assert!(!algorithm_is_acceptable("HS384"));
        assert!(!algorithm_is_acceptable("HS512"));
        assert!(!algorithm_is_acceptable(""));
    }

    #[test]
    fn key_types_match_their_algorithm_families() {
        assert!(key_type_matches_algorithm("EC", "ES256"));
        assert!(key_type_matches_algorithm("RSA", "RS256"));
        assert!(key_type_matches_algorithm("RSA", "PS384"));
        assert!(key_type_matches_algorithm("OKP", "EdDSA"));
        assert!(!key_type_matches_algorithm("EC", "RS256"));
        assert!(!key_type_matches_algorithm("RSA", "ES256"));
        assert!(!key_type_matches_algorithm("OKP", "ES256"));
    }

    #[test]
    fn ed25519_roundtrip_verifies() {
        let signing = SigningKey::from_bytes(&[42_u8; 32]);
        let jwk = AccountJwk::from_value(&ed25519_jwk(&signing)).expect("jwk parse");
        assert_eq!(jwk.key_type(), "OKP");

        let input = b"protected.payload";
        let signature = signing.sign(input);
        jwk.verify("EdDSA", input, &signature.to_bytes())
            .expect("imza doğrulanmalı");

        let err = jwk.verify("EdDSA", b"tampered", &signature.to_bytes());
        assert!(matches!(err, Err(JwsVerifyError::Invalid)));
    }

    #[test]
    fn p256_roundtrip_verifies_raw_signature() {
        let secret = P256SecretKey::from_slice(&[7_u8; 32]).expect("p256 anahtarı");
        let signing = P256SigningKey::from(secret);
        let jwk = AccountJwk::from_value(&p256_jwk(&signing)).expect("jwk parse");

        let input = b"protected.payload";
        let signature: P256Sig = signing.sign(input);
        jwk.verify("ES256", input, &signature.to_bytes())
            .expect("imza doğrulanmalı");
    }

    #[test]
    fn rsa_roundtrip_verifies() {
        let mut rng = ChaCha20Rng::from_seed([11_u8; 32]);
        let private = RsaPrivateKey::new(&mut rng, 2048).expect("rsa anahtarı üretimi");
        let jwk = AccountJwk::from_value(&rsa_jwk(&private)).expect("jwk parse");
        assert_eq!(jwk.rsa_modulus_len(), Some(256));

        let signing = RsaSigningKey::<Sha256>::new(private);
        let input = b"protected.payload";
        let signature = signature::Signer::sign(&signing, input);
        let bytes: Box<[u8]> = signature::SignatureEncoding::to_bytes(&signature);
        jwk.verify("RS256", input, &bytes).expect("imza doğrulanmalı");
    }

    #[test]
    fn algorithm_key_mismatch_is_rejected() {
        let signing = SigningKey::from_bytes(&[1_u8; 32]);
        let jwk = AccountJwk::from_value(&ed25519_jwk(&signing)).expect("jwk parse");
        let err = jwk.verify("ES256", b"input", &[0_u8; 64]).unwrap_err();
        assert!(matches!(err, JwsVerifyError::UnsupportedCombination { .. }));
    }

    #[test]
    fn unknown_key_type_is_rejected() {
        let err = AccountJwk::from_value(&json!({"kty": "oct", "k": "AAAA"})).unwrap_err();
        assert!(matches!(err, JwkError::UnsupportedKeyType { .. }));
    }

    #[test]
    fn unsupported_curve_is_rejected() {
        let err = AccountJwk::from_value(&json!({
            "kty": "EC",
            "crv": "P-384",
            "x": "AAAA",
            "y": "AAAA",
        }))
        .unwrap_err();
        assert!(matches!(err, JwkError::UnsupportedCurve { .. }));
    }

    #[test]
    fn declared_algorithm_is_preserved() {
        let signing = SigningKey::from_bytes(&[9_u8; 32]);
        let mut value = ed25519_jwk(&signing);
        value["alg"] = Value::String("EdDSA".to_owned());
        let jwk = AccountJwk::from_value(&value).expect("jwk parse");
        assert_eq!(jwk.algorithm(), Some("EdDSA"));
    }

    #[test]
    fn thumbprint_matches_rfc7638_vector() {
        // RFC 7638 §3.1 örnek anahtarı.
        let value = json!({
            "kty": "RSA",
            "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
            "e": "AQAB",
            "alg": "RS256",
            "kid": "2011-04-29",
        });
        let jwk = AccountJwk::from_value(&value).expect("jwk parse");
        assert_eq!(jwk.key_id(), "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs");
    }
}
