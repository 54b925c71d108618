use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Gelen JWS ayrıştırma hataları.
///
/// Mesajlar istemciye `failed to parse JWS from request body: …` detayının
/// nedeni olarak yansır.
#[derive(Debug, Error)]
pub enum JwsParseError {
    /// Gövde `application/jose+json` JSON belgesi değil.
    #[error("body is not a JSON JWS document: {0}")]
    Json(#[from] serde_json::Error),
    /// Bir alan base64url olarak çözülemedi.
    #[error("jws member {member} is not base64url")]
    InvalidBase64 {
        /// Sorunlu alan adı.
        member: &'static str,
    },
    /// Korumalı başlık JSON olarak çözülemedi.
    #[error("protected header is not a JSON object: {source}")]
    InvalidProtectedHeader {
        /// Kaynak ayrıştırma hatası.
        #[source]
        source: serde_json::Error,
    },
}

/// Bir JWS imzasının korumalı başlığı.
///
/// `alg` dışındaki tüm üyeler isteğe bağlıdır; eksiklikler doğrulayıcı
/// aşamasında ilgili problem türüne çevrilir.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectedHeader {
    /// İmza algoritması.
    pub alg: String,
    /// Tek kullanımlık anti-replay değeri.
    #[serde(default)]
    pub nonce: Option<String>,
    /// İsteğin hedef URL'i; istek satırıyla birebir eşleşmelidir.
    #[serde(default)]
    pub url: Option<String>,
    /// Mevcut hesabın anahtar kimliği (hesap URL'i).
    #[serde(default)]
    pub kid: Option<String>,
    /// Gömülü public anahtar; yalnızca hesap açılış yolunda bulunur.
    #[serde(default)]
    pub jwk: Option<Value>,
}

/// Tek bir JWS imza girdisi.
#[derive(Debug, Clone)]
pub struct JwsSignature {
    protected_b64: String,
    signature: Vec<u8>,
    unprotected: Option<Value>,
    protected: ProtectedHeader,
}

impl JwsSignature {
    /// Çözülmüş korumalı başlık.
    #[must_use]
    pub const fn protected(&self) -> &ProtectedHeader {
        &self.protected
    }

    /// Ham imza baytları.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Korumasız başlık boş mu?
    ///
    /// RFC 8555 korumasız başlığa izin vermez; `null` veya boş nesne
    /// mevcut-değil sayılır.
    #[must_use]
    pub fn unprotected_header_is_empty(&self) -> bool {
        match &self.unprotected {
            None | Some(Value::Null) => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSignature {
    protected: String,
    signature: String,
    #[serde(default)]
    header: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GeneralWire {
    payload: String,
    signatures: Vec<WireSignature>,
}

#[derive(Debug, Deserialize)]
struct FlattenedWire {
    protected: String,
    payload: String,
    signature: String,
    #[serde(default)]
    header: Option<Value>,
}

/// İstek gövdesinden ayrıştırılmış JWS.
///
/// Ayrıştırıcı yalnızca biçimi çözer; imza sayısı, başlık politikası ve
/// imza doğrulaması sonraki aşamaların işidir.
#[derive(Debug, Clone)]
pub struct IncomingJws {
    payload_b64: String,
    payload: Vec<u8>,
    signatures: Vec<JwsSignature>,
}

impl IncomingJws {
    /// `application/jose+json` gövdesini ayrıştırır.
    ///
    /// Hem düzleştirilmiş `{protected, payload, signature}` hem de genel
    /// `{payload, signatures: […]}` serileştirmesi kabul edilir.
    ///
    /// # Errors
    ///
    /// Gövde JSON değilse veya base64url/JSON üyelerinden biri çözülemezse
    /// `JwsParseError` döner.
    pub fn parse(body: &[u8]) -> Result<Self, JwsParseError> {
        let value: Value = serde_json::from_slice(body)?;
        if value.get("signatures").is_some() {
            let wire: GeneralWire = serde_json::from_value(value)?;
            Self::from_parts(wire.payload, wire.signatures)
        } else {
            let wire: FlattenedWire = serde_json::from_value(value)?;
            Self::from_parts(
                wire.payload,
                vec![WireSignature {
                    protected: wire.protected,
                    signature: wire.signature,
                    header: wire.header,
                }],
            )
        }
    }

    fn from_parts(
        payload_b64: String,
        signatures: Vec<WireSignature>,
    ) -> Result<Self, JwsParseError> {
        let payload = URL_SAFE_NO_PAD
            .decode(&payload_b64)
            .map_err(|_| JwsParseError::InvalidBase64 { member: "payload" })?;

        let signatures = signatures
            .into_iter()
            .map(|wire| {
                let protected_raw = URL_SAFE_NO_PAD.decode(&wire.protected).map_err(|_| {
                    JwsParseError::InvalidBase64 {
                        member: "protected",
                    }
                })?;
                let protected: ProtectedHeader = serde_json::from_slice(&protected_raw)
                    .map_err(|source| JwsParseError::InvalidProtectedHeader { source })?;
                let signature = URL_SAFE_NO_PAD.decode(&wire.signature).map_err(|_| {
                    JwsParseError::InvalidBase64 {
                        member: "signature",
                    }
                })?;
                Ok(JwsSignature {
                    protected_b64: wire.protected,
                    signature,
                    unprotected: wire.header,
                    protected,
                })
            })
            .collect::<Result<Vec<_>, JwsParseError>>()?;

        Ok(Self {
            payload_b64,
            payload,
            signatures,
        })
    }

    /// Gövdedeki imza sayısı.
    #[must_use]
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// İlk (ve geçerli bir istekte tek) imza.
    #[must_use]
    pub fn signature(&self) -> Option<&JwsSignature> {
        self.signatures.first()
    }

    /// Çözülmüş payload baytları.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// İmzalama girdisi: `BASE64URL(protected) || '.' || BASE64URL(payload)`.
    #[must_use]
    pub fn signing_input(&self) -> Option<Vec<u8>> {
        self.signatures.first().map(|signature| {
            let mut input =
                Vec::with_capacity(signature.protected_b64.len() + 1 + self.payload_b64.len());
            input.extend_from_slice(signature.protected_b64.as_bytes());
            input.push(b'.');
            input.extend_from_slice(self.payload_b64.as_bytes());
            input
        })
    }
}
