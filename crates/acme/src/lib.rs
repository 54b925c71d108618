#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! Aunsorm CA'nın ACME (RFC 8555) protokol çekirdeği.
//!
//! HTTP katmanından bağımsızdır: problem belgeleri, nonce ve hesap depo
//! sözleşmeleri, JWK ayrıştırma/imza doğrulama, gelen JWS çözümleme ve
//! payload sınıflandırması burada yaşar.

mod account;
mod jwk;
mod jws;
mod nonce;
mod payload;
mod problem;

pub use account::{
    Account, AccountStatus, AccountStore, AccountStoreError, InMemoryAccountStore,
};
pub use jwk::{
    algorithm_is_acceptable, header_key_type, header_rsa_modulus_len, key_type_matches_algorithm,
    AccountJwk, JwkError, JwsVerifyError, ACCEPTED_ALGORITHMS, MIN_RSA_KEY_BYTES,
};
pub use jws::{IncomingJws, JwsParseError, JwsSignature, ProtectedHeader};
pub use nonce::{
    InMemoryNonceStore, NonceError, NonceStore, NonceStoreError, ReplayNonce, NONCE_BYTES,
    REPLAY_NONCE_HEADER,
};
pub use payload::VerifiedPayload;
pub use problem::{AcmeProblem, ProblemBody, ProblemIdentifier, ProblemType, Subproblem};
