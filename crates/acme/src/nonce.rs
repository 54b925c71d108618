use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand_core::{OsRng, RngCore};
use thiserror::Error;
use tokio::sync::Mutex;

/// ACME protokolünde kullanılan `Replay-Nonce` başlığının adı.
pub const REPLAY_NONCE_HEADER: &str = "Replay-Nonce";

/// Üretilen nonce değerlerinin ham uzunluğu; 128 bit entropi sağlar.
pub const NONCE_BYTES: usize = 16;

/// Nonce doğrulama ile ilişkili hata türleri.
#[derive(Debug, Error)]
pub enum NonceError {
    /// Boş bir nonce değeri ile karşılaşıldı.
    #[error("nonce value must not be empty")]
    Empty,
    /// Nonce base64url (padding'siz) formatında değil.
    #[error("nonce value is not base64url: {source}")]
    InvalidBase64 {
        /// Base64 ayrıştırma hatasının kaynağı.
        #[source]
        source: base64::DecodeError,
    },
}

/// Sunucunun dağıttığı, base64url kodlu tek kullanımlık nonce değeri.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplayNonce(String);

impl ReplayNonce {
    /// Metinsel bir değerden nonce üretir ve RFC 8555'e uygunluğunu doğrular.
    ///
    /// # Errors
    ///
    /// * `NonceError::Empty` - değer yalnızca boşluklardan oluştuğunda.
    /// * `NonceError::InvalidBase64` - değer base64url olarak çözümlenemediğinde.
    pub fn parse<S: AsRef<str>>(value: S) -> Result<Self, NonceError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(NonceError::Empty);
        }

        URL_SAFE_NO_PAD
            .decode(trimmed)
            .map_err(|source| NonceError::InvalidBase64 { source })?;

        Ok(Self(trimmed.to_owned()))
    }

    /// İşletim sistemi RNG'sinden taze bir nonce üretir.
    #[must_use]
    pub fn mint() -> Self {
        let mut bytes = [0_u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Nonce değerini base64url kodlu metin olarak döndürür.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Nonce değerini sahipli metin olarak döndürür.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for ReplayNonce {
    type Err = NonceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Nonce deposu işlemlerinin hata türleri.
#[derive(Debug, Error)]
pub enum NonceStoreError {
    /// Tüketilmek istenen nonce depoda yok; istemciye `badNonce` olarak yansır.
    #[error("nonce not found")]
    NotFound,
    /// Depo arka ucu isteği tamamlayamadı.
    #[error("nonce store backend failure: {0}")]
    Backend(String),
}

/// Tek kullanımlık nonce değerlerini dağıtan ve tüketen depo sözleşmesi.
///
/// `consume` tek-kazanan semantiğine sahiptir: aynı değeri eşzamanlı tüketen
/// isteklerden en fazla biri başarılı olur, diğerleri `NotFound` görür.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Yeni bir nonce üretir ve depoya kaydeder.
    ///
    /// # Errors
    ///
    /// Depo arka ucu kaydı tamamlayamazsa `NonceStoreError::Backend` döner.
    async fn create(&self) -> Result<ReplayNonce, NonceStoreError>;

    /// Nonce değerini depodan düşer; değer bir daha kullanılamaz.
    ///
    /// # Errors
    ///
    /// * `NonceStoreError::NotFound` - değer depoda yoksa veya başka bir
    ///   istek tarafından önce tüketildiyse.
    /// * `NonceStoreError::Backend` - depo arka ucu silmeyi tamamlayamazsa.
    async fn consume(&self, nonce: &str) -> Result<(), NonceStoreError>;
}

/// Bellek içi nonce deposu; kilit altındaki `remove` tek-kazanan garantisini
/// sağlar.
#[derive(Debug, Default)]
pub struct InMemoryNonceStore {
    minted: Mutex<HashSet<String>>,
}

impl InMemoryNonceStore {
    /// Boş bir depo oluşturur.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Depodaki dağıtılmış nonce sayısını döndürür.
    pub async fn len(&self) -> usize {
        self.minted.lock().await.len()
    }

    /// Depo boş mu?
    pub async fn is_empty(&self) -> bool {
        self.minted.lock().await.is_empty()
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn create(&self) -> Result<ReplayNonce, NonceStoreError> {
        let mut guard = self.minted.lock().await;
        loop {
            let nonce = ReplayNonce::mint();
            if guard.insert(nonce.as_str().to_owned()) {
                return Ok(nonce);
            }
        }
    }

    async fn consume(&self, nonce: &str) -> Result<(), NonceStoreError> {
        let mut guard = self.minted.lock().await;
        if guard.remove(nonce) {
            Ok(())
        } else {
            Err(NonceStoreError::NotFound)
        }
    }
}
