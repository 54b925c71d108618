use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::jwk::AccountJwk;
use crate::problem::AcmeProblem;

/// ACME hesabının yaşam döngüsü durumu.
///
/// Yalnızca `valid` hesaplar yeni işlemler için kimlik doğrulayabilir;
/// geçersizleşme tek yönlüdür.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Hesap aktif.
    Valid,
    /// Hesap sahibi tarafından devre dışı bırakıldı.
    Deactivated,
    /// Hesap sunucu tarafından iptal edildi.
    Revoked,
}

impl AccountStatus {
    /// RFC 8555 durum metni.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Deactivated => "deactivated",
            Self::Revoked => "revoked",
        }
    }
}

/// Sunucuda kayıtlı bir ACME hesabı.
#[derive(Debug, Clone)]
pub struct Account {
    /// Hesap kimliği; hesap URL'inin son parçasıdır.
    pub id: String,
    /// Hesap durumu.
    pub status: AccountStatus,
    /// Hesabı kimliklendiren public anahtar.
    pub key: AccountJwk,
    /// `mailto:`/`tel:` iletişim URI'ları.
    pub contacts: Vec<String>,
    /// Hesabın order listesi URL'i.
    pub orders_url: String,
}

impl Account {
    /// Hesap yeni işlemler için kimlik doğrulayabilir mi?
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.status, AccountStatus::Valid)
    }
}

/// Hesap deposu işlemlerinin hata türleri.
#[derive(Debug, Error)]
pub enum AccountStoreError {
    /// Aranan hesap depoda yok.
    #[error("account not found")]
    NotFound,
    /// Depo ACME türlü bir problem döndürdü; türü korunarak yükseltilir.
    #[error("account store returned an acme problem: {0}")]
    Problem(AcmeProblem),
    /// Depo arka ucu isteği tamamlayamadı.
    #[error("account store backend failure: {0}")]
    Backend(String),
}

/// Hesap kayıtlarını barındıran depo sözleşmesi.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Hesabı kimliği ile getirir.
    ///
    /// # Errors
    ///
    /// * `AccountStoreError::NotFound` - hesap yoksa.
    /// * `AccountStoreError::Backend` - depo arka ucu isteği tamamlayamazsa.
    async fn get(&self, id: &str) -> Result<Account, AccountStoreError>;

    /// Hesabı anahtar kimliği (JWK thumbprint) ile getirir.
    ///
    /// # Errors
    ///
    /// `get` ile aynı sözleşme geçerlidir.
    async fn get_by_key_id(&self, key_id: &str) -> Result<Account, AccountStoreError>;

    /// Yeni bir hesabı depoya yazar.
    ///
    /// # Errors
    ///
    /// Depo arka ucu kaydı tamamlayamazsa `AccountStoreError::Backend` döner.
    async fn create(&self, account: Account) -> Result<(), AccountStoreError>;

    /// Hesap durumunu günceller ve güncel kaydı döndürür.
    ///
    /// Geçersizleşme tek yönlüdür; depo `valid` dışına çıkan bir hesabı
    /// tekrar `valid` yapmak zorunda değildir.
    ///
    /// # Errors
    ///
    /// `get` ile aynı sözleşme geçerlidir.
    async fn update_status(
        &self,
        id: &str,
        status: AccountStatus,
    ) -> Result<Account, AccountStoreError>;
}

#[derive(Debug, Default)]
struct AccountIndex {
    by_id: HashMap<String, Account>,
    by_key_id: HashMap<String, String>,
}

/// Bellek içi hesap deposu; anahtar kimliği üzerinden ikincil dizin tutar.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    inner: Mutex<AccountIndex>,
}

impl InMemoryAccountStore {
    /// Boş bir depo oluşturur.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, id: &str) -> Result<Account, AccountStoreError> {
        let guard = self.inner.lock().await;
        guard
            .by_id
            .get(id)
            .cloned()
            .ok_or(AccountStoreError::NotFound)
    }

    async fn get_by_key_id(&self, key_id: &str) -> Result<Account, AccountStoreError> {
        let guard = self.inner.lock().await;
        guard
            .by_key_id
            .get(key_id)
            .and_then(|id| guard.by_id.get(id))
            .cloned()
            .ok_or(AccountStoreError::NotFound)
    }

    async fn create(&self, account: Account) -> Result<(), AccountStoreError> {
        let mut guard = self.inner.lock().await;
        guard
            .by_key_id
            .insert(account.key.key_id().to_owned(), account.id.clone());
        guard.by_id.insert(account.id.clone(), account);
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: AccountStatus,
    ) -> Result<Account, AccountStoreError> {
        let mut guard = self.inner.lock().await;
        let account = guard
            .by_id
            .get_mut(id)
            .ok_or(AccountStoreError::NotFound)?;
        account.status = status;
        Ok(account.clone())
    }
}
