use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use aunsorm_acme::{AccountStore, InMemoryAccountStore, InMemoryNonceStore, NonceStore};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::linker::Linker;

/// ACME URL yolunda görünen, adlandırılmış kimlik doğrulama kapsamı.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioner {
    name: String,
}

impl Provisioner {
    /// Provisioner oluşturur.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Provisioner adı.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// İstek işleyicilerinin paylaştığı sunucu durumu.
pub struct ServerState {
    linker: Linker,
    provisioners: HashMap<String, Arc<Provisioner>>,
    nonces: Arc<dyn NonceStore>,
    accounts: Arc<dyn AccountStore>,
    certificates: Mutex<HashMap<String, String>>,
    next_account: AtomicU64,
    next_order: AtomicU64,
}

impl ServerState {
    /// Bellek içi depolarla sunucu durumu oluşturur.
    ///
    /// # Errors
    ///
    /// Yapılandırma tutarsızsa `ServerError` döner.
    pub fn try_new(config: &ServerConfig) -> Result<Self, ServerError> {
        Self::with_stores(
            config,
            Arc::new(InMemoryNonceStore::new()),
            Arc::new(InMemoryAccountStore::new()),
        )
    }

    /// Harici depolarla sunucu durumu oluşturur; kalıcı arka uçlar bu
    /// dikişten takılır.
    ///
    /// # Errors
    ///
    /// Yapılandırma tutarsızsa `ServerError` döner.
    pub fn with_stores(
        config: &ServerConfig,
        nonces: Arc<dyn NonceStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Result<Self, ServerError> {
        let provisioners = config
            .provisioners
            .iter()
            .map(|name| (name.clone(), Arc::new(Provisioner::new(name.clone()))))
            .collect();

        let linker = Linker::try_new(&config.dns_name, config.prefix.clone()).map_err(|err| {
            ServerError::Configuration(format!("ACME taban URL'i geçersiz: {err}"))
        })?;

        Ok(Self {
            linker,
            provisioners,
            nonces,
            accounts,
            certificates: Mutex::new(HashMap::new()),
            next_account: AtomicU64::new(0),
            next_order: AtomicU64::new(0),
        })
    }

    /// URL üreticisi.
    #[must_use]
    pub const fn linker(&self) -> &Linker {
        &self.linker
    }

    /// Adına göre provisioner çözer.
    #[must_use]
    pub fn provisioner(&self, name: &str) -> Option<Arc<Provisioner>> {
        self.provisioners.get(name).cloned()
    }

    /// Nonce deposu.
    #[must_use]
    pub fn nonces(&self) -> &dyn NonceStore {
        self.nonces.as_ref()
    }

    /// Hesap deposu.
    #[must_use]
    pub fn accounts(&self) -> &dyn AccountStore {
        self.accounts.as_ref()
    }

    /// Yeni hesap kimliği üretir.
    #[must_use]
    pub fn next_account_id(&self) -> String {
        format!(
            "acct-{:016x}",
            self.next_account.fetch_add(1, Ordering::SeqCst) + 1
        )
    }

    /// Yeni order kimliği üretir.
    #[must_use]
    pub fn next_order_id(&self) -> String {
        format!(
            "ord-{:016x}",
            self.next_order.fetch_add(1, Ordering::SeqCst) + 1
        )
    }

    /// Yayınlanmış bir sertifika zincirini kaydeder.
    pub async fn insert_certificate(&self, id: impl Into<String>, chain_pem: impl Into<String>) {
        let mut guard = self.certificates.lock().await;
        guard.insert(id.into(), chain_pem.into());
    }

    /// Sertifika zincirini kimliği ile getirir.
    pub async fn certificate(&self, id: &str) -> Option<String> {
        let guard = self.certificates.lock().await;
        guard.get(id).cloned()
    }
}
