use std::env;
use std::net::SocketAddr;

use crate::error::ServerError;

/// Sunucu yapılandırması.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) listen: SocketAddr,
    pub(crate) dns_name: String,
    pub(crate) prefix: String,
    pub(crate) provisioners: Vec<String>,
}

impl ServerConfig {
    /// Çevre değişkenlerinden yapılandırmayı oluşturur.
    ///
    /// * `AUNSORM_CA_LISTEN` - dinleme adresi (varsayılan `127.0.0.1:8443`).
    /// * `AUNSORM_CA_DNS_NAME` - `Host` başlığı yokken kullanılacak otorite.
    /// * `AUNSORM_CA_PREFIX` - ACME yollarının kök parçası (varsayılan `acme`).
    /// * `AUNSORM_CA_PROVISIONERS` - virgülle ayrılmış provisioner adları.
    ///
    /// # Errors
    ///
    /// Gerekli alanlar eksikse veya geçersizse `ServerError` döner.
    pub fn from_env() -> Result<Self, ServerError> {
        let listen = env::var("AUNSORM_CA_LISTEN")
            .unwrap_or_else(|_| "127.0.0.1:8443".to_string())
            .parse()
            .map_err(|err| ServerError::Configuration(format!("dinleme adresi geçersiz: {err}")))?;
        let dns_name =
            env::var("AUNSORM_CA_DNS_NAME").unwrap_or_else(|_| "ca.aunsorm.local".to_string());
        let prefix = env::var("AUNSORM_CA_PREFIX").unwrap_or_else(|_| "acme".to_string());
        let provisioners = env::var("AUNSORM_CA_PROVISIONERS")
            .unwrap_or_else(|_| "default".to_string())
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        Self::new(listen, dns_name, prefix, provisioners)
    }

    /// Elle yapılandırma oluşturur.
    ///
    /// # Errors
    ///
    /// DNS adı veya prefix boşsa, prefix `/` içeriyorsa, provisioner listesi
    /// boşsa ya da bir provisioner adı URL'e gömülemeyecek karakter
    /// taşıyorsa `ServerError` döner.
    pub fn new(
        listen: SocketAddr,
        dns_name: impl Into<String>,
        prefix: impl Into<String>,
        provisioners: Vec<String>,
    ) -> Result<Self, ServerError> {
        let dns_name = dns_name.into();
        if dns_name.trim().is_empty() {
            return Err(ServerError::Configuration(
                "DNS adı boş bırakılamaz".to_string(),
            ));
        }

        let prefix = prefix.into();
        if prefix.is_empty() || prefix.contains('/') {
            return Err(ServerError::Configuration(
                "prefix boş olamaz ve '/' içeremez".to_string(),
            ));
        }

        if provisioners.is_empty() {
            return Err(ServerError::Configuration(
                "en az bir provisioner tanımlanmalıdır".to_string(),
            ));
        }
        for name in &provisioners {
            let url_safe = !name.is_empty()
                && name
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
            if !url_safe {
                return Err(ServerError::Configuration(format!(
                    "provisioner adı URL'e gömülemez: {name}"
                )));
            }
        }

        Ok(Self {
            listen,
            dns_name,
            prefix,
            provisioners,
        })
    }

    /// Dinleme adresi.
    #[must_use]
    pub const fn listen(&self) -> SocketAddr {
        self.listen
    }
}
