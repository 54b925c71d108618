use url::{ParseError, Position, Url};

/// İstekten türetilen kanonik taban URL'i.
///
/// ACME TLS gerektirdiğinden şema her zaman `https` olarak sabitlenir;
/// otorite istek `Host` başlığından gelir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// `Host` değerinden taban URL üretir; boş veya otorite olarak
    /// ayrıştırılamayan değer `None` döndürür.
    #[must_use]
    pub fn from_host(host: &str) -> Option<Self> {
        let trimmed = host.trim();
        if trimmed.is_empty() {
            return None;
        }
        Url::parse(&format!("https://{trimmed}")).ok().map(Self)
    }

    /// Taban URL'i `Url` olarak döndürür.
    #[must_use]
    pub const fn as_url(&self) -> &Url {
        &self.0
    }

    /// `https://host[:port]` biçimindeki değer; yol içermez.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0[..Position::BeforePath]
    }
}

/// ACME kaynakları için deterministik URL üreticisi.
///
/// İstekte kullanılabilir bir `Host` yoksa yapılandırılmış DNS adı otorite
/// olarak kullanılır; üretim saf ve yan etkisizdir. Kaynak yolları
/// `Url::join` ile kurulur, provisioner kökü sondaki `/` ile tutulur ki
/// sonraki birleştirmeler yolu ezmesin.
#[derive(Debug, Clone)]
pub struct Linker {
    origin: Url,
    prefix: String,
}

impl Linker {
    /// Linker oluşturur.
    ///
    /// # Errors
    ///
    /// DNS adı bir URL otoritesi olarak ayrıştırılamazsa `ParseError` döner.
    pub fn try_new(dns_name: &str, prefix: impl Into<String>) -> Result<Self, ParseError> {
        Ok(Self {
            origin: Url::parse(&format!("https://{dns_name}"))?,
            prefix: prefix.into(),
        })
    }

    /// Yapılandırılmış yol öneki.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn provisioner_root(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
    ) -> Result<Url, ParseError> {
        let authority = base_url.map_or_else(|| self.origin.clone(), |base| base.as_url().clone());
        authority.join(&format!("{}/{}/", self.prefix, provisioner))
    }

    /// Directory kaynağının URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn directory_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?.join("directory")
    }

    /// `newNonce` uç noktasının URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn new_nonce_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?.join("new-nonce")
    }

    /// `newAccount` uç noktasının URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn new_account_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?.join("new-account")
    }

    /// `newOrder` uç noktasının URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn new_order_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?.join("new-order")
    }

    /// `revokeCert` uç noktasının URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn revoke_cert_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?.join("revoke-cert")
    }

    /// Hesap URL'lerinin ortak öneki; `kid` denetiminin beklediği değerdir.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn account_prefix(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?.join("account/")
    }

    /// Tek bir hesabın URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn account_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
        id: &str,
    ) -> Result<Url, ParseError> {
        self.account_prefix(base_url, provisioner)?.join(id)
    }

    /// Hesabın order listesinin URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn orders_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
        id: &str,
    ) -> Result<Url, ParseError> {
        self.account_prefix(base_url, provisioner)?
            .join(&format!("{id}/orders"))
    }

    /// Tek bir order kaynağının URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn order_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
        id: &str,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?
            .join(&format!("order/{id}"))
    }

    /// Order finalize uç noktasının URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn finalize_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
        id: &str,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?
            .join(&format!("order/{id}/finalize"))
    }

    /// Order'a bağlı bir authorization kaynağının URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn authorization_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
        order_id: &str,
        index: usize,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?
            .join(&format!("authz/{order_id}-{index:02}"))
    }

    /// Sertifika kaynağının URL'i.
    ///
    /// # Errors
    ///
    /// URL birleştirmesi başarısız olursa `ParseError` döner.
    pub fn certificate_url(
        &self,
        base_url: Option<&BaseUrl>,
        provisioner: &str,
        id: &str,
    ) -> Result<Url, ParseError> {
        self.provisioner_root(base_url, provisioner)?
            .join(&format!("certificate/{id}"))
    }
}
