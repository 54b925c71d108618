use std::fmt;

use serde::Serialize;

/// RFC 8555 §6.7 problem türlerinin kapalı listesi.
///
/// Her tür kalıcı bir URN'e ve varsayılan bir HTTP durum koduna sahiptir;
/// boru hattındaki aşamalar yalnızca bu türlerden birini üretebilir.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemType {
    /// İstek ACME tel biçimine uymuyor.
    Malformed,
    /// Replay-Nonce değeri bilinmiyor veya daha önce tüketildi.
    BadNonce,
    /// JWS imza algoritması sunucu politikasına uygun değil.
    BadSignatureAlgorithm,
    /// Hesap bu işlem için yetkili değil.
    Unauthorized,
    /// `kid` ile işaret edilen hesap mevcut değil.
    AccountDoesNotExist,
    /// İstek gövdesinin içerik türü desteklenmiyor.
    UnsupportedContentType,
    /// Sunucu tarafında beklenmeyen bir hata oluştu.
    ServerInternal,
}

impl ProblemType {
    /// Problem türünün kalıcı URN değeri.
    #[must_use]
    pub const fn urn(self) -> &'static str {
        match self {
            Self::Malformed => "urn:ietf:params:acme:error:malformed",
            Self::BadNonce => "urn:ietf:params:acme:error:badNonce",
            Self::BadSignatureAlgorithm => "urn:ietf:params:acme:error:badSignatureAlgorithm",
            Self::Unauthorized => "urn:ietf:params:acme:error:unauthorized",
            Self::AccountDoesNotExist => "urn:ietf:params:acme:error:accountDoesNotExist",
            Self::UnsupportedContentType => "urn:ietf:params:acme:error:unsupportedContentType",
            Self::ServerInternal => "urn:ietf:params:acme:error:serverInternal",
        }
    }

    /// Problem türüne karşılık gelen varsayılan HTTP durum kodu.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::Malformed
            | Self::BadNonce
            | Self::BadSignatureAlgorithm
            | Self::AccountDoesNotExist => 400,
            Self::Unauthorized => 401,
            Self::UnsupportedContentType => 415,
            Self::ServerInternal => 500,
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.urn())
    }
}

/// ACME order identifier türü; problem belgelerinde hatalı kaynağı işaret eder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemIdentifier {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

impl ProblemIdentifier {
    /// DNS identifier'ı için problem referansı oluşturur.
    #[must_use]
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            kind: "dns".to_owned(),
            value: value.into(),
        }
    }

    /// IP identifier'ı için problem referansı oluşturur.
    #[must_use]
    pub fn ip(value: impl Into<String>) -> Self {
        Self {
            kind: "ip".to_owned(),
            value: value.into(),
        }
    }
}

/// Bileşik problemlerde tek bir alt problemi temsil eder.
#[derive(Debug, Clone, Serialize)]
pub struct Subproblem {
    #[serde(rename = "type", serialize_with = "serialize_problem_type")]
    kind: ProblemType,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<ProblemIdentifier>,
}

impl Subproblem {
    /// Alt problem oluşturur.
    #[must_use]
    pub fn new(
        kind: ProblemType,
        detail: impl Into<String>,
        identifier: Option<ProblemIdentifier>,
    ) -> Self {
        Self {
            kind,
            detail: detail.into(),
            identifier,
        }
    }
}

fn serialize_problem_type<S>(kind: &ProblemType, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(kind.urn())
}

/// Boru hattının ürettiği ACME problem belgesi.
///
/// `cause` alanı yalnızca log satırlarına yazılır; yanıt gövdesi her zaman
/// türün kanonik detayını taşır.
#[derive(Debug, Clone)]
pub struct AcmeProblem {
    kind: ProblemType,
    detail: String,
    cause: Option<String>,
    identifier: Option<ProblemIdentifier>,
    subproblems: Vec<Subproblem>,
}

impl AcmeProblem {
    /// Belirtilen tür ve detay ile problem oluşturur.
    #[must_use]
    pub fn new(kind: ProblemType, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            cause: None,
            identifier: None,
            subproblems: Vec::new(),
        }
    }

    /// `malformed` problemi üretir.
    #[must_use]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(ProblemType::Malformed, detail)
    }

    /// `badNonce` problemi üretir.
    #[must_use]
    pub fn bad_nonce() -> Self {
        Self::new(ProblemType::BadNonce, "unacceptable anti-replay nonce")
    }

    /// `badSignatureAlgorithm` problemi üretir.
    #[must_use]
    pub fn bad_signature_algorithm(detail: impl Into<String>) -> Self {
        Self::new(ProblemType::BadSignatureAlgorithm, detail)
    }

    /// `unauthorized` problemi üretir.
    #[must_use]
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(ProblemType::Unauthorized, detail)
    }

    /// `accountDoesNotExist` problemi üretir.
    #[must_use]
    pub fn account_does_not_exist() -> Self {
        Self::new(ProblemType::AccountDoesNotExist, "account does not exist")
    }

    /// İç hata nedenini saklayan `serverInternal` problemi üretir.
    ///
    /// Neden yanıt gövdesine hiçbir zaman yazılmaz; istemci kanonik detayı
    /// görür, neden log kaydında kalır.
    #[must_use]
    pub fn server_internal(cause: impl Into<String>) -> Self {
        let mut problem = Self::new(
            ProblemType::ServerInternal,
            "The server experienced an internal error",
        );
        problem.cause = Some(cause.into());
        problem
    }

    /// Probleme bir identifier bağlar.
    #[must_use]
    pub fn with_identifier(mut self, identifier: ProblemIdentifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Probleme bir alt problem ekler.
    #[must_use]
    pub fn with_subproblem(mut self, subproblem: Subproblem) -> Self {
        self.subproblems.push(subproblem);
        self
    }

    /// Problem türü.
    #[must_use]
    pub const fn kind(&self) -> ProblemType {
        self.kind
    }

    /// Türe bağlı HTTP durum kodu.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.kind.status()
    }

    /// İstemciye dönen detay metni.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Yalnızca loglanacak iç neden.
    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// `application/problem+json` gövdesini üretir.
    #[must_use]
    pub fn body(&self) -> ProblemBody {
        ProblemBody {
            kind: self.kind.urn(),
            detail: self.detail.clone(),
            status: self.kind.status(),
            subproblems: self.subproblems.clone(),
            identifier: self.identifier.clone(),
        }
    }
}

impl fmt::Display for AcmeProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.urn(), self.detail)
    }
}

/// Tel üzerinde serileştirilen problem belgesi.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemBody {
    #[serde(rename = "type")]
    kind: &'static str,
    detail: String,
    status: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    subproblems: Vec<Subproblem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<ProblemIdentifier>,
}
