use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use aunsorm_acme::AcmeProblem;

/// Uygulama genel hata türü.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Yapılandırma hatası.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// I/O hatası.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// ACME problemini `application/problem+json` yanıtına çevirir.
///
/// `serverInternal` problemlerinin iç nedeni burada loglanır; yanıt gövdesi
/// yalnızca kanonik detayı taşır.
pub(crate) fn problem_response(problem: &AcmeProblem) -> Response {
    if let Some(cause) = problem.cause() {
        error!(kind = %problem.kind(), cause, "ACME isteği reddedildi");
    }

    let status =
        StatusCode::from_u16(problem.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::to_vec(&problem.body()).unwrap_or_else(|_| b"{}".to_vec());

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/problem+json"),
    );
    response
}

/// İşleyicilerin `?` ile yükseltebildiği ACME problem sarmalayıcısı.
#[derive(Debug)]
pub(crate) struct ApiProblem(AcmeProblem);

impl From<AcmeProblem> for ApiProblem {
    fn from(problem: AcmeProblem) -> Self {
        Self(problem)
    }
}

impl IntoResponse for ApiProblem {
    fn into_response(self) -> Response {
        problem_response(&self.0)
    }
}
