//! İstek ömrü boyunca taşınan bağlam değerlerinin tipli erişimi.
//!
//! Her boru hattı aşaması isteğin `Extensions` alanına en fazla bir değer
//! yazar; buradaki erişimciler eksik değeri `serverInternal` problemine
//! çevirir. Sıralama kısıtları doğruysa bu hatalar hiçbir zaman üretilmez.

use std::sync::Arc;

use axum::extract::Request;

use aunsorm_acme::{AccountJwk, AcmeProblem, IncomingJws, VerifiedPayload};

use crate::linker::BaseUrl;
use crate::state::Provisioner;

pub(crate) fn require_base_url(req: &Request) -> Result<BaseUrl, AcmeProblem> {
    req.extensions()
        .get::<BaseUrl>()
        .cloned()
        .ok_or_else(|| AcmeProblem::server_internal("baseURL expected in request context"))
}

pub(crate) fn base_url(req: &Request) -> Option<BaseUrl> {
    req.extensions().get::<BaseUrl>().cloned()
}

pub(crate) fn require_provisioner(req: &Request) -> Result<Arc<Provisioner>, AcmeProblem> {
    req.extensions()
        .get::<Arc<Provisioner>>()
        .cloned()
        .ok_or_else(|| AcmeProblem::server_internal("provisioner expected in request context"))
}

pub(crate) fn require_jws(req: &Request) -> Result<Arc<IncomingJws>, AcmeProblem> {
    req.extensions()
        .get::<Arc<IncomingJws>>()
        .cloned()
        .ok_or_else(|| AcmeProblem::server_internal("jws expected in request context"))
}

pub(crate) fn require_jwk(req: &Request) -> Result<Arc<AccountJwk>, AcmeProblem> {
    req.extensions()
        .get::<Arc<AccountJwk>>()
        .cloned()
        .ok_or_else(|| AcmeProblem::server_internal("jwk expected in request context"))
}

pub(crate) fn require_payload(req: &Request) -> Result<Arc<VerifiedPayload>, AcmeProblem> {
    req.extensions()
        .get::<Arc<VerifiedPayload>>()
        .cloned()
        .ok_or_else(|| AcmeProblem::server_internal("payload expected in request context"))
}
