//! ACME istek-doğrulama boru hattının aşamaları.
//!
//! Her aşama bir axum katmanıdır: bağlama yeni bir değer ekler, isteği
//! yapılandırılmış bir ACME problemi ile reddeder ya da bir sonraki
//! aşamaya geçirir. Rotalar bu aşamaların doğrusal bileşimidir; sıralama
//! kısıtları `routes.rs` içinde kurulur.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{OriginalUri, Path, Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use aunsorm_acme::{
    algorithm_is_acceptable, header_key_type, header_rsa_modulus_len, key_type_matches_algorithm,
    AccountJwk, AccountStoreError, AcmeProblem, IncomingJws, NonceStoreError, ReplayNonce,
    VerifiedPayload, MIN_RSA_KEY_BYTES, REPLAY_NONCE_HEADER,
};

use crate::context;
use crate::error::problem_response;
use crate::linker::BaseUrl;
use crate::state::ServerState;

/// Tek bir istek gövdesi için üst sınır.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Varsayılan içerik türü beyaz listesi.
const JOSE_CONTENT_TYPES: &[&str] = &["application/jose+json"];

/// Sertifika indirme rotasının genişletilmiş beyaz listesi.
const CERTIFICATE_CONTENT_TYPES: &[&str] = &[
    "application/jose+json",
    "application/pkix-cert",
    "application/pkcs7-mime",
];

/// Her yanıta taze bir `Replay-Nonce` ekler.
///
/// Zincirin en dış katmanıdır: iç aşamalardan dönen retler de dahil olmak
/// üzere her yanıt yeni bir nonce ve `Cache-Control: no-store` taşır. Nonce
/// üretilemezse iç zincir hiç çağrılmaz.
pub(crate) async fn add_nonce(
    State(state): State<Arc<ServerState>>,
    req: Request,
    next: Next,
) -> Response {
    match state.nonces().create().await {
        Ok(nonce) => {
            let mut response = next.run(req).await;
            apply_nonce_headers(&mut response, &nonce);
            response
        }
        Err(err) => problem_response(&AcmeProblem::server_internal(format!(
            "failed to create nonce: {err}"
        ))),
    }
}

fn apply_nonce_headers(response: &mut Response, nonce: &ReplayNonce) {
    if let Ok(value) = HeaderValue::from_str(nonce.as_str()) {
        response.headers_mut().insert(REPLAY_NONCE_HEADER, value);
    }
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
}

/// İstekten kanonik taban URL'ini türetir.
///
/// Şema her zaman `https` olur; otorite `Host` başlığından gelir. Boş host
/// bağlama değer yazmaz, taban URL isteyen aşamalar bu durumu kendisi
/// raporlar.
pub(crate) async fn derive_base_url(mut req: Request, next: Next) -> Response {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| req.uri().authority().map(ToString::to_string));

    if let Some(base) = host.as_deref().and_then(BaseUrl::from_host) {
        req.extensions_mut().insert(base);
    }
    next.run(req).await
}

/// Yoldaki provisioner adını yapılandırılmış kümede çözer.
pub(crate) async fn resolve_provisioner(
    State(state): State<Arc<ServerState>>,
    Path(params): Path<HashMap<String, String>>,
    mut req: Request,
    next: Next,
) -> Response {
    let name = params.get("provisioner").cloned().unwrap_or_default();
    match state.provisioner(&name) {
        Some(provisioner) => {
            req.extensions_mut().insert(provisioner);
            next.run(req).await
        }
        None => problem_response(&AcmeProblem::malformed(format!(
            "unknown provisioner: {name}"
        ))),
    }
}

/// Yanıta `Link: <directory>;rel="index"` başlığını ekler.
pub(crate) async fn add_directory_link(
    State(state): State<Arc<ServerState>>,
    req: Request,
    next: Next,
) -> Response {
    let base = match context::require_base_url(&req) {
        Ok(base) => base,
        Err(problem) => return problem_response(&problem),
    };
    let provisioner = match context::require_provisioner(&req) {
        Ok(provisioner) => provisioner,
        Err(problem) => return problem_response(&problem),
    };

    let directory = match state.linker().directory_url(Some(&base), provisioner.name()) {
        Ok(url) => url,
        Err(err) => {
            return problem_response(&AcmeProblem::server_internal(format!(
                "failed to build directory url: {err}"
            )))
        }
    };

    let link = format!("<{directory}>;rel=\"index\"");
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&link) {
        response.headers_mut().append(header::LINK, value);
    }
    response
}

/// Varsayılan beyaz listeyle içerik türünü denetler.
pub(crate) async fn expect_jose_content_type(req: Request, next: Next) -> Response {
    verify_content_type(JOSE_CONTENT_TYPES, req, next).await
}

/// Sertifika indirme rotasının beyaz listesiyle içerik türünü denetler.
pub(crate) async fn expect_certificate_content_type(req: Request, next: Next) -> Response {
    verify_content_type(CERTIFICATE_CONTENT_TYPES, req, next).await
}

async fn verify_content_type(allowed: &'static [&'static str], req: Request, next: Next) -> Response {
    if let Err(problem) = context::require_provisioner(&req) {
        return problem_response(&problem);
    }

    let seen = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if allowed.contains(&seen) {
        return next.run(req).await;
    }

    problem_response(&AcmeProblem::malformed(format!(
        "expected content-type to be in [{}], but got {}",
        allowed.join(" "),
        seen
    )))
}

/// İstek gövdesini okuyup JWS olarak ayrıştırır ve bağlama yazar.
pub(crate) async fn parse_jws(req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return problem_response(&AcmeProblem::server_internal(format!(
                "failed to read request body: {err}"
            )))
        }
    };

    let jws = match IncomingJws::parse(&bytes) {
        Ok(jws) => jws,
        Err(err) => {
            return problem_response(&AcmeProblem::malformed(format!(
                "failed to parse JWS from request body: {err}"
            )))
        }
    };

    let mut req = Request::from_parts(parts, Body::empty());
    req.extensions_mut().insert(Arc::new(jws));
    next.run(req).await
}

/// JWS üzerinde yapısal ve politika denetimlerini uygular.
///
/// Kriptografiye dokunmaz; imza doğrulaması payload aşamasının işidir.
pub(crate) async fn validate_jws(
    State(state): State<Arc<ServerState>>,
    req: Request,
    next: Next,
) -> Response {
    let jws = match context::require_jws(&req) {
        Ok(jws) => jws,
        Err(problem) => return problem_response(&problem),
    };

    match run_jws_validations(&state, &req, &jws).await {
        Ok(()) => next.run(req).await,
        Err(problem) => problem_response(&problem),
    }
}

async fn run_jws_validations(
    state: &ServerState,
    req: &Request,
    jws: &IncomingJws,
) -> Result<(), AcmeProblem> {
    let signature = jws
        .signature()
        .ok_or_else(|| AcmeProblem::malformed("request body does not contain a signature"))?;
    if jws.signature_count() > 1 {
        return Err(AcmeProblem::malformed(
            "request body contains more than one signature",
        ));
    }

    if !signature.unprotected_header_is_empty() {
        return Err(AcmeProblem::malformed("unprotected header must not be used"));
    }

    let header = signature.protected();
    if !algorithm_is_acceptable(&header.alg) {
        return Err(AcmeProblem::bad_signature_algorithm(format!(
            "unsuitable algorithm: {}",
            header.alg
        )));
    }

    if let Some(jwk) = &header.jwk {
        let kty = header_key_type(jwk).unwrap_or_default();
        if !key_type_matches_algorithm(kty, &header.alg) {
            return Err(AcmeProblem::malformed(
                "jws key type and algorithm do not match",
            ));
        }
        if kty == "RSA" {
            if let Some(modulus_len) = header_rsa_modulus_len(jwk) {
                if modulus_len < MIN_RSA_KEY_BYTES {
                    return Err(AcmeProblem::malformed(
                        "rsa keys must be at least 2048 bits (256 bytes) in size",
                    ));
                }
            }
        }
    }

    // Nonce, URL ve kimlik denetimlerinden önce tüketilir: replay denemesi
    // nonce yakmadan kimlik hatalarını yoklayamaz.
    let nonce = header.nonce.clone().unwrap_or_default();
    match state.nonces().consume(&nonce).await {
        Ok(()) => {}
        Err(NonceStoreError::NotFound) => return Err(AcmeProblem::bad_nonce()),
        Err(err) => {
            return Err(AcmeProblem::server_internal(format!(
                "failed to delete nonce: {err}"
            )))
        }
    }

    let Some(url) = header.url.as_deref() else {
        return Err(AcmeProblem::malformed("jws missing url protected header"));
    };
    let expected = expected_request_url(req)?;
    if url != expected {
        return Err(AcmeProblem::malformed(format!(
            "url header in JWS ({url}) does not match request url ({expected})"
        )));
    }

    match (&header.jwk, &header.kid) {
        (Some(_), Some(_)) => Err(AcmeProblem::malformed("jwk and kid are mutually exclusive")),
        (None, None) => Err(AcmeProblem::malformed(
            "either jwk or kid must be defined in jws protected header",
        )),
        _ => Ok(()),
    }
}

fn expected_request_url(req: &Request) -> Result<String, AcmeProblem> {
    let base = context::require_base_url(req)?;
    // İç içe yönlendirici istek yolunun önekini soyar; JWS url denetimi
    // istemcinin gördüğü tam yol üzerinden yapılmalıdır.
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| req.uri(), |original| &original.0);
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |value| value.as_str());
    Ok(format!("{}{path_and_query}", base.as_str()))
}

/// Hesap açılış yolu: korumalı başlıktaki gömülü JWK'yı çıkarır.
///
/// Anahtar bilinen bir hesaba aitse hesap da bağlama yazılır; bilinmiyorsa
/// karar (hesap açmak gibi) iç işleyiciye bırakılır.
pub(crate) async fn extract_jwk(
    State(state): State<Arc<ServerState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let jws = match context::require_jws(&req) {
        Ok(jws) => jws,
        Err(problem) => return problem_response(&problem),
    };
    let Some(signature) = jws.signature() else {
        return problem_response(&AcmeProblem::server_internal(
            "jws expected in request context",
        ));
    };

    let Some(raw) = signature.protected().jwk.as_ref() else {
        return problem_response(&AcmeProblem::malformed("jwk expected in protected header"));
    };
    let jwk = match AccountJwk::from_value(raw) {
        Ok(jwk) => Arc::new(jwk),
        Err(_) => {
            return problem_response(&AcmeProblem::malformed("invalid jwk in protected header"))
        }
    };
    req.extensions_mut().insert(Arc::clone(&jwk));

    match state.accounts().get_by_key_id(jwk.key_id()).await {
        Ok(account) => {
            if !account.is_valid() {
                return problem_response(&AcmeProblem::unauthorized("account is not active"));
            }
            req.extensions_mut().insert(Arc::new(account));
        }
        Err(AccountStoreError::NotFound) => {}
        Err(AccountStoreError::Problem(problem)) => return problem_response(&problem),
        Err(err) => {
            return problem_response(&AcmeProblem::server_internal(format!(
                "failed to load account by key id: {err}"
            )))
        }
    }

    next.run(req).await
}

/// Hesap kimliği yolu: `kid` değerini hesap URL öneki üzerinden çözer.
pub(crate) async fn lookup_jwk(
    State(state): State<Arc<ServerState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let jws = match context::require_jws(&req) {
        Ok(jws) => jws,
        Err(problem) => return problem_response(&problem),
    };
    let Some(signature) = jws.signature() else {
        return problem_response(&AcmeProblem::server_internal(
            "jws expected in request context",
        ));
    };
    let provisioner = match context::require_provisioner(&req) {
        Ok(provisioner) => provisioner,
        Err(problem) => return problem_response(&problem),
    };

    let base = context::base_url(&req);
    let prefix = match state
        .linker()
        .account_prefix(base.as_ref(), provisioner.name())
    {
        Ok(url) => url,
        Err(err) => {
            return problem_response(&AcmeProblem::server_internal(format!(
                "failed to build account url prefix: {err}"
            )))
        }
    };
    let kid = signature.protected().kid.clone().unwrap_or_default();
    let Some(account_id) = kid.strip_prefix(prefix.as_str()) else {
        return problem_response(&AcmeProblem::malformed(format!(
            "kid does not have required prefix; expected {prefix}, but got {kid}"
        )));
    };

    match state.accounts().get(account_id).await {
        Ok(account) => {
            if !account.is_valid() {
                return problem_response(&AcmeProblem::unauthorized("account is not active"));
            }
            req.extensions_mut().insert(Arc::new(account.key.clone()));
            req.extensions_mut().insert(Arc::new(account));
            next.run(req).await
        }
        Err(AccountStoreError::NotFound) => {
            problem_response(&AcmeProblem::account_does_not_exist())
        }
        Err(AccountStoreError::Problem(problem)) => problem_response(&problem),
        Err(err) => problem_response(&AcmeProblem::server_internal(format!(
            "failed to load account: {err}"
        ))),
    }
}

/// JWS imzasını doğrular ve payload'ı sınıflandırıp bağlama yazar.
pub(crate) async fn verify_jws_payload(mut req: Request, next: Next) -> Response {
    let jws = match context::require_jws(&req) {
        Ok(jws) => jws,
        Err(problem) => return problem_response(&problem),
    };
    let jwk = match context::require_jwk(&req) {
        Ok(jwk) => jwk,
        Err(problem) => return problem_response(&problem),
    };
    let Some(signature) = jws.signature() else {
        return problem_response(&AcmeProblem::server_internal(
            "jws expected in request context",
        ));
    };
    let Some(signing_input) = jws.signing_input() else {
        return problem_response(&AcmeProblem::server_internal(
            "jws expected in request context",
        ));
    };

    let alg = signature.protected().alg.as_str();
    if let Some(declared) = jwk.algorithm() {
        if declared != alg {
            return problem_response(&AcmeProblem::malformed(
                "verifier and signature algorithm do not match",
            ));
        }
    }

    if let Err(err) = jwk.verify(alg, &signing_input, signature.signature()) {
        return problem_response(&AcmeProblem::malformed(format!(
            "error verifying jws: {err}"
        )));
    }

    let payload = VerifiedPayload::classify(jws.payload().to_vec());
    req.extensions_mut().insert(Arc::new(payload));
    next.run(req).await
}

/// Salt okunur rotalar için gövdenin POST-as-GET olmasını şart koşar.
pub(crate) async fn require_post_as_get(req: Request, next: Next) -> Response {
    let payload = match context::require_payload(&req) {
        Ok(payload) => payload,
        Err(problem) => return problem_response(&problem),
    };
    if payload.is_post_as_get {
        next.run(req).await
    } else {
        problem_response(&AcmeProblem::malformed("expected POST-as-GET"))
    }
}
