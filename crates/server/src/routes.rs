use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tower::ServiceBuilder;
use tracing::{info, warn};
use url::{ParseError, Url};

use aunsorm_acme::{Account, AccountJwk, AccountStatus, AcmeProblem, VerifiedPayload};

use crate::config::ServerConfig;
use crate::error::{ApiProblem, ServerError};
use crate::linker::{BaseUrl, Linker};
use crate::middleware;
use crate::state::{Provisioner, ServerState};

/// Yeni order'ların geçerlilik süresi.
const ORDER_EXPIRATION: Duration = Duration::hours(8);

/// HTTP yönlendiricisini oluşturur.
///
/// Her ACME rotası, aşamaların doğrusal bileşimidir; `ServiceBuilder`
/// yığınları boru hattı sırasını yukarıdan aşağıya okunacak şekilde kurar
/// ve `add_nonce` her zaman en dış katmandır.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let prefix_path = format!("/{}", state.linker().prefix());
    let acme = acme_routes(&state);
    Router::new().nest(&prefix_path, acme).with_state(state)
}

#[allow(clippy::too_many_lines)]
fn acme_routes(state: &Arc<ServerState>) -> Router<Arc<ServerState>> {
    let nonce = || from_fn_with_state(Arc::clone(state), middleware::add_nonce);
    let base_url = || from_fn(middleware::derive_base_url);
    let provisioner = || from_fn_with_state(Arc::clone(state), middleware::resolve_provisioner);
    let dir_link = || from_fn_with_state(Arc::clone(state), middleware::add_directory_link);
    let jose_ct = || from_fn(middleware::expect_jose_content_type);
    let certificate_ct = || from_fn(middleware::expect_certificate_content_type);
    let parse = || from_fn(middleware::parse_jws);
    let validate = || from_fn_with_state(Arc::clone(state), middleware::validate_jws);
    let extract_jwk = || from_fn_with_state(Arc::clone(state), middleware::extract_jwk);
    let lookup_jwk = || from_fn_with_state(Arc::clone(state), middleware::lookup_jwk);
    let verify = || from_fn(middleware::verify_jws_payload);
    let post_as_get = || from_fn(middleware::require_post_as_get);

    Router::new()
        .route(
            "/:provisioner/directory",
            get(directory)
                .route_layer(provisioner())
                .route_layer(base_url())
                .route_layer(nonce()),
        )
        .route(
            "/:provisioner/new-nonce",
            get(new_nonce)
                .route_layer(dir_link())
                .route_layer(provisioner())
                .route_layer(base_url())
                .route_layer(nonce()),
        )
        .route(
            "/:provisioner/new-account",
            post(new_account)
                .route_layer(verify())
                .route_layer(extract_jwk())
                .route_layer(validate())
                .route_layer(parse())
                .route_layer(jose_ct())
                .route_layer(dir_link())
                .route_layer(provisioner())
                .route_layer(base_url())
                .route_layer(nonce()),
        )
        .route(
            "/:provisioner/revoke-cert",
            post(revoke_cert)
                .route_layer(verify())
                .route_layer(extract_jwk())
                .route_layer(validate())
                .route_layer(parse())
                .route_layer(jose_ct())
                .route_layer(dir_link())
                .route_layer(provisioner())
                .route_layer(base_url())
                .route_layer(nonce()),
        )
        .route(
            "/:provisioner/new-order",
            post(new_order)
                .route_layer(verify())
                .route_layer(lookup_jwk())
                .route_layer(validate())
                .route_layer(parse())
                .route_layer(jose_ct())
                .route_layer(dir_link())
                .route_layer(provisioner())
                .route_layer(base_url())
                .route_layer(nonce()),
        )
        .route(
            "/:provisioner/account/:account_id",
            post(get_or_update_account)
                .route_layer(verify())
                .route_layer(lookup_jwk())
                .route_layer(validate())
                .route_layer(parse())
                .route_layer(jose_ct())
                .route_layer(dir_link())
                .route_layer(provisioner())
                .route_layer(base_url())
                .route_layer(nonce()),
        )
        .route(
            "/:provisioner/certificate/:certificate_id",
            post(certificate)
                .route_layer(post_as_get())
                .route_layer(verify())
                .route_layer(lookup_jwk())
                .route_layer(validate())
                .route_layer(parse())
                .route_layer(certificate_ct())
                .route_layer(dir_link())
                .route_layer(provisioner())
                .route_layer(base_url())
                .route_layer(nonce()),
        )
}

/// HTTP sunucusunu başlatır.
///
/// # Errors
///
/// Ağ dinleyicisi oluşturulamazsa veya HTTP hizmeti başlatılamazsa
/// `ServerError` döner.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let listen = config.listen();
    let state = Arc::new(ServerState::try_new(&config)?);
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(address = %listen, "aunsorm-ca dinlemede");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("SIGINT alındı, kapanış başlatılıyor"),
            Err(err) => warn!(error = %err, "CTRL+C sinyali dinlenemedi"),
        }
    };

    #[cfg(unix)]
    {
        let mut term_signal = match unix_signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!(error = %err, "SIGTERM dinleyicisi kurulamadı");
                ctrl_c.await;
                return;
            }
        };

        tokio::select! {
            () = ctrl_c => (),
            () = async {
                term_signal.recv().await;
                info!("SIGTERM alındı, kapanış başlatılıyor");
            } => (),
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn directory(
    State(state): State<Arc<ServerState>>,
    base: Option<Extension<BaseUrl>>,
    Extension(provisioner): Extension<Arc<Provisioner>>,
) -> Result<Response, ApiProblem> {
    let base = base.map(|Extension(value)| value);
    let document = directory_document(state.linker(), base.as_ref(), provisioner.name())
        .map_err(|err| {
            AcmeProblem::server_internal(format!("failed to build directory urls: {err}"))
        })?;
    Ok(Json(document).into_response())
}

fn directory_document(
    linker: &Linker,
    base_url: Option<&BaseUrl>,
    provisioner: &str,
) -> Result<serde_json::Value, ParseError> {
    Ok(json!({
        "newNonce": linker.new_nonce_url(base_url, provisioner)?.as_str(),
        "newAccount": linker.new_account_url(base_url, provisioner)?.as_str(),
        "newOrder": linker.new_order_url(base_url, provisioner)?.as_str(),
        "revokeCert": linker.revoke_cert_url(base_url, provisioner)?.as_str(),
        "meta": {
            "website": "https://docs.aunsorm.example/ca",
            "externalAccountRequired": false,
        },
    }))
}

#[allow(clippy::unused_async)] // Axum işleyicileri async imza bekler.
async fn new_nonce(method: Method) -> Response {
    // RFC 8555 §7.2: HEAD 200, GET 204 döndürür; nonce başlığını dış katman ekler.
    let status = if method == Method::HEAD {
        StatusCode::OK
    } else {
        StatusCode::NO_CONTENT
    };
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

#[derive(Debug, Default, Deserialize)]
struct NewAccountPayload {
    #[serde(default)]
    contact: Vec<String>,
    #[serde(rename = "termsOfServiceAgreed", default)]
    terms_of_service_agreed: bool,
    #[serde(rename = "onlyReturnExisting", default)]
    only_return_existing: bool,
}

async fn new_account(
    State(state): State<Arc<ServerState>>,
    base: Option<Extension<BaseUrl>>,
    Extension(provisioner): Extension<Arc<Provisioner>>,
    Extension(jwk): Extension<Arc<AccountJwk>>,
    account: Option<Extension<Arc<Account>>>,
    Extension(payload): Extension<Arc<VerifiedPayload>>,
) -> Result<Response, ApiProblem> {
    let base = base.map(|Extension(value)| value);

    if let Some(Extension(existing)) = account {
        let location =
            account_location(state.linker(), base.as_ref(), provisioner.name(), &existing.id)?;
        return Ok(account_response(StatusCode::OK, &existing, &location));
    }

    let request: NewAccountPayload = if payload.is_post_as_get || payload.is_empty_json {
        NewAccountPayload::default()
    } else {
        serde_json::from_slice(&payload.value).map_err(|err| {
            AcmeProblem::malformed(format!("failed to parse new-account payload: {err}"))
        })?
    };

    if request.only_return_existing {
        return Err(AcmeProblem::account_does_not_exist().into());
    }

    let id = state.next_account_id();
    let orders_url = state
        .linker()
        .orders_url(base.as_ref(), provisioner.name(), &id)
        .map_err(|err| {
            AcmeProblem::server_internal(format!("failed to build orders url: {err}"))
        })?;
    let account = Account {
        id: id.clone(),
        status: AccountStatus::Valid,
        key: (*jwk).clone(),
        contacts: request.contact,
        orders_url: orders_url.to_string(),
    };
    state
        .accounts()
        .create(account.clone())
        .await
        .map_err(|err| {
            AcmeProblem::server_internal(format!("failed to store account: {err}"))
        })?;
    info!(
        account = %id,
        provisioner = %provisioner.name(),
        terms_agreed = request.terms_of_service_agreed,
        "yeni ACME hesabı oluşturuldu"
    );

    let location = account_location(state.linker(), base.as_ref(), provisioner.name(), &id)?;
    Ok(account_response(StatusCode::CREATED, &account, &location))
}

#[derive(Debug, Deserialize)]
struct UpdateAccountPayload {
    #[serde(default)]
    status: Option<String>,
}

async fn get_or_update_account(
    State(state): State<Arc<ServerState>>,
    base: Option<Extension<BaseUrl>>,
    Extension(provisioner): Extension<Arc<Provisioner>>,
    Path((_, account_id)): Path<(String, String)>,
    Extension(account): Extension<Arc<Account>>,
    Extension(payload): Extension<Arc<VerifiedPayload>>,
) -> Result<Response, ApiProblem> {
    if account.id != account_id {
        return Err(
            AcmeProblem::unauthorized("account id does not match the request url").into(),
        );
    }

    let base = base.map(|Extension(value)| value);
    let location =
        account_location(state.linker(), base.as_ref(), provisioner.name(), &account.id)?;

    // POST-as-GET ve boş JSON güncellemesi hesabı olduğu gibi döndürür.
    if payload.is_post_as_get || payload.is_empty_json {
        return Ok(account_response(StatusCode::OK, &account, &location));
    }

    let request: UpdateAccountPayload = serde_json::from_slice(&payload.value).map_err(|err| {
        AcmeProblem::malformed(format!("failed to parse account update payload: {err}"))
    })?;

    match request.status.as_deref() {
        Some("deactivated") => {
            let updated = state
                .accounts()
                .update_status(&account.id, AccountStatus::Deactivated)
                .await
                .map_err(|err| {
                    AcmeProblem::server_internal(format!("failed to deactivate account: {err}"))
                })?;
            info!(account = %updated.id, "ACME hesabı devre dışı bırakıldı");
            Ok(account_response(StatusCode::OK, &updated, &location))
        }
        Some(other) => Err(AcmeProblem::malformed(format!(
            "cannot update account status to {other}, only deactivated"
        ))
        .into()),
        None => Ok(account_response(StatusCode::OK, &account, &location)),
    }
}

fn account_location(
    linker: &Linker,
    base_url: Option<&BaseUrl>,
    provisioner: &str,
    id: &str,
) -> Result<Url, ApiProblem> {
    linker
        .account_url(base_url, provisioner, id)
        .map_err(|err| {
            AcmeProblem::server_internal(format!("failed to build account url: {err}")).into()
        })
}

fn account_response(status: StatusCode, account: &Account, location: &Url) -> Response {
    let body = json!({
        "status": account.status.as_str(),
        "contact": account.contacts,
        "orders": account.orders_url,
    });
    let mut response = (status, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(location.as_str()) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderIdentifier {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct NewOrderPayload {
    identifiers: Vec<OrderIdentifier>,
    #[serde(rename = "notBefore", default, with = "time::serde::rfc3339::option")]
    not_before: Option<OffsetDateTime>,
    #[serde(rename = "notAfter", default, with = "time::serde::rfc3339::option")]
    not_after: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
struct OrderResponse {
    status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    expires: OffsetDateTime,
    identifiers: Vec<OrderIdentifier>,
    authorizations: Vec<String>,
    finalize: String,
    #[serde(
        rename = "notBefore",
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    not_before: Option<OffsetDateTime>,
    #[serde(
        rename = "notAfter",
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    not_after: Option<OffsetDateTime>,
}

async fn new_order(
    State(state): State<Arc<ServerState>>,
    base: Option<Extension<BaseUrl>>,
    Extension(provisioner): Extension<Arc<Provisioner>>,
    Extension(account): Extension<Arc<Account>>,
    Extension(payload): Extension<Arc<VerifiedPayload>>,
) -> Result<Response, ApiProblem> {
    let request: NewOrderPayload = serde_json::from_slice(&payload.value).map_err(|err| {
        AcmeProblem::malformed(format!("failed to parse new-order payload: {err}"))
    })?;

    if request.identifiers.is_empty() {
        return Err(AcmeProblem::malformed(
            "new-order request must include at least one identifier",
        )
        .into());
    }
    for identifier in &request.identifiers {
        if identifier.kind != "dns" && identifier.kind != "ip" {
            return Err(AcmeProblem::malformed(format!(
                "unsupported identifier type: {}",
                identifier.kind
            ))
            .into());
        }
    }
    if let (Some(not_before), Some(not_after)) = (request.not_before, request.not_after) {
        if not_after < not_before {
            return Err(AcmeProblem::malformed("notAfter must not precede notBefore").into());
        }
    }

    let base = base.map(|Extension(value)| value);
    let id = state.next_order_id();
    let name = provisioner.name();
    let mut authorizations = Vec::with_capacity(request.identifiers.len());
    for index in 0..request.identifiers.len() {
        let url = state
            .linker()
            .authorization_url(base.as_ref(), name, &id, index)
            .map_err(|err| {
                AcmeProblem::server_internal(format!("failed to build authorization url: {err}"))
            })?;
        authorizations.push(url.to_string());
    }
    let finalize = state
        .linker()
        .finalize_url(base.as_ref(), name, &id)
        .map_err(|err| {
            AcmeProblem::server_internal(format!("failed to build finalize url: {err}"))
        })?;
    let location = state
        .linker()
        .order_url(base.as_ref(), name, &id)
        .map_err(|err| {
            AcmeProblem::server_internal(format!("failed to build order url: {err}"))
        })?;

    let order = OrderResponse {
        status: "pending",
        expires: OffsetDateTime::now_utc() + ORDER_EXPIRATION,
        identifiers: request.identifiers,
        authorizations,
        finalize: finalize.to_string(),
        not_before: request.not_before,
        not_after: request.not_after,
    };
    info!(order = %id, account = %account.id, "ACME order oluşturuldu");

    let mut response = (StatusCode::CREATED, Json(order)).into_response();
    if let Ok(value) = HeaderValue::from_str(location.as_str()) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct RevokeCertPayload {
    certificate: String,
    #[serde(default)]
    reason: Option<u8>,
}

async fn revoke_cert(
    Extension(jwk): Extension<Arc<AccountJwk>>,
    Extension(payload): Extension<Arc<VerifiedPayload>>,
) -> Result<Response, ApiProblem> {
    let request: RevokeCertPayload = serde_json::from_slice(&payload.value).map_err(|err| {
        AcmeProblem::malformed(format!("failed to parse revoke-cert payload: {err}"))
    })?;
    if URL_SAFE_NO_PAD.decode(&request.certificate).is_err() {
        return Err(AcmeProblem::malformed("certificate must be base64url encoded DER").into());
    }

    info!(
        key_id = %jwk.key_id(),
        reason = request.reason.unwrap_or_default(),
        "sertifika iptal isteği kabul edildi"
    );
    Ok(StatusCode::OK.into_response())
}

async fn certificate(
    State(state): State<Arc<ServerState>>,
    Path((_, certificate_id)): Path<(String, String)>,
) -> Result<Response, ApiProblem> {
    let chain_pem = state.certificate(&certificate_id).await.ok_or_else(|| {
        AcmeProblem::malformed(format!("certificate {certificate_id} not found"))
    })?;

    let mut response = Response::new(Body::from(chain_pem));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pem-certificate-chain"),
    );
    Ok(response)
}
