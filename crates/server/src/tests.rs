use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use p256::ecdsa::{signature::Signer as _, Signature as P256Signature, SigningKey};
use p256::SecretKey as P256SecretKey;
use pretty_assertions::assert_eq;
use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use aunsorm_acme::{
    Account, AccountJwk, AccountStatus, AccountStore, InMemoryAccountStore, InMemoryNonceStore,
    NonceStore, ReplayNonce, REPLAY_NONCE_HEADER,
};

use crate::config::ServerConfig;
use crate::routes::build_router;
use crate::state::ServerState;

const HOST: &str = "ca.example.com";

struct TestCa {
    app: Router,
    state: Arc<ServerState>,
    nonces: Arc<InMemoryNonceStore>,
    accounts: Arc<InMemoryAccountStore>,
}

fn test_ca() -> TestCa {
    let config = ServerConfig::new(
        "127.0.0.1:0".parse().expect("adres"),
        HOST,
        "acme",
        vec!["prov".to_owned()],
    )
    .expect("yapılandırma");
    let nonces = Arc::new(InMemoryNonceStore::new());
    let accounts = Arc::new(InMemoryAccountStore::new());
    let state = Arc::new(
        ServerState::with_stores(
            &config,
            Arc::clone(&nonces) as Arc<dyn NonceStore>,
            Arc::clone(&accounts) as Arc<dyn AccountStore>,
        )
        .expect("durum"),
    );
    TestCa {
        app: build_router(Arc::clone(&state)),
        state,
        nonces,
        accounts,
    }
}

async fn fresh_nonce(ca: &TestCa) -> String {
    ca.state
        .nonces()
        .create()
        .await
        .expect("nonce üretimi")
        .into_inner()
}

fn es256_key(seed: u8) -> SigningKey {
    let secret = P256SecretKey::from_slice(&[seed; 32]).expect("p256 anahtarı");
    SigningKey::from(secret)
}

fn jwk_value(key: &SigningKey) -> Value {
    let point = key.verifying_key().to_encoded_point(false);
    json!({
        "kty": "EC",
        "crv": "P-256",
        "x": URL_SAFE_NO_PAD.encode(point.x().expect("x")),
        "y": URL_SAFE_NO_PAD.encode(point.y().expect("y")),
    })
}

fn manual_body(header: &Value, payload: &[u8], signature: &[u8]) -> String {
    json!({
        "protected": URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(header).expect("başlık serileştirme")),
        "payload": URL_SAFE_NO_PAD.encode(payload),
        "signature": URL_SAFE_NO_PAD.encode(signature),
    })
    .to_string()
}

fn sign_es256(key: &SigningKey, header: &Value, payload: &[u8]) -> String {
    let protected =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).expect("başlık serileştirme"));
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{protected}.{payload_b64}");
    let signature: P256Signature = key.sign(signing_input.as_bytes());
    json!({
        "protected": protected,
        "payload": payload_b64,
        "signature": URL_SAFE_NO_PAD.encode(signature.to_bytes()),
    })
    .to_string()
}

fn acme_post(path: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::HOST, HOST)
        .header(header::CONTENT_TYPE, "application/jose+json")
        .body(Body::from(body))
        .expect("istek")
}

async fn send(ca: &TestCa, request: Request<Body>) -> Response {
    ca.app.clone().oneshot(request).await.expect("yanıt")
}

async fn response_json(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("gövde");
    serde_json::from_slice(&body).expect("json gövde")
}

fn assert_valid_nonce_header(response: &Response) {
    let nonce = response
        .headers()
        .get(REPLAY_NONCE_HEADER)
        .and_then(|value| value.to_str().ok())
        .expect("Replay-Nonce başlığı");
    ReplayNonce::parse(nonce).expect("geçerli nonce");
}

fn assert_problem_content_type(response: &Response) {
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("application/problem+json")
    );
}

fn account_url(id: &str) -> String {
    format!("https://{HOST}/acme/prov/account/{id}")
}

async fn register_account(ca: &TestCa, key: &SigningKey, id: &str, status: AccountStatus) {
    let account = Account {
        id: id.to_owned(),
        status,
        key: AccountJwk::from_value(&jwk_value(key)).expect("jwk parse"),
        contacts: vec!["mailto:infra@example.org".to_owned()],
        orders_url: format!("{}/orders", account_url(id)),
    };
    ca.accounts.create(account).await.expect("hesap kaydı");
}

#[tokio::test]
async fn directory_lists_provisioner_scoped_resources() {
    let ca = test_ca();
    let request = Request::builder()
        .method("GET")
        .uri("/acme/prov/directory")
        .header(header::HOST, HOST)
        .body(Body::empty())
        .expect("istek");

    let response = send(&ca, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_valid_nonce_header(&response);
    let body = response_json(response).await;
    assert_eq!(
        body["newNonce"],
        format!("https://{HOST}/acme/prov/new-nonce")
    );
    assert_eq!(
        body["newAccount"],
        format!("https://{HOST}/acme/prov/new-account")
    );
    assert_eq!(
        body["newOrder"],
        format!("https://{HOST}/acme/prov/new-order")
    );
    assert_eq!(body["meta"]["externalAccountRequired"], Value::Bool(false));
}

#[tokio::test]
async fn new_nonce_issues_fresh_values() {
    let ca = test_ca();
    let request = Request::builder()
        .method("GET")
        .uri("/acme/prov/new-nonce")
        .header(header::HOST, HOST)
        .body(Body::empty())
        .expect("istek");
    let response = send(&ca, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_valid_nonce_header(&response);
    assert_eq!(
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok()),
        Some("no-store")
    );

    let head = Request::builder()
        .method("HEAD")
        .uri("/acme/prov/new-nonce")
        .header(header::HOST, HOST)
        .body(Body::empty())
        .expect("istek");
    let response = send(&ca, head).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_valid_nonce_header(&response);
}

#[tokio::test]
async fn account_fetch_with_kid_succeeds_and_consumes_nonce() {
    let ca = test_ca();
    let key = es256_key(7);
    register_account(&ca, &key, "acc-1", AccountStatus::Valid).await;
    let nonce = fresh_nonce(&ca).await;

    let body = sign_es256(
        &key,
        &json!({
            "alg": "ES256",
            "kid": account_url("acc-1"),
            "nonce": nonce.clone(),
            "url": account_url("acc-1"),
        }),
        b"{}",
    );
    let response = send(&ca, acme_post("/acme/prov/account/acc-1", body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_valid_nonce_header(&response);
    let body = response_json(response).await;
    assert_eq!(body["status"], "valid");
    assert_eq!(body["orders"], format!("{}/orders", account_url("acc-1")));

    // Sunulan nonce tüketilmiş olmalı.
    assert!(ca.nonces.consume(&nonce).await.is_err());
}

#[tokio::test]
async fn unknown_nonce_is_rejected() {
    let ca = test_ca();
    let key = es256_key(7);
    register_account(&ca, &key, "acc-1", AccountStatus::Valid).await;

    let body = sign_es256(
        &key,
        &json!({
            "alg": "ES256",
            "kid": account_url("acc-1"),
            "nonce": "N-unknown",
            "url": account_url("acc-1"),
        }),
        b"{}",
    );
    let response = send(&ca, acme_post("/acme/prov/account/acc-1", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_valid_nonce_header(&response);
    assert_problem_content_type(&response);
    let body = response_json(response).await;
    assert_eq!(body["type"], "urn:ietf:params:acme:error:badNonce");
}

#[tokio::test]
async fn url_mismatch_is_malformed_and_burns_the_nonce() {
    let ca = test_ca();
    let key = es256_key(7);
    register_account(&ca, &key, "acc-1", AccountStatus::Valid).await;
    let nonce = fresh_nonce(&ca).await;

    let body = sign_es256(
        &key,
        &json!({
            "alg": "ES256",
            "kid": account_url("acc-1"),
            "nonce": nonce.clone(),
            "url": "https://ca/wrong",
        }),
        b"{}",
    );
    let response = send(&ca, acme_post("/acme/prov/account/acc-1", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["type"], "urn:ietf:params:acme:error:malformed");
    assert!(body["detail"]
        .as_str()
        .expect("detail")
        .starts_with("url header in JWS"));
    assert!(ca.nonces.consume(&nonce).await.is_err());
}

#[tokio::test]
async fn mac_algorithm_is_rejected_without_burning_the_nonce() {
    let ca = test_ca();
    let key = es256_key(7);
    register_account(&ca, &key, "acc-1", AccountStatus::Valid).await;
    let nonce = fresh_nonce(&ca).await;

    let body = manual_body(
        &json!({
            "alg": "HS256",
            "kid": account_url("acc-1"),
            "nonce": nonce.clone(),
            "url": account_url("acc-1"),
        }),
        b"{}",
        &[0_u8; 32],
    );
    let response = send(&ca, acme_post("/acme/prov/account/acc-1", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(
        body["type"],
        "urn:ietf:params:acme:error:badSignatureAlgorithm"
    );
    assert_eq!(body["detail"], "unsuitable algorithm: HS256");
    // Politika reddi nonce'u yakmaz.
    assert!(ca.nonces.consume(&nonce).await.is_ok());
}

#[tokio::test]
async fn new_account_bootstrap_creates_an_account() {
    let ca = test_ca();
    let key = es256_key(21);
    let nonce = fresh_nonce(&ca).await;

    let payload = json!({
        "contact": ["mailto:infra@example.org"],
        "termsOfServiceAgreed": true,
    });
    let body = sign_es256(
        &key,
        &json!({
            "alg": "ES256",
            "jwk": jwk_value(&key),
            "nonce": nonce,
            "url": format!("https://{HOST}/acme/prov/new-account"),
        }),
        &serde_json::to_vec(&payload).expect("payload"),
    );
    let response = send(&ca, acme_post("/acme/prov/new-account", body)).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_valid_nonce_header(&response);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("Location başlığı")
        .to_owned();
    assert!(location.starts_with(&format!("https://{HOST}/acme/prov/account/")));
    assert_eq!(
        response
            .headers()
            .get(header::LINK)
            .and_then(|value| value.to_str().ok()),
        Some(format!("<https://{HOST}/acme/prov/directory>;rel=\"index\"").as_str())
    );

    let body = response_json(response).await;
    assert_eq!(body["status"], "valid");
    assert_eq!(body["contact"][0], "mailto:infra@example.org");

    // Hesap anahtar kimliği üzerinden bulunabilmeli.
    let jwk = AccountJwk::from_value(&jwk_value(&key)).expect("jwk parse");
    let stored = ca
        .accounts
        .get_by_key_id(jwk.key_id())
        .await
        .expect("hesap depoda olmalı");
    assert!(location.ends_with(&stored.id));
}

#[tokio::test]
async fn small_rsa_key_is_rejected() {
    let ca = test_ca();
    let nonce = fresh_nonce(&ca).await;

    let mut rng = ChaCha20Rng::from_seed([11_u8; 32]);
    let private = RsaPrivateKey::new(&mut rng, 1024).expect("rsa anahtarı üretimi");
    let public = private.to_public_key();
    let jwk = json!({
        "kty": "RSA",
        "n": URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
        "e": URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
    });

    let body = manual_body(
        &json!({
            "alg": "RS256",
            "jwk": jwk,
            "nonce": nonce,
            "url": format!("https://{HOST}/acme/prov/new-account"),
        }),
        b"{}",
        &[0_u8; 128],
    );
    let response = send(&ca, acme_post("/acme/prov/new-account", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["type"], "urn:ietf:params:acme:error:malformed");
    assert_eq!(
        body["detail"],
        "rsa keys must be at least 2048 bits (256 bytes) in size"
    );
}

#[tokio::test]
async fn deactivated_account_cannot_authenticate() {
    let ca = test_ca();
    let key = es256_key(7);
    register_account(&ca, &key, "acc-1", AccountStatus::Deactivated).await;
    let nonce = fresh_nonce(&ca).await;

    let body = sign_es256(
        &key,
        &json!({
            "alg": "ES256",
            "kid": account_url("acc-1"),
            "nonce": nonce,
            "url": account_url("acc-1"),
        }),
        b"{}",
    );
    let response = send(&ca, acme_post("/acme/prov/account/acc-1", body)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["type"], "urn:ietf:params:acme:error:unauthorized");
    assert_eq!(body["detail"], "account is not active");
}

#[tokio::test]
async fn account_can_be_deactivated_via_update() {
    let ca = test_ca();
    let key = es256_key(7);
    register_account(&ca, &key, "acc-1", AccountStatus::Valid).await;
    let nonce = fresh_nonce(&ca).await;

    let body = sign_es256(
        &key,
        &json!({
            "alg": "ES256",
            "kid": account_url("acc-1"),
            "nonce": nonce,
            "url": account_url("acc-1"),
        }),
        br#"{"status":"deactivated"}"#,
    );
    let response = send(&ca, acme_post("/acme/prov/account/acc-1", body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "deactivated");

    let stored = ca.accounts.get("acc-1").await.expect("hesap");
    assert_eq!(stored.status, AccountStatus::Deactivated);
}

#[tokio::test]
async fn new_order_returns_a_pending_order() {
    let ca = test_ca();
    let key = es256_key(7);
    register_account(&ca, &key, "acc-1", AccountStatus::Valid).await;
    let nonce = fresh_nonce(&ca).await;

    let payload = json!({
        "identifiers": [
            {"type": "dns", "value": "example.org"},
            {"type": "dns", "value": "www.example.org"},
        ],
    });
    let body = sign_es256(
        &key,
        &json!({
            "alg": "ES256",
            "kid": account_url("acc-1"),
            "nonce": nonce,
            "url": format!("https://{HOST}/acme/prov/new-order"),
        }),
        &serde_json::to_vec(&payload).expect("payload"),
    );
    let response = send(&ca, acme_post("/acme/prov/new-order", body)).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("Location başlığı")
        .to_owned();
    assert!(location.starts_with(&format!("https://{HOST}/acme/prov/order/")));

    let body = response_json(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(
        body["identifiers"]
            .as_array()
            .expect("identifier listesi")
            .len(),
        2
    );
    assert_eq!(
        body["authorizations"]
            .as_array()
            .expect("authorization listesi")
            .len(),
        2
    );
    assert_eq!(body["finalize"], format!("{location}/finalize"));
}

#[tokio::test]
async fn revoke_cert_accepts_an_embedded_key_request() {
    let ca = test_ca();
    let key = es256_key(33);
    let nonce = fresh_nonce(&ca).await;

    let payload = json!({
        "certificate": URL_SAFE_NO_PAD.encode(b"sahte-der-sertifika"),
        "reason": 4,
    });
    let body = sign_es256(
        &key,
        &json!({
            "alg": "ES256",
            "jwk": jwk_value(&key),
            "nonce": nonce,
            "url": format!("https://{HOST}/acme/prov/revoke-cert"),
        }),
        &serde_json::to_vec(&payload).expect("payload"),
    );
    let response = send(&ca, acme_post("/acme/prov/revoke-cert", body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_valid_nonce_header(&response);
}

#[tokio::test]
async fn certificate_download_requires_post_as_get() {
    let ca = test_ca();
    let key = es256_key(7);
    register_account(&ca, &key, "acc-1", AccountStatus::Valid).await;
    ca.state
        .insert_certificate("crt-1", "-----BEGIN CERTIFICATE-----\nMIIB...\n-----END CERTIFICATE-----\n")
        .await;

    let url = format!("https://{HOST}/acme/prov/certificate/crt-1");

    // "{}" gövdesi POST-as-GET değildir.
    let nonce = fresh_nonce(&ca).await;
    let body = sign_es256(
        &key,
        &json!({"alg": "ES256", "kid": account_url("acc-1"), "nonce": nonce, "url": url.clone()}),
        b"{}",
    );
    let response = send(&ca, acme_post("/acme/prov/certificate/crt-1", body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let problem = response_json(response).await;
    assert_eq!(problem["detail"], "expected POST-as-GET");

    // Boş payload sertifikayı indirir.
    let nonce = fresh_nonce(&ca).await;
    let body = sign_es256(
        &key,
        &json!({"alg": "ES256", "kid": account_url("acc-1"), "nonce": nonce, "url": url}),
        b"",
    );
    let response = send(&ca, acme_post("/acme/prov/certificate/crt-1", body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("application/pem-certificate-chain")
    );
    let pem = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("gövde");
    assert!(pem.starts_with(b"-----BEGIN CERTIFICATE-----"));
}

#[tokio::test]
async fn unknown_provisioner_is_rejected() {
    let ca = test_ca();
    let request = Request::builder()
        .method("GET")
        .uri("/acme/yok/directory")
        .header(header::HOST, HOST)
        .body(Body::empty())
        .expect("istek");
    let response = send(&ca, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_valid_nonce_header(&response);
    assert_problem_content_type(&response);
    let body = response_json(response).await;
    assert_eq!(body["type"], "urn:ietf:params:acme:error:malformed");
    assert_eq!(body["detail"], "unknown provisioner: yok");
}

#[tokio::test]
async fn content_type_gate_rejects_plain_json() {
    let ca = test_ca();
    let request = Request::builder()
        .method("POST")
        .uri("/acme/prov/new-account")
        .header(header::HOST, HOST)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .expect("istek");
    let response = send(&ca, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_valid_nonce_header(&response);
    let body = response_json(response).await;
    assert_eq!(
        body["detail"],
        "expected content-type to be in [application/jose+json], but got application/json"
    );
}

#[tokio::test]
async fn concurrent_requests_with_one_nonce_have_a_single_winner() {
    let ca = test_ca();
    let key = es256_key(7);
    register_account(&ca, &key, "acc-1", AccountStatus::Valid).await;
    let nonce = fresh_nonce(&ca).await;

    let body = sign_es256(
        &key,
        &json!({
            "alg": "ES256",
            "kid": account_url("acc-1"),
            "nonce": nonce,
            "url": account_url("acc-1"),
        }),
        b"{}",
    );

    let first = ca
        .app
        .clone()
        .oneshot(acme_post("/acme/prov/account/acc-1", body.clone()));
    let second = ca
        .app
        .clone()
        .oneshot(acme_post("/acme/prov/account/acc-1", body));
    let (first, second) = tokio::join!(first, second);
    let statuses = [
        first.expect("yanıt").status(),
        second.expect("yanıt").status(),
    ];

    let winners = statuses
        .iter()
        .filter(|status| **status == StatusCode::OK)
        .count();
    let losers = statuses
        .iter()
        .filter(|status| **status == StatusCode::BAD_REQUEST)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(losers, 1);
}
