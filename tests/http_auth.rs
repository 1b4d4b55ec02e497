// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end checks of the auth pipeline through the HTTP router.

use std::io::Write;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    response::Response,
    Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use secnex_auth::{api::router, config::Config, state::AppState};

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
const ED25519_PRIVATE: &[u8] = include_bytes!("fixtures/ed25519_private.pem");
const OTHER_ED25519_PRIVATE: &[u8] = include_bytes!("fixtures/other_ed25519_private.pem");

const POLICY: &str = r#"{
    "roles": {
        "admin": ["*"],
        "operator": ["test:read", "identity:read"],
        "viewer": ["identity:read"]
    },
    "operations": {
        "GET /test": { "capability": "test:read" },
        "GET /v1/whoami": { "capability": "identity:read" }
    }
}"#;

struct TestApp {
    app: Router,
    state: AppState,
    _policy: NamedTempFile,
}

fn app_with(extra: &[(&str, &str)]) -> TestApp {
    let mut policy = NamedTempFile::new().unwrap();
    policy.write_all(POLICY.as_bytes()).unwrap();

    let mut vars: Vec<(String, String)> = vec![
        (
            "SECNEX_GATEWAY_PUBLIC_KEY".into(),
            format!("{FIXTURES}/ed25519_public.pem"),
        ),
        (
            "AUTH_POLICY_PATH".into(),
            policy.path().display().to_string(),
        ),
        ("HASH_MEMORY_KIB".into(), "1024".into()),
        ("HASH_ITERATIONS".into(), "1".into()),
        ("HASH_PARALLELISM".into(), "1".into()),
    ];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    let config = Config::from_lookup(|key| {
        vars.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap();
    let state = AppState::from_config(&config).unwrap();

    TestApp {
        app: router(state.clone()),
        state,
        _policy: policy,
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn claims(id: &str, role: &str, scope: &str) -> Value {
    json!({
        "id": id,
        "type": "user",
        "role": role,
        "scope": scope,
        "object": { "kind": "user", "id": id },
        "exp": now() + 600
    })
}

fn sign(payload: &Value, private_pem: &[u8]) -> String {
    let key = EncodingKey::from_ed_pem(private_pem).unwrap();
    encode(&Header::new(Algorithm::EdDSA), payload, &key).unwrap()
}

async fn get(app: &Router, uri: &str, authorization: Option<&str>) -> Response {
    send(app, Method::GET, uri, authorization).await
}

async fn send(app: &Router, method: Method, uri: &str, authorization: Option<&str>) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        request = request.header(AUTHORIZATION, value);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn healthz_is_public() {
    let t = app_with(&[]);
    let response = get(&t.app, "/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn protected_route_without_header_is_401() {
    let t = app_with(&[]);
    let response = get(&t.app, "/test", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error_code"], "missing_auth_header");
}

#[tokio::test]
async fn garbage_token_is_401_malformed() {
    let t = app_with(&[]);
    let response = get(&t.app, "/test", Some("Bearer notatoken")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error_code"], "malformed_token");
}

#[tokio::test]
async fn token_from_other_key_is_401_signature() {
    let t = app_with(&[]);
    let token = sign(&claims("user_1", "operator", ""), OTHER_ED25519_PRIVATE);
    let response = get(&t.app, "/test", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error_code"], "invalid_signature");
}

#[tokio::test]
async fn expired_token_is_401() {
    let t = app_with(&[]);
    let mut payload = claims("user_1", "operator", "");
    payload["exp"] = json!(now() - 3600);
    let token = sign(&payload, ED25519_PRIVATE);

    let response = get(&t.app, "/test", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error_code"], "token_expired");
}

#[tokio::test]
async fn valid_token_reaches_handler() {
    let t = app_with(&[]);
    let token = sign(&claims("user_1", "operator", ""), ED25519_PRIVATE);

    let response = get(&t.app, "/test", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-auth-enforcement").is_none());
    assert_eq!(body_text(response).await, "This is a test!");
}

#[tokio::test]
async fn token_without_capability_is_403() {
    let t = app_with(&[]);
    let token = sign(&claims("user_1", "viewer", ""), ED25519_PRIVATE);

    let response = get(&t.app, "/test", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error_code"], "insufficient_permissions");
}

#[tokio::test]
async fn head_is_authorized_like_get() {
    let t = app_with(&[]);
    let viewer = format!("Bearer {}", sign(&claims("user_1", "viewer", ""), ED25519_PRIVATE));
    let operator = format!("Bearer {}", sign(&claims("user_1", "operator", ""), ED25519_PRIVATE));

    let response = send(&t.app, Method::HEAD, "/test", Some(&viewer)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&t.app, Method::HEAD, "/test", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&t.app, Method::HEAD, "/test", Some(&operator)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn scope_revocation_overrides_role() {
    let t = app_with(&[]);
    let token = sign(&claims("user_1", "admin", "!test:read"), ED25519_PRIVATE);

    let response = get(&t.app, "/test", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn disabled_enforcement_is_marked_on_response() {
    let t = app_with(&[("AUTH_ENABLED", "false")]);

    let response = get(&t.app, "/test", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-auth-enforcement").unwrap(),
        "disabled"
    );

    let whoami = body_json(get(&t.app, "/v1/whoami", None).await).await;
    assert_eq!(whoami["authenticated"], false);
}

#[tokio::test]
async fn unrecognized_enforcement_value_keeps_auth_on() {
    let t = app_with(&[("AUTH_ENABLED", "nah")]);
    let response = get(&t.app, "/test", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_includes_stored_account() {
    let t = app_with(&[]);
    let user = t
        .state
        .users
        .create_user("ada@example.com", "correct horse")
        .await
        .unwrap();

    let token = sign(&claims(&user.id.to_string(), "viewer", ""), ED25519_PRIVATE);
    let response = get(&t.app, "/v1/whoami", Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["caller"]["id"], user.id.to_string());
    assert_eq!(body["caller"]["type"], "user");
    assert_eq!(body["caller"]["account"]["email"], "ada@example.com");
}

#[tokio::test]
async fn request_id_is_propagated() {
    let t = app_with(&[]);
    let response = get(&t.app, "/healthz", None).await;
    assert!(response.headers().contains_key("x-request-id"));
}
