//! API integration tests for keyreg-server.
//!
//! These drive the full router with `oneshot`, carrying the session cookie
//! between the two ceremony requests the way a browser would.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use keyreg_core::testing::{SoftAuthenticator, Tamper};
use keyreg_core::Challenge;
use keyreg_server::webauthn::storage::MemoryCredentialStore;
use keyreg_server::webauthn::CredentialStore;
use keyreg_server::{create_router, create_router_with_config, AppState, Config, RelyingParty};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<MemoryCredentialStore>,
    rp: RelyingParty,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        Self::with_rp(RelyingParty::default())
    }

    fn with_rp(rp: RelyingParty) -> Self {
        let config = Config::default();
        let store = Arc::new(MemoryCredentialStore::new());
        let state = AppState::new(&config, rp.clone(), store.clone());
        Self {
            router: create_router_with_config(&config, state),
            store,
            rp,
        }
    }

    async fn post(&self, path: &str, body: impl Into<Body>, cookie: Option<&str>) -> Reply {
        let mut request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(body.into()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply {
            status,
            cookie,
            body,
        }
    }

    /// Start a ceremony; returns the session cookie and the issued challenge.
    async fn register(&self, username: &str, name: &str) -> (String, Challenge, Value) {
        let reply = self
            .post(
                "/webauthn/register",
                json!({"username": username, "name": name}).to_string(),
                None,
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        let cookie = reply.cookie.expect("session cookie");
        let challenge =
            Challenge::from_base64url(reply.body["challenge"].as_str().unwrap()).unwrap();
        (cookie, challenge, reply.body)
    }

    async fn respond(&self, cookie: &str, credential: &Value) -> Reply {
        self.post("/webauthn/response", credential.to_string(), Some(cookie))
            .await
    }

    fn credential(&self, authenticator: &SoftAuthenticator, challenge: &Challenge) -> Value {
        authenticator.register(challenge, &self.rp.origin, &self.rp.id)
    }
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let response = create_router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "keyreg-server");
    assert_eq!(json["storage"], "memory");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint() {
    let response = create_router()
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_openapi_document() {
    let response = create_router()
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Registration start
// ============================================================================

#[tokio::test]
async fn test_register_returns_ceremony_params() {
    let app = TestApp::new();
    let (_, challenge, body) = app.register("alice", "Alice A.").await;

    assert_eq!(body["challenge"], challenge.to_base64url());
    assert_eq!(body["rp"]["name"], "WebAuthn Demo");
    assert_eq!(body["user"]["name"], "alice");
    assert_eq!(body["user"]["displayName"], "Alice A.");
    assert_eq!(body["attestation"], "direct");
    assert_eq!(
        body["pubKeyCredParams"],
        json!([{"type": "public-key", "alg": -7}])
    );

    let user = app.store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(body["user"]["id"], user.id);
    assert!(!user.registered);
}

#[tokio::test]
async fn test_register_challenges_are_distinct() {
    let app = TestApp::new();
    let (_, first, _) = app.register("alice", "Alice A.").await;
    let (_, second, _) = app.register("bob", "Bob B.").await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = TestApp::new();

    let reply = app.post("/webauthn/register", "", None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Missing request body");
    assert_eq!(reply.body["code"], "INVALID_INPUT");

    let reply = app
        .post("/webauthn/register", json!({"name": "A"}).to_string(), None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Username not provided");

    let reply = app
        .post(
            "/webauthn/register",
            json!({"username": "alice"}).to_string(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Name not provided");

    assert!(app.store.is_empty());
}

// ============================================================================
// Full ceremony
// ============================================================================

#[tokio::test]
async fn test_end_to_end_registration() {
    let app = TestApp::new();
    let authenticator = SoftAuthenticator::packed_self();

    let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
    let reply = app
        .respond(&cookie, &app.credential(&authenticator, &challenge))
        .await;

    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body, json!({"error": "registered credential successfully"}));

    let user = app.store.get_user("alice").await.unwrap().unwrap();
    assert!(user.registered);
    assert_eq!(user.name, "Alice A.");
    assert_eq!(user.authenticators.len(), 1);
    assert_eq!(
        user.authenticators[0].credential_id,
        authenticator.credential_id_base64url()
    );
    assert_eq!(user.authenticators[0].algorithm, -7);
}

#[tokio::test]
async fn test_each_attestation_format_registers() {
    for (username, authenticator) in [
        ("packed-x5c", SoftAuthenticator::packed_x5c()),
        ("u2f", SoftAuthenticator::fido_u2f()),
    ] {
        let app = TestApp::new();
        let (cookie, challenge, _) = app.register(username, "Someone").await;
        let reply = app
            .respond(&cookie, &app.credential(&authenticator, &challenge))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}: {}", username, reply.body);
    }
}

#[tokio::test]
async fn test_replayed_response_is_rejected() {
    let app = TestApp::new();
    let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
    let credential = app.credential(&SoftAuthenticator::packed_self(), &challenge);

    assert_eq!(app.respond(&cookie, &credential).await.status, StatusCode::OK);

    let reply = app.respond(&cookie, &credential).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "CHALLENGE_MISMATCH");

    let user = app.store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(user.authenticators.len(), 1);
}

#[tokio::test]
async fn test_registered_username_is_taken() {
    let app = TestApp::new();
    let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
    let credential = app.credential(&SoftAuthenticator::packed_self(), &challenge);
    assert_eq!(app.respond(&cookie, &credential).await.status, StatusCode::OK);

    let reply = app
        .post(
            "/webauthn/register",
            json!({"username": "alice", "name": "Mallory"}).to_string(),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Username already taken");
    assert_eq!(reply.body["code"], "USERNAME_TAKEN");

    let user = app.store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(user.name, "Alice A.");
}

#[tokio::test]
async fn test_pending_username_can_restart() {
    let app = TestApp::new();
    let (_, first, first_body) = app.register("alice", "Alice A.").await;
    let (cookie, second, second_body) = app.register("alice", "Alice B.").await;
    assert_ne!(first, second);
    assert_ne!(first_body["user"]["id"], second_body["user"]["id"]);

    let reply = app
        .respond(
            &cookie,
            &app.credential(&SoftAuthenticator::packed_self(), &second),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let user = app.store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(user.name, "Alice B.");
    assert_eq!(user.id, second_body["user"]["id"]);
}

#[tokio::test]
async fn test_earlier_ceremony_cannot_complete_after_registration() {
    let app = TestApp::new();
    let (stale_cookie, stale, _) = app.register("alice", "Alice A.").await;
    let (cookie, current, current_body) = app.register("alice", "Alice B.").await;

    let owner = SoftAuthenticator::packed_self();
    let reply = app
        .respond(&cookie, &app.credential(&owner, &current))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let reply = app
        .respond(
            &stale_cookie,
            &app.credential(&SoftAuthenticator::fido_u2f(), &stale),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "USERNAME_TAKEN");

    let user = app.store.get_user("alice").await.unwrap().unwrap();
    assert!(user.registered);
    assert_eq!(user.id, current_body["user"]["id"]);
    assert_eq!(user.authenticators.len(), 1);
    assert_eq!(
        user.authenticators[0].credential_id,
        owner.credential_id_base64url()
    );
}

#[tokio::test]
async fn test_superseded_ceremony_cannot_complete() {
    let app = TestApp::new();
    let (stale_cookie, stale, _) = app.register("alice", "Alice A.").await;
    let (_, _, current_body) = app.register("alice", "Alice B.").await;

    let reply = app
        .respond(
            &stale_cookie,
            &app.credential(&SoftAuthenticator::packed_self(), &stale),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "USERNAME_TAKEN");

    let user = app.store.get_user("alice").await.unwrap().unwrap();
    assert!(!user.registered);
    assert_eq!(user.id, current_body["user"]["id"]);
}

// ============================================================================
// Ceremony binding
// ============================================================================

#[tokio::test]
async fn test_challenge_mismatch() {
    let app = TestApp::new();
    let (cookie, _, _) = app.register("alice", "Alice A.").await;
    let credential = app.credential(&SoftAuthenticator::packed_self(), &Challenge::generate());

    let reply = app.respond(&cookie, &credential).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Challenge mismatch");
    assert_eq!(reply.body["code"], "CHALLENGE_MISMATCH");
    assert!(!app.store.get_user("alice").await.unwrap().unwrap().registered);
}

#[tokio::test]
async fn test_response_without_session() {
    let app = TestApp::new();
    let (_, challenge, _) = app.register("alice", "Alice A.").await;
    let credential = app.credential(&SoftAuthenticator::packed_self(), &challenge);

    let reply = app
        .post("/webauthn/response", credential.to_string(), None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "CHALLENGE_MISMATCH");
}

#[tokio::test]
async fn test_origin_mismatch() {
    let app = TestApp::new();
    let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
    let credential = SoftAuthenticator::packed_self().register(
        &challenge,
        "https://evil.example",
        &app.rp.id,
    );

    let reply = app.respond(&cookie, &credential).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "ORIGIN_MISMATCH");
}

#[tokio::test]
async fn test_assertion_shaped_response_is_unsupported() {
    let app = TestApp::new();
    let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
    let credential = SoftAuthenticator::packed_self().register_with(
        &challenge,
        &app.rp.origin,
        &app.rp.id,
        Tamper::OmitAttestationObject,
    );

    let reply = app.respond(&cookie, &credential).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "UNSUPPORTED_RESPONSE");
}

#[tokio::test]
async fn test_response_field_validation() {
    let app = TestApp::new();
    let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
    let mut credential = app.credential(&SoftAuthenticator::packed_self(), &challenge);
    credential["type"] = json!("password");

    let reply = app.respond(&cookie, &credential).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Credential type must be \"public-key\"");

    let reply = app.post("/webauthn/response", "", Some(cookie.as_str())).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Missing request body");
}

// ============================================================================
// Verification failures
// ============================================================================

#[tokio::test]
async fn test_invalid_signature_is_unauthorized_and_idempotent() {
    let app = TestApp::new();
    let authenticator = SoftAuthenticator::packed_x5c();

    for _ in 0..2 {
        let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
        let before = app.store.get_user("alice").await.unwrap();
        let credential = authenticator.register_with(
            &challenge,
            &app.rp.origin,
            &app.rp.id,
            Tamper::Signature,
        );

        let reply = app.respond(&cookie, &credential).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            reply.body["error"],
            "Attestation signature verification failed"
        );
        assert_eq!(reply.body["code"], "VERIFICATION_FAILED");
        assert_eq!(app.store.get_user("alice").await.unwrap(), before);
    }
}

#[tokio::test]
async fn test_none_attestation_requires_opt_in() {
    let app = TestApp::new();
    let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
    let reply = app
        .respond(&cookie, &app.credential(&SoftAuthenticator::none(), &challenge))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let app = TestApp::with_rp(RelyingParty::default().allow_none_attestation(true));
    let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
    let reply = app
        .respond(&cookie, &app.credential(&SoftAuthenticator::none(), &challenge))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
}

#[tokio::test]
async fn test_unknown_format_is_bad_request() {
    let app = TestApp::new();
    let (cookie, challenge, _) = app.register("alice", "Alice A.").await;
    let credential = SoftAuthenticator::packed_self().register_with(
        &challenge,
        &app.rp.origin,
        &app.rp.id,
        Tamper::Format("tpm"),
    );

    let reply = app.respond(&cookie, &credential).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "INVALID_INPUT");
}
