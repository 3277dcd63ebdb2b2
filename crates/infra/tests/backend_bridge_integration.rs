//! Integration tests for the backend session bridge
//!
//! **Coverage:**
//! - `/register` request body and profile decoding
//! - Session cookie from `/login` carried to `/me` and `/logout`
//! - `/me` 404 → no profile, 401 → status error
//! - `/users` idempotency: 201, 409, legacy "User already exists" body, 5xx

use homechef_core::{BridgeError, EnsureRegistered, SessionBackend};
use homechef_domain::{IdToken, IdentityPrincipal, RegistrationFields, Role};
use homechef_infra::{BackendSessionBridge, HttpClient};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn principal() -> IdentityPrincipal {
    IdentityPrincipal {
        uid: "uid-42".to_string(),
        email: "chef@homechef.test".to_string(),
        display_name: Some("Chef Ana".to_string()),
        photo_url: None,
        token: IdToken::new("id-token-42".to_string(), 3600),
    }
}

fn bridge(server: &MockServer) -> BackendSessionBridge {
    let http = HttpClient::builder().max_attempts(1).build().unwrap();
    BackendSessionBridge::with_client(http, &server.uri())
}

#[tokio::test]
async fn test_register_posts_token_and_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_json(json!({
            "idToken": "id-token-42",
            "name": "Chef Ana",
            "address": "1 Market St"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "user": {
                "_id": "db-1",
                "uid": "uid-42",
                "email": "chef@homechef.test",
                "name": "Chef Ana",
                "address": "1 Market St",
                "role": "user",
                "status": "active"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fields = RegistrationFields {
        name: Some("Chef Ana".to_string()),
        address: Some("1 Market St".to_string()),
        profile_image: None,
        role_hint: Some(Role::Chef),
    };
    let profile = bridge(&server).exchange_and_register(&principal(), &fields).await.unwrap();

    assert_eq!(profile.id.as_deref(), Some("db-1"));
    assert_eq!(profile.address.as_deref(), Some("1 Market St"));
    assert_eq!(profile.role, Some(Role::User));
}

#[tokio::test]
async fn test_register_rejection_carries_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid ID token"})),
        )
        .mount(&server)
        .await;

    let err = bridge(&server)
        .exchange_and_register(&principal(), &RegistrationFields::default())
        .await
        .unwrap_err();

    assert_eq!(err, BridgeError::Registration("Invalid ID token".to_string()));
}

#[tokio::test]
async fn test_session_cookie_is_carried_after_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"idToken": "id-token-42"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc123; Path=/; HttpOnly")
                .set_body_json(json!({"ok": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("cookie", "session=abc123"))
        .and(header("authorization", "Bearer id-token-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"uid": "uid-42", "role": "chef", "name": "Ana"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/logout"))
        .and(header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let bridge = bridge(&server);
    bridge.login("id-token-42").await.unwrap();

    let profile = bridge.fetch_profile("id-token-42").await.unwrap().unwrap();
    assert_eq!(profile.role, Some(Role::Chef));
    assert_eq!(profile.name.as_deref(), Some("Ana"));

    bridge.logout().await.unwrap();
}

#[tokio::test]
async fn test_login_rejection_is_a_login_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Token revoked"})))
        .mount(&server)
        .await;

    let err = bridge(&server).login("stale").await.unwrap_err();
    assert_eq!(err, BridgeError::Login("Token revoked".to_string()));
}

#[tokio::test]
async fn test_missing_profile_is_none_and_unauthorized_is_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer unknown"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "User not found"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Unauthorized"})))
        .mount(&server)
        .await;

    let bridge = bridge(&server);
    assert_eq!(bridge.fetch_profile("unknown").await.unwrap(), None);

    let err = bridge.fetch_profile("expired").await.unwrap_err();
    assert_eq!(err, BridgeError::Status { status: 401, message: "Unauthorized".to_string() });
}

#[tokio::test]
async fn test_ensure_registered_sends_identity_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let outcome = bridge(&server).ensure_registered(&principal(), Role::Chef).await;
    assert_eq!(outcome, EnsureRegistered::Created);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({
            "uid": "uid-42",
            "email": "chef@homechef.test",
            "name": "Chef Ana",
            "profileImage": "",
            "role": "chef"
        })
    );
}

#[tokio::test]
async fn test_ensure_registered_treats_existing_user_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(409))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "User already exists"})),
        )
        .mount(&server)
        .await;

    let bridge = bridge(&server);
    for _ in 0..2 {
        let outcome = bridge.ensure_registered(&principal(), Role::User).await;
        assert_eq!(outcome, EnsureRegistered::AlreadyExists);
    }
}

#[tokio::test]
async fn test_ensure_registered_failures_are_reported_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "db down"})))
        .mount(&server)
        .await;

    let outcome = bridge(&server).ensure_registered(&principal(), Role::User).await;

    assert!(!outcome.is_registered());
    assert_eq!(
        outcome,
        EnsureRegistered::Failed(BridgeError::Status {
            status: 500,
            message: "db down".to_string()
        })
    );
}
