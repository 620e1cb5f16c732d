//! Sign-in flow integration tests using wiremock
//!
//! Drives `LogtoClient::sign_in` and `handle_sign_in_callback` against a
//! mocked tenant:
//!
//! - a successful round trip stores verified tokens and navigates to the
//!   post-redirect URI
//! - every failure after the session was loaded deletes the session
//! - ID tokens that are missing, expired or from another issuer are rejected

mod common;

use std::sync::Arc;

use chrono::Utc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{query_param, Provider, APP_ID, APP_SECRET, KEY_A, REDIRECT_URI};
use logto::client::{SignInOptions, SignInSession};
use logto::error::{JwtError, LogtoError, SessionMismatchKind};
use logto::{MemoryStorage, Storage};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Start a sign-in and return the callback URL the provider would redirect to.
async fn start_sign_in(client: &logto::LogtoClient, options: SignInOptions) -> String {
    let uri = client.sign_in(options).await.unwrap();
    let state = query_param(&uri, "state").expect("state in authorization URI");
    format!("{REDIRECT_URI}?code=auth-code&state={state}")
}

fn token_body(id_token: Option<String>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": "opaque-access-token",
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "scope": "openid offline_access profile",
        "token_type": "Bearer",
    });
    if let Some(id_token) = id_token {
        body["id_token"] = serde_json::Value::String(id_token);
    }
    body
}

async fn mount_token(provider: &Provider, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .expect(1)
        .mount(&provider.server)
        .await;
}

// ---------------------------------------------------------------------------
// Successful sign-in
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sign_in_round_trip_stores_verified_tokens() {
    let provider = Provider::start().await;
    provider.mount_jwks(&[KEY_A], 1).await;

    let storage = Arc::new(MemoryStorage::new());
    let (client, visited) = provider.client_with_navigation(storage.clone()).await;

    let callback = start_sign_in(
        &client,
        SignInOptions {
            post_redirect_uri: Some("https://app.example.com/home".to_string()),
            ..SignInOptions::new(REDIRECT_URI)
        },
    )
    .await;

    let session = SignInSession::load(storage.as_ref()).unwrap().unwrap();
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains(format!(
            "code_verifier={}",
            session.code_verifier
        )))
        .and(body_string_contains(format!("client_id={APP_ID}")))
        .and(body_string_contains(format!("client_secret={APP_SECRET}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body(Some(provider.id_token(KEY_A, "user-1")))),
        )
        .expect(1)
        .mount(&provider.server)
        .await;

    let post_redirect = client.handle_sign_in_callback(&callback).await.unwrap();

    assert_eq!(
        post_redirect.as_deref(),
        Some("https://app.example.com/home")
    );
    assert!(client.is_authenticated().unwrap());
    assert_eq!(client.refresh_token().unwrap().as_deref(), Some("refresh-1"));
    assert_eq!(client.id_token_claims().unwrap().unwrap().sub, "user-1");
    assert_eq!(SignInSession::load(storage.as_ref()).unwrap(), None);

    // The default access token is served from storage without another grant.
    assert_eq!(
        client.access_token(None, None).await.unwrap().as_deref(),
        Some("opaque-access-token")
    );

    let visited = visited.lock().unwrap();
    assert_eq!(visited.len(), 2);
    assert!(visited[0].starts_with(&format!("{}/oidc/auth?", provider.server.uri())));
    assert_eq!(visited[1], "https://app.example.com/home");
}

#[tokio::test]
async fn test_authorization_uri_carries_configured_values() {
    let provider = Provider::start().await;
    let client = provider.client(Arc::new(MemoryStorage::new())).await;

    let uri = client
        .sign_in(SignInOptions {
            first_screen: Some("register".to_string()),
            interaction_mode: Some("signUp".to_string()),
            login_hint: Some("user@example.com".to_string()),
            extra_params: vec![("ui_locales".to_string(), "de".to_string())],
            ..SignInOptions::new(REDIRECT_URI)
        })
        .await
        .unwrap();

    assert_eq!(query_param(&uri, "client_id").as_deref(), Some(APP_ID));
    assert_eq!(query_param(&uri, "redirect_uri").as_deref(), Some(REDIRECT_URI));
    assert_eq!(query_param(&uri, "code_challenge_method").as_deref(), Some("S256"));
    assert_eq!(query_param(&uri, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(&uri, "prompt").as_deref(), Some("consent"));
    assert_eq!(
        query_param(&uri, "scope").as_deref(),
        Some("openid offline_access profile")
    );
    assert_eq!(query_param(&uri, "first_screen").as_deref(), Some("register"));
    assert_eq!(query_param(&uri, "interaction_mode"), None);
    assert_eq!(
        query_param(&uri, "login_hint").as_deref(),
        Some("user@example.com")
    );
    assert!(uri.ends_with("&ui_locales=de"));
}

#[tokio::test]
async fn test_sign_in_without_post_redirect_returns_none() {
    let provider = Provider::start().await;
    provider.mount_jwks(&[KEY_A], 1).await;
    mount_token(
        &provider,
        200,
        token_body(Some(provider.id_token(KEY_A, "user-2"))),
    )
    .await;

    let (client, visited) = provider
        .client_with_navigation(Arc::new(MemoryStorage::new()))
        .await;
    let callback = start_sign_in(&client, SignInOptions::new(REDIRECT_URI)).await;

    assert_eq!(client.handle_sign_in_callback(&callback).await.unwrap(), None);
    assert_eq!(visited.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Rejected callbacks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_server_error_callback_deletes_session() {
    let provider = Provider::start().await;
    let storage = Arc::new(MemoryStorage::new());
    let client = provider.client(storage.clone()).await;
    start_sign_in(&client, SignInOptions::new(REDIRECT_URI)).await;

    let result = client
        .handle_sign_in_callback(&format!(
            "{REDIRECT_URI}?error=access_denied&error_description=User%20cancelled"
        ))
        .await;

    match result {
        Err(LogtoError::ServerCallback { error, description }) => {
            assert_eq!(error, "access_denied");
            assert_eq!(description.as_deref(), Some("User cancelled"));
        }
        other => panic!("expected ServerCallback, got {other:?}"),
    }
    assert_eq!(SignInSession::load(storage.as_ref()).unwrap(), None);
}

#[tokio::test]
async fn test_callback_to_other_redirect_uri_is_rejected() {
    let provider = Provider::start().await;
    let client = provider.client(Arc::new(MemoryStorage::new())).await;
    let callback = start_sign_in(&client, SignInOptions::new(REDIRECT_URI)).await;

    let forged = callback.replace("app.example.com", "evil.example.com");
    let result = client.handle_sign_in_callback(&forged).await;

    assert!(matches!(
        result,
        Err(LogtoError::SessionMismatch(SessionMismatchKind::RedirectUri))
    ));

    // The session is gone, so even the genuine callback cannot be replayed.
    assert!(matches!(
        client.handle_sign_in_callback(&callback).await,
        Err(LogtoError::SessionNotFound)
    ));
}

#[tokio::test]
async fn test_token_endpoint_failure_deletes_session() {
    let provider = Provider::start().await;
    mount_token(
        &provider,
        400,
        serde_json::json!({ "error": "invalid_grant" }),
    )
    .await;

    let storage = Arc::new(MemoryStorage::new());
    let client = provider.client(storage.clone()).await;
    let callback = start_sign_in(&client, SignInOptions::new(REDIRECT_URI)).await;

    match client.handle_sign_in_callback(&callback).await {
        Err(LogtoError::Token { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected Token error, got {other:?}"),
    }
    assert_eq!(SignInSession::load(storage.as_ref()).unwrap(), None);
    assert!(!client.is_authenticated().unwrap());
}

#[tokio::test]
async fn test_missing_id_token_is_rejected() {
    let provider = Provider::start().await;
    mount_token(&provider, 200, token_body(None)).await;

    let client = provider.client(Arc::new(MemoryStorage::new())).await;
    let callback = start_sign_in(&client, SignInOptions::new(REDIRECT_URI)).await;

    assert!(matches!(
        client.handle_sign_in_callback(&callback).await,
        Err(LogtoError::JwtVerification(JwtError::MissingIdToken))
    ));
    assert!(!client.is_authenticated().unwrap());
}

#[tokio::test]
async fn test_id_token_from_other_issuer_is_rejected() {
    let provider = Provider::start().await;
    provider.mount_jwks(&[KEY_A], 1).await;

    let mut claims = provider.id_token_claims("user-1");
    claims["iss"] = serde_json::json!("https://other.example.com/oidc");
    mount_token(&provider, 200, token_body(Some(KEY_A.sign(&claims)))).await;

    let storage = Arc::new(MemoryStorage::new());
    let client = provider.client(storage.clone()).await;
    let callback = start_sign_in(&client, SignInOptions::new(REDIRECT_URI)).await;

    assert!(matches!(
        client.handle_sign_in_callback(&callback).await,
        Err(LogtoError::JwtVerification(JwtError::InvalidIssuer))
    ));
    assert!(!client.is_authenticated().unwrap());
    assert_eq!(storage.get("refresh_token").unwrap(), None);
}

#[tokio::test]
async fn test_expired_id_token_is_rejected() {
    let provider = Provider::start().await;
    provider.mount_jwks(&[KEY_A], 1).await;

    let mut claims = provider.id_token_claims("user-1");
    claims["exp"] = serde_json::json!(Utc::now().timestamp() - 3600);
    mount_token(&provider, 200, token_body(Some(KEY_A.sign(&claims)))).await;

    let client = provider.client(Arc::new(MemoryStorage::new())).await;
    let callback = start_sign_in(&client, SignInOptions::new(REDIRECT_URI)).await;

    assert!(matches!(
        client.handle_sign_in_callback(&callback).await,
        Err(LogtoError::JwtVerification(JwtError::Expired))
    ));
}
