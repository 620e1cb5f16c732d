//! Access token integration tests using wiremock
//!
//! Covers `LogtoClient::access_token` and friends against a mocked token
//! endpoint:
//!
//! - fresh cached tokens are served without network access
//! - expired tokens are refreshed with the requested resource/organization
//! - concurrent refreshes of one key share a single grant
//! - userinfo is fetched with the default access token

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{Provider, APP_ID, KEY_A};
use logto::client::{build_access_token_key, AccessToken, TokenStore};
use logto::error::LogtoError;
use logto::{MemoryStorage, Storage};

const API: &str = "https://api.example.com";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Store a signed-in user: ID token, refresh token and optionally one access token.
fn seed_signed_in(
    provider: &Provider,
    storage: &dyn Storage,
    access: Option<(&str, &str, i64)>,
) {
    storage
        .set("id_token", &provider.id_token(KEY_A, "user-1"))
        .unwrap();
    storage.set("refresh_token", "refresh-1").unwrap();

    if let Some((key, token, expires_in)) = access {
        TokenStore::new(storage)
            .save_access_token(
                key,
                AccessToken {
                    token: token.to_string(),
                    scope: String::new(),
                    expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
                },
            )
            .unwrap();
    }
}

fn refresh_body(access_token: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "refresh_token": "refresh-2",
        "expires_in": 3600,
        "scope": "read:data",
        "token_type": "Bearer",
    })
}

// ---------------------------------------------------------------------------
// Cache hits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fresh_token_is_served_from_storage() {
    let provider = Provider::start().await;
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&provider.server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    seed_signed_in(&provider, storage.as_ref(), Some((":https://api.example.com", "cached", 3600)));
    let client = provider.client(storage).await;

    assert_eq!(
        client.access_token(Some(API), None).await.unwrap().as_deref(),
        Some("cached")
    );
}

#[tokio::test]
async fn test_not_authenticated_without_id_token() {
    let provider = Provider::start().await;
    let storage = Arc::new(MemoryStorage::new());
    storage.set("refresh_token", "refresh-1").unwrap();
    let client = provider.client(storage).await;

    assert!(matches!(
        client.access_token(Some(API), None).await,
        Err(LogtoError::NotAuthenticated)
    ));
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_token_inside_leeway_is_refreshed_for_resource() {
    let provider = Provider::start().await;
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .and(body_string_contains("resource=https%3A%2F%2Fapi.example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("fresh")))
        .expect(1)
        .mount(&provider.server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    // Expires in five seconds, inside the ten second leeway.
    seed_signed_in(&provider, storage.as_ref(), Some((":https://api.example.com", "stale", 5)));
    let client = provider.client(storage.clone()).await;

    assert_eq!(
        client.access_token(Some(API), None).await.unwrap().as_deref(),
        Some("fresh")
    );
    assert_eq!(client.refresh_token().unwrap().as_deref(), Some("refresh-2"));

    // Served from storage the second time.
    assert_eq!(
        client.access_token(Some(API), None).await.unwrap().as_deref(),
        Some("fresh")
    );

    let stored = TokenStore::new(storage.as_ref())
        .access_token(&build_access_token_key(Some(API), None))
        .unwrap()
        .unwrap();
    assert_eq!(stored.scope, "read:data");
    assert!(stored.is_valid());
}

#[tokio::test]
async fn test_organization_token_claims() {
    let provider = Provider::start().await;
    let org_token = provider.access_token_jwt("urn:logto:organization:org_1", "read:org");
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .and(body_string_contains("organization_id=org_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(&org_token)))
        .expect(1)
        .mount(&provider.server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    seed_signed_in(&provider, storage.as_ref(), None);
    let client = provider.client(storage.clone()).await;

    let claims = client
        .access_token_claims(None, Some("org_1"))
        .await
        .unwrap()
        .unwrap();

    assert!(claims.aud.contains("urn:logto:organization:org_1"));
    assert_eq!(claims.scope, "read:org");
    assert_eq!(claims.client_id.as_deref(), Some(APP_ID));
    assert!(TokenStore::new(storage.as_ref())
        .access_token("#org_1:openid")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_grant() {
    let provider = Provider::start().await;
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body("shared"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&provider.server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    seed_signed_in(&provider, storage.as_ref(), None);
    let client = provider.client(storage).await;

    let (first, second) = tokio::join!(
        client.access_token(Some(API), None),
        client.access_token(Some(API), None)
    );

    assert_eq!(first.unwrap().as_deref(), Some("shared"));
    assert_eq!(second.unwrap().as_deref(), Some("shared"));
}

#[tokio::test]
async fn test_refreshed_id_token_is_verified_and_stored() {
    let provider = Provider::start().await;
    provider.mount_jwks(&[KEY_A], 1).await;

    let mut body = refresh_body("fresh");
    body["id_token"] = serde_json::json!(provider.id_token(KEY_A, "user-1-renewed"));
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&provider.server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    seed_signed_in(&provider, storage.as_ref(), None);
    let client = provider.client(storage).await;

    client.access_token(None, None).await.unwrap();

    assert_eq!(
        client.id_token_claims().unwrap().unwrap().sub,
        "user-1-renewed"
    );
}

#[tokio::test]
async fn test_expired_token_without_refresh_token_is_evicted() {
    let provider = Provider::start().await;
    let storage = Arc::new(MemoryStorage::new());
    seed_signed_in(&provider, storage.as_ref(), Some((":openid", "expired", -60)));
    storage.remove("refresh_token").unwrap();
    let client = provider.client(storage.clone()).await;

    assert_eq!(client.access_token(None, None).await.unwrap(), None);
    assert!(TokenStore::new(storage.as_ref())
        .access_token(":openid")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_refresh_failure_is_reported() {
    let provider = Provider::start().await;
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
        )
        .mount(&provider.server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    seed_signed_in(&provider, storage.as_ref(), None);
    let client = provider.client(storage).await;

    assert!(matches!(
        client.access_token(Some(API), None).await,
        Err(LogtoError::Token { status: 400, .. })
    ));
}

// ---------------------------------------------------------------------------
// Userinfo
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fetch_user_info_uses_default_access_token() {
    let provider = Provider::start().await;
    Mock::given(method("GET"))
        .and(path("/oidc/me"))
        .and(header("authorization", "Bearer opaque"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sub": "user-1",
            "email": "user@example.com",
            "custom_data": { "plan": "pro" },
        })))
        .expect(1)
        .mount(&provider.server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    seed_signed_in(&provider, storage.as_ref(), Some((":openid", "opaque", 3600)));
    let client = provider.client(storage).await;

    let info = client.fetch_user_info().await.unwrap();
    assert_eq!(info.sub, "user-1");
}

#[tokio::test]
async fn test_fetch_user_info_error_status() {
    let provider = Provider::start().await;
    Mock::given(method("GET"))
        .and(path("/oidc/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&provider.server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    seed_signed_in(&provider, storage.as_ref(), Some((":openid", "opaque", 3600)));
    let client = provider.client(storage).await;

    assert!(matches!(
        client.fetch_user_info().await,
        Err(LogtoError::UserInfo { status: 401, .. })
    ));
}
