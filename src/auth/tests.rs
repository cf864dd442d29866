//! Tests for the auth module

use super::*;
use crate::config::{AuthMode, Credentials, RefreshMargin, SessionConfig};
use crate::error::{Error, ErrorKind};
use crate::http::{RecordedResponse, RecordedTransport, Reply};
use crate::types::Method;
use base64::Engine;
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const OAUTH_PATH: &str = "/api/v1/oauth/token";
const BASIC_PATH: &str = "/api/v1/auth/token";
const KEEP_ALIVE_PATH: &str = "/api/v1/auth/keep-alive";
const INVALIDATE_PATH: &str = "/api/v1/auth/invalidate-token";

fn oauth_session(transport: &Arc<RecordedTransport>) -> SessionManager {
    oauth_session_with(transport, SessionConfig::default())
}

fn oauth_session_with(transport: &Arc<RecordedTransport>, config: SessionConfig) -> SessionManager {
    let creds = Credentials::new(
        "https://jamf.test",
        AuthMode::token_exchange("client-1", "s3cret"),
    )
    .unwrap();
    SessionManager::new(creds, config, transport.clone())
}

fn basic_session(transport: &Arc<RecordedTransport>) -> SessionManager {
    let creds = Credentials::new("https://jamf.test", AuthMode::basic("admin", "pw")).unwrap();
    SessionManager::new(creds, SessionConfig::default(), transport.clone())
}

/// Token endpoint that issues `tok-1`, `tok-2`, ... with the given lifetime
fn numbered_tokens(transport: &RecordedTransport, expires_in: i64) -> Arc<AtomicUsize> {
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();
    transport.on_fn(Method::POST, OAUTH_PATH, move |_| {
        let n = c.fetch_add(1, Ordering::SeqCst) + 1;
        Reply::Respond(RecordedResponse::json(
            200,
            &json!({"access_token": format!("tok-{n}"), "expires_in": expires_in}),
        ))
    });
    counter
}

fn bearer_reply(token: &str, lifetime_secs: i64) -> RecordedResponse {
    let expires = Utc::now() + chrono::Duration::seconds(lifetime_secs);
    RecordedResponse::json(200, &json!({"token": token, "expires": expires.to_rfc3339()}))
}

fn expose(token: &Token) -> String {
    use secrecy::ExposeSecret;
    token.secret().expose_secret().to_string()
}

// ============================================================================
// EnsureValid
// ============================================================================

#[tokio::test]
async fn test_ensure_valid_fetches_once_and_caches() {
    let transport = Arc::new(RecordedTransport::new());
    numbered_tokens(&transport, 1200);
    let session = oauth_session(&transport);

    assert_eq!(session.state(), SessionState::Unauthenticated);
    let first = session.ensure_valid().await.unwrap();
    let second = session.ensure_valid().await.unwrap();

    assert_eq!(expose(&first), "tok-1");
    assert_eq!(first, second);
    assert_eq!(first.kind(), TokenKind::Bearer);
    assert_eq!(session.state(), SessionState::Valid);
    assert_eq!(transport.count(Method::POST, OAUTH_PATH), 1);
}

#[tokio::test]
async fn test_oauth_request_shape() {
    let transport = Arc::new(RecordedTransport::new());
    numbered_tokens(&transport, 1200);
    let session = oauth_session(&transport);

    session.ensure_valid().await.unwrap();

    let req = &transport.requests()[0];
    assert_eq!(
        req.header("content-type"),
        Some("application/x-www-form-urlencoded")
    );
    let body = req.body_text();
    assert!(body.contains("client_id=client-1"));
    assert!(body.contains("client_secret=s3cret"));
    assert!(body.contains("grant_type=client_credentials"));
}

#[tokio::test]
async fn test_basic_auth_request_shape() {
    let transport = Arc::new(RecordedTransport::new());
    transport.on(Method::POST, BASIC_PATH, bearer_reply("b-1", 1800));
    let session = basic_session(&transport);

    let token = session.ensure_valid().await.unwrap();
    assert_eq!(expose(&token), "b-1");

    let req = &transport.requests()[0];
    let expected = base64::engine::general_purpose::STANDARD.encode("admin:pw");
    assert_eq!(
        req.header("authorization"),
        Some(format!("Basic {expected}").as_str())
    );
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let transport = Arc::new(RecordedTransport::new());
    // Lifetime shorter than the 30s expiry skew
    numbered_tokens(&transport, 10);
    let session = oauth_session(&transport);

    let first = session.ensure_valid().await.unwrap();
    let second = session.ensure_valid().await.unwrap();

    assert_ne!(first.serial(), second.serial());
    assert_eq!(transport.count(Method::POST, OAUTH_PATH), 2);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let transport = Arc::new(RecordedTransport::new().with_latency(Duration::from_millis(50)));
    numbered_tokens(&transport, 1200);
    let session = Arc::new(oauth_session(&transport));

    let mut handles = Vec::new();
    for i in 0..50 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                session.ensure_valid().await
            } else {
                session.keep_alive().await?;
                session.ensure_valid().await
            }
        }));
    }

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(transport.count(Method::POST, OAUTH_PATH), 1);
    assert_eq!(session.refresh_count(), 1);
    assert!(tokens.iter().all(|t| *t == tokens[0]));
    assert_eq!(expose(&tokens[0]), "tok-1");
}

#[tokio::test]
async fn test_followers_receive_leader_failure() {
    let transport = Arc::new(RecordedTransport::new().with_latency(Duration::from_millis(50)));
    transport.on(
        Method::POST,
        OAUTH_PATH,
        RecordedResponse::json(401, &json!({"error": "invalid_client"})),
    );
    let session = Arc::new(oauth_session(&transport));

    let results = futures::future::join_all((0..10).map(|_| {
        let session = session.clone();
        async move { session.ensure_valid().await }
    }))
    .await;

    assert_eq!(transport.count(Method::POST, OAUTH_PATH), 1);
    for result in results {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
    }
    assert_eq!(session.state(), SessionState::Invalidated);
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test]
async fn test_refresh_failure_is_not_cached() {
    let transport = Arc::new(RecordedTransport::new());
    transport.on(Method::POST, OAUTH_PATH, RecordedResponse::empty(401));
    transport.on(
        Method::POST,
        OAUTH_PATH,
        RecordedResponse::json(200, &json!({"access_token": "ok", "expires_in": 600})),
    );
    let session = oauth_session(&transport);

    let err = session.ensure_valid().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.status(), Some(401));
    assert_eq!(session.state(), SessionState::Invalidated);

    let token = session.ensure_valid().await.unwrap();
    assert_eq!(expose(&token), "ok");
}

#[tokio::test]
async fn test_network_failure_keeps_network_kind() {
    let transport = Arc::new(RecordedTransport::new());
    transport.on(
        Method::POST,
        OAUTH_PATH,
        Reply::Fail(Error::network("connection reset by peer", true)),
    );
    let session = oauth_session(&transport);

    let err = session.ensure_valid().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(session.state(), SessionState::Invalidated);
}

#[tokio::test]
async fn test_malformed_token_response_is_unauthorized() {
    let transport = Arc::new(RecordedTransport::new());
    transport.on(
        Method::POST,
        OAUTH_PATH,
        RecordedResponse::json(200, &json!({"unexpected": true})),
    );
    let session = oauth_session(&transport);

    let err = session.ensure_valid().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(err.raw_body().is_some());
}

#[tokio::test]
async fn test_cancelled_refresh_resets_to_invalidated() {
    let transport = Arc::new(RecordedTransport::new().with_latency(Duration::from_millis(200)));
    numbered_tokens(&transport, 1200);
    let session = Arc::new(oauth_session(&transport));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = session.ensure_valid_with(&cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(session.state(), SessionState::Invalidated);

    let token = session.ensure_valid().await.unwrap();
    assert_eq!(session.state(), SessionState::Valid);
    assert_eq!(token.serial(), 1);
}

#[tokio::test]
async fn test_follower_takes_over_after_leader_cancelled() {
    let transport = Arc::new(RecordedTransport::new().with_latency(Duration::from_millis(100)));
    numbered_tokens(&transport, 1200);
    let session = Arc::new(oauth_session(&transport));

    let cancel = CancellationToken::new();
    let leader = {
        let session = session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.ensure_valid_with(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let follower = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_valid().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();

    assert!(leader.await.unwrap().unwrap_err().is_cancelled());
    let token = follower.await.unwrap().unwrap();
    assert_eq!(session.state(), SessionState::Valid);
    assert_eq!(token, session.ensure_valid().await.unwrap());
}

// ============================================================================
// Invalidate
// ============================================================================

#[tokio::test]
async fn test_invalidate_forces_refresh() {
    let transport = Arc::new(RecordedTransport::new());
    numbered_tokens(&transport, 1200);
    let session = oauth_session(&transport);

    let first = session.ensure_valid().await.unwrap();
    session.invalidate();
    assert_eq!(session.state(), SessionState::Invalidated);

    let second = session.ensure_valid().await.unwrap();
    assert_eq!(expose(&second), "tok-2");
    assert!(second.serial() > first.serial());
}

#[tokio::test]
async fn test_invalidate_if_current_ignores_stale_token() {
    let transport = Arc::new(RecordedTransport::new());
    numbered_tokens(&transport, 1200);
    let session = oauth_session(&transport);

    let stale = session.ensure_valid().await.unwrap();
    assert!(session.invalidate_if_current(&stale));
    let fresh = session.ensure_valid().await.unwrap();

    assert!(!session.invalidate_if_current(&stale));
    assert_eq!(session.state(), SessionState::Valid);
    assert_eq!(session.ensure_valid().await.unwrap(), fresh);
}

#[tokio::test]
async fn test_revoke_calls_invalidate_endpoint() {
    let transport = Arc::new(RecordedTransport::new());
    numbered_tokens(&transport, 1200);
    transport.on(Method::POST, INVALIDATE_PATH, RecordedResponse::empty(204));
    let session = oauth_session(&transport);

    session.ensure_valid().await.unwrap();
    session.revoke().await.unwrap();

    assert_eq!(transport.count(Method::POST, INVALIDATE_PATH), 1);
    let req = transport
        .requests()
        .into_iter()
        .find(|r| r.path == INVALIDATE_PATH)
        .unwrap();
    assert_eq!(req.header("authorization"), Some("Bearer tok-1"));
    assert_eq!(session.state(), SessionState::Invalidated);
}

#[tokio::test]
async fn test_revoke_without_token_is_noop() {
    let transport = Arc::new(RecordedTransport::new());
    let session = oauth_session(&transport);

    session.revoke().await.unwrap();
    assert!(transport.requests().is_empty());
}

// ============================================================================
// KeepAlive
// ============================================================================

#[tokio::test]
async fn test_keep_alive_noop_when_fresh() {
    let transport = Arc::new(RecordedTransport::new());
    numbered_tokens(&transport, 3600);
    let session = oauth_session(&transport);

    session.ensure_valid().await.unwrap();
    assert_eq!(
        session.keep_alive().await.unwrap(),
        KeepAliveOutcome::StillFresh
    );
    assert_eq!(transport.count(Method::POST, OAUTH_PATH), 1);
}

#[tokio::test]
async fn test_keep_alive_refreshes_inside_margin() {
    let transport = Arc::new(RecordedTransport::new());
    // 200s left is inside the default 300s margin but outside the 30s skew
    numbered_tokens(&transport, 200);
    let session = oauth_session(&transport);

    let first = session.ensure_valid().await.unwrap();
    assert_eq!(session.ensure_valid().await.unwrap(), first);

    assert_eq!(
        session.keep_alive().await.unwrap(),
        KeepAliveOutcome::Refreshed
    );
    let second = session.ensure_valid().await.unwrap();
    assert_eq!(expose(&second), "tok-2");
}

#[tokio::test]
async fn test_keep_alive_fraction_margin() {
    let transport = Arc::new(RecordedTransport::new());
    numbered_tokens(&transport, 1000);
    let config = SessionConfig {
        refresh_margin: RefreshMargin::Fraction(0.5),
        ..SessionConfig::default()
    };
    let session = oauth_session_with(&transport, config);

    session.ensure_valid().await.unwrap();
    // ~1000s of 1000s remain, above the 500s margin
    assert_eq!(
        session.keep_alive().await.unwrap(),
        KeepAliveOutcome::StillFresh
    );
}

#[tokio::test]
async fn test_keep_alive_without_token_acquires_one() {
    let transport = Arc::new(RecordedTransport::new());
    numbered_tokens(&transport, 1200);
    let session = oauth_session(&transport);

    assert_eq!(
        session.keep_alive().await.unwrap(),
        KeepAliveOutcome::Refreshed
    );
    assert_eq!(session.state(), SessionState::Valid);
}

#[tokio::test]
async fn test_basic_keep_alive_uses_extend_endpoint() {
    let transport = Arc::new(RecordedTransport::new());
    transport.on(Method::POST, BASIC_PATH, bearer_reply("b-1", 200));
    transport.on(Method::POST, KEEP_ALIVE_PATH, bearer_reply("b-2", 1800));
    let session = basic_session(&transport);

    session.ensure_valid().await.unwrap();
    assert_eq!(
        session.keep_alive().await.unwrap(),
        KeepAliveOutcome::Refreshed
    );

    let token = session.ensure_valid().await.unwrap();
    assert_eq!(expose(&token), "b-2");
    assert_eq!(transport.count(Method::POST, BASIC_PATH), 1);

    let req = transport
        .requests()
        .into_iter()
        .find(|r| r.path == KEEP_ALIVE_PATH)
        .unwrap();
    assert_eq!(req.header("authorization"), Some("Bearer b-1"));
}

#[tokio::test]
async fn test_basic_keep_alive_falls_back_to_fetch() {
    let transport = Arc::new(RecordedTransport::new());
    transport.on(Method::POST, BASIC_PATH, bearer_reply("b-1", 200));
    transport.on(Method::POST, BASIC_PATH, bearer_reply("b-2", 1800));
    transport.on(Method::POST, KEEP_ALIVE_PATH, RecordedResponse::empty(500));
    let session = basic_session(&transport);

    session.ensure_valid().await.unwrap();
    session.keep_alive().await.unwrap();

    let token = session.ensure_valid().await.unwrap();
    assert_eq!(expose(&token), "b-2");
    assert_eq!(session.refresh_count(), 3);
}

#[tokio::test]
async fn test_spawned_keep_alive_stops_on_cancel() {
    let transport = Arc::new(RecordedTransport::new());
    numbered_tokens(&transport, 1200);
    let session = Arc::new(oauth_session(&transport));

    let cancel = CancellationToken::new();
    let handle = session.spawn_keep_alive(Duration::from_millis(10), cancel.clone());
    tokio::time::sleep(Duration::from_millis(60)).await;
    cancel.cancel();
    handle.await.unwrap();

    // First tick acquires; later ticks find the token fresh
    assert_eq!(transport.count(Method::POST, OAUTH_PATH), 1);
    assert_eq!(session.state(), SessionState::Valid);
}

#[test]
fn test_token_debug_redacts_value() {
    let now = Utc::now();
    let token = Token::new(
        "super-secret".into(),
        now,
        now + chrono::Duration::seconds(60),
        Some("api-role".into()),
        1,
    );
    let debug = format!("{token:?}");
    assert!(!debug.contains("super-secret"));
    assert_eq!(token.scope(), Some("api-role"));
    assert_eq!(token.lifetime(), Duration::from_secs(60));
}
