//! Token manager behaviour against a mock auth endpoint.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::TimeDelta;
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use sha2::Sha512;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    KEY_ID, PRIVATE_KEY, auth_body, auth_requests, mount_auth, mount_auth_once, settings,
    start_time, token_manager,
};
use rustore_client::{ClientError, TokenManager, TokenState};

#[tokio::test]
async fn test_first_call_authenticates_with_signed_payload() {
    let server = MockServer::start().await;
    mount_auth(&server, "jwe-1", 900, 1).await;
    let fixture = token_manager(&settings(&server.uri()));

    let token = fixture.tokens.get_token(false).await.unwrap();
    assert_eq!(token.expose_secret(), "jwe-1");

    let requests = auth_requests(&server).await;
    assert_eq!(requests.len(), 1);

    let payload: Value = requests[0].body_json().unwrap();
    assert_eq!(payload["keyId"], KEY_ID);
    assert_eq!(payload["timestamp"], "2024-01-15T10:30:00.000+00:00");

    let signature = STANDARD
        .decode(payload["signature"].as_str().unwrap())
        .unwrap();
    let verifying_key = VerifyingKey::<Sha512>::new(RsaPublicKey::from(&*PRIVATE_KEY));
    let message = format!("{KEY_ID}2024-01-15T10:30:00.000+00:00");
    verifying_key
        .verify(
            message.as_bytes(),
            &Signature::try_from(signature.as_slice()).unwrap(),
        )
        .expect("signature verifies");
}

#[tokio::test]
async fn test_valid_token_is_cached() {
    let server = MockServer::start().await;
    mount_auth(&server, "jwe-1", 900, 1).await;
    let fixture = token_manager(&settings(&server.uri()));

    assert_eq!(fixture.tokens.state().await, TokenState::NoToken);
    assert_eq!(fixture.tokens.expires_at().await, None);

    for _ in 0..5 {
        let token = fixture.tokens.get_token(false).await.unwrap();
        assert_eq!(token.expose_secret(), "jwe-1");
    }

    assert_eq!(fixture.tokens.state().await, TokenState::Valid);
    assert_eq!(
        fixture.tokens.expires_at().await,
        Some(start_time() + TimeDelta::seconds(900))
    );
}

#[tokio::test]
async fn test_refreshes_inside_skew_window() {
    let server = MockServer::start().await;
    mount_auth_once(&server, "jwe-1", 100).await;
    mount_auth_once(&server, "jwe-2", 100).await;
    let fixture = token_manager(&settings(&server.uri()));

    assert_eq!(fixture.tokens.get_token(false).await.unwrap().expose_secret(), "jwe-1");

    // 100s ttl minus 30s skew: still valid at +69s.
    fixture.clock.advance(TimeDelta::seconds(69));
    assert_eq!(fixture.tokens.get_token(false).await.unwrap().expose_secret(), "jwe-1");
    assert_eq!(auth_requests(&server).await.len(), 1);

    fixture.clock.advance(TimeDelta::seconds(1));
    assert_eq!(fixture.tokens.state().await, TokenState::Expired);
    assert_eq!(fixture.tokens.get_token(false).await.unwrap().expose_secret(), "jwe-2");
    assert_eq!(auth_requests(&server).await.len(), 2);
    assert_eq!(
        fixture.tokens.expires_at().await,
        Some(start_time() + TimeDelta::seconds(170))
    );
}

#[tokio::test]
async fn test_force_refresh_ignores_cache() {
    let server = MockServer::start().await;
    mount_auth_once(&server, "jwe-1", 900).await;
    mount_auth_once(&server, "jwe-2", 900).await;
    let fixture = token_manager(&settings(&server.uri()));

    assert_eq!(fixture.tokens.get_token(false).await.unwrap().expose_secret(), "jwe-1");
    assert_eq!(fixture.tokens.get_token(true).await.unwrap().expose_secret(), "jwe-2");
    assert_eq!(fixture.tokens.get_token(false).await.unwrap().expose_secret(), "jwe-2");
    assert_eq!(auth_requests(&server).await.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/public/auth/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(auth_body("shared", 900))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let fixture = token_manager(&settings(&server.uri()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let tokens = Arc::clone(&fixture.tokens);
            tokio::spawn(async move { tokens.get_token(false).await })
        })
        .collect();

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "shared");
    }
    assert_eq!(auth_requests(&server).await.len(), 1);
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/public/auth/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "UNAUTHORIZED",
            "message": "bad signature"
        })))
        .mount(&server)
        .await;
    let fixture = token_manager(&settings(&server.uri()));

    let err = fixture.tokens.get_token(false).await.unwrap_err();
    assert!(err.is_authentication_error());
    assert!(matches!(
        &err,
        ClientError::AuthenticationError { status: Some(401), message, .. } if message.contains("bad signature")
    ));
    assert_eq!(fixture.tokens.state().await, TokenState::NoToken);
    assert!(fixture.sink.joined().contains("[AUTH][ERROR]"));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_token() {
    let server = MockServer::start().await;
    mount_auth_once(&server, "jwe-1", 100).await;
    Mock::given(method("POST"))
        .and(path("/public/auth/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;
    let fixture = token_manager(&settings(&server.uri()));

    fixture.tokens.get_token(false).await.unwrap();
    fixture.clock.advance(TimeDelta::seconds(80));

    let err = fixture.tokens.get_token(false).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::AuthenticationError { status: Some(500), .. }
    ));
    assert_eq!(fixture.tokens.state().await, TokenState::Expired);
    assert_eq!(
        fixture.tokens.expires_at().await,
        Some(start_time() + TimeDelta::seconds(100))
    );
}

#[tokio::test]
async fn test_unexpected_auth_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/public/auth/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "OK",
            "body": { "token": "not-a-jwe" }
        })))
        .mount(&server)
        .await;
    let fixture = token_manager(&settings(&server.uri()));

    let err = fixture.tokens.get_token(false).await.unwrap_err();
    assert!(matches!(err, ClientError::UnexpectedAuthResponseError { .. }));
    assert!(!err.to_string().contains("not-a-jwe"));
    assert_eq!(fixture.tokens.state().await, TokenState::NoToken);
}

#[tokio::test]
async fn test_unreachable_auth_endpoint() {
    let fixture = token_manager(&settings("http://127.0.0.1:1"));

    let err = fixture.tokens.get_token(false).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::AuthenticationError { status: None, source: Some(_), .. }
    ));
}

#[tokio::test]
async fn test_auth_logs_hide_secrets() {
    let server = MockServer::start().await;
    mount_auth(&server, "SECRET-JWE-VALUE", 900, 1).await;
    let fixture = token_manager(&settings(&server.uri()));

    fixture.tokens.get_token(false).await.unwrap();

    let payload: Value = auth_requests(&server).await[0].body_json().unwrap();
    let signature = payload["signature"].as_str().unwrap();

    let lines = fixture.sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("[AUTH][REQUEST] POST "));
    assert!(lines[1].starts_with("[AUTH][RESPONSE] 200"));

    let joined = fixture.sink.joined();
    assert!(!joined.contains("SECRET-JWE-VALUE"));
    assert!(!joined.contains(signature));
    assert!(joined.contains(&signature[..16]));
    assert!(joined.contains(&signature[signature.len() - 16..]));
}

#[tokio::test]
async fn test_missing_key_is_a_configuration_error() {
    let mut settings = settings("http://127.0.0.1:1");
    settings.private_key_b64 = None;

    assert!(matches!(
        TokenManager::new(&settings),
        Err(ClientError::ConfigurationError(_))
    ));
}
