//! Shared fixtures for the integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rustore_client::{ManualClock, MemorySink, RedactingLogger, TokenManager};
use rustore_common::Settings;

pub const KEY_ID: &str = "key-123";

pub static PRIVATE_KEY: Lazy<RsaPrivateKey> = Lazy::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("generate test key")
});

pub static PRIVATE_KEY_B64: Lazy<String> = Lazy::new(|| {
    let der = PRIVATE_KEY.to_pkcs8_der().expect("encode test key");
    STANDARD.encode(der.as_bytes())
});

pub fn settings(base_url: &str) -> Settings {
    Settings::new(KEY_ID, PRIVATE_KEY_B64.clone())
        .with_base_url(base_url)
        .with_allow_insecure(true)
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
}

pub fn auth_body(jwe: &str, ttl: u64) -> Value {
    json!({
        "code": "OK",
        "message": null,
        "body": { "jwe": jwe, "ttl": ttl },
        "timestamp": "2024-01-15T13:30:00.000+03:00"
    })
}

/// Mounts an auth endpoint that answers with `jwe` once, then falls through.
pub async fn mount_auth_once(server: &MockServer, jwe: &str, ttl: u64) {
    Mock::given(method("POST"))
        .and(path("/public/auth/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(jwe, ttl)))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// Mounts an auth endpoint answering with `jwe` and expecting exactly `calls` requests.
pub async fn mount_auth(server: &MockServer, jwe: &str, ttl: u64, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/public/auth/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(jwe, ttl)))
        .expect(calls)
        .mount(server)
        .await;
}

pub struct Fixture {
    pub tokens: Arc<TokenManager>,
    pub clock: ManualClock,
    pub sink: Arc<MemorySink>,
}

pub fn token_manager(settings: &Settings) -> Fixture {
    let clock = ManualClock::new(start_time());
    let sink = Arc::new(MemorySink::new());
    let tokens = TokenManager::new(settings)
        .unwrap()
        .with_clock(Arc::new(clock.clone()))
        .with_logger(RedactingLogger::new(sink.clone()));

    Fixture {
        tokens: Arc::new(tokens),
        clock,
        sink,
    }
}

pub async fn auth_requests(server: &MockServer) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path() == "/public/auth/")
        .collect()
}
