#![allow(dead_code)]

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use gwont_core::{ApiClient, MemoryStore, SessionManager};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const API_KEY: &str = "test-api-key";

pub fn jwt(claims: Value) -> String {
    format!(
        "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.signature",
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

pub fn in_an_hour() -> i64 {
    Utc::now().timestamp() + 3600
}

pub fn an_hour_ago() -> i64 {
    Utc::now().timestamp() - 3600
}

pub fn access_token(jti: &str, exp: i64) -> String {
    jwt(json!({
        "sub": "admin",
        "exp": exp,
        "iat": exp - 900,
        "nbf": exp - 900,
        "jti": jti,
        "type": "access",
        "fresh": true,
        "user_role_id": 1
    }))
}

pub fn refresh_token(jti: &str, exp: i64) -> String {
    jwt(json!({
        "sub": "admin",
        "exp": exp,
        "iat": exp - 86400,
        "nbf": exp - 86400,
        "jti": jti,
        "type": "refresh"
    }))
}

pub fn user_token(name: &str, host: &str, exp: i64) -> String {
    jwt(json!({
        "sub": name,
        "exp": exp,
        "iat": exp - 900,
        "nbf": exp - 900,
        "jti": format!("{}-{}", name, host),
        "type": "access",
        "fresh": false,
        "host": host
    }))
}

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<MemoryStore>,
    pub client: ApiClient,
    pub session: Arc<SessionManager>,
}

/// Mock backend plus a session restored from `entries`.
pub async fn harness<I>(entries: I) -> Harness
where
    I: IntoIterator<Item = (String, String)>,
{
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::with_entries(entries));
    let client = ApiClient::new(server.uri()).expect("client");
    let session = Arc::new(
        SessionManager::restored(client.clone(), store.clone())
            .await
            .expect("restore"),
    );
    Harness {
        server,
        store,
        client,
        session,
    }
}

pub fn entry(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}
