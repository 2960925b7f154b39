//! HTTP transport for the Gwont backend and the anonymous facade.
//!
//! `ApiClient` owns the connection pool and knows the endpoint paths.
//! `PublicApi` exposes it without credentials: the generic verbs plus the
//! three credential exchanges (login, API-key login, refresh).

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::dto::{
    ApiKeyLoginRequest, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Production API host.
pub const DEFAULT_API_HOST: &str = "https://api.gwont.com";

pub const LOGIN_ENDPOINT: &str = "/login";
pub const LOGIN_API_KEY_ENDPOINT: &str = "/login/api-key";
pub const REFRESH_TOKEN_ENDPOINT: &str = "/refresh-token";
pub const USER_TOKEN_BY_NAME_ENDPOINT: &str = "/user/avatar-token-by-name";
pub const EXPORT_ENDPOINT: &str = "/export-page";

/// Default HTTP request timeout in seconds.
/// Page exports upload whole documents, so this is generous.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Transport shared by all facades.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Wrap an existing reqwest client, sharing its connection pool.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start a request for `path` relative to the base URL.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Start a request carrying the JSON content type, with an optional body.
    pub(crate) fn json_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> RequestBuilder {
        let builder = self
            .request(method, path)
            .header(header::CONTENT_TYPE, "application/json");
        match body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }

    /// Send a request, attaching `bearer` when given.
    ///
    /// Never retries. A non-2xx reply is logged and still returned, the
    /// caller decides what it means.
    pub(crate) async fn execute(
        &self,
        builder: RequestBuilder,
        bearer: Option<&str>,
    ) -> Result<Response, ApiError> {
        let builder = match bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Request failed to complete");
            ApiError::NetworkError(e)
        })?;

        if response.status().is_success() {
            debug!(status = %response.status(), url = %response.url().path(), "Request succeeded");
        } else {
            warn!(status = %response.status(), url = %response.url().path(), "Request returned error status");
        }
        Ok(response)
    }

    /// Check if response is successful, returning an error with body if not.
    pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    pub(crate) async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Ask the backend for a delegated token for avatar `name` on `host`.
    ///
    /// The endpoint answers with the bare token; a JSON-quoted string is
    /// accepted as well.
    pub(crate) async fn fetch_delegated_token(
        &self,
        bearer: Option<&str>,
        name: &str,
        host: &str,
        on_behalf_of: Option<&str>,
    ) -> Result<String, ApiError> {
        let mut query = vec![("avatar_name", name), ("host", host)];
        if let Some(sitter) = on_behalf_of {
            query.push(("sitter_avatar_name", sitter));
        }

        let builder = self
            .json_request::<()>(Method::GET, USER_TOKEN_BY_NAME_ENDPOINT, None)
            .query(&query);
        let response = Self::check_response(self.execute(builder, bearer).await?).await?;
        let body = response.text().await?;
        Self::parse_token_body(&body)
    }

    fn parse_token_body(body: &str) -> Result<String, ApiError> {
        let trimmed = body.trim();
        if trimmed.starts_with('"') {
            serde_json::from_str::<String>(trimmed)
                .map_err(|e| ApiError::InvalidResponse(e.to_string()))
        } else {
            Ok(trimmed.to_string())
        }
    }

    /// Build the export upload: the page HTML as body, avatar and page URL
    /// as form-encoded query parameters.
    pub(crate) fn export_request(&self, url: &str, avatar_name: &str, html: String) -> RequestBuilder {
        self.request(Method::POST, EXPORT_ENDPOINT)
            .query(&[("avatar_name", avatar_name), ("url", url)])
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(html)
    }
}

/// Anonymous facade: requests without any bearer token.
#[derive(Clone, Debug)]
pub struct PublicApi {
    client: ApiClient,
}

impl PublicApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        let builder = self.client.json_request::<()>(Method::GET, path, None);
        self.client.execute(builder, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let builder = self.client.json_request(Method::POST, path, body);
        self.client.execute(builder, None).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let builder = self.client.json_request(Method::PUT, path, body);
        self.client.execute(builder, None).await
    }

    pub async fn delete<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let builder = self.client.json_request(Method::DELETE, path, body);
        self.client.execute(builder, None).await
    }

    /// Exchange admin username and password for an access/refresh pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest { username, password };
        let response = self.post(LOGIN_ENDPOINT, Some(&body)).await?;
        ApiClient::parse_json(response).await
    }

    /// Exchange an API key for an access/refresh pair.
    pub async fn login_with_key(&self, api_key: &str) -> Result<LoginResponse, ApiError> {
        let body = ApiKeyLoginRequest { api_key };
        let response = self.post(LOGIN_API_KEY_ENDPOINT, Some(&body)).await?;
        ApiClient::parse_json(response).await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let body = RefreshRequest { refresh_token };
        let response = self.post(REFRESH_TOKEN_ENDPOINT, Some(&body)).await?;
        ApiClient::parse_json(response).await
    }
}
