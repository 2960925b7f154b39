//! Bearer-authenticated facades.
//!
//! `AdminApi` attaches the admin access token, `UserApi` the delegated token
//! of the selected avatar. Both resolve their token through the
//! `SessionManager` before every request.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{AuthError, SessionManager, Tier, TokenResolution};

use super::ApiClient;

/// Shared request path of the authenticated facades.
#[derive(Clone)]
struct Authenticated {
    client: ApiClient,
    session: Arc<SessionManager>,
    tier: Tier,
    send_unauthenticated_if_no_token: bool,
}

impl Authenticated {
    /// Token to attach. `None` means send without one, which only happens
    /// when the session has nothing and the facade is allowed to try anyway.
    async fn bearer(&self) -> Result<Option<String>, AuthError> {
        match self.session.resolve_token(self.tier).await? {
            TokenResolution::Token(token) => Ok(Some(token)),
            TokenResolution::NoTokenAvailable(missing) if self.send_unauthenticated_if_no_token => {
                warn!(tier = ?self.tier, %missing, "No token available, sending request unauthenticated");
                Ok(None)
            }
            TokenResolution::NoTokenAvailable(missing) => Err(AuthError::NoTokenAvailable(missing)),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, AuthError> {
        let bearer = self.bearer().await?;
        Ok(self.client.execute(builder, bearer.as_deref()).await?)
    }

    async fn json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, AuthError> {
        self.send(self.client.json_request(method, path, body)).await
    }
}

macro_rules! authenticated_verbs {
    ($facade:ty) => {
        impl $facade {
            pub async fn get(&self, path: &str) -> Result<Response, AuthError> {
                self.inner.json::<()>(Method::GET, path, None).await
            }

            pub async fn post<B: Serialize + ?Sized>(
                &self,
                path: &str,
                body: Option<&B>,
            ) -> Result<Response, AuthError> {
                self.inner.json(Method::POST, path, body).await
            }

            pub async fn put<B: Serialize + ?Sized>(
                &self,
                path: &str,
                body: Option<&B>,
            ) -> Result<Response, AuthError> {
                self.inner.json(Method::PUT, path, body).await
            }

            pub async fn delete<B: Serialize + ?Sized>(
                &self,
                path: &str,
                body: Option<&B>,
            ) -> Result<Response, AuthError> {
                self.inner.json(Method::DELETE, path, body).await
            }
        }
    };
}

/// Requests authenticated as the administrator.
#[derive(Clone)]
pub struct AdminApi {
    inner: Authenticated,
}

impl AdminApi {
    pub fn new(
        client: ApiClient,
        session: Arc<SessionManager>,
        send_unauthenticated_if_no_token: bool,
    ) -> Self {
        Self {
            inner: Authenticated {
                client,
                session,
                tier: Tier::AdminAccess,
                send_unauthenticated_if_no_token,
            },
        }
    }

    /// Have the backend issue a delegated token for avatar `name` on `host`,
    /// optionally for a sitter acting on that avatar's behalf.
    ///
    /// This does not touch the session's selected identity or its cache.
    pub async fn issue_delegated_token(
        &self,
        name: &str,
        host: &str,
        on_behalf_of: Option<&str>,
    ) -> Result<String, AuthError> {
        let bearer = self.inner.bearer().await?;
        Ok(self
            .inner
            .client
            .fetch_delegated_token(bearer.as_deref(), name, host, on_behalf_of)
            .await?)
    }

    /// Upload a captured page for processing. The raw response is returned
    /// whatever its status.
    pub async fn submit_page_export(
        &self,
        url: &str,
        avatar_name: &str,
        html: String,
    ) -> Result<Response, AuthError> {
        debug!(url = %url, avatar = %avatar_name, bytes = html.len(), "Submitting page export");
        let builder = self.inner.client.export_request(url, avatar_name, html);
        self.inner.send(builder).await
    }
}

authenticated_verbs!(AdminApi);

/// Requests authenticated as the selected avatar.
#[derive(Clone)]
pub struct UserApi {
    inner: Authenticated,
}

impl UserApi {
    pub fn new(
        client: ApiClient,
        session: Arc<SessionManager>,
        send_unauthenticated_if_no_token: bool,
    ) -> Self {
        Self {
            inner: Authenticated {
                client,
                session,
                tier: Tier::DelegatedUser,
                send_unauthenticated_if_no_token,
            },
        }
    }
}

authenticated_verbs!(UserApi);
