use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, PublicApi};
use crate::store::{
    CredentialStore, StoreError, ACCESS_TOKEN_KEY, ADMIN_USERNAME_KEY, API_KEY_KEY,
    AVATAR_HOST_KEY, AVATAR_NAME_KEY, PASSWORD_KEY, REFRESH_TOKEN_KEY, USER_TOKEN_KEY,
};
use crate::token::{
    is_valid, AdminAccessClaims, AdminAccessToken, AdminRefreshClaims, AdminRefreshToken, Claims,
    DelegatedUserClaims, DelegatedUserToken, Token,
};

use super::{AdminSecret, AuthError, IdentitySelector, MissingCredential, RenewalStep};

/// One of the three independent credential roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    AdminAccess,
    AdminRefresh,
    DelegatedUser,
}

/// Outcome of resolving a tier that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenResolution {
    /// A currently valid raw bearer token.
    Token(String),
    /// No renewal step could run; the user has to configure something.
    NoTokenAvailable(MissingCredential),
}

impl TokenResolution {
    pub fn token(&self) -> Option<&str> {
        match self {
            TokenResolution::Token(token) => Some(token),
            TokenResolution::NoTokenAvailable(_) => None,
        }
    }

    pub fn into_result(self) -> Result<String, AuthError> {
        match self {
            TokenResolution::Token(token) => Ok(token),
            TokenResolution::NoTokenAvailable(missing) => Err(AuthError::NoTokenAvailable(missing)),
        }
    }
}

/// In-memory state of one tier, for status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierState {
    Absent,
    Expired { expired_at: Option<DateTime<Utc>> },
    Valid { expires_at: DateTime<Utc> },
}

impl TierState {
    fn of<C: Claims>(token: Option<&Token<C>>) -> Self {
        let Some(token) = token else {
            return TierState::Absent;
        };
        let expiry = token
            .expires_at()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        match expiry {
            Some(expires_at) if is_valid(Some(token)) => TierState::Valid { expires_at },
            expired_at => TierState::Expired { expired_at },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TierState::Valid { .. })
    }
}

#[derive(Default)]
struct SessionState {
    admin_access: Option<AdminAccessToken>,
    admin_refresh: Option<AdminRefreshToken>,
    user_access: Option<DelegatedUserToken>,
    identity: Option<IdentitySelector>,
}

/// Raw strings of a successful login.
struct LoginTokens {
    access: String,
    refresh: Option<String>,
}

/// Owns the decoded tokens of one administrator and the selected avatar
/// identity, and renews them lazily.
///
/// Every acquired token is written through to the credential store before
/// it is installed in memory. Renewals are serialised per tier: a caller
/// that finds an expired token takes the tier's guard, checks again, and
/// only then talks to the server, so concurrent callers share one exchange.
/// Lock order is delegated guard before admin guard.
pub struct SessionManager {
    client: ApiClient,
    public: PublicApi,
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    admin_renewal: Mutex<()>,
    user_renewal: Mutex<()>,
}

impl SessionManager {
    pub fn new(client: ApiClient, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            public: PublicApi::new(client.clone()),
            client,
            store,
            state: RwLock::new(SessionState::default()),
            admin_renewal: Mutex::new(()),
            user_renewal: Mutex::new(()),
        }
    }

    /// Create a manager and warm it from the store.
    pub async fn restored(
        client: ApiClient,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, AuthError> {
        let session = Self::new(client, store);
        session.restore().await?;
        Ok(session)
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn public_api(&self) -> &PublicApi {
        &self.public
    }

    // ===== Startup =====

    /// Load persisted tokens and the selected identity into memory.
    ///
    /// Tokens that fail to decode are dropped with a warning. Expired tokens
    /// are kept; they only decide which renewal step runs next.
    pub async fn restore(&self) -> Result<(), AuthError> {
        let values = self
            .store
            .get(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, AVATAR_NAME_KEY, AVATAR_HOST_KEY])
            .await?;

        let access = decode_stored::<AdminAccessClaims>(ACCESS_TOKEN_KEY, values.get(ACCESS_TOKEN_KEY));
        let refresh =
            decode_stored::<AdminRefreshClaims>(REFRESH_TOKEN_KEY, values.get(REFRESH_TOKEN_KEY));
        let identity = match (values.get(AVATAR_NAME_KEY), values.get(AVATAR_HOST_KEY)) {
            (Some(name), Some(host)) if !name.is_empty() && !host.is_empty() => {
                Some(IdentitySelector::new(name.clone(), host.clone()))
            }
            _ => None,
        };

        {
            let mut state = self.state.write().await;
            state.admin_access = access;
            state.admin_refresh = refresh;
            state.identity = identity.clone();
            state.user_access = None;
        }

        if let Some(ref identity) = identity {
            self.adopt_persisted(identity).await?;
        }

        info!(
            access = ?self.tier_state(Tier::AdminAccess).await,
            refresh = ?self.tier_state(Tier::AdminRefresh).await,
            identity = ?identity.as_ref().map(ToString::to_string),
            "Session restored"
        );
        Ok(())
    }

    // ===== Resolution =====

    /// A currently valid bearer token for `tier`, renewing it if needed.
    pub async fn resolve_token(&self, tier: Tier) -> Result<TokenResolution, AuthError> {
        match tier {
            Tier::AdminAccess => self.resolve_admin_access().await,
            Tier::AdminRefresh => self.resolve_admin_refresh().await,
            Tier::DelegatedUser => self.resolve_delegated_user().await,
        }
    }

    /// The in-memory token of `tier`, if it is still valid.
    async fn current(&self, tier: Tier) -> Option<String> {
        let state = self.state.read().await;
        match tier {
            Tier::AdminAccess => valid_raw(state.admin_access.as_ref()),
            Tier::AdminRefresh => valid_raw(state.admin_refresh.as_ref()),
            Tier::DelegatedUser => valid_raw(state.user_access.as_ref()),
        }
    }

    async fn resolve_admin_access(&self) -> Result<TokenResolution, AuthError> {
        if let Some(token) = self.current(Tier::AdminAccess).await {
            return Ok(TokenResolution::Token(token));
        }

        let _guard = self.admin_renewal.lock().await;
        if let Some(token) = self.current(Tier::AdminAccess).await {
            return Ok(TokenResolution::Token(token));
        }

        let refresh = valid_token(self.state.read().await.admin_refresh.as_ref());
        if let Some(refresh) = refresh {
            debug!("Admin access token expired, using refresh token");
            return self.refresh_access(&refresh).await.map(TokenResolution::Token);
        }

        Ok(match self.login().await? {
            Some(tokens) => TokenResolution::Token(tokens.access),
            None => TokenResolution::NoTokenAvailable(MissingCredential::AdminSecret),
        })
    }

    async fn resolve_admin_refresh(&self) -> Result<TokenResolution, AuthError> {
        if let Some(token) = self.current(Tier::AdminRefresh).await {
            return Ok(TokenResolution::Token(token));
        }

        let _guard = self.admin_renewal.lock().await;
        if let Some(token) = self.current(Tier::AdminRefresh).await {
            return Ok(TokenResolution::Token(token));
        }

        // Refresh tokens are only ever issued by a full login
        match self.login().await? {
            Some(LoginTokens {
                refresh: Some(refresh),
                ..
            }) => Ok(TokenResolution::Token(refresh)),
            Some(LoginTokens { refresh: None, .. }) => Err(AuthError::rejected(
                self.login_step().await?,
                "login did not return a valid refresh token",
            )),
            None => Ok(TokenResolution::NoTokenAvailable(
                MissingCredential::AdminSecret,
            )),
        }
    }

    async fn resolve_delegated_user(&self) -> Result<TokenResolution, AuthError> {
        if let Some(token) = self.current(Tier::DelegatedUser).await {
            return Ok(TokenResolution::Token(token));
        }

        let _guard = self.user_renewal.lock().await;
        if let Some(token) = self.current(Tier::DelegatedUser).await {
            return Ok(TokenResolution::Token(token));
        }

        let (identity, cached) = {
            let state = self.state.read().await;
            (state.identity.clone(), state.user_access.is_some())
        };
        let Some(identity) = identity else {
            return Ok(TokenResolution::NoTokenAvailable(
                MissingCredential::IdentitySelection,
            ));
        };

        if !cached {
            if let Some(token) = self.adopt_persisted(&identity).await? {
                return Ok(TokenResolution::Token(token));
            }
        }

        let admin = match self.resolve_admin_access().await? {
            TokenResolution::Token(token) => token,
            unavailable => return Ok(unavailable),
        };

        self.issue_delegated(&identity, &admin)
            .await
            .map(TokenResolution::Token)
    }

    // ===== Renewal steps =====

    async fn refresh_access(&self, refresh: &AdminRefreshToken) -> Result<String, AuthError> {
        let response = self
            .public
            .refresh(refresh.raw())
            .await
            .map_err(|e| AuthError::from_exchange(RenewalStep::Refresh, e))?;

        let access = accept::<AdminAccessClaims>(RenewalStep::Refresh, response.access_token.as_deref())?;
        let raw = access.raw().to_string();

        self.store.set_one(ACCESS_TOKEN_KEY, &raw).await?;
        self.state.write().await.admin_access = Some(access);

        info!("Admin access token refreshed");
        Ok(raw)
    }

    /// Log in with the configured admin secret. `None` when no secret is
    /// configured.
    async fn login(&self) -> Result<Option<LoginTokens>, AuthError> {
        let Some(secret) = self.admin_secret().await? else {
            debug!("No admin secret configured, cannot log in");
            return Ok(None);
        };

        let (step, result) = match &secret {
            AdminSecret::ApiKey(key) => (
                RenewalStep::LoginWithKey,
                self.public.login_with_key(key).await,
            ),
            AdminSecret::Password { username, password } => {
                (RenewalStep::Login, self.public.login(username, password).await)
            }
        };
        let response = result.map_err(|e| AuthError::from_exchange(step, e))?;

        let access = accept::<AdminAccessClaims>(step, response.access_token.as_deref())?;
        let refresh = match accept::<AdminRefreshClaims>(step, response.refresh_token.as_deref()) {
            Ok(refresh) => Some(refresh),
            Err(e) => {
                warn!(error = %e, "Login returned no usable refresh token");
                None
            }
        };

        let tokens = LoginTokens {
            access: access.raw().to_string(),
            refresh: refresh.as_ref().map(|t| t.raw().to_string()),
        };

        let mut entries = HashMap::from([(ACCESS_TOKEN_KEY.to_string(), tokens.access.clone())]);
        if let Some(ref raw) = tokens.refresh {
            entries.insert(REFRESH_TOKEN_KEY.to_string(), raw.clone());
        }
        self.store.set(entries).await?;

        {
            let mut state = self.state.write().await;
            state.admin_access = Some(access);
            if refresh.is_some() {
                state.admin_refresh = refresh;
            }
        }

        let subject = self.admin_subject().await;
        info!(step = %step, subject = %subject, "Admin logged in");
        Ok(Some(tokens))
    }

    async fn issue_delegated(
        &self,
        identity: &IdentitySelector,
        admin_token: &str,
    ) -> Result<String, AuthError> {
        let step = RenewalStep::IssueDelegatedToken;
        let raw = self
            .client
            .fetch_delegated_token(Some(admin_token), &identity.name, &identity.host, None)
            .await
            .map_err(|e| AuthError::from_exchange(step, e))?;

        let token = accept::<DelegatedUserClaims>(step, Some(&raw))?;
        let raw = token.raw().to_string();

        self.store
            .set(HashMap::from([
                (USER_TOKEN_KEY.to_string(), raw.clone()),
                (identity.store_key(), raw.clone()),
            ]))
            .await?;
        self.state.write().await.user_access = Some(token);

        info!(identity = %identity, "Delegated token issued");
        Ok(raw)
    }

    /// Install the persisted delegated token of `identity` if it is valid.
    async fn adopt_persisted(&self, identity: &IdentitySelector) -> Result<Option<String>, AuthError> {
        let key = identity.store_key();
        let stored = self.store.get_one(&key).await?;
        let Some(token) = decode_stored::<DelegatedUserClaims>(USER_TOKEN_KEY, stored.as_ref()) else {
            return Ok(None);
        };
        if !is_valid(Some(&token)) {
            debug!(identity = %identity, "Persisted delegated token expired");
            return Ok(None);
        }

        let raw = token.raw().to_string();
        self.store.set_one(USER_TOKEN_KEY, &raw).await?;
        self.state.write().await.user_access = Some(token);

        debug!(identity = %identity, "Reusing persisted delegated token");
        Ok(Some(raw))
    }

    // ===== Identity =====

    /// Make `selector` the current delegated identity.
    ///
    /// Selecting a different identity drops the in-memory delegated token and
    /// adopts the one persisted for the new identity, if still valid.
    /// Selecting the current identity again is a no-op.
    pub async fn select_identity(&self, selector: Option<IdentitySelector>) -> Result<(), AuthError> {
        let _guard = self.user_renewal.lock().await;
        if self.state.read().await.identity == selector {
            return Ok(());
        }

        let (name, host) = selector
            .as_ref()
            .map(|s| (s.name.clone(), s.host.clone()))
            .unwrap_or_default();
        self.store
            .set(HashMap::from([
                (AVATAR_NAME_KEY.to_string(), name),
                (AVATAR_HOST_KEY.to_string(), host),
            ]))
            .await?;

        {
            let mut state = self.state.write().await;
            state.identity = selector.clone();
            state.user_access = None;
        }

        match selector {
            Some(ref identity) => {
                self.adopt_persisted(identity).await?;
                info!(identity = %identity, "Identity selected");
            }
            None => info!("Identity cleared"),
        }
        Ok(())
    }

    pub async fn current_identity(&self) -> Option<IdentitySelector> {
        self.state.read().await.identity.clone()
    }

    // ===== Admin secret =====

    /// Persist the administrator credential used for logins.
    pub async fn save_admin_secret(&self, secret: &AdminSecret) -> Result<(), StoreError> {
        let entries = match secret {
            AdminSecret::ApiKey(key) => HashMap::from([(API_KEY_KEY.to_string(), key.clone())]),
            AdminSecret::Password { username, password } => HashMap::from([
                (ADMIN_USERNAME_KEY.to_string(), username.clone()),
                (PASSWORD_KEY.to_string(), password.clone()),
            ]),
        };
        self.store.set(entries).await?;
        info!(secret = ?secret, "Admin secret saved");
        Ok(())
    }

    /// The configured admin secret. An API key wins over a password.
    pub async fn admin_secret(&self) -> Result<Option<AdminSecret>, StoreError> {
        let mut values = self
            .store
            .get(&[API_KEY_KEY, ADMIN_USERNAME_KEY, PASSWORD_KEY])
            .await?;

        if let Some(key) = values.remove(API_KEY_KEY).filter(|k| !k.trim().is_empty()) {
            return Ok(Some(AdminSecret::ApiKey(key)));
        }
        let username = values.remove(ADMIN_USERNAME_KEY).filter(|u| !u.trim().is_empty());
        let password = values.remove(PASSWORD_KEY).filter(|p| !p.is_empty());
        Ok(match (username, password) {
            (Some(username), Some(password)) => Some(AdminSecret::Password { username, password }),
            _ => None,
        })
    }

    pub async fn has_admin_secret(&self) -> Result<bool, StoreError> {
        Ok(self.admin_secret().await?.is_some())
    }

    async fn login_step(&self) -> Result<RenewalStep, StoreError> {
        Ok(match self.admin_secret().await? {
            Some(AdminSecret::Password { .. }) => RenewalStep::Login,
            _ => RenewalStep::LoginWithKey,
        })
    }

    // ===== Inspection =====

    pub async fn tier_state(&self, tier: Tier) -> TierState {
        let state = self.state.read().await;
        match tier {
            Tier::AdminAccess => TierState::of(state.admin_access.as_ref()),
            Tier::AdminRefresh => TierState::of(state.admin_refresh.as_ref()),
            Tier::DelegatedUser => TierState::of(state.user_access.as_ref()),
        }
    }

    async fn admin_subject(&self) -> String {
        self.state
            .read()
            .await
            .admin_access
            .as_ref()
            .map(|t| t.subject().to_string())
            .unwrap_or_default()
    }
}

fn valid_raw<C: Claims>(token: Option<&Token<C>>) -> Option<String> {
    token
        .filter(|t| is_valid(Some(*t)))
        .map(|t| t.raw().to_string())
}

fn valid_token<C: Claims>(token: Option<&Token<C>>) -> Option<Token<C>> {
    token.filter(|t| is_valid(Some(*t))).cloned()
}

/// Decode a token read from the store; undecodable tokens count as absent.
fn decode_stored<C: Claims>(key: &str, raw: Option<&String>) -> Option<Token<C>> {
    match Token::<C>::decode(raw.map(String::as_str)) {
        Ok(token) => token,
        Err(e) => {
            warn!(key = %key.replace('\0', "/"), error = %e, "Discarding undecodable stored token");
            None
        }
    }
}

/// Decode a freshly issued token and insist that it is valid.
fn accept<C: Claims>(step: RenewalStep, raw: Option<&str>) -> Result<Token<C>, AuthError> {
    match Token::<C>::decode(raw) {
        Ok(Some(token)) if is_valid(Some(&token)) => Ok(token),
        Ok(Some(_)) => Err(AuthError::rejected(step, "issued token is already expired")),
        Ok(None) => Err(AuthError::rejected(step, "response did not contain a token")),
        Err(e) => Err(AuthError::rejected(
            step,
            format!("issued token could not be decoded: {}", e),
        )),
    }
}
