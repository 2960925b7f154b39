use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Claims common to every token the backend issues.
///
/// Each concrete claims type carries its own copy of `sub` and `exp` so the
/// payload deserializes flat, the way the backend writes it.
pub trait Claims: DeserializeOwned + Clone + Send + Sync + 'static {
    /// The `sub` claim.
    fn subject(&self) -> &str;

    /// The `exp` claim in seconds since the epoch, if present.
    fn expires_at(&self) -> Option<i64>;
}

/// Admin access token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAccessClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub jti: String,
    #[serde(rename = "type", default)]
    pub token_type: String,
    #[serde(default)]
    pub fresh: bool,
    #[serde(default)]
    pub user_role_id: Option<i64>,
}

/// Admin refresh token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRefreshClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub jti: String,
    #[serde(rename = "type", default)]
    pub token_type: String,
}

/// Delegated (per-avatar) access token payload.
///
/// `host` tells apart avatars with the same name on different game servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedUserClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub jti: String,
    #[serde(rename = "type", default)]
    pub token_type: String,
    #[serde(default)]
    pub fresh: bool,
    #[serde(default)]
    pub host: String,
}

macro_rules! impl_claims {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Claims for $ty {
                fn subject(&self) -> &str {
                    &self.sub
                }

                fn expires_at(&self) -> Option<i64> {
                    self.exp
                }
            }
        )*
    };
}

impl_claims!(AdminAccessClaims, AdminRefreshClaims, DelegatedUserClaims);
