use std::fmt;

use reqwest::Url;

/// Which delegated identity is current: an avatar name on one game server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentitySelector {
    pub name: String,
    pub host: String,
}

impl IdentitySelector {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }

    /// Store key of this identity's cached delegated token.
    pub fn store_key(&self) -> String {
        crate::store::user_token_key(&self.name, &self.host)
    }
}

impl fmt::Display for IdentitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.host)
    }
}

/// Administrator credential saved from configuration.
#[derive(Clone, PartialEq, Eq)]
pub enum AdminSecret {
    ApiKey(String),
    Password { username: String, password: String },
}

// Manual impl keeps secrets out of logs
impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminSecret::ApiKey(_) => f.write_str("ApiKey(***)"),
            AdminSecret::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Game server prefix from a page URL on `site_domain`.
///
/// `https://ts2.x1.europe.travian.com/dorf1.php` on `travian` yields
/// `ts2.x1.europe`.
pub fn avatar_host_from_url(page_url: &str, site_domain: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    let host = url.host_str()?;
    let marker = format!(".{}.", site_domain);
    let idx = host.find(&marker)?;
    if idx == 0 {
        return None;
    }
    Some(host[..idx].to_string())
}
