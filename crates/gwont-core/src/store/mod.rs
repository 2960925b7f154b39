//! Durable key/value persistence for tokens, identity selection and secrets.
//!
//! The session manager writes through to a `CredentialStore` on every
//! change and reads it back at startup or when the selected identity
//! changes. Backends:
//!
//! - `JsonFileStore`: a single JSON object file, replaced atomically
//! - `KeychainStore`: one OS keychain entry per key via keyring
//! - `MemoryStore`: in-process map for tests and throwaway sessions
//! - `SplitStore`: secrets to one backend, everything else to another

pub mod file;
pub mod keychain;
pub mod memory;
pub mod split;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub use file::JsonFileStore;
pub use keychain::KeychainStore;
pub use memory::MemoryStore;
pub use split::SplitStore;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_TOKEN_KEY: &str = "userToken";
pub const AVATAR_NAME_KEY: &str = "avatarName";
pub const AVATAR_HOST_KEY: &str = "avatarHost";
pub const API_KEY_KEY: &str = "apiKey";
pub const ADMIN_USERNAME_KEY: &str = "adminUsername";
pub const PASSWORD_KEY: &str = "password";

/// Keys holding administrator secrets rather than tokens.
pub const SECRET_KEYS: [&str; 3] = [API_KEY_KEY, ADMIN_USERNAME_KEY, PASSWORD_KEY];

/// Store key for the cached delegated token of one avatar on one server.
pub fn user_token_key(name: &str, host: &str) -> String {
    format!("{}\0{}\0{}", USER_TOKEN_KEY, name, host)
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store is corrupt: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),
}

/// Run blocking backend I/O on tokio's blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Bulk read. Keys with no stored value are left out of the result.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError>;

    /// Bulk write, overwriting every given key.
    async fn set(&self, entries: HashMap<String, String>) -> Result<(), StoreError>;

    async fn get_one(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get(&[key]).await?.remove(key))
    }

    async fn set_one(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set(HashMap::from([(key.to_string(), value.to_string())]))
            .await
    }
}
