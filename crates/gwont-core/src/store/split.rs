use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{CredentialStore, StoreError, SECRET_KEYS};

/// Routes administrator secrets to one store and tokens to another.
///
/// The usual setup keeps the API key and password in the OS keychain while
/// short-lived tokens go to the JSON file.
pub struct SplitStore {
    secrets: Arc<dyn CredentialStore>,
    tokens: Arc<dyn CredentialStore>,
}

impl SplitStore {
    pub fn new(secrets: Arc<dyn CredentialStore>, tokens: Arc<dyn CredentialStore>) -> Self {
        Self { secrets, tokens }
    }

    fn is_secret(key: &str) -> bool {
        SECRET_KEYS.contains(&key)
    }
}

#[async_trait]
impl CredentialStore for SplitStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        let (secret_keys, token_keys): (Vec<&str>, Vec<&str>) =
            keys.iter().copied().partition(|key| Self::is_secret(key));

        let mut values = HashMap::new();
        if !secret_keys.is_empty() {
            values.extend(self.secrets.get(&secret_keys).await?);
        }
        if !token_keys.is_empty() {
            values.extend(self.tokens.get(&token_keys).await?);
        }
        Ok(values)
    }

    async fn set(&self, entries: HashMap<String, String>) -> Result<(), StoreError> {
        let (secrets, tokens): (HashMap<_, _>, HashMap<_, _>) = entries
            .into_iter()
            .partition(|(key, _)| Self::is_secret(key));

        if !secrets.is_empty() {
            self.secrets.set(secrets).await?;
        }
        if !tokens.is_empty() {
            self.tokens.set(tokens).await?;
        }
        Ok(())
    }
}
