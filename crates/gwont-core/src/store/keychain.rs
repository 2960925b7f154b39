use std::collections::HashMap;

use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use super::{blocking, CredentialStore, StoreError};

/// Default keychain service name.
pub const SERVICE_NAME: &str = "gwont-companion";

/// Credential store backed by the OS keychain, one entry per key.
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Composite keys contain NUL separators, which some keychains refuse
    /// in account names.
    fn account(key: &str) -> String {
        key.replace('\0', "/")
    }
}

fn entry(service: &str, key: &str) -> Result<Entry, StoreError> {
    Ok(Entry::new(service, &KeychainStore::account(key))?)
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

#[async_trait]
impl CredentialStore for KeychainStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        let service = self.service.clone();
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
        blocking(move || {
            let mut values = HashMap::new();
            for key in keys {
                match entry(&service, &key)?.get_password() {
                    Ok(value) => {
                        values.insert(key, value);
                    }
                    Err(keyring::Error::NoEntry) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(values)
        })
        .await
    }

    async fn set(&self, entries: HashMap<String, String>) -> Result<(), StoreError> {
        let service = self.service.clone();
        blocking(move || {
            for (key, value) in &entries {
                entry(&service, key)?.set_password(value)?;
                debug!(service = %service, key = %KeychainStore::account(key), "Stored keychain entry");
            }
            Ok(())
        })
        .await
    }
}
