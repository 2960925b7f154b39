//! Application configuration management.
//!
//! Holds the backend host, the site domain accepted for page exports and
//! the credential storage choice. Configuration is stored at
//! `~/.config/gwont/config.json`; credentials default to
//! `~/.local/share/gwont/credentials.json` (secrets go to the OS keychain
//! when `use_keychain` is set).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, DEFAULT_API_HOST, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::store::{CredentialStore, JsonFileStore, KeychainStore, SplitStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "gwont";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Credential store file name
const CREDENTIALS_FILE: &str = "credentials.json";

/// Game site whose pages may be exported
const DEFAULT_SITE_DOMAIN: &str = "travian";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_host: String,
    pub site_domain: String,
    /// Send authenticated requests without a token when none can be
    /// obtained, letting the server report the failure.
    pub send_unauthenticated_if_no_token: bool,
    /// Keep the API key and password in the OS keychain instead of the
    /// credentials file.
    pub use_keychain: bool,
    pub request_timeout_secs: u64,
    pub credentials_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            site_domain: DEFAULT_SITE_DOMAIN.to_string(),
            send_unauthenticated_if_no_token: true,
            use_keychain: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credentials_path: None,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location, or defaults if no file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn credentials_path(&self) -> Result<PathBuf> {
        match self.credentials_path {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join(CREDENTIALS_FILE)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Transport for the configured host.
    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::with_timeout(&self.api_host, self.request_timeout())
            .context("Failed to build HTTP client")
    }

    /// The credential store this configuration asks for.
    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let file: Arc<dyn CredentialStore> = Arc::new(JsonFileStore::new(self.credentials_path()?));
        if self.use_keychain {
            Ok(Arc::new(SplitStore::new(Arc::new(KeychainStore::default()), file)))
        } else {
            Ok(file)
        }
    }
}
