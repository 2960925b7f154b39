use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{blocking, CredentialStore, StoreError};

/// Credential store backed by a single JSON object on disk.
///
/// Every write lands in a temp file beside the target and is renamed over
/// it, so readers only ever see a complete file.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_all(path: &Path) -> Result<HashMap<String, String>, StoreError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(&contents)?)
}

fn write_all(path: &Path, entries: &HashMap<String, String>) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let contents = serde_json::to_vec_pretty(entries)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(&contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        let path = self.path.clone();
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
        blocking(move || {
            let mut all = read_all(&path)?;
            Ok(keys
                .iter()
                .filter_map(|key| all.remove_entry(key.as_str()))
                .collect())
        })
        .await
    }

    async fn set(&self, entries: HashMap<String, String>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let count = entries.len();
        blocking(move || {
            let mut all = read_all(&path)?;
            all.extend(entries);
            write_all(&path, &all)
        })
        .await?;
        debug!(path = %self.path.display(), keys = count, "Credential store written");
        Ok(())
    }
}
