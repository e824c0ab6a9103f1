//! Directory-backed key-value store
//!
//! Each key is stored as `<root>/<key>.json`. The previous value is kept as
//! `<key>.json.backup` and is replaced on every write.

use crate::error::{Result, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;

const EXTENSION: &str = "json";
const BACKUP_SUFFIX: &str = ".backup";

/// Local key-value store
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", key, EXTENSION)))
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    async fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).await?;
            tracing::debug!("Created data directory: {}", self.root.display());
        }
        Ok(())
    }

    /// Raw stored text, `None` when the key is absent
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path).await?))
    }

    /// Deserialized value, `None` when the key is absent.
    ///
    /// An unparseable value is reported as [`StoreError::Corrupt`].
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(content) = self.get_raw(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.ensure_root().await?;
        let path = self.key_path(key)?;

        if path.exists() {
            let backup = Self::backup_path(&path);
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(value)?;
        fs::write(&path, content).await?;
        tracing::debug!(key, "Stored value");
        Ok(())
    }

    /// Remove a key. Returns whether it existed
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let path = self.key_path(key)?;
        let existed = path.exists();
        if existed {
            fs::remove_file(&path).await?;
            tracing::debug!(key, "Removed value");
        }
        let backup = Self::backup_path(&path);
        if backup.exists() {
            fs::remove_file(&backup).await?;
        }
        Ok(existed)
    }

    /// All keys currently stored, sorted
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if !self.root.exists() {
            return Ok(keys);
        }
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_get_remove() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path().join("data"));

        assert_eq!(store.get::<Vec<u32>>("ridecs").await.unwrap(), None);

        store.set("ridecs", &vec![1u32, 2]).await.unwrap();
        store.set("ridecs", &vec![3u32]).await.unwrap();
        assert_eq!(store.get::<Vec<u32>>("ridecs").await.unwrap(), Some(vec![3]));

        let backup = temp_dir.path().join("data").join("ridecs.json.backup");
        assert!(backup.exists());

        assert!(store.remove("ridecs").await.unwrap());
        assert!(!store.remove("ridecs").await.unwrap());
        assert!(!backup.exists());
    }

    #[tokio::test]
    async fn test_corrupt_value() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        std::fs::write(temp_dir.path().join("ridec_session.json"), "{not json").unwrap();

        let err = store
            .get::<serde_json::Value>("ridec_session")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_keys_and_invalid_key() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        store.set("b_key", "x").await.unwrap();
        store.set("a_key", "y").await.unwrap();
        store.set("a_key", "z").await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["a_key", "b_key"]);
        assert!(matches!(
            store.set("../escape", "x").await.unwrap_err(),
            StoreError::InvalidKey(_)
        ));
    }
}
