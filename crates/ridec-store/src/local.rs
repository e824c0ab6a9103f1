//! Local backend: the full record list stored as one blob

use crate::backend::{BackendStatus, RecordBackend};
use crate::error::{Result, StoreError};
use crate::keys;
use crate::kv::LocalStore;
use crate::session::SessionUser;
use async_trait::async_trait;
use ridec_core::{ChangeSet, ProcessRecord, RecordKind};

/// Backend over the local key-value store
#[derive(Debug, Clone)]
pub struct LocalBackend {
    store: LocalStore,
}

impl LocalBackend {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Replace the stored list. An empty list removes the key
    pub async fn save_all(&self, records: &[ProcessRecord]) -> Result<()> {
        if records.is_empty() {
            self.store.remove(keys::RECORDS).await?;
            tracing::debug!("Record list empty, key removed");
        } else {
            self.store.set(keys::RECORDS, records).await?;
            tracing::debug!("Saved {} records", records.len());
        }
        Ok(())
    }
}

#[async_trait]
impl RecordBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn status(&self) -> Result<BackendStatus> {
        let root = self.store.root().display().to_string();
        match self.list_records().await {
            Ok(records) => Ok(BackendStatus::ok(
                self.name(),
                format!("{} ({} records)", root, records.len()),
            )),
            Err(e) => Ok(BackendStatus::failed(self.name(), e.to_string())),
        }
    }

    async fn list_records(&self) -> Result<Vec<ProcessRecord>> {
        Ok(self
            .store
            .get::<Vec<ProcessRecord>>(keys::RECORDS)
            .await?
            .unwrap_or_default())
    }

    async fn get_record(&self, id: &str) -> Result<Option<ProcessRecord>> {
        Ok(self.list_records().await?.into_iter().find(|r| r.id == id))
    }

    async fn create_record(&self, record: &ProcessRecord) -> Result<()> {
        let mut records = self.list_records().await?;
        records.retain(|r| r.id != record.id);
        records.push(record.clone());
        self.save_all(&records).await
    }

    async fn update_record(&self, record: &ProcessRecord) -> Result<()> {
        let mut records = self.list_records().await?;
        let slot = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| StoreError::NotFound(record.id.clone()))?;
        *slot = record.clone();
        self.save_all(&records).await
    }

    async fn delete_record(&self, id: &str, _kind: RecordKind) -> Result<()> {
        let mut records = self.list_records().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.save_all(&records).await
    }

    async fn lookup_user(&self, email: &str, name: Option<&str>) -> Result<SessionUser> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(StoreError::AuthenticationFailed(format!(
                "invalid e-mail address: '{}'",
                email
            )));
        }
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());
        Ok(SessionUser {
            id: None,
            name,
            email: email.to_string(),
            company: None,
            role: None,
        })
    }

    /// The whole list is written once per command
    async fn apply(&self, records: &[ProcessRecord], _changes: &ChangeSet) -> Result<()> {
        self.save_all(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ridec_core::RecordBook;
    use tempfile::tempdir;

    fn backend(dir: &std::path::Path) -> LocalBackend {
        LocalBackend::new(LocalStore::new(dir))
    }

    #[tokio::test]
    async fn test_missing_and_empty_list_mean_no_data() {
        let temp_dir = tempdir().unwrap();
        let backend = backend(temp_dir.path());
        assert!(backend.list_records().await.unwrap().is_empty());

        std::fs::write(temp_dir.path().join("ridecs.json"), "[]").unwrap();
        assert!(backend.list_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_saving_empty_list_removes_key() {
        let temp_dir = tempdir().unwrap();
        let backend = backend(temp_dir.path());
        let record = ProcessRecord::new_template("Compras", Utc::now());

        backend.create_record(&record).await.unwrap();
        assert!(temp_dir.path().join("ridecs.json").exists());

        backend
            .delete_record(&record.id, RecordKind::Template)
            .await
            .unwrap();
        assert!(!temp_dir.path().join("ridecs.json").exists());
        assert!(backend.store().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_record_fails() {
        let temp_dir = tempdir().unwrap();
        let backend = backend(temp_dir.path());
        let record = ProcessRecord::new_template("Compras", Utc::now());
        assert!(matches!(
            backend.update_record(&record).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_apply_writes_whole_list() {
        let temp_dir = tempdir().unwrap();
        let backend = backend(temp_dir.path());
        let a = ProcessRecord::new_template("A", Utc::now());
        let b = ProcessRecord::new_template("B", Utc::now());
        let book = RecordBook::new(vec![a.clone(), b]);

        crate::apply_changes(&backend, &book, &ChangeSet::created(a.id.clone()))
            .await
            .unwrap();
        assert_eq!(backend.list_records().await.unwrap().len(), 2);
        assert_eq!(backend.get_record(&a.id).await.unwrap().unwrap().title, "A");
    }

    #[tokio::test]
    async fn test_lookup_user_derives_name() {
        let temp_dir = tempdir().unwrap();
        let user = backend(temp_dir.path())
            .lookup_user("ana@empresa.com", None)
            .await
            .unwrap();
        assert_eq!(user.name, "ana");
        assert!(
            backend(temp_dir.path())
                .lookup_user("not-an-email", None)
                .await
                .is_err()
        );
    }
}
