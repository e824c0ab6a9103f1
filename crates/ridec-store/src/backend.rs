//! Record backend trait definition

use crate::error::Result;
use crate::session::SessionUser;
use async_trait::async_trait;
use ridec_core::{ChangeSet, ProcessRecord, RecordBook, RecordKind};
use serde::{Deserialize, Serialize};

/// Persistence abstraction for process records
///
/// The local key-value store and the hosted table backend both implement this
/// trait, so commands never need to know which one is active.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Returns the backend name (e.g., "local", "hosted")
    fn name(&self) -> &str;

    /// Check that the backend is reachable and usable
    async fn status(&self) -> Result<BackendStatus>;

    /// Load every record (templates and occurrences)
    async fn list_records(&self) -> Result<Vec<ProcessRecord>>;

    async fn get_record(&self, id: &str) -> Result<Option<ProcessRecord>>;

    async fn create_record(&self, record: &ProcessRecord) -> Result<()>;

    async fn update_record(&self, record: &ProcessRecord) -> Result<()>;

    async fn delete_record(&self, id: &str, kind: RecordKind) -> Result<()>;

    /// Resolve the user behind a login attempt
    async fn lookup_user(&self, email: &str, name: Option<&str>) -> Result<SessionUser>;

    /// Push a change set. `records` is the full in-memory list after the change.
    ///
    /// The default issues one call per changed record.
    async fn apply(&self, records: &[ProcessRecord], changes: &ChangeSet) -> Result<()> {
        for (id, kind) in &changes.deleted {
            self.delete_record(id, *kind).await?;
        }
        for id in &changes.created {
            if let Some(record) = records.iter().find(|r| &r.id == id) {
                self.create_record(record).await?;
            }
        }
        for id in &changes.updated {
            if let Some(record) = records.iter().find(|r| &r.id == id) {
                self.update_record(record).await?;
            }
        }
        Ok(())
    }
}

/// Backend status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStatus {
    pub backend: String,

    /// Whether the backend answered
    pub reachable: bool,

    /// Location or account information if available
    pub detail: Option<String>,

    /// Error message if not reachable
    pub error: Option<String>,
}

impl BackendStatus {
    pub fn ok(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            reachable: true,
            detail: Some(detail.into()),
            error: None,
        }
    }

    pub fn failed(backend: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            reachable: false,
            detail: None,
            error: Some(error.into()),
        }
    }
}

/// Persist the effect of one command on the active backend
#[tracing::instrument(skip_all, fields(backend = backend.name()))]
pub async fn apply_changes(
    backend: &dyn RecordBackend,
    book: &RecordBook,
    changes: &ChangeSet,
) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }
    tracing::debug!(
        created = changes.created.len(),
        updated = changes.updated.len(),
        deleted = changes.deleted.len(),
        "Applying changes"
    );
    backend.apply(book.records(), changes).await.map_err(|e| {
        tracing::error!("Failed to persist changes: {}", e);
        e
    })
}
