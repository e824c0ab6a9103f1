//! RIDEC persistence
//!
//! Records are stored either in a local key-value directory or in a hosted
//! table backend. Commands work against [`RecordBackend`] and never need to know
//! which one is active.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ridec (CLI)                  │
//! └───────────────┬──────────────────────────┘
//!                 │ ChangeSet
//! ┌───────────────▼──────────────────────────┐
//! │             ridec-store                   │
//! │   trait RecordBackend { ... }             │
//! │   SessionGate · NotificationLog · Prefs   │
//! └───────┬───────────────────┬──────────────┘
//!         │                   │
//! ┌───────▼───────┐   ┌───────▼───────┐
//! │  LocalStore   │   │  hosted REST  │
//! │ <key>.json    │   │  tables       │
//! └───────────────┘   └───────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod hosted;
pub mod keys;
pub mod kv;
pub mod local;
pub mod notifications;
pub mod preferences;
pub mod session;

// Re-exports
pub use backend::{BackendStatus, RecordBackend, apply_changes};
pub use error::{Result, StoreError};
pub use hosted::{HostedBackend, HostedConfig};
pub use kv::LocalStore;
pub use local::LocalBackend;
pub use notifications::NotificationLog;
pub use preferences::Preferences;
pub use session::{ClearReason, Session, SessionCheck, SessionGate, SessionUser};

use ridec_config::Settings;

/// Select the backend for the current settings
pub fn open_backend(settings: &Settings, store: &LocalStore) -> Result<Box<dyn RecordBackend>> {
    if settings.backend.use_hosted() {
        let config = HostedConfig::from_settings(&settings.backend)?;
        tracing::debug!(url = %config.url, "Using hosted backend");
        Ok(Box::new(HostedBackend::new(config)))
    } else {
        tracing::debug!(root = %store.root().display(), "Using local backend");
        Ok(Box::new(LocalBackend::new(store.clone())))
    }
}

/// Remove every key RIDEC owns from the local store. Returns the removed keys
pub async fn reset(store: &LocalStore) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for key in store.keys().await? {
        if keys::is_owned(&key) && store.remove(&key).await? {
            removed.push(key);
        }
    }
    tracing::info!(removed = removed.len(), "Local data reset");
    Ok(removed)
}
