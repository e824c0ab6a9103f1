//! Notification log stored under `ridec_notifications`

use crate::error::Result;
use crate::keys;
use crate::kv::LocalStore;
use ridec_core::Notification;

/// Persisted notification list, oldest first
pub struct NotificationLog<'a> {
    store: &'a LocalStore,
    max_kept: usize,
}

impl<'a> NotificationLog<'a> {
    pub fn new(store: &'a LocalStore, max_kept: usize) -> Self {
        Self { store, max_kept }
    }

    pub async fn list(&self) -> Result<Vec<Notification>> {
        Ok(self
            .store
            .get::<Vec<Notification>>(keys::NOTIFICATIONS)
            .await?
            .unwrap_or_default())
    }

    pub async fn unread_count(&self) -> Result<usize> {
        Ok(self.list().await?.iter().filter(|n| !n.read).count())
    }

    async fn save(&self, notifications: &[Notification]) -> Result<()> {
        if notifications.is_empty() {
            self.store.remove(keys::NOTIFICATIONS).await?;
        } else {
            self.store.set(keys::NOTIFICATIONS, notifications).await?;
        }
        Ok(())
    }

    /// Append notifications, dropping the oldest beyond `max_kept`
    pub async fn push(&self, fresh: Vec<Notification>) -> Result<usize> {
        if fresh.is_empty() {
            return Ok(0);
        }
        let added = fresh.len();
        let mut all = self.list().await?;
        all.extend(fresh);
        if self.max_kept > 0 && all.len() > self.max_kept {
            let excess = all.len() - self.max_kept;
            all.drain(..excess);
        }
        self.save(&all).await?;
        tracing::debug!(added, total = all.len(), "Notifications stored");
        Ok(added)
    }

    /// Mark one notification as read. Accepts an id prefix
    pub async fn mark_read(&self, id: &str) -> Result<bool> {
        let mut all = self.list().await?;
        let Some(n) = all.iter_mut().find(|n| n.id == id || n.id.starts_with(id)) else {
            return Ok(false);
        };
        n.read = true;
        self.save(&all).await?;
        Ok(true)
    }

    pub async fn mark_all_read(&self) -> Result<usize> {
        let mut all = self.list().await?;
        let mut changed = 0;
        for n in all.iter_mut().filter(|n| !n.read) {
            n.read = true;
            changed += 1;
        }
        if changed > 0 {
            self.save(&all).await?;
        }
        Ok(changed)
    }

    pub async fn clear(&self) -> Result<usize> {
        let count = self.list().await?.len();
        self.store.remove(keys::NOTIFICATIONS).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ridec_core::NotificationKind;
    use tempfile::tempdir;

    fn note(title: &str) -> Notification {
        Notification::new(NotificationKind::Info, title, "m", Utc::now())
    }

    #[tokio::test]
    async fn test_push_caps_to_max_kept() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        let log = NotificationLog::new(&store, 2);

        log.push(vec![note("1"), note("2"), note("3")]).await.unwrap();
        let titles: Vec<_> = log.list().await.unwrap().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn test_read_and_clear() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        let log = NotificationLog::new(&store, 10);

        let first = note("1");
        let id = first.id.clone();
        log.push(vec![first, note("2")]).await.unwrap();
        assert_eq!(log.unread_count().await.unwrap(), 2);

        assert!(log.mark_read(&id).await.unwrap());
        assert_eq!(log.unread_count().await.unwrap(), 1);
        assert_eq!(log.mark_all_read().await.unwrap(), 1);
        assert_eq!(log.unread_count().await.unwrap(), 0);

        assert_eq!(log.clear().await.unwrap(), 2);
        assert!(store.get_raw(keys::NOTIFICATIONS).await.unwrap().is_none());
    }
}
