//! Session gate
//!
//! The session lives under the `ridec_session` key. Expired, unparseable, and
//! seed/example sessions are cleared on check. This is a data-quality guard,
//! not a security boundary.

use crate::error::{Result, StoreError};
use crate::keys;
use crate::kv::LocalStore;
use chrono::{DateTime, Duration, Utc};
use ridec_config::SessionSettings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens shipped in demos and fixtures
const SEED_TOKENS: &[&str] = &[
    "demo-token",
    "test-token",
    "example-token",
    "sample-token",
    "fake-token",
];

/// E-mail addresses shipped in demos and fixtures
const SEED_EMAILS: &[&str] = &[
    "example@example.com",
    "user@example.com",
    "admin@example.com",
    "demo@demo.com",
    "test@test.com",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// Hosted user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub remember_me: bool,
}

impl Session {
    pub fn new(user: SessionUser, remember_me: bool, now: DateTime<Utc>) -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            user,
            created_at: now,
            remember_me,
        }
    }

    pub fn expires_at(&self, settings: &SessionSettings) -> DateTime<Utc> {
        let lifetime = if self.remember_me {
            Duration::days(settings.remember_days as i64)
        } else {
            Duration::hours(settings.lifetime_hours as i64)
        };
        self.created_at + lifetime
    }

    pub fn is_seed(&self) -> bool {
        is_seed_token(&self.token) || is_seed_email(&self.user.email)
    }
}

pub fn is_seed_token(token: &str) -> bool {
    SEED_TOKENS.contains(&token.trim())
}

pub fn is_seed_email(email: &str) -> bool {
    let email = email.trim().to_ascii_lowercase();
    SEED_EMAILS.contains(&email.as_str())
}

/// Why a stored session was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    Expired,
    Corrupt,
    SeedCredential,
}

impl fmt::Display for ClearReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearReason::Expired => write!(f, "session expired"),
            ClearReason::Corrupt => write!(f, "session data was unreadable"),
            ClearReason::SeedCredential => write!(f, "example credentials are not accepted"),
        }
    }
}

/// Result of a session check
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCheck {
    NoSession,
    Valid(Session),
    Cleared(ClearReason),
}

/// Session gate over the local store
pub struct SessionGate<'a> {
    store: &'a LocalStore,
    settings: SessionSettings,
}

impl<'a> SessionGate<'a> {
    pub fn new(store: &'a LocalStore, settings: SessionSettings) -> Self {
        Self { store, settings }
    }

    #[tracing::instrument(skip(self))]
    pub async fn check(&self, now: DateTime<Utc>) -> Result<SessionCheck> {
        let session = match self.store.get::<Session>(keys::SESSION).await {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(SessionCheck::NoSession),
            Err(StoreError::Corrupt { message, .. }) => {
                tracing::warn!("Clearing unreadable session: {}", message);
                self.store.remove(keys::SESSION).await?;
                return Ok(SessionCheck::Cleared(ClearReason::Corrupt));
            }
            Err(e) => return Err(e),
        };

        let reason = if session.is_seed() {
            Some(ClearReason::SeedCredential)
        } else if now > session.expires_at(&self.settings) {
            Some(ClearReason::Expired)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::info!(email = %session.user.email, %reason, "Session cleared");
                self.store.remove(keys::SESSION).await?;
                Ok(SessionCheck::Cleared(reason))
            }
            None => Ok(SessionCheck::Valid(session)),
        }
    }

    /// Store a new session for an already resolved user
    pub async fn login(
        &self,
        user: SessionUser,
        remember_me: bool,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        if is_seed_email(&user.email) {
            return Err(StoreError::AuthenticationFailed(format!(
                "'{}' is an example address",
                user.email
            )));
        }
        let session = Session::new(user, remember_me, now);
        self.store.set(keys::SESSION, &session).await?;
        tracing::info!(email = %session.user.email, remember_me, "Logged in");
        Ok(session)
    }

    /// Returns whether a session existed
    pub async fn logout(&self) -> Result<bool> {
        self.store.remove(keys::SESSION).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn user(email: &str) -> SessionUser {
        SessionUser {
            id: None,
            name: "Ana".into(),
            email: email.into(),
            company: None,
            role: None,
        }
    }

    #[tokio::test]
    async fn test_no_session() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        let gate = SessionGate::new(&store, SessionSettings::default());
        assert_eq!(gate.check(Utc::now()).await.unwrap(), SessionCheck::NoSession);
    }

    #[tokio::test]
    async fn test_valid_then_expired() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        let gate = SessionGate::new(&store, SessionSettings::default());
        let now = Utc::now();

        gate.login(user("ana@empresa.com"), false, now).await.unwrap();
        assert!(matches!(
            gate.check(now + Duration::hours(23)).await.unwrap(),
            SessionCheck::Valid(_)
        ));
        assert_eq!(
            gate.check(now + Duration::hours(25)).await.unwrap(),
            SessionCheck::Cleared(ClearReason::Expired)
        );
        assert_eq!(gate.check(now).await.unwrap(), SessionCheck::NoSession);
    }

    #[tokio::test]
    async fn test_remember_me_extends_lifetime() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        let gate = SessionGate::new(&store, SessionSettings::default());
        let now = Utc::now();

        gate.login(user("ana@empresa.com"), true, now).await.unwrap();
        assert!(matches!(
            gate.check(now + Duration::days(29)).await.unwrap(),
            SessionCheck::Valid(_)
        ));
        assert_eq!(
            gate.check(now + Duration::days(31)).await.unwrap(),
            SessionCheck::Cleared(ClearReason::Expired)
        );
    }

    #[tokio::test]
    async fn test_corrupt_and_seed_sessions_are_cleared() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        let gate = SessionGate::new(&store, SessionSettings::default());

        std::fs::write(temp_dir.path().join("ridec_session.json"), "not json").unwrap();
        assert_eq!(
            gate.check(Utc::now()).await.unwrap(),
            SessionCheck::Cleared(ClearReason::Corrupt)
        );

        let mut seeded = Session::new(user("ana@empresa.com"), false, Utc::now());
        seeded.token = "demo-token".into();
        store.set(keys::SESSION, &seeded).await.unwrap();
        assert_eq!(
            gate.check(Utc::now()).await.unwrap(),
            SessionCheck::Cleared(ClearReason::SeedCredential)
        );
        assert!(store.get_raw(keys::SESSION).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_example_address() {
        let temp_dir = tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        let gate = SessionGate::new(&store, SessionSettings::default());
        let err = gate
            .login(user("Example@Example.com"), false, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AuthenticationFailed(_)));
        assert!(!gate.logout().await.unwrap());
    }
}
