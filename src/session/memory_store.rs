//! Degraded-mode session storage, used only when Redis is explicitly
//! disabled at process start.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::session::{SessionStore, SessionStoreError};

#[derive(Debug)]
struct Entry {
    expires_at: Instant,
}

/// A process-local session table. Lost on restart; only acceptable for a
/// single-instance degraded deployment, never production.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<(Uuid, String), Entry>>,
}

impl MemoryStore {
    /// Build an empty store and log the degraded-mode warning once.
    #[must_use]
    pub fn new() -> Self {
        log::warn!("session store running in degraded in-memory mode: sessions do not survive a restart and are not shared across instances");
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn store_session(&self, user_id: Uuid, session_id: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions.insert(
            (user_id, session_id.to_owned()),
            Entry {
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn validate_session(&self, user_id: Uuid, session_id: &str) -> Result<bool, SessionStoreError> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        let key = (user_id, session_id.to_owned());
        match sessions.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(true),
            Some(_) => {
                sessions.remove(&key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn delete_session(&self, user_id: Uuid, session_id: &str) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions.remove(&(user_id, session_id.to_owned()));
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions.retain(|(uid, _), _| *uid != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_sessions_fail_validation() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .store_session(user_id, "abc", Duration::from_millis(10))
            .await
            .expect("store");

        assert!(store.validate_session(user_id, "abc").await.expect("validate"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!store.validate_session(user_id, "abc").await.expect("validate"));
    }

    #[tokio::test]
    async fn revoke_all_removes_every_session_for_the_user() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        store.store_session(user_id, "a", Duration::from_secs(60)).await.expect("store");
        store.store_session(user_id, "b", Duration::from_secs(60)).await.expect("store");

        store.revoke_all(user_id).await.expect("revoke");

        assert!(!store.validate_session(user_id, "a").await.expect("validate"));
        assert!(!store.validate_session(user_id, "b").await.expect("validate"));
    }
}
