//! Redis-backed session storage.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

use crate::model::session::SessionRecord;
use crate::session::{SessionStore, SessionStoreError};

/// One key per `(user_id, session_id)`, value a serialized
/// [`SessionRecord`], with Redis's own TTL providing expiry. `revoke_all`
/// finds every live session for a user with a `SCAN MATCH` over its key
/// prefix rather than keeping a separate per-user index to maintain.
#[derive(Debug, Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to `addr` (e.g. `redis://127.0.0.1:6379`), authenticating
    /// with `password` if set.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the address can't be parsed or the initial
    /// connection fails.
    pub async fn connect(addr: &str, password: Option<&str>) -> Result<Self, redis::RedisError> {
        let url = match password {
            Some(password) => format!("redis://:{password}@{}", addr.trim_start_matches("redis://")),
            None => addr.to_owned(),
        };
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }

    fn session_key(user_id: Uuid, session_id: &str) -> String {
        format!("session:{user_id}:{session_id}")
    }

    fn user_sessions_key(user_id: Uuid) -> String {
        format!("session:{user_id}:*")
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn store_session(&self, user_id: Uuid, session_id: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        let record = SessionRecord {
            user_id,
            session_id: session_id.to_owned(),
            created_at: Utc::now(),
            ttl,
        };
        let payload = serde_json::to_string(&record).map_err(|err| SessionStoreError(err.to_string()))?;

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(Self::session_key(user_id, session_id), payload, ttl.as_secs())
            .await
            .map_err(|err| SessionStoreError(err.to_string()))
    }

    async fn validate_session(&self, user_id: Uuid, session_id: &str) -> Result<bool, SessionStoreError> {
        let mut conn = self.connection.clone();
        let payload: Option<String> = conn
            .get(Self::session_key(user_id, session_id))
            .await
            .map_err(|err| SessionStoreError(err.to_string()))?;

        let Some(payload) = payload else {
            return Ok(false);
        };
        let record: SessionRecord = serde_json::from_str(&payload).map_err(|err| SessionStoreError(err.to_string()))?;
        Ok(record.user_id == user_id && record.session_id == session_id)
    }

    async fn delete_session(&self, user_id: Uuid, session_id: &str) -> Result<(), SessionStoreError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(Self::session_key(user_id, session_id))
            .await
            .map_err(|err| SessionStoreError(err.to_string()))
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<(), SessionStoreError> {
        use futures_util::StreamExt;

        let mut conn = self.connection.clone();
        let mut keys = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> = conn
                .scan_match(Self::user_sessions_key(user_id))
                .await
                .map_err(|err| SessionStoreError(err.to_string()))?;
            while let Some(key) = iter.next().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Ok(());
        }

        conn.del::<_, ()>(keys).await.map_err(|err| SessionStoreError(err.to_string()))
    }
}
