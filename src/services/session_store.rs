// src/services/session_store.rs
use crate::config::SheetConfig;
use crate::errors::ContactSheetError;
use crate::services::selection::SelectionState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// One user's review session: config fixed at creation plus the mutable selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub config: SheetConfig,
    pub selection: SelectionState,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &Uuid) -> Result<Session, ContactSheetError>;
    async fn save(&self, session: &Session) -> Result<(), ContactSheetError>;
    async fn delete(&self, id: &Uuid) -> Result<(), ContactSheetError>;
}

struct StoredSession {
    session: Session,
    expires_at: Instant,
}

/// In-process sessions with the same sliding TTL as the Redis store: every
/// save pushes the expiry out, expired entries are swept on save.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, StoredSession>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &Uuid) -> Result<Session, ContactSheetError> {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .get(id)
            .filter(|stored| stored.expires_at > now)
            .map(|stored| stored.session.clone())
            .ok_or_else(|| ContactSheetError::SessionNotFound(id.to_string()))
    }

    async fn save(&self, session: &Session) -> Result<(), ContactSheetError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, stored| stored.expires_at > now);
        if sessions.len() < before {
            debug!("Evicted {} expired sessions", before - sessions.len());
        }

        sessions.insert(
            session.id,
            StoredSession {
                session: session.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<(), ContactSheetError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ContactSheetError::SessionNotFound(id.to_string()))
    }
}

/// Sessions as JSON blobs with a TTL, so abandoned reviews expire on their own.
pub struct RedisSessionStore {
    client: Client,
    ttl_secs: usize,
}

impl RedisSessionStore {
    pub async fn new(redis_url: &str, ttl_secs: usize) -> Result<Self, ContactSheetError> {
        let client =
            Client::open(redis_url).map_err(|e| ContactSheetError::SessionStore(e.to_string()))?;

        // Test connection
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| ContactSheetError::SessionStore(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| ContactSheetError::SessionStore(e.to_string()))?;

        Ok(Self { client, ttl_secs })
    }

    fn key(id: &Uuid) -> String {
        format!("contact-sheets:session:{}", id)
    }

    async fn connection(&self) -> Result<redis::aio::Connection, ContactSheetError> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| ContactSheetError::SessionStore(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: &Uuid) -> Result<Session, ContactSheetError> {
        let mut conn = self.connection().await?;

        let value: Option<String> = conn
            .get(Self::key(id))
            .await
            .map_err(|e| ContactSheetError::SessionStore(e.to_string()))?;
        let value = value.ok_or_else(|| ContactSheetError::SessionNotFound(id.to_string()))?;

        serde_json::from_str(&value).map_err(|e| ContactSheetError::Serialization(e.to_string()))
    }

    async fn save(&self, session: &Session) -> Result<(), ContactSheetError> {
        let mut conn = self.connection().await?;

        let value = serde_json::to_string(session)
            .map_err(|e| ContactSheetError::Serialization(e.to_string()))?;

        conn.set_ex::<_, _, ()>(Self::key(&session.id), value, self.ttl_secs)
            .await
            .map_err(|e| ContactSheetError::SessionStore(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<(), ContactSheetError> {
        let mut conn = self.connection().await?;

        let removed: usize = conn
            .del(Self::key(id))
            .await
            .map_err(|e| ContactSheetError::SessionStore(e.to_string()))?;

        if removed == 0 {
            return Err(ContactSheetError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }
}
