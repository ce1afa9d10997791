//! Process-local session store.
//!
//! Used for single-instance deployments and tests. An optional read latency can be injected: the
//! record is copied *before* the delay, so a concurrent writer can land in between and the reader
//! ends up holding a stale snapshot, which is exactly the hazard the update engine guards against.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::time::sleep;

use crate::dao::{models::SessionEntity, session_store::SessionStore, storage::StorageResult};

/// DashMap-backed [`SessionStore`].
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<String, SessionEntity>>,
    read_delay: Option<Duration>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose reads complete `delay` after the snapshot was taken.
    pub fn with_read_delay(delay: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            read_delay: Some(delay),
        }
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no session.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let snapshot = self.sessions.get(code).map(|entry| entry.value().clone());
        let delay = self.read_delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            Ok(snapshot)
        })
    }

    fn put(&self, code: &str, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.sessions.insert(code.to_string(), session);
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
