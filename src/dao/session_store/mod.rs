#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::{models::SessionEntity, storage::StorageResult};

/// Whole-record persistence for sessions, keyed by join code.
///
/// Backends offer no partial updates, locking or compare-and-swap; reads may be stale. Callers
/// that need durable multi-writer updates go through the optimistic update engine.
pub trait SessionStore: Send + Sync {
    /// Load the session stored under `code`.
    fn get(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Replace (or create) the session stored under `code`.
    fn put(&self, code: &str, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the underlying connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
