use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoSessionDocument, code_filter},
};
use crate::dao::{models::SessionEntity, session_store::SessionStore, storage::StorageResult};

const SESSION_COLLECTION_NAME: &str = "sessions";

/// [`SessionStore`] backed by a MongoDB collection, one document per session.
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "code": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("session_code_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        self.collection()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "code",
                source,
            })?;
        Ok(())
    }

    async fn collection(&self) -> Collection<MongoSessionDocument> {
        self.inner
            .database
            .read()
            .await
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn save_session(&self, code: String, session: SessionEntity) -> MongoResult<()> {
        let mut document = MongoSessionDocument::from(session);
        document.code_key = code.clone();
        self.collection()
            .await
            .replace_one(code_filter(&code), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession { code, source })?;
        Ok(())
    }

    async fn find_session(&self, code: String) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .collection()
            .await
            .find_one(code_filter(&code))
            .await
            .map_err(|source| MongoDaoError::LoadSession { code, source })?;
        Ok(document.map(|doc| doc.session))
    }
}

impl SessionStore for MongoSessionStore {
    fn get(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        let code = code.to_string();
        Box::pin(async move { store.find_session(code).await.map_err(Into::into) })
    }

    fn put(&self, code: &str, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let code = code.to_string();
        Box::pin(async move { store.save_session(code, session).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
