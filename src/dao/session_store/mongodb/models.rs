use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::SessionEntity;

/// Session stored under its join code as `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    pub code_key: String,
    #[serde(flatten)]
    pub session: SessionEntity,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(session: SessionEntity) -> Self {
        Self {
            code_key: session.code.clone(),
            session,
        }
    }
}

pub fn code_filter(code: &str) -> Document {
    doc! { "_id": code }
}
