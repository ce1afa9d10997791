use serde::{Deserialize, Serialize};

use crate::dao::models::SessionEntity;

const SESSION_PREFIX: &str = "session::";

/// CouchDB envelope around a session: document id and revision next to the flattened record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub session: SessionEntity,
}

impl CouchSessionDocument {
    pub fn new(session: SessionEntity, rev: Option<String>) -> Self {
        Self {
            id: session_doc_id(&session.code),
            rev,
            session,
        }
    }
}

/// Only the revision of an existing document, so a put does not decode the whole session.
#[derive(Debug, Deserialize)]
pub struct CouchRevision {
    #[serde(rename = "_rev")]
    pub rev: String,
}

pub fn session_doc_id(code: &str) -> String {
    format!("{SESSION_PREFIX}{code}")
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::state::session::{RoundType, Session};

    #[test]
    fn envelope_flattens_the_session_next_to_couch_fields() {
        let session = Session::new(
            "QRST".into(),
            2,
            vec![RoundType::Survival],
            UNIX_EPOCH + Duration::from_secs(1),
        );
        let doc = CouchSessionDocument::new(session.into(), Some("3-abc".into()));

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "session::QRST");
        assert_eq!(json["_rev"], "3-abc");
        assert_eq!(json["code"], "QRST");
        assert_eq!(json["current_round_idx"], -1);

        let back: CouchSessionDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back.session.code, "QRST");
    }
}
