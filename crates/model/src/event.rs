use serde::{Deserialize, Serialize};

use crate::ids::RecordId;
use crate::record::{Record, RecordKind};

/// Identifying key carried by a DELETE event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub id: RecordId,
}

/// One notification from a change feed.
///
/// INSERT and UPDATE carry the full post-image; DELETE carries only the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeEvent {
    Insert(Record),
    Update(Record),
    Delete(RecordKey),
}

impl ChangeEvent {
    pub fn kind(&self) -> RecordKind {
        match self {
            ChangeEvent::Insert(r) | ChangeEvent::Update(r) => r.kind(),
            ChangeEvent::Delete(key) => key.kind,
        }
    }

    pub fn record_id(&self) -> &RecordId {
        match self {
            ChangeEvent::Insert(r) | ChangeEvent::Update(r) => r.id(),
            ChangeEvent::Delete(key) => &key.id,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeEvent::Insert(_) => "INSERT",
            ChangeEvent::Update(_) => "UPDATE",
            ChangeEvent::Delete(_) => "DELETE",
        }
    }
}
