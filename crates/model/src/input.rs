//! Create inputs and partial update patches.
//!
//! Inputs carry only domain fields: identity (`id`, `owner_id`,
//! `created_at`) is assigned by the persistence layer on create and is
//! immutable afterwards, so patches have no way to express it.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::RecordId;

use crate::record::{Customer, Lead, Note, Record, RecordKind, RecordMeta, Task};
use crate::stage::{LeadStage, Stage, TaskStage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadInput {
    pub name: String,
    #[serde(default)]
    pub amount: Decimal,
    /// Defaults to the first pipeline stage.
    #[serde(default)]
    pub stage: Option<LeadStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub stage: Option<TaskStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInput {
    pub customer_id: RecordId,
    pub content: String,
}

/// Fields for a record that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NewRecord {
    Customer(CustomerInput),
    Lead(LeadInput),
    Task(TaskInput),
    Note(NoteInput),
}

impl NewRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            NewRecord::Customer(_) => RecordKind::Customer,
            NewRecord::Lead(_) => RecordKind::Lead,
            NewRecord::Task(_) => RecordKind::Task,
            NewRecord::Note(_) => RecordKind::Note,
        }
    }

    /// Materialise the record once the backend has assigned identity.
    pub fn into_record(self, meta: RecordMeta) -> Record {
        match self {
            NewRecord::Customer(c) => Record::Customer(Customer {
                meta,
                name: c.name,
                email: c.email,
                tags: c.tags,
            }),
            NewRecord::Lead(l) => Record::Lead(Lead {
                meta,
                name: l.name,
                amount: l.amount,
                stage: l.stage.unwrap_or(LeadStage::INITIAL),
            }),
            NewRecord::Task(t) => Record::Task(Task {
                meta,
                title: t.title,
                project_id: t.project_id,
                stage: t.stage.unwrap_or(TaskStage::INITIAL),
            }),
            NewRecord::Note(n) => Record::Note(Note {
                meta,
                customer_id: n.customer_id,
                content: n.content,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeadPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<LeadStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `Some(None)` detaches the task from its project; JSON `null` maps to it.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<TaskStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A field that is present in the input, even as `null`, becomes `Some`.
/// Absent fields fall back to `default` and stay `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial field update for an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecordPatch {
    Customer(CustomerPatch),
    Lead(LeadPatch),
    Task(TaskPatch),
    Note(NotePatch),
}

impl RecordPatch {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPatch::Customer(_) => RecordKind::Customer,
            RecordPatch::Lead(_) => RecordKind::Lead,
            RecordPatch::Task(_) => RecordKind::Task,
            RecordPatch::Note(_) => RecordKind::Note,
        }
    }
}

/// A patch was applied to a record of a different kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {patch} patch to {record} record")]
pub struct PatchMismatch {
    pub record: RecordKind,
    pub patch: RecordKind,
}
