use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::{OwnerId, RecordId};
use crate::input::{CustomerPatch, LeadPatch, NotePatch, PatchMismatch, RecordPatch, TaskPatch};
use crate::stage::{LeadStage, Stage, Staged, TaskStage};

/// The record types a store instance can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Customer,
    Lead,
    Task,
    Note,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Customer,
        RecordKind::Lead,
        RecordKind::Task,
        RecordKind::Note,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Customer => "customer",
            RecordKind::Lead => "lead",
            RecordKind::Task => "task",
            RecordKind::Note => "note",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for RecordKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" | "customers" => Ok(RecordKind::Customer),
            "lead" | "leads" => Ok(RecordKind::Lead),
            "task" | "tasks" => Ok(RecordKind::Task),
            "note" | "notes" => Ok(RecordKind::Note),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Fields every record carries regardless of kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub id: RecordId,
    pub owner_id: OwnerId,
    /// Immutable after creation.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub amount: Decimal,
    pub stage: LeadStage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub stage: TaskStage,
}

/// A free-text note attached to one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub customer_id: RecordId,
    pub content: String,
}

/// Tagged union over all record kinds, used wherever a collaborator is not
/// specialised to one kind (storage, change events, data files).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    Customer(Customer),
    Lead(Lead),
    Task(Task),
    Note(Note),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Customer(_) => RecordKind::Customer,
            Record::Lead(_) => RecordKind::Lead,
            Record::Task(_) => RecordKind::Task,
            Record::Note(_) => RecordKind::Note,
        }
    }

    pub fn meta(&self) -> &RecordMeta {
        match self {
            Record::Customer(c) => &c.meta,
            Record::Lead(l) => &l.meta,
            Record::Task(t) => &t.meta,
            Record::Note(n) => &n.meta,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.meta().id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.meta().owner_id
    }

    /// The customer a note belongs to. `None` for every other kind.
    pub fn customer_id(&self) -> Option<&RecordId> {
        match self {
            Record::Note(n) => Some(&n.customer_id),
            _ => None,
        }
    }

    /// Apply a partial patch in place. The patch kind must match the record
    /// kind; identity fields are never touched.
    pub fn apply_patch(&mut self, patch: &RecordPatch) -> Result<(), PatchMismatch> {
        match (self, patch) {
            (Record::Customer(c), RecordPatch::Customer(p)) => {
                c.apply(p);
                Ok(())
            }
            (Record::Lead(l), RecordPatch::Lead(p)) => {
                l.apply(p);
                Ok(())
            }
            (Record::Task(t), RecordPatch::Task(p)) => {
                t.apply(p);
                Ok(())
            }
            (Record::Note(n), RecordPatch::Note(p)) => {
                if let Some(content) = &p.content {
                    n.content = content.clone();
                }
                Ok(())
            }
            (record, patch) => Err(PatchMismatch {
                record: record.kind(),
                patch: patch.kind(),
            }),
        }
    }
}

// ── Sorting ──────────────────────────────────────────────────────────────────

/// Attributes a collection can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    /// Customer/lead name or task title, case-insensitive.
    Name,
    Email,
    Amount,
    /// Position in the record's pipeline.
    Stage,
    TagCount,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created_at" | "created" | "date" => Ok(SortKey::CreatedAt),
            "name" | "title" => Ok(SortKey::Name),
            "email" => Ok(SortKey::Email),
            "amount" => Ok(SortKey::Amount),
            "stage" => Ok(SortKey::Stage),
            "tag_count" | "tags" => Ok(SortKey::TagCount),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

/// A comparable projection of one record attribute.
///
/// `Missing` sorts before every present value so records lacking the
/// attribute group together at the start of an ascending sort.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Missing,
    Rank(usize),
    Number(Decimal),
    Text(String),
    Time(OffsetDateTime),
}

// ── DomainRecord ─────────────────────────────────────────────────────────────

/// Behaviour the view model needs from a concrete record kind.
pub trait DomainRecord: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: RecordKind;

    fn meta(&self) -> &RecordMeta;

    fn id(&self) -> &RecordId {
        &self.meta().id
    }

    fn created_at(&self) -> OffsetDateTime {
        self.meta().created_at
    }

    /// Fields free-text search looks at.
    fn search_fields(&self) -> Vec<&str>;

    fn tags(&self) -> &[String] {
        &[]
    }

    fn sort_value(&self, key: SortKey) -> SortValue;

    fn into_record(self) -> Record;

    /// `None` when the record is of another kind.
    fn from_record(record: Record) -> Option<Self>;
}

/// A record kind whose tag set can be edited in bulk.
pub trait Tagged: DomainRecord {
    fn set_tags(&mut self, tags: Vec<String>);

    fn tags_patch(tags: Vec<String>) -> RecordPatch;
}

impl DomainRecord for Customer {
    const KIND: RecordKind = RecordKind::Customer;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.email.as_str()];
        fields.extend(self.tags.iter().map(|t| t.as_str()));
        fields
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn sort_value(&self, key: SortKey) -> SortValue {
        match key {
            SortKey::CreatedAt => SortValue::Time(self.meta.created_at),
            SortKey::Name => SortValue::Text(self.name.to_lowercase()),
            SortKey::Email => SortValue::Text(self.email.to_lowercase()),
            SortKey::TagCount => SortValue::Rank(self.tags.len()),
            SortKey::Amount | SortKey::Stage => SortValue::Missing,
        }
    }

    fn into_record(self) -> Record {
        Record::Customer(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Customer(c) => Some(c),
            _ => None,
        }
    }
}

impl Tagged for Customer {
    fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    fn tags_patch(tags: Vec<String>) -> RecordPatch {
        RecordPatch::Customer(CustomerPatch {
            tags: Some(tags),
            ..CustomerPatch::default()
        })
    }
}

impl Customer {
    fn apply(&mut self, patch: &CustomerPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
    }
}

impl DomainRecord for Lead {
    const KIND: RecordKind = RecordKind::Lead;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.stage.as_str()]
    }

    fn sort_value(&self, key: SortKey) -> SortValue {
        match key {
            SortKey::CreatedAt => SortValue::Time(self.meta.created_at),
            SortKey::Name => SortValue::Text(self.name.to_lowercase()),
            SortKey::Amount => SortValue::Number(self.amount),
            SortKey::Stage => SortValue::Rank(self.stage.position()),
            SortKey::TagCount => SortValue::Rank(0),
            SortKey::Email => SortValue::Missing,
        }
    }

    fn into_record(self) -> Record {
        Record::Lead(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Lead(l) => Some(l),
            _ => None,
        }
    }
}

impl Staged for Lead {
    type Stage = LeadStage;

    fn stage(&self) -> LeadStage {
        self.stage
    }

    fn set_stage(&mut self, stage: LeadStage) {
        self.stage = stage;
    }

    fn stage_patch(stage: LeadStage) -> RecordPatch {
        RecordPatch::Lead(LeadPatch {
            stage: Some(stage),
            ..LeadPatch::default()
        })
    }
}

impl Lead {
    fn apply(&mut self, patch: &LeadPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(stage) = patch.stage {
            self.stage = stage;
        }
    }
}

impl DomainRecord for Task {
    const KIND: RecordKind = RecordKind::Task;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.stage.as_str()]
    }

    fn sort_value(&self, key: SortKey) -> SortValue {
        match key {
            SortKey::CreatedAt => SortValue::Time(self.meta.created_at),
            SortKey::Name => SortValue::Text(self.title.to_lowercase()),
            SortKey::Stage => SortValue::Rank(self.stage.position()),
            SortKey::TagCount => SortValue::Rank(0),
            SortKey::Email | SortKey::Amount => SortValue::Missing,
        }
    }

    fn into_record(self) -> Record {
        Record::Task(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Task(t) => Some(t),
            _ => None,
        }
    }
}

impl Staged for Task {
    type Stage = TaskStage;

    fn stage(&self) -> TaskStage {
        self.stage
    }

    fn set_stage(&mut self, stage: TaskStage) {
        self.stage = stage;
    }

    fn stage_patch(stage: TaskStage) -> RecordPatch {
        RecordPatch::Task(TaskPatch {
            stage: Some(stage),
            ..TaskPatch::default()
        })
    }
}

impl Task {
    fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(project_id) = &patch.project_id {
            self.project_id = project_id.clone();
        }
        if let Some(stage) = patch.stage {
            self.stage = stage;
        }
    }
}

impl DomainRecord for Note {
    const KIND: RecordKind = RecordKind::Note;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.content.as_str()]
    }

    fn sort_value(&self, key: SortKey) -> SortValue {
        match key {
            SortKey::CreatedAt => SortValue::Time(self.meta.created_at),
            SortKey::Name => SortValue::Text(self.content.to_lowercase()),
            SortKey::TagCount => SortValue::Rank(0),
            SortKey::Email | SortKey::Amount | SortKey::Stage => SortValue::Missing,
        }
    }

    fn into_record(self) -> Record {
        Record::Note(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Note(n) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn meta(id: &str) -> RecordMeta {
        RecordMeta {
            id: RecordId::from(id),
            owner_id: OwnerId::from("owner-1"),
            created_at: datetime!(2025-03-04 10:15:00 UTC),
        }
    }

    #[test]
    fn record_json_carries_type_tag_and_flat_meta() {
        let record = Record::Customer(Customer {
            meta: meta("c-1"),
            name: "Acme Industries".to_string(),
            email: "ops@acme.com".to_string(),
            tags: vec!["Enterprise".to_string()],
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "customer");
        assert_eq!(json["id"], "c-1");
        assert_eq!(json["owner_id"], "owner-1");
        assert_eq!(json["created_at"], "2025-03-04T10:15:00Z");
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn lead_amount_reads_from_string() {
        let json = serde_json::json!({
            "type": "lead",
            "id": "l-1",
            "owner_id": "owner-1",
            "created_at": "2025-03-04T10:15:00Z",
            "name": "Nimbus renewal",
            "amount": "1250.50",
            "stage": "proposal"
        });
        let record: Record = serde_json::from_value(json).unwrap();
        let lead = Lead::from_record(record).unwrap();
        assert_eq!(lead.amount, Decimal::new(125050, 2));
        assert_eq!(lead.stage, LeadStage::Proposal);
    }

    #[test]
    fn patch_kind_must_match() {
        let mut record = Record::Task(Task {
            meta: meta("t-1"),
            title: "Homepage UI".to_string(),
            project_id: None,
            stage: TaskStage::Todo,
        });
        let err = record
            .apply_patch(&RecordPatch::Customer(CustomerPatch::default()))
            .unwrap_err();
        assert_eq!(err.record, RecordKind::Task);
        assert_eq!(err.patch, RecordKind::Customer);

        record.apply_patch(&Task::stage_patch(TaskStage::Doing)).unwrap();
        match record {
            Record::Task(t) => {
                assert_eq!(t.stage, TaskStage::Doing);
                assert_eq!(t.title, "Homepage UI");
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn customer_search_fields_include_tags() {
        let c = Customer {
            meta: meta("c-1"),
            name: "Acme".to_string(),
            email: "ops@acme.com".to_string(),
            tags: vec!["vip".to_string(), "Retail".to_string()],
        };
        assert_eq!(c.search_fields(), vec!["Acme", "ops@acme.com", "vip", "Retail"]);
    }

    #[test]
    fn missing_sorts_first() {
        assert!(SortValue::Missing < SortValue::Rank(0));
        assert!(SortValue::Text("a".into()) < SortValue::Text("b".into()));
    }

    #[test]
    fn kind_parses_singular_and_plural() {
        assert_eq!("Leads".parse::<RecordKind>(), Ok(RecordKind::Lead));
        assert_eq!("task".parse::<RecordKind>(), Ok(RecordKind::Task));
        assert!("invoice".parse::<RecordKind>().is_err());
        assert_eq!("notes".parse::<RecordKind>(), Ok(RecordKind::Note));
    }

    #[test]
    fn note_carries_its_customer() {
        let json = serde_json::json!({
            "type": "note",
            "id": "n-1",
            "owner_id": "owner-1",
            "created_at": "2025-03-04T10:15:00Z",
            "customer_id": "c-1",
            "content": "Called about renewal"
        });
        let mut record: Record = serde_json::from_value(json).unwrap();
        assert_eq!(record.kind(), RecordKind::Note);
        assert_eq!(record.customer_id().map(RecordId::as_str), Some("c-1"));

        record
            .apply_patch(&RecordPatch::Note(NotePatch {
                content: Some("Renewal signed".to_string()),
            }))
            .unwrap();
        let note = Note::from_record(record).unwrap();
        assert_eq!(note.content, "Renewal signed");
        assert_eq!(note.customer_id.as_str(), "c-1");
    }
}
