use bizflow_model::{RecordId, RecordKind, UnknownStage};
use bizflow_storage::StorageError;

/// Errors surfaced by view-model operations.
///
/// None of these are fatal: each is scoped to the single user action that
/// triggered it, and the store is left as it was before that action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// The persistence or change-feed collaborator rejected the call.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A mutation was attempted with no signed-in owner.
    #[error("no owner is signed in")]
    NoOwner,

    /// Input or patch of another kind than the view holds.
    #[error("expected a {expected} record, got {found}")]
    KindMismatch { expected: RecordKind, found: RecordKind },

    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// A move named a source stage the record is not in.
    #[error("record {id} is not in stage '{stage}'")]
    NotInStage { id: RecordId, stage: String },

    #[error(transparent)]
    UnknownStage(#[from] UnknownStage),

    /// `bizflow.toml` is not valid TOML or has fields of the wrong type.
    #[error("malformed config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("page size must be at least 1")]
    InvalidPageSize,

    #[error("{0}")]
    InvalidOffset(String),

    #[error("note must not be blank")]
    BlankNote,

    #[error("segment name must not be blank")]
    BlankSegmentName,

    #[error("segment not found: {0}")]
    SegmentNotFound(String),

    /// Rename source and target are blank or equal ignoring case.
    #[error("cannot rename tag '{from}' to '{to}'")]
    InvalidTagRename { from: String, to: String },
}
