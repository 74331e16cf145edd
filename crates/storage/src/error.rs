use bizflow_model::RecordKind;

/// All errors that can be returned by a storage or change-feed implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No record with the given id.
    #[error("record not found: {id}")]
    NotFound { id: String },

    /// The patch targets a different record kind than the stored record.
    #[error("record {id} is a {record}, cannot apply {patch} patch")]
    KindMismatch {
        id: String,
        record: RecordKind,
        patch: RecordKind,
    },

    /// The caller is not allowed to act for this owner.
    #[error("not authorized for owner '{owner}'")]
    Unauthorized { owner: String },

    /// The subscription handle is not (or no longer) registered.
    #[error("unknown subscription: {0}")]
    UnknownSubscription(u64),

    /// The change feed is gone; no further events will arrive.
    #[error("change feed closed")]
    FeedClosed,

    /// A backend-specific error (transport, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
