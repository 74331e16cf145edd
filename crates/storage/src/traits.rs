use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use bizflow_model::{
    ChangeEvent, DomainRecord, NewRecord, Note, OwnerId, Record, RecordId, RecordKind, RecordPatch,
};

use crate::error::StorageError;

/// The persistence collaborator.
///
/// Every call is attempted once; retries are the caller's business and the
/// view model never makes any. Implementations must be `Send + Sync +
/// 'static` so a single backend can be shared by every view.
#[async_trait]
pub trait RecordStorage: Send + Sync + 'static {
    /// All records of `kind` belonging to `owner`, newest first.
    async fn list(&self, owner: &OwnerId, kind: RecordKind) -> Result<Vec<Record>, StorageError>;

    /// Notes on one customer, newest first.
    async fn list_notes(
        &self,
        owner: &OwnerId,
        customer_id: &RecordId,
    ) -> Result<Vec<Note>, StorageError> {
        let rows = self.list(owner, RecordKind::Note).await?;
        Ok(rows
            .into_iter()
            .filter_map(Note::from_record)
            .filter(|n| &n.customer_id == customer_id)
            .collect())
    }

    /// Create a record for `owner`. The backend assigns `id` and `created_at`.
    async fn create(&self, owner: &OwnerId, input: NewRecord) -> Result<Record, StorageError>;

    /// Apply a partial patch and return the post-image.
    ///
    /// Returns `Err(StorageError::NotFound)` for an unknown id and
    /// `Err(StorageError::KindMismatch)` when the patch kind differs from the
    /// record kind.
    async fn update(&self, id: &RecordId, patch: RecordPatch) -> Result<Record, StorageError>;

    /// Delete one record. Deleting an id that does not exist is not an error.
    async fn delete(&self, id: &RecordId) -> Result<(), StorageError>;

    /// Delete several records in one call.
    async fn delete_many(&self, ids: &[RecordId]) -> Result<(), StorageError>;
}

/// Handle identifying one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A subscription scoped to one (owner, kind) pair.
///
/// Events arrive on `events` in emission order. When the feed side drops its
/// sender the channel yields `None`.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner: OwnerId,
    pub kind: RecordKind,
    /// Set on note subscriptions narrowed to one customer.
    pub customer: Option<RecordId>,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// The change-feed collaborator.
///
/// Reconnect semantics, if any, belong to the implementation. Consumers
/// recover only by subscribing again.
#[async_trait]
pub trait ChangeFeed: Send + Sync + 'static {
    async fn subscribe(
        &self,
        owner: &OwnerId,
        kind: RecordKind,
    ) -> Result<Subscription, StorageError>;

    /// Note events for one customer only. DELETE events are filtered by the
    /// customer of the removed note.
    async fn subscribe_notes(
        &self,
        owner: &OwnerId,
        customer_id: &RecordId,
    ) -> Result<Subscription, StorageError>;

    /// Stop delivering events for `id`.
    ///
    /// Returns `Err(StorageError::UnknownSubscription)` when the handle is
    /// not registered.
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), StorageError>;
}
