//! Reconciles change-feed events into a [`RecordStore`].
//!
//! Reconciliation is per-id and in arrival order:
//!
//! | event  | id present          | id absent |
//! |--------|---------------------|-----------|
//! | INSERT | ignored             | prepended |
//! | UPDATE | replaced in place   | ignored   |
//! | DELETE | removed             | ignored   |
//!
//! There is no reordering and no dedup beyond the INSERT existence check,
//! so applying the echo of a mutation the store already reflects is a
//! no-op.

use std::sync::Arc;

use bizflow_model::{ChangeEvent, DomainRecord, OwnerId, RecordId, RecordKind};
use bizflow_storage::{ChangeFeed, Subscription, SubscriptionId};
use tokio::sync::mpsc::error::TryRecvError;

use crate::error::ViewError;
use crate::store::RecordStore;

/// Whether the subscription can still deliver events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Open,
    /// The feed dropped its side or the adapter was closed. Recovery is a
    /// fresh subscription.
    Closed,
}

/// Apply one event to `store`. Returns whether the store changed.
///
/// Events for another record kind are ignored.
pub fn apply_event<R: DomainRecord>(store: &mut RecordStore<R>, event: ChangeEvent) -> bool {
    if event.kind() != R::KIND {
        return false;
    }
    match event {
        ChangeEvent::Insert(record) => R::from_record(record).is_some_and(|r| store.prepend(r)),
        ChangeEvent::Update(record) => R::from_record(record).is_some_and(|r| store.replace(r)),
        ChangeEvent::Delete(key) => store.remove(&key.id).is_some(),
    }
}

/// Anything a feed can reconcile into: the record store, or a stage board
/// holding the same records partitioned by stage.
pub trait EventSink {
    /// Apply one event. Returns whether anything changed.
    fn apply_event(&mut self, event: ChangeEvent) -> bool;
}

impl<R: DomainRecord> EventSink for RecordStore<R> {
    fn apply_event(&mut self, event: ChangeEvent) -> bool {
        apply_event(self, event)
    }
}

/// One live subscription for an (owner, kind) pair.
///
/// Dropping the adapter unsubscribes in the background when a tokio
/// runtime is available; otherwise the feed notices the dropped receiver
/// on its next publish.
pub struct FeedAdapter<F: ChangeFeed + ?Sized> {
    feed: Arc<F>,
    subscription: Option<Subscription>,
    disconnected: bool,
}

impl<F: ChangeFeed + ?Sized> FeedAdapter<F> {
    pub async fn open(feed: Arc<F>, owner: &OwnerId, kind: RecordKind) -> Result<Self, ViewError> {
        let subscription = feed.subscribe(owner, kind).await?;
        tracing::debug!(subscription = %subscription.id, owner = %owner, kind = %kind, "feed opened");
        Ok(Self::from_subscription(feed, subscription))
    }

    /// Note events for one customer.
    pub async fn open_notes(
        feed: Arc<F>,
        owner: &OwnerId,
        customer_id: &RecordId,
    ) -> Result<Self, ViewError> {
        let subscription = feed.subscribe_notes(owner, customer_id).await?;
        tracing::debug!(subscription = %subscription.id, owner = %owner, customer = %customer_id, "notes feed opened");
        Ok(Self::from_subscription(feed, subscription))
    }

    fn from_subscription(feed: Arc<F>, subscription: Subscription) -> Self {
        Self {
            feed,
            subscription: Some(subscription),
            disconnected: false,
        }
    }

    pub fn id(&self) -> Option<SubscriptionId> {
        self.subscription.as_ref().map(|s| s.id)
    }

    pub fn owner(&self) -> Option<&OwnerId> {
        self.subscription.as_ref().map(|s| &s.owner)
    }

    pub fn status(&self) -> FeedStatus {
        if self.subscription.is_none() || self.disconnected {
            FeedStatus::Closed
        } else {
            FeedStatus::Open
        }
    }

    /// Apply every event already delivered, without waiting.
    pub fn drain<T: EventSink + ?Sized>(&mut self, sink: &mut T) -> FeedStatus {
        let Some(sub) = self.subscription.as_mut() else {
            return FeedStatus::Closed;
        };
        loop {
            match sub.events.try_recv() {
                Ok(event) => {
                    tracing::debug!(subscription = %sub.id, event = event.label(), record = %event.record_id(), "feed event");
                    sink.apply_event(event);
                }
                Err(TryRecvError::Empty) => return FeedStatus::Open,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    return FeedStatus::Closed;
                }
            }
        }
    }

    /// Wait for the next event and apply it.
    pub async fn recv<T: EventSink + ?Sized>(&mut self, sink: &mut T) -> FeedStatus {
        let Some(sub) = self.subscription.as_mut() else {
            return FeedStatus::Closed;
        };
        match sub.events.recv().await {
            Some(event) => {
                tracing::debug!(subscription = %sub.id, event = event.label(), record = %event.record_id(), "feed event");
                sink.apply_event(event);
                FeedStatus::Open
            }
            None => {
                self.disconnected = true;
                FeedStatus::Closed
            }
        }
    }

    /// Unsubscribe. Events not yet drained are discarded.
    pub async fn close(&mut self) -> Result<(), ViewError> {
        let Some(sub) = self.subscription.take() else {
            return Ok(());
        };
        tracing::debug!(subscription = %sub.id, "feed closed");
        self.feed.unsubscribe(sub.id).await?;
        Ok(())
    }
}

impl<F: ChangeFeed + ?Sized> Drop for FeedAdapter<F> {
    fn drop(&mut self) {
        let Some(sub) = self.subscription.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let feed = Arc::clone(&self.feed);
        handle.spawn(async move {
            if let Err(err) = feed.unsubscribe(sub.id).await {
                tracing::debug!(subscription = %sub.id, error = %err, "unsubscribe on drop failed");
            }
        });
    }
}
