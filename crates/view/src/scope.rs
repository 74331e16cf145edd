//! Ties a [`CollectionView`] to the signed-in owner.
//!
//! The store only ever holds the current owner's records. Switching owner
//! discards the store and selection and closes the old subscription before
//! anything is fetched for the new owner. The new subscription opens before
//! the initial list.

use std::sync::Arc;

use bizflow_model::{DomainRecord, NewRecord, OwnerId, RecordId, RecordPatch, Tagged};
use bizflow_storage::{ChangeFeed, RecordStorage, Session};

use crate::bulk::{BulkEditor, BulkReport};
use crate::error::ViewError;
use crate::feed::{FeedAdapter, FeedStatus};
use crate::view::{CollectionView, ViewAction};

pub struct OwnerScope<R, S>
where
    R: DomainRecord,
    S: RecordStorage + ChangeFeed + ?Sized,
{
    storage: Arc<S>,
    owner: Option<OwnerId>,
    view: CollectionView<R>,
    feed: Option<FeedAdapter<S>>,
}

impl<R, S> OwnerScope<R, S>
where
    R: DomainRecord,
    S: RecordStorage + ChangeFeed + ?Sized,
{
    /// A scope with no owner: empty store, no subscription.
    pub fn new(storage: Arc<S>, view: CollectionView<R>) -> Self {
        Self {
            storage,
            owner: None,
            view,
            feed: None,
        }
    }

    pub fn owner(&self) -> Option<&OwnerId> {
        self.owner.as_ref()
    }

    pub fn view(&self) -> &CollectionView<R> {
        &self.view
    }

    pub fn apply(&mut self, action: ViewAction) -> Result<(), ViewError> {
        self.view.apply(action)
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.feed
            .as_ref()
            .map_or(FeedStatus::Closed, FeedAdapter::status)
    }

    /// Follow a session: nothing happens while it is still resolving, and
    /// nothing is reloaded when the owner did not change.
    pub async fn follow<Se: Session + ?Sized>(&mut self, session: &Se) -> Result<(), ViewError> {
        if session.is_loading() {
            return Ok(());
        }
        let owner = session.owner();
        if owner == self.owner {
            return Ok(());
        }
        self.switch_owner(owner).await
    }

    /// Drop everything held for the previous owner, then subscribe and load
    /// for `owner`. A failed load leaves the store empty and no subscription
    /// open.
    ///
    /// The subscription is opened before the snapshot is taken, so a row
    /// committed in between arrives as an INSERT; the INSERT existence check
    /// makes the overlap with the snapshot a no-op.
    pub async fn switch_owner(&mut self, owner: Option<OwnerId>) -> Result<(), ViewError> {
        if let Some(mut feed) = self.feed.take() {
            if let Err(err) = feed.close().await {
                tracing::warn!(error = %err, "closing previous subscription failed");
            }
        }
        self.view.reset();
        self.owner = owner;

        let Some(owner) = self.owner.clone() else {
            return Ok(());
        };
        let mut feed = FeedAdapter::open(Arc::clone(&self.storage), &owner, R::KIND).await?;
        let records = match self.storage.list(&owner, R::KIND).await {
            Ok(records) => records,
            Err(err) => {
                if let Err(close_err) = feed.close().await {
                    tracing::warn!(error = %close_err, "closing subscription after failed load");
                }
                return Err(err.into());
            }
        };
        self.view
            .load(records.into_iter().filter_map(R::from_record));
        tracing::debug!(owner = %owner, kind = %R::KIND, count = self.view.store().len(), "loaded");

        self.feed = Some(feed);
        Ok(())
    }

    /// Apply every pending feed event to the store.
    pub fn sync(&mut self) -> FeedStatus {
        let Some(feed) = self.feed.as_mut() else {
            return FeedStatus::Closed;
        };
        self.view.with_store(|store| feed.drain(store))
    }

    /// Wait for one feed event and apply it.
    pub async fn next_event(&mut self) -> FeedStatus {
        let Some(feed) = self.feed.as_mut() else {
            return FeedStatus::Closed;
        };
        let status = feed.recv(self.view.store_mut()).await;
        self.view.prune();
        status
    }

    /// Persist a new record, then prepend it unless the feed already has.
    pub async fn create(&mut self, input: NewRecord) -> Result<R, ViewError> {
        let owner = self.owner.clone().ok_or(ViewError::NoOwner)?;
        if input.kind() != R::KIND {
            return Err(ViewError::KindMismatch {
                expected: R::KIND,
                found: input.kind(),
            });
        }
        let created = self.storage.create(&owner, input).await?;
        let found = created.kind();
        let record = R::from_record(created).ok_or(ViewError::KindMismatch {
            expected: R::KIND,
            found,
        })?;
        self.view.with_store(|store| store.prepend(record.clone()));
        Ok(record)
    }

    /// Persist a patch, then write the post-image into the store.
    pub async fn update(&mut self, id: &RecordId, patch: RecordPatch) -> Result<R, ViewError> {
        if self.owner.is_none() {
            return Err(ViewError::NoOwner);
        }
        if patch.kind() != R::KIND {
            return Err(ViewError::KindMismatch {
                expected: R::KIND,
                found: patch.kind(),
            });
        }
        let updated = self.storage.update(id, patch).await?;
        let found = updated.kind();
        let record = R::from_record(updated).ok_or(ViewError::KindMismatch {
            expected: R::KIND,
            found,
        })?;
        self.view.with_store(|store| store.upsert(record.clone()));
        Ok(record)
    }

    /// Persist a delete, then drop the record locally.
    pub async fn delete(&mut self, id: &RecordId) -> Result<(), ViewError> {
        if self.owner.is_none() {
            return Err(ViewError::NoOwner);
        }
        self.storage.delete(id).await?;
        self.view.with_store(|store| store.remove(id));
        Ok(())
    }

    /// Delete the selected records, then clear the selection.
    pub async fn delete_selected(&mut self) -> Result<usize, ViewError> {
        if self.owner.is_none() {
            return Err(ViewError::NoOwner);
        }
        let ids = self.view.selection().ids();
        if ids.is_empty() {
            return Ok(0);
        }
        self.storage.delete_many(&ids).await?;
        let removed = self.view.with_store(|store| store.remove_many(&ids));
        self.view.apply(ViewAction::ClearSelection)?;
        Ok(removed)
    }

    /// Merge `tags` into every selected record.
    pub async fn add_tags_to_selection(&mut self, tags: &[String]) -> BulkReport
    where
        R: Tagged,
    {
        let ids = self.view.selection().ids();
        let report = BulkEditor::new(&*self.storage)
            .add_tags(self.view.store_mut(), &ids, tags)
            .await;
        self.view.prune();
        report
    }

    /// Remove `tags` from every selected record.
    pub async fn remove_tags_from_selection(&mut self, tags: &[String]) -> BulkReport
    where
        R: Tagged,
    {
        let ids = self.view.selection().ids();
        let report = BulkEditor::new(&*self.storage)
            .remove_tags(self.view.store_mut(), &ids, tags)
            .await;
        self.view.prune();
        report
    }

    pub async fn rename_tag(&mut self, from: &str, to: &str) -> Result<BulkReport, ViewError>
    where
        R: Tagged,
    {
        BulkEditor::new(&*self.storage)
            .rename_tag(self.view.store_mut(), from, to)
            .await
    }

    pub async fn delete_tag(&mut self, tag: &str) -> BulkReport
    where
        R: Tagged,
    {
        BulkEditor::new(&*self.storage)
            .delete_tag(self.view.store_mut(), tag)
            .await
    }
}
