//! The notes panel on a customer's detail screen.
//!
//! A [`NotesScope`] holds one customer's notes, newest first, in a
//! [`RecordStore`] kept live by a feed narrowed to that customer. Local
//! adds and deletes are applied straight away; their feed echoes are
//! no-ops under the store's per-id rules.

use std::sync::Arc;

use bizflow_model::{DomainRecord, NewRecord, Note, NoteInput, OwnerId, RecordId};
use bizflow_storage::{ChangeFeed, RecordStorage};

use crate::error::ViewError;
use crate::feed::{FeedAdapter, FeedStatus};
use crate::store::RecordStore;

pub struct NotesScope<S: RecordStorage + ChangeFeed + ?Sized> {
    storage: Arc<S>,
    owner: OwnerId,
    customer_id: RecordId,
    store: RecordStore<Note>,
    feed: FeedAdapter<S>,
}

impl<S: RecordStorage + ChangeFeed + ?Sized> NotesScope<S> {
    /// Subscribe to the customer's notes, then load them.
    pub async fn open(
        storage: Arc<S>,
        owner: OwnerId,
        customer_id: RecordId,
    ) -> Result<Self, ViewError> {
        let mut feed = FeedAdapter::open_notes(Arc::clone(&storage), &owner, &customer_id).await?;
        let notes = match storage.list_notes(&owner, &customer_id).await {
            Ok(notes) => notes,
            Err(err) => {
                if let Err(close_err) = feed.close().await {
                    tracing::warn!(error = %close_err, "closing notes subscription after failed load");
                }
                return Err(err.into());
            }
        };
        let mut store = RecordStore::new();
        store.load(notes);
        tracing::debug!(customer = %customer_id, count = store.len(), "notes loaded");
        Ok(Self {
            storage,
            owner,
            customer_id,
            store,
            feed,
        })
    }

    pub fn customer_id(&self) -> &RecordId {
        &self.customer_id
    }

    /// Newest first.
    pub fn notes(&self) -> &[Note] {
        self.store.records()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.feed.status()
    }

    /// Apply every pending feed event.
    pub fn sync(&mut self) -> FeedStatus {
        self.feed.drain(&mut self.store)
    }

    /// Wait for one feed event and apply it.
    pub async fn next_event(&mut self) -> FeedStatus {
        self.feed.recv(&mut self.store).await
    }

    /// Persist a note with trimmed `content` and prepend it.
    pub async fn add(&mut self, content: &str) -> Result<Note, ViewError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ViewError::BlankNote);
        }
        let input = NewRecord::Note(NoteInput {
            customer_id: self.customer_id.clone(),
            content: content.to_string(),
        });
        let created = self.storage.create(&self.owner, input).await?;
        let found = created.kind();
        let note = Note::from_record(created).ok_or(ViewError::KindMismatch {
            expected: Note::KIND,
            found,
        })?;
        self.store.prepend(note.clone());
        Ok(note)
    }

    /// Persist the delete, then drop the note locally.
    pub async fn delete(&mut self, id: &RecordId) -> Result<(), ViewError> {
        self.storage.delete(id).await?;
        self.store.remove(id);
        Ok(())
    }

    /// Unsubscribe. The loaded notes stay readable.
    pub async fn close(&mut self) -> Result<(), ViewError> {
        self.feed.close().await
    }
}
