//! In-process backend implementing both [`RecordStorage`] and [`ChangeFeed`].
//!
//! Every successful mutation is published to the subscribers whose
//! (owner, kind) scope matches the affected record, after the mutation is
//! visible to `list`. Note subscribers may be narrowed further to one
//! customer. Subscribers whose receiver has been dropped are
//! pruned on the next publish.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{mpsc, Mutex};

use bizflow_model::{
    ChangeEvent, NewRecord, OwnerId, Record, RecordId, RecordKey, RecordKind, RecordMeta,
    RecordPatch,
};

use crate::error::StorageError;
use crate::traits::{ChangeFeed, RecordStorage, Subscription, SubscriptionId};

struct Stored {
    seq: u64,
    record: Record,
}

struct Subscriber {
    owner: OwnerId,
    kind: RecordKind,
    customer: Option<RecordId>,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct Faults {
    ids: HashSet<RecordId>,
    lists: bool,
    creates: bool,
}

#[derive(Default)]
struct Inner {
    records: Vec<Stored>,
    next_seq: u64,
    next_sub: u64,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    faults: Faults,
}

impl Inner {
    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|s| s.record.id() == id)
    }

    fn push(&mut self, record: Record) {
        self.next_seq += 1;
        self.records.push(Stored {
            seq: self.next_seq,
            record,
        });
    }

    fn fresh_id(&mut self, kind: RecordKind) -> RecordId {
        let prefix = match kind {
            RecordKind::Customer => "c",
            RecordKind::Lead => "l",
            RecordKind::Task => "t",
            RecordKind::Note => "n",
        };
        loop {
            let candidate = RecordId::new(format!("{}-{}", prefix, self.next_seq + 1));
            if self.position(&candidate).is_none() {
                return candidate;
            }
            self.next_seq += 1;
        }
    }

    fn register(
        &mut self,
        owner: &OwnerId,
        kind: RecordKind,
        customer: Option<RecordId>,
    ) -> Subscription {
        self.next_sub += 1;
        let id = SubscriptionId(self.next_sub);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(
            id,
            Subscriber {
                owner: owner.clone(),
                kind,
                customer: customer.clone(),
                tx,
            },
        );
        tracing::debug!(subscription = %id, owner = %owner, kind = %kind, customer = ?customer, "subscribed");
        Subscription {
            id,
            owner: owner.clone(),
            kind,
            customer,
            events: rx,
        }
    }

    fn check_fault(&self, id: &RecordId) -> Result<(), StorageError> {
        if self.faults.ids.contains(id) {
            return Err(StorageError::Backend(format!(
                "injected failure for record {}",
                id
            )));
        }
        Ok(())
    }

    /// `customer` is the customer of the affected note, if any.
    fn publish(&mut self, owner: &OwnerId, customer: Option<&RecordId>, event: ChangeEvent) {
        let kind = event.kind();
        self.subscribers.retain(|sub_id, sub| {
            if &sub.owner != owner || sub.kind != kind {
                return true;
            }
            if sub.customer.is_some() && sub.customer.as_ref() != customer {
                return true;
            }
            let delivered = sub.tx.send(event.clone()).is_ok();
            if !delivered {
                tracing::debug!(subscription = %sub_id, "dropping subscriber with closed receiver");
            }
            delivered
        });
    }
}

/// In-memory record storage with an attached change feed.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    clock: fn() -> OffsetDateTime,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock: OffsetDateTime::now_utc,
        }
    }

    /// Backend pre-populated with existing records (e.g. from a data file).
    /// Seeding publishes no events.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut inner = Inner::default();
        for record in records {
            match inner.position(record.id()) {
                Some(pos) => inner.records[pos].record = record,
                None => inner.push(record),
            }
        }
        Self {
            inner: Mutex::new(inner),
            clock: OffsetDateTime::now_utc,
        }
    }

    /// Replace the timestamp source used for `created_at` on create.
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Every stored record in insertion order.
    pub async fn snapshot(&self) -> Vec<Record> {
        let inner = self.inner.lock().await;
        inner.records.iter().map(|s| s.record.clone()).collect()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }

    /// Make every update/delete touching `id` fail with a backend error.
    pub async fn fail_on(&self, id: impl Into<RecordId>) {
        self.inner.lock().await.faults.ids.insert(id.into());
    }

    pub async fn fail_lists(&self, on: bool) {
        self.inner.lock().await.faults.lists = on;
    }

    pub async fn fail_creates(&self, on: bool) {
        self.inner.lock().await.faults.creates = on;
    }

    pub async fn clear_faults(&self) {
        self.inner.lock().await.faults = Faults::default();
    }
}

#[async_trait]
impl RecordStorage for MemoryBackend {
    async fn list(&self, owner: &OwnerId, kind: RecordKind) -> Result<Vec<Record>, StorageError> {
        let inner = self.inner.lock().await;
        if inner.faults.lists {
            return Err(StorageError::Backend("injected list failure".to_string()));
        }
        let mut rows: Vec<&Stored> = inner
            .records
            .iter()
            .filter(|s| s.record.owner_id() == owner && s.record.kind() == kind)
            .collect();
        rows.sort_by(|a, b| {
            b.record
                .meta()
                .created_at
                .cmp(&a.record.meta().created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(rows.into_iter().map(|s| s.record.clone()).collect())
    }

    async fn create(&self, owner: &OwnerId, input: NewRecord) -> Result<Record, StorageError> {
        if owner.as_str().trim().is_empty() {
            return Err(StorageError::Unauthorized {
                owner: owner.to_string(),
            });
        }
        let mut inner = self.inner.lock().await;
        if inner.faults.creates {
            return Err(StorageError::Backend("injected create failure".to_string()));
        }
        let meta = RecordMeta {
            id: inner.fresh_id(input.kind()),
            owner_id: owner.clone(),
            created_at: (self.clock)(),
        };
        let record = input.into_record(meta);
        inner.push(record.clone());
        inner.publish(owner, record.customer_id(), ChangeEvent::Insert(record.clone()));
        Ok(record)
    }

    async fn update(&self, id: &RecordId, patch: RecordPatch) -> Result<Record, StorageError> {
        let mut inner = self.inner.lock().await;
        inner.check_fault(id)?;
        let pos = inner.position(id).ok_or_else(|| StorageError::NotFound {
            id: id.to_string(),
        })?;
        let record = &mut inner.records[pos].record;
        record
            .apply_patch(&patch)
            .map_err(|m| StorageError::KindMismatch {
                id: id.to_string(),
                record: m.record,
                patch: m.patch,
            })?;
        let updated = record.clone();
        inner.publish(
            updated.owner_id(),
            updated.customer_id(),
            ChangeEvent::Update(updated.clone()),
        );
        Ok(updated)
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner.check_fault(id)?;
        if let Some(pos) = inner.position(id) {
            let removed = inner.records.remove(pos).record;
            let key = RecordKey {
                kind: removed.kind(),
                id: removed.id().clone(),
            };
            inner.publish(removed.owner_id(), removed.customer_id(), ChangeEvent::Delete(key));
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[RecordId]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        for id in ids {
            inner.check_fault(id)?;
        }
        for id in ids {
            if let Some(pos) = inner.position(id) {
                let removed = inner.records.remove(pos).record;
                let key = RecordKey {
                    kind: removed.kind(),
                    id: removed.id().clone(),
                };
                inner.publish(removed.owner_id(), removed.customer_id(), ChangeEvent::Delete(key));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(
        &self,
        owner: &OwnerId,
        kind: RecordKind,
    ) -> Result<Subscription, StorageError> {
        Ok(self.inner.lock().await.register(owner, kind, None))
    }

    async fn subscribe_notes(
        &self,
        owner: &OwnerId,
        customer_id: &RecordId,
    ) -> Result<Subscription, StorageError> {
        Ok(self
            .inner
            .lock()
            .await
            .register(owner, RecordKind::Note, Some(customer_id.clone())))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        match inner.subscribers.remove(&id) {
            Some(_) => {
                tracing::debug!(subscription = %id, "unsubscribed");
                Ok(())
            }
            None => Err(StorageError::UnknownSubscription(id.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizflow_model::{Customer, CustomerInput, NoteInput, RecordMeta};
    use time::macros::datetime;

    fn customer(id: &str, owner: &str, created: OffsetDateTime) -> Record {
        Record::Customer(Customer {
            meta: RecordMeta {
                id: RecordId::from(id),
                owner_id: OwnerId::from(owner),
                created_at: created,
            },
            name: id.to_uppercase(),
            email: format!("{}@example.com", id),
            tags: vec![],
        })
    }

    #[tokio::test]
    async fn seeded_list_is_newest_first_and_owner_scoped() {
        let backend = MemoryBackend::with_records(vec![
            customer("a", "o1", datetime!(2025-01-01 00:00 UTC)),
            customer("b", "o1", datetime!(2025-02-01 00:00 UTC)),
            customer("c", "o2", datetime!(2025-03-01 00:00 UTC)),
        ]);
        let rows = backend
            .list(&OwnerId::from("o1"), RecordKind::Customer)
            .await
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn generated_ids_skip_seeded_ones() {
        let backend =
            MemoryBackend::with_records(vec![customer("c-2", "o1", datetime!(2025-01-01 00:00 UTC))]);
        let created = backend
            .create(
                &OwnerId::from("o1"),
                NewRecord::Customer(CustomerInput {
                    name: "Nimbus".to_string(),
                    email: "hello@nimbus.ai".to_string(),
                    tags: vec![],
                }),
            )
            .await
            .unwrap();
        assert_ne!(created.id().as_str(), "c-2");
        assert_eq!(backend.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_publish() {
        let backend = MemoryBackend::new();
        let owner = OwnerId::from("o1");
        let sub = backend.subscribe(&owner, RecordKind::Customer).await.unwrap();
        drop(sub);
        assert_eq!(backend.subscriber_count().await, 1);
        backend
            .create(
                &owner,
                NewRecord::Customer(CustomerInput {
                    name: "Acme".to_string(),
                    email: "ops@acme.com".to_string(),
                    tags: vec![],
                }),
            )
            .await
            .unwrap();
        assert_eq!(backend.subscriber_count().await, 0);
    }

    fn note_input(customer: &str, content: &str) -> NewRecord {
        NewRecord::Note(NoteInput {
            customer_id: RecordId::from(customer),
            content: content.to_string(),
        })
    }

    #[tokio::test]
    async fn note_subscription_sees_only_its_customer() {
        let backend = MemoryBackend::new();
        let owner = OwnerId::from("o1");
        let mut sub = backend
            .subscribe_notes(&owner, &RecordId::from("c-1"))
            .await
            .unwrap();
        assert_eq!(sub.kind, RecordKind::Note);

        let other = backend.create(&owner, note_input("c-2", "elsewhere")).await.unwrap();
        let mine = backend.create(&owner, note_input("c-1", "first call")).await.unwrap();
        backend.delete(other.id()).await.unwrap();
        backend.delete(mine.id()).await.unwrap();

        let first = sub.events.try_recv().unwrap();
        assert!(matches!(first, ChangeEvent::Insert(ref r) if r.id() == mine.id()));
        let second = sub.events.try_recv().unwrap();
        assert!(matches!(second, ChangeEvent::Delete(ref k) if &k.id == mine.id()));
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn list_notes_filters_by_customer_newest_first() {
        let backend = MemoryBackend::new();
        let owner = OwnerId::from("o1");
        backend.create(&owner, note_input("c-1", "older")).await.unwrap();
        backend.create(&owner, note_input("c-2", "not mine")).await.unwrap();
        backend.create(&owner, note_input("c-1", "newer")).await.unwrap();

        let notes = backend.list_notes(&owner, &RecordId::from("c-1")).await.unwrap();
        let contents: Vec<&str> = notes.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["newer", "older"]);
        assert!(notes.iter().all(|n| n.meta.id.as_str().starts_with("n-")));
    }

    #[tokio::test]
    async fn delete_many_fault_leaves_everything_in_place() {
        let backend = MemoryBackend::with_records(vec![
            customer("a", "o1", datetime!(2025-01-01 00:00 UTC)),
            customer("b", "o1", datetime!(2025-01-02 00:00 UTC)),
        ]);
        backend.fail_on("b").await;
        let err = backend
            .delete_many(&[RecordId::from("a"), RecordId::from("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
        assert_eq!(backend.snapshot().await.len(), 2);
    }
}
