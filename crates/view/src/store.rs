//! The in-memory record store a view renders from.

use std::collections::HashSet;

use bizflow_model::{DomainRecord, RecordId};

/// Ordered collection of one record kind for the current owner.
///
/// Invariant: no two records share an id. Every mutation is synchronous
/// and keeps that invariant; there is no way to observe a half-applied
/// change.
#[derive(Debug, Clone)]
pub struct RecordStore<R> {
    records: Vec<R>,
}

impl<R> Default for RecordStore<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R: DomainRecord> RecordStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole contents. Later duplicates of an id are dropped.
    pub fn load(&mut self, records: impl IntoIterator<Item = R>) {
        let mut seen = HashSet::new();
        self.records = records
            .into_iter()
            .filter(|r| seen.insert(r.id().clone()))
            .collect();
    }

    /// Drop everything, e.g. when the owner signs out.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Replace in place if the id is known, else append.
    pub fn upsert(&mut self, record: R) {
        match self.position(record.id()) {
            Some(pos) => self.records[pos] = record,
            None => self.records.push(record),
        }
    }

    /// Insert at the front (newest first). Returns `false` without touching
    /// the store when the id is already present.
    pub fn prepend(&mut self, record: R) -> bool {
        if self.contains(record.id()) {
            return false;
        }
        self.records.insert(0, record);
        true
    }

    /// Replace the record with the same id; returns `false` if it is unknown.
    pub fn replace(&mut self, record: R) -> bool {
        match self.position(record.id()) {
            Some(pos) => {
                self.records[pos] = record;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &RecordId) -> Option<R> {
        self.position(id).map(|pos| self.records.remove(pos))
    }

    /// Remove every listed id; returns how many were present.
    pub fn remove_many(&mut self, ids: &[RecordId]) -> usize {
        let doomed: HashSet<&RecordId> = ids.iter().collect();
        let before = self.records.len();
        self.records.retain(|r| !doomed.contains(r.id()));
        before - self.records.len()
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.position(id).is_some()
    }

    pub fn ids(&self) -> HashSet<RecordId> {
        self.records.iter().map(|r| r.id().clone()).collect()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizflow_model::{Customer, OwnerId, RecordMeta};
    use time::macros::datetime;

    fn customer(id: &str, name: &str) -> Customer {
        Customer {
            meta: RecordMeta {
                id: RecordId::from(id),
                owner_id: OwnerId::from("owner-1"),
                created_at: datetime!(2025-01-01 00:00 UTC),
            },
            name: name.to_string(),
            email: format!("{}@example.com", id),
            tags: vec![],
        }
    }

    fn names(store: &RecordStore<Customer>) -> Vec<&str> {
        store.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn load_replaces_and_dedups() {
        let mut store = RecordStore::new();
        store.upsert(customer("old", "Old"));
        store.load(vec![
            customer("1", "Acme"),
            customer("2", "Nimbus"),
            customer("1", "Acme again"),
        ]);
        assert_eq!(names(&store), vec!["Acme", "Nimbus"]);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut store = RecordStore::new();
        store.load(vec![customer("1", "Acme"), customer("2", "Nimbus")]);
        store.upsert(customer("1", "Acme Industries"));
        store.upsert(customer("3", "BlueBay"));
        assert_eq!(names(&store), vec!["Acme Industries", "Nimbus", "BlueBay"]);
    }

    #[test]
    fn prepend_refuses_known_id() {
        let mut store = RecordStore::new();
        assert!(store.prepend(customer("1", "Acme")));
        assert!(!store.prepend(customer("1", "Duplicate")));
        assert!(store.prepend(customer("2", "Nimbus")));
        assert_eq!(names(&store), vec!["Nimbus", "Acme"]);
    }

    #[test]
    fn remove_many_counts_present_ids() {
        let mut store = RecordStore::new();
        store.load(vec![customer("1", "A"), customer("2", "B"), customer("3", "C")]);
        let removed = store.remove_many(&[RecordId::from("1"), RecordId::from("9")]);
        assert_eq!(removed, 1);
        assert_eq!(names(&store), vec!["B", "C"]);
        assert!(store.remove(&RecordId::from("9")).is_none());
    }
}
