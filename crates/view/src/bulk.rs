//! Bulk edits over the selection: tag add/remove, vocabulary-wide tag
//! rename/delete, and multi-delete.
//!
//! Per-record updates are independent. A failure is recorded against its
//! id in the [`BulkReport`] and the remaining records are still attempted;
//! the store only ever sees post-images the storage accepted.

use std::fmt;

use bizflow_model::{DomainRecord, RecordId, Tagged};
use bizflow_storage::{RecordStorage, StorageError};

use crate::error::ViewError;
use crate::store::RecordStore;
use crate::tags::{fold_tag, has_tag, merge_tags, rename_tag, subtract_tags};

/// Outcome of a batch of per-record updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub succeeded: Vec<RecordId>,
    /// Unknown ids and records the edit would not change.
    pub skipped: Vec<RecordId>,
    pub failed: Vec<(RecordId, StorageError)>,
}

impl BulkReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

impl fmt::Display for BulkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} skipped, {} failed",
            self.succeeded.len(),
            self.skipped.len(),
            self.failed.len()
        )?;
        for (id, err) in &self.failed {
            write!(f, "\n  {}: {}", id, err)?;
        }
        Ok(())
    }
}

/// Dispatches bulk edits through a storage collaborator and applies the
/// accepted post-images to a store.
pub struct BulkEditor<'a, S: ?Sized> {
    storage: &'a S,
}

impl<'a, S: RecordStorage + ?Sized> BulkEditor<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Merge `tags` into every listed record.
    pub async fn add_tags<R: Tagged>(
        &self,
        store: &mut RecordStore<R>,
        ids: &[RecordId],
        tags: &[String],
    ) -> BulkReport {
        self.retag(store, ids.to_vec(), |existing| merge_tags(existing, tags))
            .await
    }

    /// Remove `tags` from every listed record.
    pub async fn remove_tags<R: Tagged>(
        &self,
        store: &mut RecordStore<R>,
        ids: &[RecordId],
        tags: &[String],
    ) -> BulkReport {
        self.retag(store, ids.to_vec(), |existing| subtract_tags(existing, tags))
            .await
    }

    /// Rename `from` to `to` on every record in the store carrying it.
    ///
    /// Not atomic: each record is updated on its own, so a partial failure
    /// leaves some records renamed and some not.
    pub async fn rename_tag<R: Tagged>(
        &self,
        store: &mut RecordStore<R>,
        from: &str,
        to: &str,
    ) -> Result<BulkReport, ViewError> {
        let (f, t) = (from.trim(), to.trim());
        if f.is_empty() || t.is_empty() || fold_tag(f) == fold_tag(t) {
            return Err(ViewError::InvalidTagRename {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let targets = carrying(store, f);
        Ok(self
            .retag(store, targets, |existing| rename_tag(existing, f, t))
            .await)
    }

    /// Remove `tag` from every record in the store carrying it.
    pub async fn delete_tag<R: Tagged>(&self, store: &mut RecordStore<R>, tag: &str) -> BulkReport {
        let targets = carrying(store, tag);
        let doomed = [tag.to_string()];
        self.retag(store, targets, |existing| subtract_tags(existing, &doomed))
            .await
    }

    /// Delete the listed records in one storage call. On failure nothing is
    /// removed locally. Returns how many records left the store.
    pub async fn delete<R: DomainRecord>(
        &self,
        store: &mut RecordStore<R>,
        ids: &[RecordId],
    ) -> Result<usize, ViewError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.storage.delete_many(ids).await?;
        Ok(store.remove_many(ids))
    }

    async fn retag<R, F>(&self, store: &mut RecordStore<R>, ids: Vec<RecordId>, edit: F) -> BulkReport
    where
        R: Tagged,
        F: Fn(&[String]) -> Vec<String>,
    {
        let mut report = BulkReport::default();
        for id in ids {
            let Some(current) = store.get(&id) else {
                report.skipped.push(id);
                continue;
            };
            let next = edit(current.tags());
            if next.as_slice() == current.tags() {
                report.skipped.push(id);
                continue;
            }
            let mut local = current.clone();
            match self.storage.update(&id, R::tags_patch(next.clone())).await {
                Ok(post) => {
                    let accepted = R::from_record(post).unwrap_or_else(|| {
                        local.set_tags(next);
                        local
                    });
                    store.upsert(accepted);
                    report.succeeded.push(id);
                }
                Err(err) => {
                    tracing::warn!(record = %id, error = %err, "tag update failed");
                    report.failed.push((id, err));
                }
            }
        }
        report
    }
}

fn carrying<R: DomainRecord>(store: &RecordStore<R>, tag: &str) -> Vec<RecordId> {
    store
        .iter()
        .filter(|r| has_tag(r.tags(), tag))
        .map(|r| r.id().clone())
        .collect()
}
