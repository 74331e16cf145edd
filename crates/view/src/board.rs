//! Stage transition controller for kanban and pipeline screens.
//!
//! A [`Board`] holds one ordered partition per stage of the record's
//! pipeline. Every record sits in exactly one partition, the one matching
//! its own `stage` field. Moves are applied locally first and then
//! persisted; a persistence failure is logged and the local move stands.
//!
//! A board reconciles change-feed events with the same per-id rules as the
//! record store, so a [`FeedAdapter`](crate::feed::FeedAdapter) can drain
//! into it directly. A remote stage change moves the card.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bizflow_model::{ChangeEvent, DomainRecord, Lead, LeadStage, RecordId, Stage, Staged};
use bizflow_storage::RecordStorage;

use crate::bulk::BulkReport;
use crate::error::ViewError;
use crate::feed::EventSink;

/// Where a record lands in its destination partition after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Tail of the partition (task boards).
    #[default]
    Append,
    /// Head of the partition (leads pipeline).
    Prepend,
}

/// A completed local move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMove<S> {
    pub id: RecordId,
    pub from: S,
    pub to: S,
}

impl<S: Stage> fmt::Display for StageMove<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.id, self.from, self.to)
    }
}

#[derive(Debug, Clone)]
pub struct Board<R: Staged> {
    partitions: Vec<Vec<R>>,
    placement: Placement,
}

impl<R: Staged> Board<R> {
    /// Partition `records` by stage, keeping their relative order.
    pub fn new(records: impl IntoIterator<Item = R>, placement: Placement) -> Self {
        let mut partitions: Vec<Vec<R>> = R::Stage::ALL.iter().map(|_| Vec::new()).collect();
        for record in records {
            let idx = record.stage().position();
            partitions[idx].push(record);
        }
        Self {
            partitions,
            placement,
        }
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn partition(&self, stage: R::Stage) -> &[R] {
        &self.partitions[stage.position()]
    }

    /// `(stage, records)` pairs in pipeline order.
    pub fn columns(&self) -> impl Iterator<Item = (R::Stage, &[R])> {
        R::Stage::ALL
            .iter()
            .copied()
            .zip(self.partitions.iter().map(Vec::as_slice))
    }

    /// All records, stage by stage.
    pub fn records(&self) -> impl Iterator<Item = &R> {
        self.partitions.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(Vec::is_empty)
    }

    pub fn stage_of(&self, id: &RecordId) -> Option<R::Stage> {
        self.locate(id).map(|(stage, _)| stage)
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.locate(id)
            .map(|(stage, pos)| &self.partitions[stage.position()][pos])
    }

    /// New records go to the head of their own stage. An existing record
    /// with the same id is replaced.
    pub fn add(&mut self, record: R) {
        self.remove(record.id());
        let idx = record.stage().position();
        self.partitions[idx].insert(0, record);
    }

    pub fn remove(&mut self, id: &RecordId) -> Option<R> {
        let (stage, pos) = self.locate(id)?;
        Some(self.partitions[stage.position()].remove(pos))
    }

    /// Move locally without persisting.
    ///
    /// `Ok(None)` when `from == to`. Fails with `NotInStage` when the record
    /// is not currently in `from`; the board is then unchanged.
    pub fn apply_move(
        &mut self,
        id: &RecordId,
        from: R::Stage,
        to: R::Stage,
    ) -> Result<Option<StageMove<R::Stage>>, ViewError> {
        if from == to {
            return Ok(None);
        }
        let source = &mut self.partitions[from.position()];
        let pos = source
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| ViewError::NotInStage {
                id: id.clone(),
                stage: from.as_str().to_string(),
            })?;
        let mut record = source.remove(pos);
        record.set_stage(to);
        self.place(record);
        tracing::debug!(record = %id, from = %from, to = %to, "stage move");
        Ok(Some(StageMove {
            id: id.clone(),
            from,
            to,
        }))
    }

    /// Move `id` from `from` to `to`, then persist the new stage.
    pub async fn move_record<S: RecordStorage + ?Sized>(
        &mut self,
        storage: &S,
        id: &RecordId,
        from: R::Stage,
        to: R::Stage,
    ) -> Result<Option<StageMove<R::Stage>>, ViewError> {
        let Some(moved) = self.apply_move(id, from, to)? else {
            return Ok(None);
        };
        if let Err(err) = storage.update(id, R::stage_patch(to)).await {
            tracing::warn!(record = %id, stage = %to, error = %err, "stage change not persisted");
        }
        Ok(Some(moved))
    }

    /// [`Board::move_record`] with stage names, as carried by a drag payload.
    pub async fn move_by_name<S: RecordStorage + ?Sized>(
        &mut self,
        storage: &S,
        id: &RecordId,
        from: &str,
        to: &str,
    ) -> Result<Option<StageMove<R::Stage>>, ViewError> {
        let from = R::Stage::parse(from)?;
        let to = R::Stage::parse(to)?;
        self.move_record(storage, id, from, to).await
    }

    /// Delete every record in `stage`, one storage call per record.
    /// Records whose delete fails stay on the board.
    pub async fn clear_stage<S: RecordStorage + ?Sized>(
        &mut self,
        storage: &S,
        stage: R::Stage,
    ) -> BulkReport {
        let ids: Vec<RecordId> = self
            .partition(stage)
            .iter()
            .map(|r| r.id().clone())
            .collect();
        let mut report = BulkReport::default();
        for id in ids {
            match storage.delete(&id).await {
                Ok(()) => {
                    self.remove(&id);
                    report.succeeded.push(id);
                }
                Err(err) => {
                    tracing::warn!(record = %id, stage = %stage, error = %err, "delete failed");
                    report.failed.push((id, err));
                }
            }
        }
        report
    }

    /// Put a record that is on no partition into its own stage, honouring
    /// the board's placement.
    fn place(&mut self, record: R) {
        let dest = &mut self.partitions[record.stage().position()];
        match self.placement {
            Placement::Append => dest.push(record),
            Placement::Prepend => dest.insert(0, record),
        }
    }

    fn locate(&self, id: &RecordId) -> Option<(R::Stage, usize)> {
        R::Stage::ALL
            .iter()
            .zip(&self.partitions)
            .find_map(|(stage, part)| {
                part.iter().position(|r| r.id() == id).map(|pos| (*stage, pos))
            })
    }
}

impl<R: Staged> EventSink for Board<R> {
    /// INSERT adds an unknown record at the head of its stage. UPDATE
    /// replaces in place, or moves the card like a local move when the
    /// stage changed. DELETE removes. Unknown ids are ignored for UPDATE and
    /// DELETE, as are events for other kinds.
    fn apply_event(&mut self, event: ChangeEvent) -> bool {
        if event.kind() != R::KIND {
            return false;
        }
        match event {
            ChangeEvent::Insert(record) => {
                let Some(record) = R::from_record(record) else {
                    return false;
                };
                if self.locate(record.id()).is_some() {
                    return false;
                }
                self.add(record);
                true
            }
            ChangeEvent::Update(record) => {
                let Some(record) = R::from_record(record) else {
                    return false;
                };
                let Some((stage, pos)) = self.locate(record.id()) else {
                    return false;
                };
                let column = &mut self.partitions[stage.position()];
                if record.stage() == stage {
                    column[pos] = record;
                } else {
                    column.remove(pos);
                    tracing::debug!(record = %record.id(), from = %stage, to = %record.stage(), "remote stage change");
                    self.place(record);
                }
                true
            }
            ChangeEvent::Delete(key) => self.remove(&key.id).is_some(),
        }
    }
}

// ── Lead totals ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTotal {
    pub stage: LeadStage,
    pub count: usize,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadTotals {
    pub stages: Vec<StageTotal>,
    /// Sum over every stage.
    pub total: Decimal,
    /// Sum over new, qualified and proposal.
    pub open_total: Decimal,
}

impl Board<Lead> {
    pub fn totals(&self) -> LeadTotals {
        let stages: Vec<StageTotal> = self
            .columns()
            .map(|(stage, leads)| StageTotal {
                stage,
                count: leads.len(),
                amount: leads.iter().map(|l| l.amount).sum(),
            })
            .collect();
        let total = stages.iter().map(|s| s.amount).sum();
        let open_total = stages
            .iter()
            .filter(|s| s.stage.is_open())
            .map(|s| s.amount)
            .sum();
        LeadTotals {
            stages,
            total,
            open_total,
        }
    }
}
