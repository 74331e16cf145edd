//! Workflow stages for pipeline and kanban boards.
//!
//! A stage set is a closed, ordered enum. Records carry exactly one current
//! stage as a plain field; the board that partitions them lives in
//! `bizflow-view`. Any stage may follow any other: there is no transition
//! table, only "the target is a member of the pipeline".

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::input::RecordPatch;
use crate::record::DomainRecord;

/// A name that does not belong to the pipeline it was parsed against.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage '{name}' (expected one of: {expected})")]
pub struct UnknownStage {
    pub name: String,
    pub expected: String,
}

/// An ordered set of named stages.
pub trait Stage:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Every stage, in pipeline order.
    const ALL: &'static [Self];

    /// Stage assigned to newly created records.
    const INITIAL: Self;

    fn as_str(self) -> &'static str;

    /// Terminal by convention only; nothing prevents leaving a terminal stage.
    fn is_terminal(self) -> bool {
        false
    }

    /// Zero-based position in the pipeline.
    fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|s| *s == self)
            .unwrap_or(Self::ALL.len())
    }

    /// Parse a stage name, case-insensitively.
    fn parse(name: &str) -> Result<Self, UnknownStage> {
        let wanted = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownStage {
                name: name.to_string(),
                expected: Self::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// A record kind that sits on a board.
pub trait Staged: DomainRecord {
    type Stage: Stage;

    fn stage(&self) -> Self::Stage;

    fn set_stage(&mut self, stage: Self::Stage);

    /// Partial patch that persists only the stage field.
    fn stage_patch(stage: Self::Stage) -> RecordPatch;
}

// ── Leads pipeline ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStage {
    New,
    Qualified,
    Proposal,
    Won,
    Lost,
}

impl LeadStage {
    /// Stages whose amounts count toward the open pipeline total.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            LeadStage::New | LeadStage::Qualified | LeadStage::Proposal
        )
    }
}

impl Stage for LeadStage {
    const ALL: &'static [Self] = &[
        LeadStage::New,
        LeadStage::Qualified,
        LeadStage::Proposal,
        LeadStage::Won,
        LeadStage::Lost,
    ];
    const INITIAL: Self = LeadStage::New;

    fn as_str(self) -> &'static str {
        match self {
            LeadStage::New => "new",
            LeadStage::Qualified => "qualified",
            LeadStage::Proposal => "proposal",
            LeadStage::Won => "won",
            LeadStage::Lost => "lost",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, LeadStage::Won | LeadStage::Lost)
    }
}

impl fmt::Display for LeadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Task board ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStage {
    Todo,
    Doing,
    Done,
}

impl Stage for TaskStage {
    const ALL: &'static [Self] = &[TaskStage::Todo, TaskStage::Doing, TaskStage::Done];
    const INITIAL: Self = TaskStage::Todo;

    fn as_str(self) -> &'static str {
        match self {
            TaskStage::Todo => "todo",
            TaskStage::Doing => "doing",
            TaskStage::Done => "done",
        }
    }

    fn is_terminal(self) -> bool {
        self == TaskStage::Done
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
