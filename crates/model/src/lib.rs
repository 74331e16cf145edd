//! bizflow-model: the shared record vocabulary.
//!
//! Every list screen in bizflow (customers, leads, tasks, customer notes)
//! renders from the same typed records defined here. Records are a tagged
//! union over the domain kinds with a shared [`RecordMeta`] base; consumers
//! work either with the union ([`Record`]) at collaborator boundaries or with
//! a concrete kind through the [`DomainRecord`] trait.

pub mod event;
pub mod ids;
pub mod input;
pub mod record;
pub mod stage;

pub use event::{ChangeEvent, RecordKey};
pub use ids::{OwnerId, RecordId};
pub use input::{
    CustomerInput, CustomerPatch, LeadInput, LeadPatch, NewRecord, NoteInput, NotePatch,
    PatchMismatch, RecordPatch, TaskInput, TaskPatch,
};
pub use record::{
    Customer, DomainRecord, Lead, Note, Record, RecordKind, RecordMeta, SortKey, SortValue,
    Tagged, Task, UnknownKind,
};
pub use stage::{LeadStage, Stage, Staged, TaskStage, UnknownStage};
