//! bizflow-view: the collection view model behind every list screen.
//!
//! Data flows one way: the change feed reconciles into a [`RecordStore`],
//! the query engine derives a filtered, sorted, paginated [`Page`] from the
//! store, and the [`Selection`] tracks checked rows across pages. User
//! mutations go through the storage collaborator and are then applied to
//! the store, either directly or by the feed echo; both paths are
//! idempotent.
//!
//! Pipeline and kanban screens partition records by stage with a
//! [`Board`]; stage moves are optimistic and persisted fire-and-forget, and
//! the board follows the feed like the store does. A customer's notes live
//! in a [`NotesScope`] fed by a subscription narrowed to that customer.

pub mod board;
pub mod bulk;
pub mod config;
pub mod csv;
mod error;
pub mod feed;
pub mod notes;
pub mod query;
pub mod scope;
pub mod segment;
pub mod selection;
pub mod store;
pub mod tags;
pub mod view;

pub use board::{Board, LeadTotals, Placement, StageMove, StageTotal};
pub use bulk::{BulkEditor, BulkReport};
pub use config::{BoardConfig, Config, ViewConfig};
pub use error::ViewError;
pub use feed::{EventSink, FeedAdapter, FeedStatus};
pub use notes::NotesScope;
pub use query::{filter, paginate, sort, DateRange, Page, QuerySpec, SortDirection, SortSpec, TagSegment};
pub use scope::OwnerScope;
pub use segment::{Segment, SegmentBook};
pub use selection::Selection;
pub use store::RecordStore;
pub use view::{CollectionView, ViewAction};
