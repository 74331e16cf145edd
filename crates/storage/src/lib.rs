//! bizflow-storage: the collaborators the view model is written against.
//!
//! - [`RecordStorage`]: list/create/update/delete against the backing store.
//! - [`ChangeFeed`]: owner-scoped push notifications of INSERT/UPDATE/DELETE.
//! - [`Session`]: who the current owner is, if anyone.
//!
//! [`MemoryBackend`] implements both storage traits in process and is what
//! the CLI and the test suites run against. [`conformance`] holds a
//! backend-agnostic suite any implementation can run.

pub mod conformance;
mod error;
mod memory;
mod session;
mod traits;

pub use error::StorageError;
pub use memory::MemoryBackend;
pub use session::{Session, StaticSession};
pub use traits::{ChangeFeed, RecordStorage, Subscription, SubscriptionId};
