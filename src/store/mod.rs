//! The recoverable store
//!
//! An in-memory index of committed object states that can always be
//! rebuilt from the journal. The index has no persisted form.

mod errors;
mod id_allocator;
mod recoverable;
mod type_index;

pub use errors::{StoreError, StoreResult};
pub use id_allocator::IdAllocator;
pub use recoverable::{ObjectState, RecoverableStore, RecoveryReport, COMMITTED_STATE_RECORD};
pub use type_index::{IndexEntry, TypeIndex};
