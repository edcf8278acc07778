//! journalstore - committed object state over an append-only journal
//!
//! A transaction manager persists the committed state of its objects
//! through [`RecoverableStore`]. Everything the store knows is recovered
//! at start-up by replaying the journal.

pub mod cli;
pub mod codec;
pub mod config;
pub mod journal;
pub mod observability;
pub mod store;
pub mod uid;

pub use codec::{RecordCodec, StateCodec};
pub use config::{JournalConfig, StoreConfig};
pub use journal::{DurableLog, FileJournal, MemoryJournal};
pub use store::{ObjectState, RecoverableStore, RecoveryReport, StoreError, StoreResult};
pub use uid::Uid;
