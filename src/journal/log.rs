//! The durable log contract consumed by the store

use super::errors::JournalResult;

/// A committed record as returned by replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    pub id: u64,
    pub user_tag: u8,
    pub data: Vec<u8>,
}

/// A transaction that was prepared but had no outcome logged before the
/// journal was last closed. Its operations are in doubt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreparedTransaction {
    pub tx_id: u64,
    /// Adds and updates staged by the transaction, in log order
    pub records: Vec<RecordInfo>,
    /// Record ids the transaction would delete
    pub deletes: Vec<u64>,
}

/// Everything a journal replay hands back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JournalLoad {
    /// Latest committed state of every live record, ordered by id
    pub committed: Vec<RecordInfo>,
    /// In-doubt transactions
    pub prepared: Vec<PreparedTransaction>,
    /// Transactions that never reached prepare; their operations are dropped
    pub failed_transactions: Vec<u64>,
    /// Highest record or transaction id seen anywhere in the journal
    pub max_id: u64,
}

/// An ordered, crash-recoverable, append-only store of opaque records.
///
/// Record ids are chosen by the caller. Implementations serialize their own
/// I/O, so every append method takes `&self` and may be called from
/// several threads at once.
pub trait DurableLog: Send + Sync {
    /// Opens the journal and runs its own crash-recovery scan.
    fn start(&mut self) -> JournalResult<()>;

    /// Flushes buffered frames and closes the journal.
    fn stop(&mut self) -> JournalResult<()>;

    /// Replays the journal. Valid once per `start`.
    fn load(&mut self) -> JournalResult<JournalLoad>;

    /// Appends the first record for `id`.
    fn append_add(&self, id: u64, user_tag: u8, data: &[u8], sync: bool) -> JournalResult<()>;

    /// Replaces the data of live record `id`.
    fn append_update(&self, id: u64, user_tag: u8, data: &[u8], sync: bool) -> JournalResult<()>;

    /// Deletes live record `id`.
    fn append_delete(&self, id: u64, sync: bool) -> JournalResult<()>;

    /// Human-readable location of the journal, for store naming and logs.
    fn describe(&self) -> String;
}
