//! Recoverable object store
//!
//! # Start-up
//!
//! 1. Start the journal (it runs its own crash scan)
//! 2. Load committed records and in-doubt transactions
//! 3. Warn about prepared and failed transactions; neither is indexed
//! 4. Seed the id allocator from the highest id in the journal
//! 5. Index every committed record by its decoded uid and type name
//!
//! Payloads stay encoded in the index until they are read.
//!
//! # Writes
//!
//! id resolution -> journal append -> index update, in that order. The
//! index only changes after the journal accepted the record.
//!
//! Writes and removes for one uid must not race each other: the store
//! checks the index, appends, then updates the index without holding a
//! lock across the three steps. Callers serialize per uid.

use std::fs;

use serde::Serialize;

use crate::codec::{RecordCodec, StateCodec};
use crate::config::StoreConfig;
use crate::journal::{DurableLog, FileJournal, JournalError, JournalLoad};
use crate::observability::{
    log_event_with_fields, Event, ObservationScope, StoreMetrics, StoreMetricsSnapshot, STORE_START,
};
use crate::uid::Uid;

use super::errors::{StoreError, StoreResult};
use super::id_allocator::IdAllocator;
use super::type_index::{IndexEntry, TypeIndex};

/// User tag carried by every record the store writes.
pub const COMMITTED_STATE_RECORD: u8 = 0x00;

const STORE_KIND: &str = "RecoverableStore";

/// A fully decoded committed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectState {
    pub uid: Uid,
    pub type_name: String,
    pub state: Vec<u8>,
}

/// What `start` found in the journal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Committed records indexed
    pub records_recovered: usize,
    /// Type names present in the index, sorted
    pub types: Vec<String>,
    /// Highest id in the journal; the next minted id is above it
    pub max_id: u64,
    /// Ids of in-doubt transactions left in the journal
    pub prepared_transactions: Vec<u64>,
    /// Records staged by those transactions
    pub prepared_records: usize,
    /// Transactions discarded because they never reached prepare
    pub failed_transactions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Committed object states, indexed in memory over a durable journal.
///
/// `start` and `stop` take `&mut self`; every other operation takes
/// `&self` and may be called from many threads once the store is running.
pub struct RecoverableStore<L: DurableLog, C: RecordCodec = StateCodec> {
    journal: L,
    codec: C,
    index: TypeIndex,
    ids: IdAllocator,
    metrics: StoreMetrics,
    sync_writes: bool,
    sync_deletes: bool,
    lifecycle: Lifecycle,
}

impl RecoverableStore<FileJournal> {
    /// Builds a store over the file journal described by `config`.
    ///
    /// The store directory is created if missing and canonicalized, so the
    /// store name is stable however the path was spelled.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.store_dir).map_err(|e| {
            StoreError::IoFailure(JournalError::io_failed(
                format!("Failed to create store directory: {}", config.store_dir.display()),
                e,
            ))
        })?;
        let dir = fs::canonicalize(&config.store_dir).map_err(|e| {
            StoreError::IoFailure(JournalError::io_failed(
                format!("Failed to resolve store directory: {}", config.store_dir.display()),
                e,
            ))
        })?;

        let journal = FileJournal::new(dir, config.journal.clone());
        Ok(Self::new(journal, StateCodec, config.sync_writes, config.sync_deletes))
    }
}

impl<L: DurableLog, C: RecordCodec> RecoverableStore<L, C> {
    /// Wraps a journal and codec. Nothing is read until `start`.
    pub fn new(journal: L, codec: C, sync_writes: bool, sync_deletes: bool) -> Self {
        Self {
            journal,
            codec,
            index: TypeIndex::new(),
            ids: IdAllocator::new(),
            metrics: StoreMetrics::new(),
            sync_writes,
            sync_deletes,
            lifecycle: Lifecycle::Created,
        }
    }

    /// Rebuilds the index from the journal. Must succeed before any other
    /// operation. A store starts at most once; a failed start leaves it
    /// stopped.
    pub fn start(&mut self) -> StoreResult<RecoveryReport> {
        if self.lifecycle != Lifecycle::Created {
            return Err(StoreError::AlreadyStarted);
        }

        let name = self.store_name();
        let scope = ObservationScope::begin(STORE_START, &[("store", name.as_str())]);

        match self.recover() {
            Ok(report) => {
                self.lifecycle = Lifecycle::Running;
                let records = report.records_recovered.to_string();
                let types = report.types.len().to_string();
                scope.complete(&[("records", records.as_str()), ("types", types.as_str())]);
                Ok(report)
            }
            Err(err) => {
                self.lifecycle = Lifecycle::Stopped;
                if let StoreError::Corruption(cause) = &err {
                    let reason = cause.to_string();
                    log_event_with_fields(Event::JournalCorruption, &[("reason", reason.as_str())]);
                }
                // the journal may be half open; its own error is secondary
                let _ = self.journal.stop();
                scope.fail(&err.to_string());
                Err(err)
            }
        }
    }

    fn recover(&mut self) -> StoreResult<RecoveryReport> {
        self.journal.start()?;
        let JournalLoad {
            committed,
            prepared,
            failed_transactions,
            max_id,
        } = self.journal.load()?;

        let committed_count = committed.len().to_string();
        let prepared_count = prepared.len().to_string();
        log_event_with_fields(
            Event::JournalLoaded,
            &[
                ("committed", committed_count.as_str()),
                ("prepared", prepared_count.as_str()),
            ],
        );

        let prepared_transactions: Vec<u64> = prepared.iter().map(|tx| tx.tx_id).collect();
        let prepared_records: usize = prepared.iter().map(|tx| tx.records.len() + tx.deletes.len()).sum();
        if !prepared.is_empty() {
            let ids = join_ids(&prepared_transactions);
            let records = prepared_records.to_string();
            log_event_with_fields(
                Event::PreparedRecordsPresent,
                &[("transactions", ids.as_str()), ("records", records.as_str())],
            );
        }
        if !failed_transactions.is_empty() {
            let ids = join_ids(&failed_transactions);
            log_event_with_fields(Event::FailedTransactionsDiscarded, &[("transactions", ids.as_str())]);
        }

        self.ids.seed(max_id);

        let records_recovered = committed.len();
        for record in committed {
            let (uid, type_name) = {
                let prefix = self.codec.decode_prefix(&record.data)?;
                (prefix.uid, prefix.type_name)
            };
            self.index.insert(
                uid,
                &type_name,
                IndexEntry {
                    id: record.id,
                    payload: record.data,
                },
            );
        }
        self.metrics.add_records_recovered(records_recovered as u64);

        let mut types = self.index.known_types();
        types.sort();

        let records = records_recovered.to_string();
        let max = max_id.to_string();
        log_event_with_fields(
            Event::RecoveryComplete,
            &[("records", records.as_str()), ("max_id", max.as_str())],
        );

        Ok(RecoveryReport {
            records_recovered,
            types,
            max_id,
            prepared_transactions,
            prepared_records,
            failed_transactions: failed_transactions.len(),
        })
    }

    /// Flushes and closes the journal. Every later call fails with
    /// `NotRunning`.
    pub fn stop(&mut self) -> StoreResult<()> {
        self.ensure_running()?;
        self.lifecycle = Lifecycle::Stopped;
        self.journal.stop()?;

        let name = self.store_name();
        log_event_with_fields(Event::StoreStopComplete, &[("store", name.as_str())]);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    fn ensure_running(&self) -> StoreResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(StoreError::NotRunning)
        }
    }

    /// Persists `state` as the committed state of `uid` under `type_name`.
    ///
    /// Appends an update when the pair is already indexed and an add
    /// otherwise. Concurrent writes or removes for the same pair are not
    /// serialized here: callers must keep a single writer per uid.
    pub fn write_committed(&self, uid: &Uid, type_name: &str, state: &[u8]) -> StoreResult<()> {
        self.ensure_running()?;

        let payload = self.codec.encode(uid, type_name, state)?;
        let id = self.ids.resolve(&self.index, uid, type_name)?;

        if self.index.contains(uid, type_name) {
            self.journal
                .append_update(id, COMMITTED_STATE_RECORD, &payload, self.sync_writes)?;
            self.metrics.increment_updates();
        } else {
            self.journal
                .append_add(id, COMMITTED_STATE_RECORD, &payload, self.sync_writes)?;
            self.metrics.increment_adds();
        }

        self.index.insert(*uid, type_name, IndexEntry { id, payload });
        Ok(())
    }

    /// Removes the committed state of `uid` under `type_name`.
    ///
    /// Returns `Ok(false)` when the journal refuses the delete because it
    /// holds no live record for the id. The index entry is dropped either way.
    pub fn remove_committed(&self, uid: &Uid, type_name: &str) -> StoreResult<bool> {
        self.ensure_running()?;

        let id = self.ids.resolve(&self.index, uid, type_name)?;
        self.index.remove(uid, type_name);

        match self.journal.append_delete(id, self.sync_deletes) {
            Ok(()) => {
                self.metrics.increment_removes();
                Ok(true)
            }
            Err(err) if err.is_invalid_state() => {
                self.metrics.increment_soft_remove_failures();
                let uid = uid.to_string();
                let id = id.to_string();
                let reason = err.to_string();
                log_event_with_fields(
                    Event::RemoveInvalidState,
                    &[
                        ("uid", uid.as_str()),
                        ("type_name", type_name),
                        ("record_id", id.as_str()),
                        ("reason", reason.as_str()),
                    ],
                );
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The committed state of `uid` under `type_name`, decoded in full.
    pub fn read_committed(&self, uid: &Uid, type_name: &str) -> StoreResult<Option<ObjectState>> {
        self.ensure_running()?;
        self.metrics.increment_reads();

        let Some(entry) = self.index.get(uid, type_name) else {
            self.metrics.increment_read_misses();
            return Ok(None);
        };

        let (uid, type_name, state) = self.codec.decode(&entry.payload)?;
        Ok(Some(ObjectState { uid, type_name, state }))
    }

    pub fn contains(&self, uid: &Uid, type_name: &str) -> StoreResult<bool> {
        self.ensure_running()?;
        Ok(self.index.contains(uid, type_name))
    }

    /// Every type name seen since start. Unordered.
    pub fn known_types(&self) -> StoreResult<Vec<String>> {
        self.ensure_running()?;
        Ok(self.index.known_types())
    }

    /// Uids with committed state under `type_name`. Unordered.
    pub fn identities_for_type(&self, type_name: &str) -> StoreResult<Vec<Uid>> {
        self.ensure_running()?;
        Ok(self.index.identities_for_type(type_name))
    }

    /// The record id the store uses for the pair, minting one if the pair
    /// is not indexed. Fails with `IdsExhausted` once `u64::MAX` is taken.
    pub fn get_id(&self, uid: &Uid, type_name: &str) -> StoreResult<u64> {
        self.ensure_running()?;
        self.ids.resolve(&self.index, uid, type_name)
    }

    /// `RecoverableStore:<journal location>`
    pub fn store_name(&self) -> String {
        format!("{}:{}", STORE_KIND, self.journal.describe())
    }

    pub fn metrics(&self) -> StoreMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The underlying journal.
    pub fn journal(&self) -> &L {
        &self.journal
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
}
