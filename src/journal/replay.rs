//! Frame replay
//!
//! `Replay` folds frames, in log order, into the committed record set plus
//! the transactions still open at the end. `LiveSet` tracks the same thing
//! by id only and is what a running journal consults to accept or refuse
//! appends.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::errors::{JournalError, JournalResult};
use super::log::{JournalLoad, PreparedTransaction, RecordInfo};
use super::record::{FrameKind, JournalFrame};

#[derive(Debug, Default)]
struct OpenTransaction {
    prepared: bool,
    frames: Vec<JournalFrame>,
}

/// Replay accumulator.
#[derive(Debug, Default)]
pub struct Replay {
    live: BTreeMap<u64, RecordInfo>,
    open: BTreeMap<u64, OpenTransaction>,
    max_id: u64,
}

impl Replay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the next frame in log order.
    pub fn apply(&mut self, frame: JournalFrame) {
        self.max_id = self.max_id.max(frame.record_id);
        if frame.kind.is_transactional() {
            self.max_id = self.max_id.max(frame.tx_id);
        }

        match frame.kind {
            FrameKind::Add | FrameKind::Update | FrameKind::Delete => self.apply_committed(frame),
            FrameKind::AddTx | FrameKind::UpdateTx | FrameKind::DeleteTx => {
                self.open.entry(frame.tx_id).or_default().frames.push(frame);
            }
            FrameKind::Prepare => {
                self.open.entry(frame.tx_id).or_default().prepared = true;
            }
            FrameKind::Commit => {
                if let Some(tx) = self.open.remove(&frame.tx_id) {
                    for staged in tx.frames {
                        self.apply_committed(staged);
                    }
                }
            }
            FrameKind::Rollback => {
                self.open.remove(&frame.tx_id);
            }
        }
    }

    fn apply_committed(&mut self, frame: JournalFrame) {
        match frame.kind {
            FrameKind::Add | FrameKind::AddTx => {
                self.live.insert(
                    frame.record_id,
                    RecordInfo {
                        id: frame.record_id,
                        user_tag: frame.user_tag,
                        data: frame.data,
                    },
                );
            }
            FrameKind::Update | FrameKind::UpdateTx => {
                // updates of records no longer live carry nothing to restore
                if let Some(record) = self.live.get_mut(&frame.record_id) {
                    record.user_tag = frame.user_tag;
                    record.data = frame.data;
                }
            }
            FrameKind::Delete | FrameKind::DeleteTx => {
                self.live.remove(&frame.record_id);
            }
            FrameKind::Prepare | FrameKind::Commit | FrameKind::Rollback => {}
        }
    }

    /// Finishes replay, returning the load result and the matching id set.
    pub fn finish(self) -> (JournalLoad, LiveSet) {
        let mut live_set = LiveSet::default();
        live_set.live.extend(self.live.keys().copied());

        let mut prepared = Vec::new();
        let mut failed_transactions = Vec::new();

        for (tx_id, tx) in self.open {
            live_set
                .open
                .insert(tx_id, tx.frames.iter().map(|f| (f.kind, f.record_id)).collect());

            if tx.prepared {
                let mut entry = PreparedTransaction {
                    tx_id,
                    ..Default::default()
                };
                for frame in tx.frames {
                    match frame.kind {
                        FrameKind::DeleteTx => entry.deletes.push(frame.record_id),
                        _ => entry.records.push(RecordInfo {
                            id: frame.record_id,
                            user_tag: frame.user_tag,
                            data: frame.data,
                        }),
                    }
                }
                prepared.push(entry);
            } else {
                failed_transactions.push(tx_id);
                // never prepared, so it can never commit
                live_set.open.remove(&tx_id);
            }
        }

        let load = JournalLoad {
            committed: self.live.into_values().collect(),
            prepared,
            failed_transactions,
            max_id: self.max_id,
        };
        (load, live_set)
    }
}

/// Ids of live records and the staged operations of open transactions.
#[derive(Debug, Default, Clone)]
pub struct LiveSet {
    live: HashSet<u64>,
    open: HashMap<u64, Vec<(FrameKind, u64)>>,
}

impl LiveSet {
    /// Whether record `id` is currently live.
    pub fn contains(&self, id: u64) -> bool {
        self.live.contains(&id)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no record is live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Refuses frames that reference ids in a state the frame cannot apply to.
    pub fn check(&self, frame: &JournalFrame) -> JournalResult<()> {
        let id = frame.record_id;
        match frame.kind {
            FrameKind::Add | FrameKind::AddTx if self.live.contains(&id) => Err(
                JournalError::invalid_state(format!("record {} already exists", id)),
            ),
            FrameKind::Update | FrameKind::Delete | FrameKind::UpdateTx | FrameKind::DeleteTx
                if !self.live.contains(&id) =>
            {
                Err(JournalError::invalid_state(format!(
                    "cannot find add info for record {}",
                    id
                )))
            }
            FrameKind::Commit | FrameKind::Rollback if !self.open.contains_key(&frame.tx_id) => {
                Err(JournalError::invalid_state(format!(
                    "transaction {} is not open",
                    frame.tx_id
                )))
            }
            _ => Ok(()),
        }
    }

    /// Records the effect of a frame that has been written.
    pub fn apply(&mut self, frame: &JournalFrame) {
        let id = frame.record_id;
        match frame.kind {
            FrameKind::Add => {
                self.live.insert(id);
            }
            FrameKind::Delete => {
                self.live.remove(&id);
            }
            FrameKind::Update => {}
            FrameKind::AddTx | FrameKind::UpdateTx | FrameKind::DeleteTx => {
                self.open.entry(frame.tx_id).or_default().push((frame.kind, id));
            }
            FrameKind::Prepare => {
                self.open.entry(frame.tx_id).or_default();
            }
            FrameKind::Commit => {
                for (kind, id) in self.open.remove(&frame.tx_id).unwrap_or_default() {
                    match kind {
                        FrameKind::AddTx => {
                            self.live.insert(id);
                        }
                        FrameKind::DeleteTx => {
                            self.live.remove(&id);
                        }
                        _ => {}
                    }
                }
            }
            FrameKind::Rollback => {
                self.open.remove(&frame.tx_id);
            }
        }
    }
}
