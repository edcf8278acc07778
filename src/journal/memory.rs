//! In-memory journal
//!
//! Keeps frames in a shared vector instead of files. Clones share the same
//! backing, so dropping one store and starting another over a clone behaves
//! like a process restart against the same disk. Unsynced frames are kept
//! too: there is no page cache to lose.

use std::sync::{Arc, Mutex, MutexGuard};

use super::errors::{JournalError, JournalResult};
use super::log::{DurableLog, JournalLoad};
use super::record::{FrameKind, JournalFrame};
use super::replay::{LiveSet, Replay};

#[derive(Default)]
struct Backing {
    frames: Vec<JournalFrame>,
    fail_next_append: bool,
}

/// Durable log held in memory.
#[derive(Clone, Default)]
pub struct MemoryJournal {
    backing: Arc<Mutex<Backing>>,
    live: Arc<Mutex<Option<LiveSet>>>,
    pending_load: Option<JournalLoad>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle over the same frames with its own lifecycle, as a restarted
    /// process would see them.
    pub fn reopen(&self) -> Self {
        Self {
            backing: Arc::clone(&self.backing),
            live: Arc::new(Mutex::new(None)),
            pending_load: None,
        }
    }

    /// Number of frames ever appended.
    pub fn frame_count(&self) -> usize {
        self.backing().map(|b| b.frames.len()).unwrap_or(0)
    }

    /// Makes the next append fail with an I/O error, without writing.
    /// Nothing reaches the backing, so later appends go through.
    pub fn fail_next_append(&self) {
        if let Ok(mut backing) = self.backing() {
            backing.fail_next_append = true;
        }
    }

    /// Appends a frame without checking or tracking ids, for seeding
    /// arbitrary journal contents in tests.
    pub fn push_raw(&self, frame: JournalFrame) -> JournalResult<()> {
        self.backing()?.frames.push(frame);
        Ok(())
    }

    fn backing(&self) -> JournalResult<MutexGuard<'_, Backing>> {
        self.backing
            .lock()
            .map_err(|_| JournalError::invalid_state("journal lock poisoned"))
    }

    fn append(&self, frame: JournalFrame) -> JournalResult<()> {
        let mut live_guard = self
            .live
            .lock()
            .map_err(|_| JournalError::invalid_state("journal lock poisoned"))?;
        let live = live_guard.as_mut().ok_or_else(JournalError::not_started)?;
        live.check(&frame)?;

        let mut backing = self.backing()?;
        if backing.fail_next_append {
            backing.fail_next_append = false;
            return Err(JournalError::io_failed(
                format!("injected failure appending record {}", frame.record_id),
                std::io::Error::new(std::io::ErrorKind::Other, "injected"),
            ));
        }
        live.apply(&frame);
        backing.frames.push(frame);
        Ok(())
    }
}

impl DurableLog for MemoryJournal {
    fn start(&mut self) -> JournalResult<()> {
        let mut live = self
            .live
            .lock()
            .map_err(|_| JournalError::invalid_state("journal lock poisoned"))?;
        if live.is_some() {
            return Err(JournalError::invalid_state("journal already started"));
        }

        let mut replay = Replay::new();
        for frame in self.backing()?.frames.iter() {
            replay.apply(frame.clone());
        }
        let (load, live_set) = replay.finish();
        *live = Some(live_set);
        drop(live);

        self.pending_load = Some(load);
        Ok(())
    }

    fn stop(&mut self) -> JournalResult<()> {
        if let Ok(mut live) = self.live.lock() {
            *live = None;
        }
        self.pending_load = None;
        Ok(())
    }

    fn load(&mut self) -> JournalResult<JournalLoad> {
        self.pending_load
            .take()
            .ok_or_else(|| JournalError::invalid_state("journal not started or already loaded"))
    }

    fn append_add(&self, id: u64, user_tag: u8, data: &[u8], _sync: bool) -> JournalResult<()> {
        self.append(JournalFrame::plain(FrameKind::Add, id, user_tag, data.to_vec()))
    }

    fn append_update(&self, id: u64, user_tag: u8, data: &[u8], _sync: bool) -> JournalResult<()> {
        self.append(JournalFrame::plain(FrameKind::Update, id, user_tag, data.to_vec()))
    }

    fn append_delete(&self, id: u64, _sync: bool) -> JournalResult<()> {
        self.append(JournalFrame::plain(FrameKind::Delete, id, 0, Vec::new()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
