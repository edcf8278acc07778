//! Segmented file journal
//!
//! # Start-up scan
//!
//! 1. List `<prefix>-<number>.<extension>` segments in number order
//! 2. Read every frame, validating length and checksum
//! 3. A torn or damaged frame at the end of the last segment, with no
//!    intact frame after it, is cut off; anywhere else it is corruption
//! 4. Fold the frames into the committed set and open transactions
//! 5. Reopen the last segment for appending
//!
//! Any other checksum or structural failure halts start-up.
//!
//! # Failed writes
//!
//! Once a write, flush or fsync fails, what reached the file is unknown.
//! The journal refuses every later append with the original error code
//! until it is restarted and the scan has re-read the segment.
//!
//! # Timed flush
//!
//! With `buffer_flushes_per_second` set, a background thread pushes
//! unsynced frames from the write buffer to the file on that period. It
//! does not fsync.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::JournalConfig;
use crate::observability::{log_event_with_fields, Event};

use super::errors::{JournalError, JournalErrorCode, JournalResult};
use super::log::{DurableLog, JournalLoad};
use super::reader::{ReadOutcome, SegmentReader};
use super::record::{FrameKind, JournalFrame};
use super::replay::{LiveSet, Replay};
use super::segment::list_segments;
use super::writer::SegmentWriter;

struct Running {
    writer: SegmentWriter,
    live: LiveSet,
    /// Code and cause of the first write failure
    failed: Option<(JournalErrorCode, String)>,
}

impl Running {
    fn new(writer: SegmentWriter, live: LiveSet) -> Self {
        Self {
            writer,
            live,
            failed: None,
        }
    }

    fn ensure_writable(&self) -> JournalResult<()> {
        match &self.failed {
            Some((code, cause)) => Err(JournalError::writer_failed(*code, cause)),
            None => Ok(()),
        }
    }

    /// Remembers an I/O failure. Errors raised before any byte was written
    /// leave the writer usable.
    fn record_failure(&mut self, err: &JournalError) {
        if self.failed.is_some()
            || !matches!(err.code(), JournalErrorCode::IoFailed | JournalErrorCode::FsyncFailed)
        {
            return;
        }
        let cause = err.to_string();
        let segment = self.writer.path().display().to_string();
        log_event_with_fields(
            Event::JournalWriterFailed,
            &[("segment", segment.as_str()), ("reason", cause.as_str())],
        );
        self.failed = Some((err.code(), cause));
    }

    fn append(&mut self, frame: &JournalFrame, sync: bool) -> JournalResult<()> {
        self.ensure_writable()?;
        self.live.check(frame)?;
        if let Err(err) = self.writer.append(frame, sync) {
            self.record_failure(&err);
            return Err(err);
        }
        self.live.apply(frame);
        Ok(())
    }

    /// Pushes buffered frames to the file without fsync.
    fn flush_buffered(&mut self) {
        if self.failed.is_some() || !self.writer.has_buffered() {
            return;
        }
        if let Err(err) = self.writer.flush(false) {
            self.record_failure(&err);
        }
    }

    /// Drains the buffer and fsyncs, unless the writer already failed.
    fn close(mut self) -> JournalResult<()> {
        self.ensure_writable()?;
        self.writer.flush(true)
    }
}

type Shared = Arc<Mutex<Option<Running>>>;

/// Background thread running the timed buffer flush.
struct Flusher {
    stop_tx: Option<mpsc::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Flusher {
    fn spawn(running: Shared, interval: Duration) -> JournalResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let join = thread::Builder::new()
            .name("journalstore-flush".into())
            .spawn(move || flush_loop(&running, &stop_rx, interval))
            .map_err(|e| JournalError::io_failed("Failed to spawn buffer flush thread", e))?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }

    fn stop(&mut self) {
        // a closed channel wakes the thread
        self.stop_tx.take();
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn flush_loop(running: &Mutex<Option<Running>>, stop_rx: &mpsc::Receiver<()>, interval: Duration) {
    while let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
        let mut guard = running.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(running) => running.flush_buffered(),
            None => break,
        }
    }
}

/// Durable log stored as a directory of append-only segment files.
pub struct FileJournal {
    dir: PathBuf,
    config: JournalConfig,
    running: Shared,
    flusher: Option<Flusher>,
    pending_load: Option<JournalLoad>,
}

impl FileJournal {
    /// Creates a journal over `dir`. Nothing is touched until `start`.
    pub fn new(dir: impl AsRef<Path>, config: JournalConfig) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            config,
            running: Arc::new(Mutex::new(None)),
            flusher: None,
            pending_load: None,
        }
    }

    /// Whether `start` has run and `stop` has not.
    pub fn is_running(&self) -> bool {
        self.lock().map(|r| r.is_some()).unwrap_or(false)
    }

    fn lock(&self) -> JournalResult<MutexGuard<'_, Option<Running>>> {
        self.running
            .lock()
            .map_err(|_| JournalError::invalid_state("journal lock poisoned"))
    }

    /// Replays all segments, cutting off a torn tail in the last one.
    fn scan(&self) -> JournalResult<(Replay, u64)> {
        let segments = list_segments(&self.dir, &self.config.file_prefix, &self.config.file_extension)?;
        let mut replay = Replay::new();
        let last_index = segments.len().saturating_sub(1);

        for (index, (_, path)) in segments.iter().enumerate() {
            let last = index == last_index;
            let mut reader = SegmentReader::open(path)?;
            loop {
                match reader.read_next()? {
                    ReadOutcome::Frame(frame) => replay.apply(frame),
                    ReadOutcome::End => break,
                    ReadOutcome::TornTail { offset } if last && !reader.frame_follows(offset)? => {
                        cut_tail(path, offset, "incomplete frame")?;
                        break;
                    }
                    ReadOutcome::Damaged { offset, reason } if last && !reader.frame_follows(offset)? => {
                        cut_tail(path, offset, &reason)?;
                        break;
                    }
                    ReadOutcome::TornTail { offset } => {
                        return Err(JournalError::corruption_at(
                            &path.display().to_string(),
                            offset,
                            "incomplete frame before the end of the journal",
                        ));
                    }
                    ReadOutcome::Damaged { offset, reason } => {
                        return Err(JournalError::corruption_at(&path.display().to_string(), offset, reason));
                    }
                }
            }
        }

        let current = segments.last().map(|(number, _)| *number).unwrap_or(1);
        Ok((replay, current))
    }

    fn append(&self, frame: JournalFrame, sync: bool) -> JournalResult<()> {
        let mut guard = self.lock()?;
        let running = guard.as_mut().ok_or_else(JournalError::not_started)?;
        running.append(&frame, sync)
    }

    /// Makes the next fsync of the current segment fail after the bytes
    /// were written.
    #[cfg(test)]
    pub(crate) fn fail_next_sync(&self) {
        if let Ok(mut guard) = self.lock() {
            if let Some(running) = guard.as_mut() {
                running.writer.fail_next_sync();
            }
        }
    }

    /// Stages an add of `id` in transaction `tx_id`.
    pub fn append_add_transactional(&self, tx_id: u64, id: u64, user_tag: u8, data: &[u8]) -> JournalResult<()> {
        self.append(
            JournalFrame::transactional(FrameKind::AddTx, tx_id, id, user_tag, data.to_vec()),
            false,
        )
    }

    /// Stages an update of `id` in transaction `tx_id`.
    pub fn append_update_transactional(&self, tx_id: u64, id: u64, user_tag: u8, data: &[u8]) -> JournalResult<()> {
        self.append(
            JournalFrame::transactional(FrameKind::UpdateTx, tx_id, id, user_tag, data.to_vec()),
            false,
        )
    }

    /// Stages a delete of `id` in transaction `tx_id`.
    pub fn append_delete_transactional(&self, tx_id: u64, id: u64) -> JournalResult<()> {
        self.append(
            JournalFrame::transactional(FrameKind::DeleteTx, tx_id, id, 0, Vec::new()),
            false,
        )
    }

    /// Marks transaction `tx_id` prepared. Always synced.
    pub fn append_prepare(&self, tx_id: u64) -> JournalResult<()> {
        self.append(JournalFrame::marker(FrameKind::Prepare, tx_id), true)
    }

    /// Commits transaction `tx_id`, applying its staged operations.
    pub fn append_commit(&self, tx_id: u64, sync: bool) -> JournalResult<()> {
        self.append(JournalFrame::marker(FrameKind::Commit, tx_id), sync)
    }

    /// Rolls back transaction `tx_id`.
    pub fn append_rollback(&self, tx_id: u64, sync: bool) -> JournalResult<()> {
        self.append(JournalFrame::marker(FrameKind::Rollback, tx_id), sync)
    }
}

/// Truncates the last segment at `offset` and reports the cut.
fn cut_tail(path: &Path, offset: u64, reason: &str) -> JournalResult<()> {
    truncate_segment(path, offset)?;
    log_event_with_fields(
        Event::JournalTornTail,
        &[
            ("segment", path.display().to_string().as_str()),
            ("truncated_at", offset.to_string().as_str()),
            ("reason", reason),
        ],
    );
    Ok(())
}

fn truncate_segment(path: &Path, len: u64) -> JournalResult<()> {
    let file = OpenOptions::new().write(true).open(path).map_err(|e| {
        JournalError::io_failed(format!("Failed to open segment for truncation: {}", path.display()), e)
    })?;
    file.set_len(len).map_err(|e| {
        JournalError::io_failed(format!("Failed to truncate segment: {}", path.display()), e)
    })?;
    file.sync_all().map_err(|e| {
        JournalError::fsync_failed(format!("Failed to fsync truncated segment: {}", path.display()), e)
    })
}

impl DurableLog for FileJournal {
    fn start(&mut self) -> JournalResult<()> {
        if self.lock()?.is_some() {
            return Err(JournalError::invalid_state("journal already started"));
        }

        fs::create_dir_all(&self.dir).map_err(|e| {
            JournalError::io_failed(
                format!("Failed to create journal directory: {}", self.dir.display()),
                e,
            )
        })?;

        let (replay, current) = self.scan()?;
        let (load, live) = replay.finish();
        let writer = SegmentWriter::open(&self.dir, &self.config, current)?;

        self.pending_load = Some(load);
        *self.lock()? = Some(Running::new(writer, live));

        let interval = self.config.buffer_flush_interval();
        if let Some(period) = interval {
            self.flusher = Some(Flusher::spawn(Arc::clone(&self.running), period)?);
        }

        let segment = current.to_string();
        let flush_us = interval.map(|d| d.as_micros()).unwrap_or(0).to_string();
        let max_io = self.config.max_io.to_string();
        log_event_with_fields(
            Event::JournalOpened,
            &[
                ("segment", segment.as_str()),
                ("buffer_flush_interval_us", flush_us.as_str()),
                ("max_io", max_io.as_str()),
            ],
        );
        Ok(())
    }

    fn stop(&mut self) -> JournalResult<()> {
        if let Some(mut flusher) = self.flusher.take() {
            flusher.stop();
        }
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.pending_load = None;
        match running {
            Some(running) => running.close(),
            None => Ok(()),
        }
    }

    fn load(&mut self) -> JournalResult<JournalLoad> {
        self.pending_load
            .take()
            .ok_or_else(|| JournalError::invalid_state("journal not started or already loaded"))
    }

    fn append_add(&self, id: u64, user_tag: u8, data: &[u8], sync: bool) -> JournalResult<()> {
        self.append(JournalFrame::plain(FrameKind::Add, id, user_tag, data.to_vec()), sync)
    }

    fn append_update(&self, id: u64, user_tag: u8, data: &[u8], sync: bool) -> JournalResult<()> {
        self.append(JournalFrame::plain(FrameKind::Update, id, user_tag, data.to_vec()), sync)
    }

    fn append_delete(&self, id: u64, sync: bool) -> JournalResult<()> {
        self.append(JournalFrame::plain(FrameKind::Delete, id, 0, Vec::new()), sync)
    }

    fn describe(&self) -> String {
        fs::canonicalize(&self.dir)
            .unwrap_or_else(|_| self.dir.clone())
            .display()
            .to_string()
    }
}
