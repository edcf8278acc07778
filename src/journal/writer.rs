//! Segment writer
//!
//! Appends frames to the current segment through a write buffer. A synced
//! append is flushed and fsynced before it returns; an unsynced one may sit
//! in the buffer until the buffer fills, a later synced append, or close.
//! When a frame would push the segment past the configured size, the
//! segment is sealed (flush + fsync) and a new one started.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::JournalConfig;
use crate::observability::{log_event_with_fields, Event};

use super::errors::{JournalError, JournalResult};
use super::record::JournalFrame;
use super::segment::segment_file_name;

/// Appends frames to numbered segment files in one directory.
pub struct SegmentWriter {
    dir: PathBuf,
    config: JournalConfig,
    number: u64,
    path: PathBuf,
    writer: BufWriter<File>,
    /// Bytes in the segment, buffered bytes included
    segment_len: u64,
    #[cfg(test)]
    fail_next_sync: bool,
}

impl SegmentWriter {
    /// Opens segment `number` for appending, creating it if missing.
    pub fn open(dir: &Path, config: &JournalConfig, number: u64) -> JournalResult<Self> {
        let path = dir.join(segment_file_name(&config.file_prefix, number, &config.file_extension));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                JournalError::io_failed(format!("Failed to open segment: {}", path.display()), e)
            })?;
        let segment_len = file
            .metadata()
            .map_err(|e| {
                JournalError::io_failed(format!("Failed to stat segment: {}", path.display()), e)
            })?
            .len();

        Ok(Self {
            dir: dir.to_path_buf(),
            config: config.clone(),
            number,
            path,
            writer: BufWriter::with_capacity(config.buffer_size, file),
            segment_len,
            #[cfg(test)]
            fail_next_sync: false,
        })
    }

    /// Number of the segment currently appended to.
    pub fn segment_number(&self) -> u64 {
        self.number
    }

    /// Path of the segment currently appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes in the current segment.
    pub fn segment_len(&self) -> u64 {
        self.segment_len
    }

    /// Whether unsynced frames are waiting in the write buffer.
    pub fn has_buffered(&self) -> bool {
        !self.writer.buffer().is_empty()
    }

    /// Appends one frame, rolling over first if it would not fit.
    pub fn append(&mut self, frame: &JournalFrame, sync: bool) -> JournalResult<()> {
        let bytes = frame.serialize()?;

        // an oversized frame still goes alone into a fresh segment
        if self.segment_len > 0 && self.segment_len + bytes.len() as u64 > self.config.file_size {
            self.roll_over()?;
        }

        self.writer.write_all(&bytes).map_err(|e| {
            JournalError::io_failed(
                format!(
                    "Failed to write frame for record {} to {}",
                    frame.record_id,
                    self.path.display()
                ),
                e,
            )
        })?;
        self.segment_len += bytes.len() as u64;

        if sync {
            self.flush(true)?;
        }
        Ok(())
    }

    /// Drains the write buffer, then fsyncs if `sync` is set.
    pub fn flush(&mut self, sync: bool) -> JournalResult<()> {
        self.writer.flush().map_err(|e| {
            JournalError::io_failed(format!("Failed to flush {}", self.path.display()), e)
        })?;
        if sync {
            self.sync_data().map_err(|e| {
                JournalError::fsync_failed(format!("fsync failed on {}", self.path.display()), e)
            })?;
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn sync_data(&mut self) -> io::Result<()> {
        self.writer.get_ref().sync_data()
    }

    #[cfg(test)]
    fn sync_data(&mut self) -> io::Result<()> {
        if std::mem::take(&mut self.fail_next_sync) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected fsync failure"));
        }
        self.writer.get_ref().sync_data()
    }

    /// Makes the next fsync fail after the bytes reached the file.
    #[cfg(test)]
    pub(crate) fn fail_next_sync(&mut self) {
        self.fail_next_sync = true;
    }

    fn roll_over(&mut self) -> JournalResult<()> {
        self.flush(true)?;

        let next = self.number + 1;
        let path = self
            .dir
            .join(segment_file_name(&self.config.file_prefix, next, &self.config.file_extension));
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                JournalError::io_failed(format!("Failed to create segment: {}", path.display()), e)
            })?;

        // make the new directory entry durable before writing into it
        let dir_handle = File::open(&self.dir).map_err(|e| {
            JournalError::io_failed(
                format!("Failed to open journal directory for fsync: {}", self.dir.display()),
                e,
            )
        })?;
        dir_handle.sync_all().map_err(|e| {
            JournalError::fsync_failed(
                format!("Failed to fsync journal directory: {}", self.dir.display()),
                e,
            )
        })?;

        let sealed = self.number.to_string();
        let sealed_len = self.segment_len.to_string();
        let opened = next.to_string();
        self.writer = BufWriter::with_capacity(self.config.buffer_size, file);
        self.number = next;
        self.path = path;
        self.segment_len = 0;

        log_event_with_fields(
            Event::JournalSegmentRollover,
            &[
                ("sealed_segment", sealed.as_str()),
                ("sealed_bytes", sealed_len.as_str()),
                ("segment", opened.as_str()),
            ],
        );
        Ok(())
    }
}
