//! Sequential segment reader
//!
//! Reads frames front to back and validates each one. A frame whose
//! declared length runs past the end of the file is reported as a torn
//! tail. A frame that is all there but fails validation is reported as
//! damaged. Neither is an error here; the journal decides whether it is
//! acceptable (only at the very end of the last segment).

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::errors::{JournalError, JournalResult};
use super::record::{JournalFrame, FRAME_OVERHEAD};

/// Result of one read.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete, checksummed frame
    Frame(JournalFrame),
    /// Clean end of segment
    End,
    /// An incomplete frame starts at `offset`
    TornTail { offset: u64 },
    /// The frame at `offset` has a bad length, checksum or layout
    Damaged { offset: u64, reason: String },
}

/// Reads frames from one segment file.
pub struct SegmentReader {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    file_size: u64,
}

impl SegmentReader {
    /// Opens a segment for reading.
    pub fn open(path: &Path) -> JournalResult<Self> {
        let file = File::open(path).map_err(|e| {
            JournalError::io_failed(format!("Failed to open segment: {}", path.display()), e)
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| {
                JournalError::io_failed(format!("Failed to stat segment: {}", path.display()), e)
            })?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            offset: 0,
            file_size,
        })
    }

    /// Byte offset just past the last frame returned.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn segment_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn read_error(&self, e: io::Error) -> JournalError {
        JournalError::io_failed(
            format!("Failed to read segment {} at offset {}", self.path.display(), self.offset),
            e,
        )
    }

    /// Reads the next frame.
    pub fn read_next(&mut self) -> JournalResult<ReadOutcome> {
        let remaining = self.file_size - self.offset;
        if remaining == 0 {
            return Ok(ReadOutcome::End);
        }
        if remaining < 4 {
            return Ok(ReadOutcome::TornTail { offset: self.offset });
        }

        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .map_err(|e| self.read_error(e))?;
        let frame_len = u32::from_le_bytes(len_buf) as u64;

        if frame_len < FRAME_OVERHEAD as u64 {
            return Ok(ReadOutcome::Damaged {
                offset: self.offset,
                reason: format!("frame length {} below minimum {}", frame_len, FRAME_OVERHEAD),
            });
        }
        if frame_len > remaining {
            return Ok(ReadOutcome::TornTail { offset: self.offset });
        }

        let mut frame_buf = vec![0u8; frame_len as usize];
        frame_buf[..4].copy_from_slice(&len_buf);
        self.reader
            .read_exact(&mut frame_buf[4..])
            .map_err(|e| self.read_error(e))?;

        let frame = match JournalFrame::deserialize(&frame_buf) {
            Ok(frame) => frame,
            Err(e) => {
                return Ok(ReadOutcome::Damaged {
                    offset: self.offset,
                    reason: e.to_string(),
                })
            }
        };

        self.offset += frame_len;
        Ok(ReadOutcome::Frame(frame))
    }

    /// Whether a valid frame starts anywhere after `damaged_at`.
    ///
    /// A crash leaves garbage only at the end of what was written. If an
    /// intact frame follows the damage, the damage is not a torn write.
    pub fn frame_follows(&self, damaged_at: u64) -> JournalResult<bool> {
        let start = damaged_at + 1;
        if start >= self.file_size {
            return Ok(false);
        }

        let mut file = File::open(&self.path).map_err(|e| {
            JournalError::io_failed(format!("Failed to open segment: {}", self.path.display()), e)
        })?;
        file.seek(SeekFrom::Start(start))
            .map_err(|e| self.read_error(e))?;
        let mut rest = Vec::with_capacity((self.file_size - start) as usize);
        file.read_to_end(&mut rest).map_err(|e| self.read_error(e))?;

        for pos in 0..rest.len() {
            let candidate = &rest[pos..];
            if candidate.len() < FRAME_OVERHEAD {
                break;
            }
            let len = u32::from_le_bytes([candidate[0], candidate[1], candidate[2], candidate[3]]) as usize;
            if len < FRAME_OVERHEAD || len > candidate.len() {
                continue;
            }
            if JournalFrame::deserialize(&candidate[..len]).is_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
