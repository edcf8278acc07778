//! Durable journal subsystem
//!
//! The journal is the only persistent state. The store keeps nothing on
//! disk of its own; everything it knows after a restart comes from
//! replaying this log.
//!
//! # Guarantees
//!
//! - Append-only: frames are never rewritten in place
//! - Every frame carries a CRC32 over its header and data
//! - A synced append is fsynced before it returns
//! - Replay is sequential and halts on any corrupt frame
//! - Only a torn or damaged final frame (a crash mid-write) is discarded
//! - After a failed write or fsync, appends are refused until restart
//!
//! Compaction is out of scope: segments roll over but are never rewritten.

mod checksum;
mod errors;
mod file;
mod log;
mod memory;
mod reader;
mod record;
mod replay;
mod segment;
mod writer;

pub use checksum::compute_checksum;
pub use errors::{JournalError, JournalErrorCode, JournalResult, Severity};
pub use file::FileJournal;
pub use log::{DurableLog, JournalLoad, PreparedTransaction, RecordInfo};
pub use memory::MemoryJournal;
pub use reader::{ReadOutcome, SegmentReader};
pub use record::{FrameKind, JournalFrame, FRAME_OVERHEAD};
pub use segment::{list_segments, segment_file_name};
