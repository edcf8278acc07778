//! Store error types
//!
//! Error codes:
//! - STORE_IO_FAILURE (ERROR, FATAL when the journal lost an fsync)
//! - STORE_CODEC_FAILURE (ERROR)
//! - STORE_INVALID_LOG_STATE (ERROR)
//! - STORE_CORRUPTION (FATAL)
//! - STORE_NOT_RUNNING (ERROR)
//! - STORE_ALREADY_STARTED (ERROR)
//! - STORE_CONFIG (ERROR)
//! - STORE_RECORD_TOO_LARGE (ERROR)
//! - STORE_IDS_EXHAUSTED (ERROR)

use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::journal::{JournalError, JournalErrorCode};

/// Errors returned by [`RecoverableStore`](super::RecoverableStore)
#[derive(Debug, Error)]
pub enum StoreError {
    /// The journal or the filesystem failed an operation
    #[error("journal I/O failed: {0}")]
    IoFailure(#[source] JournalError),

    /// A payload could not be encoded or decoded
    #[error("record payload is malformed: {0}")]
    CodecFailure(#[from] CodecError),

    /// The journal refused an operation for the record id it names
    #[error("journal rejected the operation: {0}")]
    InvalidLogState(#[source] JournalError),

    /// Replay found damaged frames
    #[error("journal is corrupted: {0}")]
    Corruption(#[source] JournalError),

    /// The store was never started or has been stopped
    #[error("store is not running")]
    NotRunning,

    /// `start` was called on a store that has already been started once
    #[error("store has already been started")]
    AlreadyStarted,

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The encoded record does not fit in one journal frame
    #[error("record too large for the journal: {0}")]
    RecordTooLarge(#[source] JournalError),

    /// Every record id up to `u64::MAX` has been handed out
    #[error("record ids exhausted after {last}")]
    IdsExhausted { last: u64 },
}

impl StoreError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::IoFailure(_) => "STORE_IO_FAILURE",
            StoreError::CodecFailure(_) => "STORE_CODEC_FAILURE",
            StoreError::InvalidLogState(_) => "STORE_INVALID_LOG_STATE",
            StoreError::Corruption(_) => "STORE_CORRUPTION",
            StoreError::NotRunning => "STORE_NOT_RUNNING",
            StoreError::AlreadyStarted => "STORE_ALREADY_STARTED",
            StoreError::Config(_) => "STORE_CONFIG",
            StoreError::RecordTooLarge(_) => "STORE_RECORD_TOO_LARGE",
            StoreError::IdsExhausted { .. } => "STORE_IDS_EXHAUSTED",
        }
    }

    /// Whether the store can no longer be trusted after this error
    pub fn is_fatal(&self) -> bool {
        match self {
            StoreError::Corruption(_) => true,
            StoreError::IoFailure(e) => e.is_fatal(),
            _ => false,
        }
    }
}

impl From<JournalError> for StoreError {
    fn from(err: JournalError) -> Self {
        match err.code() {
            JournalErrorCode::Corruption => StoreError::Corruption(err),
            JournalErrorCode::InvalidState => StoreError::InvalidLogState(err),
            JournalErrorCode::FrameTooLarge => StoreError::RecordTooLarge(err),
            JournalErrorCode::IoFailed | JournalErrorCode::FsyncFailed => StoreError::IoFailure(err),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
