//! Journal error types
//!
//! Error codes:
//! - JOURNAL_IO_FAILED (ERROR severity)
//! - JOURNAL_FSYNC_FAILED (FATAL severity)
//! - JOURNAL_CORRUPTION (FATAL severity)
//! - JOURNAL_INVALID_STATE (ERROR severity)
//! - JOURNAL_FRAME_TOO_LARGE (ERROR severity)

use std::fmt;
use std::io;

/// Severity levels for journal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the journal stays usable
    Error,
    /// The journal can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Journal error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalErrorCode {
    /// Write, open or create failed
    IoFailed,
    /// fsync failed; what reached disk is unknown
    FsyncFailed,
    /// A frame failed validation during replay
    Corruption,
    /// The operation references an id the journal does not accept
    InvalidState,
    /// A frame does not fit the u32 length field
    FrameTooLarge,
}

impl JournalErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            JournalErrorCode::IoFailed => "JOURNAL_IO_FAILED",
            JournalErrorCode::FsyncFailed => "JOURNAL_FSYNC_FAILED",
            JournalErrorCode::Corruption => "JOURNAL_CORRUPTION",
            JournalErrorCode::InvalidState => "JOURNAL_INVALID_STATE",
            JournalErrorCode::FrameTooLarge => "JOURNAL_FRAME_TOO_LARGE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            JournalErrorCode::IoFailed => Severity::Error,
            JournalErrorCode::FsyncFailed => Severity::Fatal,
            JournalErrorCode::Corruption => Severity::Fatal,
            JournalErrorCode::InvalidState => Severity::Error,
            JournalErrorCode::FrameTooLarge => Severity::Error,
        }
    }
}

impl fmt::Display for JournalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Journal error with context
#[derive(Debug)]
pub struct JournalError {
    code: JournalErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl JournalError {
    /// An I/O operation on a segment failed
    pub fn io_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: JournalErrorCode::IoFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// fsync failed
    pub fn fsync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: JournalErrorCode::FsyncFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Replay found a damaged frame
    pub fn corruption(message: impl Into<String>) -> Self {
        Self {
            code: JournalErrorCode::Corruption,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Corruption at a byte offset within a segment
    pub fn corruption_at(segment: &str, offset: u64, reason: impl Into<String>) -> Self {
        Self {
            code: JournalErrorCode::Corruption,
            message: reason.into(),
            details: Some(format!("segment: {}, byte_offset: {}", segment, offset)),
            source: None,
        }
    }

    /// The journal rejected the operation for the given record id
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self {
            code: JournalErrorCode::InvalidState,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// A frame of `len` bytes cannot be encoded
    pub fn frame_too_large(record_id: u64, len: usize) -> Self {
        Self {
            code: JournalErrorCode::FrameTooLarge,
            message: format!("frame for record {} is {} bytes, above the {} byte limit", record_id, len, u32::MAX),
            details: None,
            source: None,
        }
    }

    /// The writer failed earlier; nothing more is accepted until restart
    pub fn writer_failed(code: JournalErrorCode, cause: &str) -> Self {
        Self {
            code,
            message: "journal writer failed earlier, restart required".to_string(),
            details: Some(cause.to_string()),
            source: None,
        }
    }

    /// Operation attempted while the journal is not started
    pub fn not_started() -> Self {
        Self::invalid_state("journal is not started")
    }

    /// Returns the error code
    pub fn code(&self) -> JournalErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Whether the journal refused the operation rather than failing to do it
    pub fn is_invalid_state(&self) -> bool {
        self.code == JournalErrorCode::InvalidState
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for JournalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for journal operations
pub type JournalResult<T> = Result<T, JournalError>;
