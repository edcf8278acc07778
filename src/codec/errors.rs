//! Codec error types

use thiserror::Error;

/// Result type for payload encoding and decoding
pub type CodecResult<T> = Result<T, CodecError>;

/// Failures raised while packing or unpacking a record payload.
///
/// Any of these on a payload that came out of the journal means the
/// journal and the codec disagree, which recovery treats as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("payload truncated while reading {field}: need {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("type name is not valid UTF-8: {0}")]
    InvalidTypeName(String),

    #[error("{field} length {len} exceeds the u32 length prefix")]
    LengthOverflow { field: &'static str, len: usize },

    #[error("{0} unexpected trailing bytes after state")]
    TrailingBytes(usize),
}

impl CodecError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::Truncated { .. } => "CODEC_TRUNCATED",
            CodecError::InvalidTypeName(_) => "CODEC_INVALID_TYPE_NAME",
            CodecError::LengthOverflow { .. } => "CODEC_LENGTH_OVERFLOW",
            CodecError::TrailingBytes(_) => "CODEC_TRAILING_BYTES",
        }
    }
}
