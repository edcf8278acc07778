//! Journal frame layout
//!
//! Each frame on disk (all integers little endian):
//! - Frame length (u32), counting every byte of the frame
//! - Kind (u8)
//! - Record id (u64)
//! - Transaction id (u64), zero for non-transactional frames
//! - User tag (u8), the caller's record type byte
//! - Data length (u32) + data
//! - Checksum (u32) over all preceding bytes

use std::io;

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{JournalError, JournalResult};

/// Fixed bytes in a frame besides the data section.
pub const FRAME_OVERHEAD: usize = 4 + 1 + 8 + 8 + 1 + 4 + 4;

/// Encoded length of a frame carrying `data_len` bytes of data.
pub fn frame_len(record_id: u64, data_len: usize) -> JournalResult<u32> {
    data_len
        .checked_add(FRAME_OVERHEAD)
        .and_then(|total| u32::try_from(total).ok())
        .ok_or_else(|| JournalError::frame_too_large(record_id, data_len.saturating_add(FRAME_OVERHEAD)))
}

/// What a frame does to the record it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// First appearance of a record
    Add = 0,
    /// Full replacement of a live record's data
    Update = 1,
    /// Removal of a live record
    Delete = 2,
    /// Add inside a transaction, applied on commit
    AddTx = 3,
    /// Update inside a transaction, applied on commit
    UpdateTx = 4,
    /// Delete inside a transaction, applied on commit
    DeleteTx = 5,
    /// Transaction reached the prepared (in-doubt) state
    Prepare = 6,
    /// Transaction outcome: apply buffered operations
    Commit = 7,
    /// Transaction outcome: discard buffered operations
    Rollback = 8,
}

impl FrameKind {
    /// Convert from u8, returns None for unknown kinds
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FrameKind::Add),
            1 => Some(FrameKind::Update),
            2 => Some(FrameKind::Delete),
            3 => Some(FrameKind::AddTx),
            4 => Some(FrameKind::UpdateTx),
            5 => Some(FrameKind::DeleteTx),
            6 => Some(FrameKind::Prepare),
            7 => Some(FrameKind::Commit),
            8 => Some(FrameKind::Rollback),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Frames that belong to a transaction and carry a transaction id
    pub fn is_transactional(self) -> bool {
        !matches!(self, FrameKind::Add | FrameKind::Update | FrameKind::Delete)
    }
}

/// One decoded journal frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalFrame {
    pub kind: FrameKind,
    pub record_id: u64,
    pub tx_id: u64,
    pub user_tag: u8,
    pub data: Vec<u8>,
}

impl JournalFrame {
    /// A frame outside any transaction.
    pub fn plain(kind: FrameKind, record_id: u64, user_tag: u8, data: Vec<u8>) -> Self {
        Self {
            kind,
            record_id,
            tx_id: 0,
            user_tag,
            data,
        }
    }

    /// A frame owned by transaction `tx_id`.
    pub fn transactional(kind: FrameKind, tx_id: u64, record_id: u64, user_tag: u8, data: Vec<u8>) -> Self {
        Self {
            kind,
            record_id,
            tx_id,
            user_tag,
            data,
        }
    }

    /// A prepare/commit/rollback marker for `tx_id`.
    pub fn marker(kind: FrameKind, tx_id: u64) -> Self {
        Self::transactional(kind, tx_id, 0, 0, Vec::new())
    }

    /// Size of this frame once serialized.
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.data.len()
    }

    /// Serialize to bytes, checksum included.
    ///
    /// Fails with `JOURNAL_FRAME_TOO_LARGE` when the frame length does not
    /// fit the u32 length field.
    pub fn serialize(&self) -> JournalResult<Vec<u8>> {
        let total = frame_len(self.record_id, self.data.len())?;
        let mut buf = Vec::with_capacity(total as usize);

        buf.extend_from_slice(&total.to_le_bytes());
        buf.push(self.kind.as_u8());
        buf.extend_from_slice(&self.record_id.to_le_bytes());
        buf.extend_from_slice(&self.tx_id.to_le_bytes());
        buf.push(self.user_tag);
        // data_len < total, so it fits as well
        buf.extend_from_slice(&(total - FRAME_OVERHEAD as u32).to_le_bytes());
        buf.extend_from_slice(&self.data);

        let checksum = compute_checksum(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }

    /// Deserialize one complete frame.
    ///
    /// `buf` must hold exactly the bytes announced by the frame's length
    /// field. Checksum and structure are validated.
    pub fn deserialize(buf: &[u8]) -> io::Result<Self> {
        fn invalid(msg: impl Into<String>) -> io::Error {
            io::Error::new(io::ErrorKind::InvalidData, msg.into())
        }

        if buf.len() < FRAME_OVERHEAD {
            return Err(invalid(format!(
                "frame of {} bytes is shorter than the {} byte minimum",
                buf.len(),
                FRAME_OVERHEAD
            )));
        }

        let declared = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if declared != buf.len() {
            return Err(invalid(format!(
                "frame length field {} does not match buffer length {}",
                declared,
                buf.len()
            )));
        }

        let body_end = buf.len() - 4;
        let stored = u32::from_le_bytes([
            buf[body_end],
            buf[body_end + 1],
            buf[body_end + 2],
            buf[body_end + 3],
        ]);
        if !verify_checksum(&buf[..body_end], stored) {
            return Err(invalid("checksum mismatch"));
        }

        let kind = FrameKind::from_u8(buf[4])
            .ok_or_else(|| invalid(format!("unknown frame kind {}", buf[4])))?;

        let mut u64_buf = [0u8; 8];
        u64_buf.copy_from_slice(&buf[5..13]);
        let record_id = u64::from_le_bytes(u64_buf);
        u64_buf.copy_from_slice(&buf[13..21]);
        let tx_id = u64::from_le_bytes(u64_buf);
        let user_tag = buf[21];
        let data_len = u32::from_le_bytes([buf[22], buf[23], buf[24], buf[25]]) as usize;

        if 26 + data_len != body_end {
            return Err(invalid(format!(
                "data length {} inconsistent with frame length {}",
                data_len, declared
            )));
        }

        Ok(Self {
            kind,
            record_id,
            tx_id,
            user_tag,
            data: buf[26..body_end].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::errors::JournalErrorCode;

    #[test]
    fn test_frame_survives_serialization() {
        let frame = JournalFrame::plain(FrameKind::Add, 42, 0x00, vec![9, 8, 7]);
        let bytes = frame.serialize().unwrap();
        assert_eq!(bytes.len(), frame.encoded_len());
        assert_eq!(JournalFrame::deserialize(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_marker_has_no_data() {
        let frame = JournalFrame::marker(FrameKind::Commit, 5);
        let decoded = JournalFrame::deserialize(&frame.serialize().unwrap()).unwrap();
        assert_eq!(decoded.kind, FrameKind::Commit);
        assert_eq!(decoded.tx_id, 5);
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut bytes = JournalFrame::plain(FrameKind::Update, 1, 0, vec![1, 2, 3]).serialize().unwrap();
        bytes[27] ^= 0xff;
        let err = JournalFrame::deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut frame = JournalFrame::plain(FrameKind::Add, 1, 0, vec![]).serialize().unwrap();
        frame[4] = 99;
        // re-seal so only the kind is wrong
        let body_end = frame.len() - 4;
        let checksum = compute_checksum(&frame[..body_end]);
        frame[body_end..].copy_from_slice(&checksum.to_le_bytes());
        assert!(JournalFrame::deserialize(&frame).is_err());
    }

    #[test]
    fn test_transactional_kinds() {
        assert!(!FrameKind::Add.is_transactional());
        assert!(!FrameKind::Delete.is_transactional());
        assert!(FrameKind::AddTx.is_transactional());
        assert!(FrameKind::Prepare.is_transactional());
        assert!(FrameKind::Rollback.is_transactional());
    }

    #[test]
    fn test_frame_len_limits() {
        assert_eq!(frame_len(1, 0).unwrap(), FRAME_OVERHEAD as u32);
        assert_eq!(frame_len(1, u32::MAX as usize - FRAME_OVERHEAD).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_frame_over_four_gib_rejected() {
        let err = frame_len(7, u32::MAX as usize - FRAME_OVERHEAD + 1).unwrap_err();
        assert_eq!(err.code(), JournalErrorCode::FrameTooLarge);
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("record 7"));

        assert!(frame_len(7, usize::MAX).is_err());
    }
}
