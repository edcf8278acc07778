//! Binary packing of committed object state
//!
//! Payload layout (all integers little endian):
//! - uid (16 bytes)
//! - type_name_len (u32) + type_name (UTF-8)
//! - state_len (u32) + state bytes
//!
//! The uid and type name form the prefix that recovery decodes; the state
//! section is only unpacked when a record is actually read.

use crate::uid::{Uid, UID_LEN};

use super::errors::{CodecError, CodecResult};
use super::{RecordCodec, RecordPrefix};

/// Length-prefixed binary codec for (uid, type name, state) payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateCodec;

impl StateCodec {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }
}

fn write_len(buf: &mut Vec<u8>, field: &'static str, len: usize) -> CodecResult<()> {
    let len = u32::try_from(len).map_err(|_| CodecError::LengthOverflow { field, len })?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

/// Splits `n` bytes off the front of `input`.
fn take<'a>(input: &mut &'a [u8], n: usize, field: &'static str) -> CodecResult<&'a [u8]> {
    if input.len() < n {
        return Err(CodecError::Truncated {
            field,
            needed: n,
            available: input.len(),
        });
    }
    let (head, tail) = input.split_at(n);
    *input = tail;
    Ok(head)
}

fn take_prefixed<'a>(input: &mut &'a [u8], field: &'static str) -> CodecResult<&'a [u8]> {
    let len_bytes = take(input, 4, field)?;
    let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
    take(input, len as usize, field)
}

impl RecordCodec for StateCodec {
    fn encode(&self, uid: &Uid, type_name: &str, state: &[u8]) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(UID_LEN + 8 + type_name.len() + state.len());
        buf.extend_from_slice(uid.as_bytes());
        write_len(&mut buf, "type_name", type_name.len())?;
        buf.extend_from_slice(type_name.as_bytes());
        write_len(&mut buf, "state", state.len())?;
        buf.extend_from_slice(state);
        Ok(buf)
    }

    fn decode_prefix<'a>(&self, payload: &'a [u8]) -> CodecResult<RecordPrefix<'a>> {
        let mut input = payload;

        let uid_bytes = take(&mut input, UID_LEN, "uid")?;
        let mut raw = [0u8; UID_LEN];
        raw.copy_from_slice(uid_bytes);

        let name_bytes = take_prefixed(&mut input, "type_name")?;
        let type_name = std::str::from_utf8(name_bytes)
            .map_err(|e| CodecError::InvalidTypeName(e.to_string()))?
            .to_string();

        Ok(RecordPrefix {
            uid: Uid::from_bytes(raw),
            type_name,
            remainder: input,
        })
    }

    fn decode_state(&self, remainder: &[u8]) -> CodecResult<Vec<u8>> {
        let mut input = remainder;
        let state = take_prefixed(&mut input, "state")?;
        if !input.is_empty() {
            return Err(CodecError::TrailingBytes(input.len()));
        }
        Ok(state.to_vec())
    }
}
