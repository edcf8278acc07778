//! Record payload codec
//!
//! The journal stores opaque byte buffers. A codec turns an object's
//! (uid, type name, state) triple into such a buffer and back. Decoding is
//! split in two so recovery can read the uid and type name of every record
//! without unpacking state that may never be requested.

mod errors;
mod state;

pub use errors::{CodecError, CodecResult};
pub use state::StateCodec;

use crate::uid::Uid;

/// The decoded identity prefix of a payload plus the still-packed rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPrefix<'a> {
    pub uid: Uid,
    pub type_name: String,
    pub remainder: &'a [u8],
}

/// Encodes and decodes committed-state payloads.
pub trait RecordCodec: Send + Sync {
    /// Packs a uid, type name and state into one payload.
    fn encode(&self, uid: &Uid, type_name: &str, state: &[u8]) -> CodecResult<Vec<u8>>;

    /// Unpacks only the uid and type name.
    fn decode_prefix<'a>(&self, payload: &'a [u8]) -> CodecResult<RecordPrefix<'a>>;

    /// Unpacks the state section left over by `decode_prefix`.
    fn decode_state(&self, remainder: &[u8]) -> CodecResult<Vec<u8>>;

    /// Unpacks a whole payload.
    fn decode(&self, payload: &[u8]) -> CodecResult<(Uid, String, Vec<u8>)> {
        let prefix = self.decode_prefix(payload)?;
        let state = self.decode_state(prefix.remainder)?;
        Ok((prefix.uid, prefix.type_name, state))
    }
}
