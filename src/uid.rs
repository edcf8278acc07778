//! Object identity
//!
//! A `Uid` names one object instance. It is assigned by the caller (the
//! transaction manager) and never generated by the store itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width of a packed `Uid` in bytes.
pub const UID_LEN: usize = 16;

/// Opaque, globally unique object identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(Uuid);

impl Uid {
    /// Mints a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps raw identity bytes.
    pub fn from_bytes(bytes: [u8; UID_LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The packed form written into record payloads.
    pub fn as_bytes(&self) -> &[u8; UID_LEN] {
        self.0.as_bytes()
    }

    /// The all-zero identity, used as a sentinel by callers that need one.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for Uid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Uid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uids_are_distinct() {
        assert_ne!(Uid::new(), Uid::new());
    }

    #[test]
    fn test_bytes_preserve_identity() {
        let uid = Uid::new();
        assert_eq!(Uid::from_bytes(*uid.as_bytes()), uid);
    }

    #[test]
    fn test_display_parses_back() {
        let uid = Uid::new();
        let parsed: Uid = uid.to_string().parse().unwrap();
        assert_eq!(parsed, uid);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("not-a-uid".parse::<Uid>().is_err());
    }
}
