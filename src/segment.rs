//!
//! The neutral envelope used to fragment marshalled CRDT state for an
//! external keyed store.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sigil delimiting a key that holds one set entry.
pub const ENTRY_SIGIL: u8 = b'E';

/// Sigil delimiting a key that holds one deferred-removal bucket.
pub const DEFERRED_SIGIL: u8 = b'D';

/// Prefix for user keyspace keys. Reserved for the storage collaborator.
pub const PREFIX_USER_KEY: u8 = 0x01;

/// Prefix for segment keys, the support data for the user keyspace.
pub const PREFIX_SEGMENT_KEY: u8 = 0x02;

/// Prefix for system keyspace keys.
pub const PREFIX_SYSTEM_KEY: u8 = 0x03;

/// Byte separating the sigil from the remainder of a composed key suffix.
const KEY_SEPARATOR: u8 = 0x00;

/// One `(key_suffix, value)` fragment of a marshalled value.
///
/// The key suffix is empty for a root segment; otherwise its first byte is a
/// sigil and its remainder starts at a fixed offset past the separator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Key material appended to the owning value's key by the store.
    #[serde(with = "serde_bytes")]
    pub key_suffix: Vec<u8>,
    /// Opaque payload bytes.
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
}

impl Segment {
    /// A segment with a composed key suffix.
    pub fn new(key_suffix: Vec<u8>, value: Vec<u8>) -> Self {
        Segment { key_suffix, value }
    }

    /// A root segment: payload only, empty key suffix.
    pub fn root(value: Vec<u8>) -> Self {
        Segment {
            key_suffix: Vec::new(),
            value,
        }
    }
}

/// Composes a key suffix from a sigil and the remainder bytes.
pub fn compose_key(sigil: u8, rest: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + rest.len());
    key.push(sigil);
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(rest);
    key
}

/// Splits a composed key suffix back into its sigil and remainder bytes.
pub fn split_key(key: &[u8]) -> Result<(u8, &[u8])> {
    if key.len() < 2 {
        return Err(Error::Decode(format!(
            "key suffix is too short to carry a sigil: {} bytes",
            key.len()
        )));
    }

    Ok((key[0], &key[2..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_and_split_are_mutual_inverses() {
        let key = compose_key(ENTRY_SIGIL, b"some member");
        let (sigil, rest) = split_key(&key).unwrap();

        assert_eq!(sigil, ENTRY_SIGIL);
        assert_eq!(rest, b"some member");
    }

    #[test]
    fn compose_handles_an_empty_remainder() {
        let key = compose_key(DEFERRED_SIGIL, b"");
        let (sigil, rest) = split_key(&key).unwrap();

        assert_eq!(sigil, DEFERRED_SIGIL);
        assert!(rest.is_empty());
    }

    #[test]
    fn split_rejects_a_truncated_key() {
        assert!(split_key(b"").is_err());
        assert!(split_key(b"E").is_err());
    }

    #[test]
    fn keyspace_prefixes_are_distinct() {
        assert_ne!(PREFIX_USER_KEY, PREFIX_SEGMENT_KEY);
        assert_ne!(PREFIX_SEGMENT_KEY, PREFIX_SYSTEM_KEY);
    }
}
