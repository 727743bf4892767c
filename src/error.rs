//!
//! Defines error types for the crate.

use crate::value::Kind;

/// Represents errors that can occur while decoding marshalled state or
/// merging values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A payload could not be parsed.
    #[error("failed to decode payload: {0}")]
    Decode(String),
    /// A marshalled value arrived without its root segment.
    #[error("marshalled value is missing its root segment")]
    MissingRootSegment,
    /// A segment key suffix began with a byte that is not a known sigil.
    #[error("unexpected key sigil: {0:#04x}")]
    UnknownKeySigil(u8),
    /// A register was set with a timestamp earlier than its current one.
    #[error("cannot set register to a value from the past: {attempted} < {current}")]
    RegisterRegression {
        /// The rejected timestamp.
        attempted: u64,
        /// The register's current timestamp.
        current: u64,
    },
    /// Two registers carry different values under the same timestamp.
    /// Unrecoverable: it means clocks were skewed or a replica id was
    /// duplicated upstream.
    #[error("registers have diverged: identical timestamps with different values")]
    RegisterDivergence,
    /// `merge` was called across two different kinds of CRDT value.
    #[error("cannot merge a {left} value with a {right} value")]
    TypeMismatch {
        /// Kind of the receiving value.
        left: Kind,
        /// Kind of the value being merged in.
        right: Kind,
    },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
