//!
//! Last-write-wins register.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::value::Marshaler;

/// Caller-supplied write timestamp. Strictly greater wins; the library never
/// consults a wall clock itself.
pub type Timestamp = u64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Stamped {
    value: String,
    timestamp: Timestamp,
}

/// A single-valued register arbitrated purely by timestamps.
///
/// Unlike the other values in this crate, conflict resolution here is
/// last-writer-wins: whichever write carries the greater timestamp survives
/// a merge. Equal timestamps with different values mean the arbitration
/// input was broken upstream (clock skew or a duplicated replica id), which
/// is unrecoverable.
pub struct LwwRegister {
    state: RwLock<Stamped>,
}

impl LwwRegister {
    /// Returns a register holding an initial value at timestamp zero, so
    /// that any replicated write supersedes it.
    pub fn new(initial_value: impl Into<String>) -> Self {
        LwwRegister {
            state: RwLock::new(Stamped {
                value: initial_value.into(),
                timestamp: 0,
            }),
        }
    }

    /// The current value.
    pub fn get(&self) -> String {
        self.state.read().value.clone()
    }

    /// The timestamp of the last accepted write.
    pub fn timestamp(&self) -> Timestamp {
        self.state.read().timestamp
    }

    /// Replaces the value and timestamp. Fails when `timestamp` is earlier
    /// than the register's current one.
    pub fn set(&self, value: impl Into<String>, timestamp: Timestamp) -> Result<()> {
        let mut state = self.state.write();
        if timestamp < state.timestamp {
            return Err(Error::RegisterRegression {
                attempted: timestamp,
                current: state.timestamp,
            });
        }

        state.value = value.into();
        state.timestamp = timestamp;
        Ok(())
    }

    /// Merges a peer's register into this one, adopting its value when its
    /// timestamp is newer.
    pub fn merge(&self, other: &LwwRegister) -> Result<()> {
        let theirs = other.state.read().clone();

        let mut state = self.state.write();
        if theirs.timestamp > state.timestamp {
            *state = theirs;
        } else if theirs.timestamp == state.timestamp && theirs.value != state.value {
            tracing::error!(
                timestamp = theirs.timestamp,
                "register merge found one timestamp with two values"
            );
            return Err(Error::RegisterDivergence);
        }

        Ok(())
    }
}

impl Marshaler for LwwRegister {
    fn marshal(&self) -> Result<Vec<Segment>> {
        // The timestamp ships with the value; dropping it would reset
        // arbitration on every load.
        let state = self.state.read();
        Ok(vec![Segment::root(serde_json::to_vec(&*state)?)])
    }

    fn unmarshal(&self, data: &[Segment]) -> Result<()> {
        let root = data.first().ok_or(Error::MissingRootSegment)?;
        let incoming: Stamped = serde_json::from_slice(&root.value)?;
        *self.state.write() = incoming;
        Ok(())
    }
}

impl std::fmt::Debug for LwwRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("LwwRegister")
            .field("value", &state.value)
            .field("timestamp", &state.timestamp)
            .finish()
    }
}
