//!
//! Positive-negative counter.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::types::ReplicaId;
use crate::value::Marshaler;

/// Grow-only positive and negative tallies, one slot per replica. Both maps
/// are monotone non-decreasing, which is what makes the pointwise-max merge
/// a lattice join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PnState {
    inc: BTreeMap<ReplicaId, i64>,
    dec: BTreeMap<ReplicaId, i64>,
}

impl PnState {
    fn value(&self) -> i64 {
        let added: i64 = self.inc.values().sum();
        let removed: i64 = self.dec.values().sum();
        added - removed
    }
}

/// A counter that can go both up and down, kept as separate per-replica
/// increment and decrement tallies so merges never lose updates.
pub struct PnCounter {
    replica_id: ReplicaId,
    state: RwLock<PnState>,
}

impl PnCounter {
    /// Returns a new counter owned by a specific replica.
    pub fn new(replica_id: impl Into<ReplicaId>) -> Self {
        PnCounter {
            replica_id: replica_id.into(),
            state: RwLock::new(PnState::default()),
        }
    }

    /// The replica this counter mutates on behalf of.
    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// Increments by one and returns the resulting value.
    pub fn incr(&self) -> i64 {
        self.incr_by(1)
    }

    /// Adjusts the counter by `amount` (negative amounts land in the
    /// decrement tally) and returns the resulting value.
    pub fn incr_by(&self, amount: i64) -> i64 {
        let mut state = self.state.write();
        if amount > 0 {
            *state.inc.entry(self.replica_id.clone()).or_insert(0) += amount;
        } else if amount < 0 {
            *state.dec.entry(self.replica_id.clone()).or_insert(0) -= amount;
        }
        state.value()
    }

    /// Decrements by one and returns the resulting value.
    pub fn decr(&self) -> i64 {
        self.incr_by(-1)
    }

    /// Decrements by `amount` and returns the resulting value.
    pub fn decr_by(&self, amount: i64) -> i64 {
        self.incr_by(-amount)
    }

    /// The current value: the sum of all increments minus the sum of all
    /// decrements, across every replica seen so far.
    pub fn value(&self) -> i64 {
        self.state.read().value()
    }

    /// Merges a peer's counter into this one: pointwise max per replica
    /// across both tallies.
    pub fn merge(&self, other: &PnCounter) {
        let theirs = other.state.read().clone();

        let mut state = self.state.write();
        for (replica, inc) in theirs.inc {
            let slot = state.inc.entry(replica).or_insert(0);
            if *slot < inc {
                *slot = inc;
            }
        }
        for (replica, dec) in theirs.dec {
            let slot = state.dec.entry(replica).or_insert(0);
            if *slot < dec {
                *slot = dec;
            }
        }
    }
}

impl Marshaler for PnCounter {
    fn marshal(&self) -> Result<Vec<Segment>> {
        let state = self.state.read();
        Ok(vec![Segment::root(serde_json::to_vec(&*state)?)])
    }

    fn unmarshal(&self, data: &[Segment]) -> Result<()> {
        let root = data.first().ok_or(Error::MissingRootSegment)?;
        let incoming: PnState = serde_json::from_slice(&root.value)?;
        *self.state.write() = incoming;
        Ok(())
    }
}

impl std::fmt::Debug for PnCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PnCounter")
            .field("replica_id", &self.replica_id)
            .field("inc", &state.inc)
            .field("dec", &state.dec)
            .finish()
    }
}
