//! Version vectors and causal ordering.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;

use crate::error::Result;
use crate::time::lamport::LamportTime;
use crate::types::ReplicaId;

/// Causal ordering between two events, usually written `A -> B` (event A is
/// causally ordered before B) and tracked with some form of logical clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    /// Both clocks are identical.
    Equal,
    /// Clock A > clock B, and therefore event B -> event A.
    Greater,
    /// Clock B > clock A, and therefore event A -> event B.
    Less,
    /// The clocks come from concurrent timelines. Possible because this is a
    /// partial, rather than total, ordering.
    None,
}

impl fmt::Display for CausalOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            CausalOrder::Equal => "OrderEqual",
            CausalOrder::Greater => "OrderGreater",
            CausalOrder::Less => "OrderLess",
            CausalOrder::None => "OrderNone",
        };
        f.write_str(description)
    }
}

/// Snapshot form of a version vector: the newest witnessed time per replica.
/// Ordered, so its serialization is canonical.
pub type Dots = BTreeMap<ReplicaId, LamportTime>;

/// A mapping from replica id to the greatest Lamport time witnessed from that
/// replica.
///
/// Think `{"ReplicaA": 2, "ReplicaB": 3}`.
///
/// The map is guarded by a reader-writer lock so one vector can be shared
/// across threads. Operations over two vectors never hold both locks at
/// once: one side is snapshotted first, which makes self-application (for
/// example `v.merge(&v)`) and arbitrary interleavings with concurrent
/// mutation safe.
///
/// A replica id never appears with time 0; zero-valued entries are absent
/// rather than stored.
pub struct VersionVector {
    dots: RwLock<Dots>,
}

impl VersionVector {
    /// Returns a new, empty vector.
    pub fn new() -> Self {
        VersionVector {
            dots: RwLock::new(Dots::new()),
        }
    }

    /// Parses a marshalled payload into a fresh vector.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let vector = VersionVector::new();
        vector.unmarshal(data)?;
        Ok(vector)
    }

    /// Stores a time for a replica if it dominates any existing time for
    /// that replica. Returns whether the time was stored.
    pub fn witness(&self, replica: impl Into<ReplicaId>, time: LamportTime) -> bool {
        let replica = replica.into();
        let mut dots = self.dots.write();

        let newer = match dots.get(&replica) {
            Some(current) => time > *current,
            None => time > 0,
        };
        if newer {
            dots.insert(replica, time);
        }

        newer
    }

    /// Increments the time for a replica (starting it at 1 if absent) and
    /// returns the new time.
    pub fn incr(&self, replica: impl Into<ReplicaId>) -> LamportTime {
        let replica = replica.into();
        let mut dots = self.dots.write();

        let next = dots.get(&replica).copied().unwrap_or(0) + 1;
        dots.insert(replica, next);
        next
    }

    /// Retrieves the time for a replica.
    pub fn get(&self, replica: &str) -> Option<LamportTime> {
        self.dots.read().get(replica).copied()
    }

    /// True when the vector holds no entries.
    pub fn is_empty(&self) -> bool {
        self.dots.read().is_empty()
    }

    /// An owned snapshot of the underlying map.
    pub fn dots(&self) -> Dots {
        self.dots.read().clone()
    }

    /// Iterates over each dot under the shared lock.
    pub fn each(&self, mut f: impl FnMut(&ReplicaId, LamportTime)) {
        for (replica, time) in self.dots.read().iter() {
            f(replica, *time);
        }
    }

    /// Indicates whether this vector is causally greater than the other: for
    /// every entry of `other`, this vector holds a strictly greater time.
    pub fn descends_from(&self, other: &VersionVector) -> bool {
        descends(&self.dots(), &other.dots())
    }

    /// The causal order between this vector and another.
    pub fn compare(&self, other: &VersionVector) -> CausalOrder {
        let ours = self.dots();
        let theirs = other.dots();

        if ours == theirs {
            return CausalOrder::Equal;
        }
        if descends(&ours, &theirs) {
            return CausalOrder::Greater;
        }
        if descends(&theirs, &ours) {
            return CausalOrder::Less;
        }

        CausalOrder::None
    }

    /// Indicates whether the two vectors are totally divergent.
    pub fn is_concurrent_with(&self, other: &VersionVector) -> bool {
        self.compare(other) == CausalOrder::None
    }

    /// Returns a new vector holding only the entries that dominate the other
    /// vector: replicas absent from `other`, or carrying a strictly greater
    /// time here.
    pub fn subtract(&self, other: &VersionVector) -> VersionVector {
        let dominating: Dots = self
            .dots()
            .into_iter()
            .filter(|(replica, time)| match other.get(replica) {
                Some(theirs) => *time > theirs,
                None => true,
            })
            .collect();

        VersionVector::from(dominating)
    }

    /// Returns a new vector holding the entries common to both vectors, with
    /// the same replica and the same time.
    pub fn intersection(&self, other: &VersionVector) -> VersionVector {
        let common: Dots = self
            .dots()
            .into_iter()
            .filter(|(replica, time)| other.get(replica) == Some(*time))
            .collect();

        VersionVector::from(common)
    }

    /// Witnesses every entry of the other vector into this one.
    pub fn merge(&self, other: &VersionVector) {
        for (replica, time) in other.dots() {
            self.witness(replica, time);
        }
    }

    /// Serialises the vector into an opaque byte payload.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.dots())?)
    }

    /// Parses a marshalled payload, witnessing its entries into this vector.
    pub fn unmarshal(&self, data: &[u8]) -> Result<()> {
        let incoming: Dots = serde_json::from_slice(data)?;

        let mut dots = self.dots.write();
        for (replica, time) in incoming {
            if time > 0 {
                dots.insert(replica, time);
            }
        }

        Ok(())
    }

    /// Replaces the vector's contents wholesale.
    pub(crate) fn reset(&self, dots: Dots) {
        *self.dots.write() = dots;
    }
}

fn descends(ours: &Dots, theirs: &Dots) -> bool {
    theirs
        .iter()
        .all(|(replica, time)| ours.get(replica).copied().is_some_and(|mine| mine > *time))
}

impl Default for VersionVector {
    fn default() -> Self {
        VersionVector::new()
    }
}

impl Clone for VersionVector {
    fn clone(&self) -> Self {
        VersionVector::from(self.dots())
    }
}

impl From<Dots> for VersionVector {
    fn from(dots: Dots) -> Self {
        VersionVector {
            dots: RwLock::new(dots),
        }
    }
}

impl FromIterator<(ReplicaId, LamportTime)> for VersionVector {
    fn from_iter<I: IntoIterator<Item = (ReplicaId, LamportTime)>>(iter: I) -> Self {
        VersionVector::from(iter.into_iter().collect::<Dots>())
    }
}

impl PartialEq for VersionVector {
    fn eq(&self, other: &Self) -> bool {
        self.dots() == other.dots()
    }
}

impl Eq for VersionVector {}

impl fmt::Debug for VersionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VersionVector").field(&self.dots()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vv(dots: &[(&str, LamportTime)]) -> VersionVector {
        dots.iter()
            .map(|(replica, time)| (replica.to_string(), *time))
            .collect()
    }

    #[test]
    fn a_new_vector_is_empty() {
        assert!(VersionVector::new().is_empty());
    }

    #[test]
    fn witness_stores_only_dominating_times() {
        let vector = VersionVector::new();
        assert!(vector.witness("Actor 4", 4));
        assert!(!vector.witness("Actor 4", 4));
        assert!(!vector.witness("Actor 4", 2));
        assert!(vector.witness("Actor 4", 9));
        assert_eq!(vector.get("Actor 4"), Some(9));
    }

    #[test]
    fn witness_never_stores_a_zero_time() {
        let vector = VersionVector::new();
        assert!(!vector.witness("Actor 4", 0));
        assert!(vector.is_empty());
    }

    #[test]
    fn incr_increments_an_existing_replica() {
        let vector = VersionVector::new();
        vector.witness("foo", 3);
        assert_eq!(vector.incr("foo"), 4);
    }

    #[test]
    fn incr_creates_a_missing_replica() {
        let vector = VersionVector::new();
        assert_eq!(vector.incr("foo"), 1);
    }

    #[test]
    fn merge_combines_disjoint_and_shared_replicas() {
        let left = vv(&[("Actor 4", 4), ("Actor 5", 5), ("Actor 7", 7)]);
        let right = vv(&[("Actor 6", 6), ("Actor 7", 7)]);

        left.merge(&right);

        assert_eq!(
            left,
            vv(&[("Actor 4", 4), ("Actor 5", 5), ("Actor 6", 6), ("Actor 7", 7)])
        );
    }

    #[test]
    fn merge_keeps_newer_local_times() {
        let left = vv(&[("Actor 6", 6), ("Actor 7", 7)]);
        let right = vv(&[("Actor 5", 5)]);

        left.merge(&right);

        assert_eq!(left, vv(&[("Actor 5", 5), ("Actor 6", 6), ("Actor 7", 7)]));
    }

    #[test]
    fn merge_with_itself_is_a_noop() {
        let vector = vv(&[("Actor 4", 4), ("Actor 5", 5)]);
        let before = vector.dots();
        vector.merge(&vector.clone());
        assert_eq!(vector.dots(), before);
    }

    #[test]
    fn subtract_keeps_replicas_absent_from_the_other() {
        let left = vv(&[("Actor 4", 1), ("Actor 5", 1), ("Actor 6", 1)]);
        let right = vv(&[("Actor 4", 1)]);

        assert_eq!(left.subtract(&right), vv(&[("Actor 5", 1), ("Actor 6", 1)]));
    }

    #[test]
    fn subtract_keeps_strictly_newer_times() {
        let left = vv(&[("Actor 4", 1), ("Actor 5", 1), ("Actor 6", 5)]);
        let right = vv(&[("Actor 4", 1), ("Actor 5", 3), ("Actor 6", 4)]);

        assert_eq!(left.subtract(&right), vv(&[("Actor 6", 5)]));
    }

    #[test]
    fn intersection_keeps_equal_entries_only() {
        let left = vv(&[("Actor 4", 1), ("Actor 5", 2), ("Actor 6", 1)]);
        let right = vv(&[("Actor 4", 1), ("Actor 5", 1), ("Actor 6", 3)]);

        assert_eq!(left.intersection(&right), vv(&[("Actor 4", 1)]));
    }

    #[test]
    fn ordering_when_a_dominates() {
        let a = vv(&[("Actor A", 2)]);
        let b = vv(&[("Actor A", 1)]);

        assert!(a.descends_from(&b));
        assert!(!b.descends_from(&a));
        assert!(!a.is_concurrent_with(&b));
        assert_eq!(a.compare(&b), CausalOrder::Greater);
        assert_eq!(b.compare(&a), CausalOrder::Less);
    }

    #[test]
    fn ordering_when_concurrent() {
        let a = vv(&[("Actor A", 2), ("Actor B", 1)]);
        let b = vv(&[("Actor A", 3)]);

        assert!(!a.descends_from(&b));
        assert!(!b.descends_from(&a));
        assert!(a.is_concurrent_with(&b));
        assert_eq!(b.compare(&a), CausalOrder::None);
    }

    #[test]
    fn ordering_when_equal() {
        let a = vv(&[("Actor A", 1)]);
        let b = vv(&[("Actor A", 1)]);

        // Descent is strict, so equal vectors descend from neither side.
        assert!(!a.descends_from(&b));
        assert!(!b.descends_from(&a));
        assert!(!a.is_concurrent_with(&b));
        assert_eq!(b.compare(&a), CausalOrder::Equal);
    }

    #[test]
    fn a_missing_entry_means_no_descent() {
        let a = vv(&[("Actor A", 1)]);
        let b = vv(&[("Actor A", 1), ("Actor B", 1)]);

        assert!(!b.descends_from(&a));

        let wider = vv(&[("Actor A", 2), ("Actor B", 1)]);
        assert!(wider.descends_from(&a));
    }

    #[test]
    fn clone_is_a_deep_copy() {
        let vector = vv(&[("Actor A", 1)]);
        let copy = vector.clone();

        copy.incr("Actor A");

        assert_eq!(vector.get("Actor A"), Some(1));
        assert_eq!(copy.get("Actor A"), Some(2));
    }

    #[test]
    fn marshal_round_trips_structurally() {
        let vector = vv(&[("Actor A", 3), ("Actor B", 7)]);

        let data = vector.marshal().unwrap();
        let parsed = VersionVector::from_bytes(&data).unwrap();

        assert_eq!(parsed, vector);
    }

    #[test]
    fn unmarshal_rejects_garbage() {
        let vector = VersionVector::new();
        assert!(vector.unmarshal(b"not a payload").is_err());
    }

    #[test]
    fn concurrent_witness_and_merge_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let shared = Arc::new(VersionVector::new());
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    let peer = vv(&[("peer", i + 1)]);
                    for _ in 0..500 {
                        shared.incr(format!("actor-{i}"));
                        shared.merge(&peer);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..4u64 {
            assert_eq!(shared.get(&format!("actor-{i}")), Some(500));
        }
        assert_eq!(shared.get("peer"), Some(4));
    }
}
