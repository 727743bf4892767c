//!
//! Add-wins set without tombstones.
//!
//! An addition-biased, observed-remove set in the riak_dt ORSWOT lineage.
//! Adds capture a fresh dot from the set-wide version vector, removes cite
//! the support they observed, and the merge resolves concurrent add/remove
//! pairs without retaining tombstones. Removes whose context carries dots
//! this replica has not witnessed are parked in a deferred map and replayed
//! on every merge until the set-wide version subsumes them.

use std::collections::HashMap;
use std::fmt;
use std::mem;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::segment::{self, Segment, DEFERRED_SIGIL, ENTRY_SIGIL};
use crate::set::deferred::{DeferredMap, DeferredSet};
use crate::time::vector::VersionVector;
use crate::types::Member;
use crate::value::{Marshaler, SetOperations};

/// An add-wins observed-remove set.
///
/// A member is in the set iff an entry for it exists; each entry holds the
/// version vector of every dot currently supporting its membership. The
/// set-wide version vector records all causal history this replica has
/// witnessed, which is what lets the merge tell "never seen" apart from
/// "seen and removed" without tombstones.
pub struct AwSet {
    version: VersionVector,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Member, VersionVector>,
    deferred: DeferredMap,
}

impl AwSet {
    /// Returns a new, empty set.
    pub fn new() -> Self {
        AwSet {
            version: VersionVector::new(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// The set-wide causal history. Monotone non-decreasing under every
    /// operation and every merge.
    pub fn version(&self) -> &VersionVector {
        &self.version
    }

    /// A snapshot of the removals still waiting for their context to be
    /// witnessed.
    pub fn deferred(&self) -> DeferredMap {
        self.inner.read().deferred.clone()
    }

    /// Adds a single member for a specific replica. Returns true if the
    /// member was not already present.
    ///
    /// The entry's previous supporting dots are discarded: the freshest
    /// observation supersedes all earlier support.
    pub fn add_one(&self, value: impl Into<Member>, replica: &str) -> bool {
        let time = self.version.incr(replica);
        let entry = VersionVector::new();
        entry.witness(replica, time);

        let mut inner = self.inner.write();
        inner.entries.insert(value.into(), entry).is_none()
    }

    /// Adds multiple members for a specific replica. Returns the number of
    /// members that were not already present.
    pub fn add<I>(&self, values: I, replica: &str) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Member>,
    {
        let mut added = 0;
        for value in values {
            if self.add_one(value, replica) {
                added += 1;
            }
        }
        added
    }

    /// Removes a single member by value, returning the support that was
    /// removed. The caller asserts it has observed the current support, so
    /// nothing is deferred and the set-wide version does not change.
    pub fn remove_one(&self, value: &str) -> Option<VersionVector> {
        self.inner.write().entries.remove(value)
    }

    /// Removes a number of members, returning how many were present.
    pub fn remove<I>(&self, values: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        values
            .into_iter()
            .filter(|value| self.remove_one(value.as_ref()).is_some())
            .count()
    }

    /// Removes a member under a witnessing context.
    ///
    /// Returns `None` when the member was absent; otherwise the dots that
    /// survived the remove (empty when the context dominated all support).
    /// Surviving dots are concurrent adds the context never observed, and
    /// they keep the member in the set.
    pub fn remove_one_with_context(
        &self,
        value: &str,
        context: &VersionVector,
    ) -> Option<VersionVector> {
        let mut inner = self.inner.write();
        self.remove_under_lock(&mut inner, value, context)
    }

    /// Removes a number of members under one witnessing context, returning
    /// how many were present.
    pub fn remove_with_context<I>(&self, values: I, context: &VersionVector) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut inner = self.inner.write();
        values
            .into_iter()
            .filter(|value| {
                self.remove_under_lock(&mut inner, value.as_ref(), context)
                    .is_some()
            })
            .count()
    }

    fn remove_under_lock(
        &self,
        inner: &mut Inner,
        value: &str,
        context: &VersionVector,
    ) -> Option<VersionVector> {
        if !context.subtract(&self.version).is_empty() {
            // The context carries dots we have not witnessed; park the
            // removal until a merge advances our version far enough.
            tracing::debug!(value, "deferring removal with unseen context");
            inner
                .deferred
                .entry(context.dots())
                .or_default()
                .insert(value);
        }

        let existing = inner.entries.remove(value)?;

        let survivors = existing.subtract(context);
        if !survivors.is_empty() {
            // Dots the context never observed are concurrent adds; they win.
            inner.entries.insert(value.to_owned(), survivors.clone());
        }

        Some(survivors)
    }

    /// Returns a clone of the version vector supporting a member, or `None`
    /// when the member is absent.
    pub fn get_entry(&self, value: &str) -> Option<VersionVector> {
        self.inner.read().entries.get(value).cloned()
    }

    /// True when the set contains `value`.
    pub fn contains(&self, value: &str) -> bool {
        self.inner.read().entries.contains_key(value)
    }

    /// The number of members.
    pub fn cardinality(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// True when the set has no members.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// The current members, in no particular order.
    pub fn values(&self) -> Vec<Member> {
        self.inner.read().entries.keys().cloned().collect()
    }

    /// Calls `f` once per member, under the shared lock.
    pub fn each(&self, mut f: impl FnMut(&Member)) {
        for value in self.inner.read().entries.keys() {
            f(value);
        }
    }

    /// Returns a new set holding the union of this set and the other, added
    /// under the supplied replica. The result is a CRDT in its own right,
    /// not a view.
    pub fn union(&self, other: &dyn SetOperations, replica: &str) -> AwSet {
        let union = AwSet::new();
        union.add(self.values(), replica);
        union.add(other.values(), replica);
        union
    }

    /// Returns a new set holding the intersection of this set and the
    /// other, added under the supplied replica.
    pub fn intersect(&self, other: &dyn SetOperations, replica: &str) -> AwSet {
        let intersection = AwSet::new();
        for value in self.values() {
            if other.contains(&value) {
                intersection.add_one(value, replica);
            }
        }
        intersection
    }

    /// Indicates whether every member of this set is in the other.
    pub fn is_subset_of(&self, other: &dyn SetOperations) -> bool {
        self.values().iter().all(|value| other.contains(value))
    }

    /// The members of this set that are not in the other.
    pub fn difference(&self, other: &dyn SetOperations) -> Vec<Member> {
        self.values()
            .into_iter()
            .filter(|value| !other.contains(value))
            .collect()
    }

    /// Merges a peer's set into this one, producing a least upper bound of
    /// the two states.
    ///
    /// The peer is snapshotted first and the computation runs under this
    /// set's lock alone, so two set locks are never held together and
    /// `a.merge(&a)` is safe. Deferred removals are replayed after the lock
    /// is released.
    pub fn merge(&self, other: &AwSet) {
        let (mut other_remaining, other_deferred) = other.snapshot();
        let other_version = other.version.clone();

        {
            let mut inner = self.inner.write();
            let mut final_entries: HashMap<Member, VersionVector> = HashMap::new();

            for (value, version) in inner.entries.iter() {
                match other_remaining.remove(value) {
                    None => {
                        // The peer has no entry because it either never saw
                        // this add or saw it and removed it. If its version
                        // subsumes all our support, it removed it; drop.
                        if !version.subtract(&other_version).is_empty() {
                            final_entries.insert(value.clone(), version.clone());
                        }
                    }
                    Some(other_entry) => {
                        // Present on both sides, yet dots seen by exactly one
                        // peer's version may still have been removed there.
                        let common = version.intersection(&other_entry);
                        let luniq = version.subtract(&common);
                        let runiq = other_entry.subtract(&common);
                        let lkeep = luniq.subtract(&other_version);
                        let rkeep = runiq.subtract(&self.version);

                        common.merge(&lkeep);
                        common.merge(&rkeep);
                        if !common.is_empty() {
                            final_entries.insert(value.clone(), common);
                        }
                    }
                }
            }

            for (value, version) in other_remaining {
                let uniq = version.subtract(&self.version);
                if !uniq.is_empty() {
                    // The peer witnessed additions we have not seen.
                    final_entries.insert(value, uniq);
                }
            }

            for (context, other_set) in other_deferred {
                let bucket = inner.deferred.entry(context).or_default();
                for member in &other_set {
                    bucket.insert(member.clone());
                }
            }

            inner.entries = final_entries;
        }

        self.version.merge(&other_version);
        self.apply_deferred();
    }

    fn apply_deferred(&self) {
        let deferred = {
            let mut inner = self.inner.write();
            mem::take(&mut inner.deferred)
        };

        if deferred.is_empty() {
            return;
        }

        tracing::debug!(buckets = deferred.len(), "replaying deferred removals");
        for (context, entries) in deferred {
            // Contexts still not covered re-enter the deferred map through
            // the normal removal path.
            let context = VersionVector::from(context);
            self.remove_with_context(entries.values(), &context);
        }
    }

    fn snapshot(&self) -> (HashMap<Member, VersionVector>, DeferredMap) {
        let inner = self.inner.read();
        (inner.entries.clone(), inner.deferred.clone())
    }
}

impl Default for AwSet {
    fn default() -> Self {
        AwSet::new()
    }
}

impl SetOperations for AwSet {
    fn contains(&self, value: &str) -> bool {
        AwSet::contains(self, value)
    }

    fn cardinality(&self) -> usize {
        AwSet::cardinality(self)
    }

    fn is_empty(&self) -> bool {
        AwSet::is_empty(self)
    }

    fn values(&self) -> Vec<Member> {
        AwSet::values(self)
    }

    fn each(&self, f: &mut dyn FnMut(&Member)) {
        AwSet::each(self, f)
    }
}

impl Marshaler for AwSet {
    fn marshal(&self) -> Result<Vec<Segment>> {
        let inner = self.inner.read();
        let mut segments = Vec::with_capacity(1 + inner.entries.len() + inner.deferred.len());

        segments.push(Segment::root(self.version.marshal()?));

        for (value, version) in inner.entries.iter() {
            segments.push(Segment::new(
                segment::compose_key(ENTRY_SIGIL, value.as_bytes()),
                version.marshal()?,
            ));
        }

        for (context, deferred_set) in inner.deferred.iter() {
            let context = VersionVector::from(context.clone());
            segments.push(Segment::new(
                segment::compose_key(DEFERRED_SIGIL, &context.marshal()?),
                deferred_set.marshal()?,
            ));
        }

        Ok(segments)
    }

    fn unmarshal(&self, data: &[Segment]) -> Result<()> {
        let root = data.first().ok_or(Error::MissingRootSegment)?;
        let version = VersionVector::from_bytes(&root.value)?;

        let mut entries = HashMap::new();
        let mut deferred = DeferredMap::new();

        for seg in &data[1..] {
            let (sigil, rest) = segment::split_key(&seg.key_suffix)?;
            match sigil {
                ENTRY_SIGIL => {
                    let member = std::str::from_utf8(rest).map_err(|err| {
                        Error::Decode(format!("entry key is not valid UTF-8: {err}"))
                    })?;
                    entries.insert(member.to_owned(), VersionVector::from_bytes(&seg.value)?);
                }
                DEFERRED_SIGIL => {
                    // The context rides in the key suffix; the value bytes
                    // hold the members awaiting removal.
                    let context = VersionVector::from_bytes(rest)?;
                    deferred.insert(context.dots(), DeferredSet::from_bytes(&seg.value)?);
                }
                other => return Err(Error::UnknownKeySigil(other)),
            }
        }

        let mut inner = self.inner.write();
        inner.entries = entries;
        inner.deferred = deferred;
        drop(inner);

        self.version.reset(version.dots());
        Ok(())
    }
}

impl fmt::Debug for AwSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("AwSet")
            .field("version", &self.version)
            .field("entries", &inner.entries)
            .field("deferred", &inner.deferred)
            .finish()
    }
}
