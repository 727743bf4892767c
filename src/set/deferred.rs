//!
//! Pending removals whose causal context has not been witnessed yet.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::time::vector::Dots;
use crate::types::Member;

/// Members queued for removal under one shared context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeferredSet {
    members: BTreeSet<Member>,
}

impl DeferredSet {
    /// Returns a new, empty deferred set.
    pub fn new() -> Self {
        DeferredSet::default()
    }

    /// Parses a marshalled payload into a fresh deferred set.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Queues a member.
    pub fn insert(&mut self, member: impl Into<Member>) {
        self.members.insert(member.into());
    }

    /// The queued members.
    pub fn values(&self) -> Vec<Member> {
        self.members.iter().cloned().collect()
    }

    /// Iterates over the queued members.
    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Serialises the deferred set into an opaque byte payload.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<'a> IntoIterator for &'a DeferredSet {
    type Item = &'a Member;
    type IntoIter = std::collections::btree_set::Iter<'a, Member>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

/// Pending removals keyed by the structural snapshot of their remove
/// context.
///
/// Keying is structural rather than by handle identity: identity cannot
/// survive the segment codec, and the ordered snapshot doubles as a
/// canonical form, so two structurally equal contexts share one bucket.
pub type DeferredMap = BTreeMap<Dots, DeferredSet>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates_members() {
        let mut deferred = DeferredSet::new();
        deferred.insert("foo");
        deferred.insert("foo");
        deferred.insert("bar");

        assert_eq!(deferred.values(), vec!["bar".to_string(), "foo".to_string()]);
    }

    #[test]
    fn marshal_round_trips() {
        let mut deferred = DeferredSet::new();
        deferred.insert("foo");
        deferred.insert("bar");

        let data = deferred.marshal().unwrap();
        assert_eq!(DeferredSet::from_bytes(&data).unwrap(), deferred);
    }

    #[test]
    fn structurally_equal_contexts_share_a_bucket() {
        let mut map = DeferredMap::new();

        let ctx_a: Dots = [("r1".to_string(), 5)].into_iter().collect();
        let ctx_b: Dots = [("r1".to_string(), 5)].into_iter().collect();

        map.entry(ctx_a).or_default().insert("foo");
        map.entry(ctx_b).or_default().insert("bar");

        assert_eq!(map.len(), 1);
    }
}
