//!
//! Contracts shared by every CRDT value, and the tagged value type used at
//! the polymorphism boundary.

use std::fmt;

use crate::counter::PnCounter;
use crate::error::{Error, Result};
use crate::register::LwwRegister;
use crate::segment::Segment;
use crate::set::awset::AwSet;
use crate::types::Member;

/// Protocol version of the marshalled surface, of the form
/// `major.minor.patch-label`.
pub const PROTO_VERSION: &str = "1.0.0-alpha.0";

/// Splitting state into keyed segments and reassembling it from them.
///
/// `unmarshal(marshal(v))` must reproduce `v` structurally.
pub trait Marshaler {
    /// Serialises the value's state into a list of segments. The returned
    /// segments are freshly allocated and owned by the caller.
    fn marshal(&self) -> Result<Vec<Segment>>;

    /// Replaces the value's state with the state parsed from `data`.
    fn unmarshal(&self, data: &[Segment]) -> Result<()>;
}

/// The query surface a set capability exposes. Set algebra on [`AwSet`]
/// accepts any implementor, so sets of different kinds can interoperate.
pub trait SetOperations {
    /// True when the set contains `value`.
    fn contains(&self, value: &str) -> bool;

    /// The number of members.
    fn cardinality(&self) -> usize;

    /// True when the set has no members.
    fn is_empty(&self) -> bool;

    /// The current members.
    fn values(&self) -> Vec<Member>;

    /// Calls `f` once per member.
    fn each(&self, f: &mut dyn FnMut(&Member));
}

/// Discriminates the kinds of [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// An add-wins set.
    Set,
    /// A positive-negative counter.
    Counter,
    /// A last-write-wins register.
    Register,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Set => "set",
            Kind::Counter => "counter",
            Kind::Register => "register",
        };
        f.write_str(name)
    }
}

/// A CRDT value of any supported kind.
///
/// Merging is only defined between values of the same kind; a cross-kind
/// merge is rejected with [`Error::TypeMismatch`] rather than coerced.
pub enum Value {
    /// An add-wins set.
    Set(AwSet),
    /// A positive-negative counter.
    Counter(PnCounter),
    /// A last-write-wins register.
    Register(LwwRegister),
}

impl Value {
    /// The kind tag of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Set(_) => Kind::Set,
            Value::Counter(_) => Kind::Counter,
            Value::Register(_) => Kind::Register,
        }
    }

    /// Merges a peer's value of the same kind into this one.
    pub fn merge(&self, other: &Value) -> Result<()> {
        match (self, other) {
            (Value::Set(ours), Value::Set(theirs)) => {
                ours.merge(theirs);
                Ok(())
            }
            (Value::Counter(ours), Value::Counter(theirs)) => {
                ours.merge(theirs);
                Ok(())
            }
            (Value::Register(ours), Value::Register(theirs)) => ours.merge(theirs),
            (ours, theirs) => Err(Error::TypeMismatch {
                left: ours.kind(),
                right: theirs.kind(),
            }),
        }
    }
}

impl Marshaler for Value {
    fn marshal(&self) -> Result<Vec<Segment>> {
        match self {
            Value::Set(set) => set.marshal(),
            Value::Counter(counter) => counter.marshal(),
            Value::Register(register) => register.marshal(),
        }
    }

    fn unmarshal(&self, data: &[Segment]) -> Result<()> {
        match self {
            Value::Set(set) => set.unmarshal(data),
            Value::Counter(counter) => counter.unmarshal(data),
            Value::Register(register) => register.unmarshal(data),
        }
    }
}
