#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(deprecated)]

//!
//! Concord-Core is a library of state-based Conflict-free Replicated Data
//! Types.
//!
//! Replicas mutate their local copy of a value and periodically merge peer
//! state; merges are commutative, associative, and idempotent, so every
//! replica that has seen the same states converges to the same value. The
//! crate provides an add-wins observed-remove set without tombstones
//! ([`set::AwSet`]), a positive-negative counter ([`counter::PnCounter`]),
//! and a last-write-wins register ([`register::LwwRegister`]), all built on
//! a shared causality layer ([`time`]).
//!
//! Marshalled state is split into neutral `(key_suffix, value)` segments
//! ([`segment::Segment`]) so an external keyed store can persist it without
//! understanding its contents.

// Shared, crate-wide type aliases.
pub mod types;

// Crate error type.
pub mod error;

// Causality layer: Lamport clock and version vector.
pub mod time;

// The segment envelope and key composition.
pub mod segment;

// The add-wins set and its deferred-removal support.
pub mod set;

// Positive-negative counter.
pub mod counter;

// Last-write-wins register.
pub mod register;

// CRDT contracts and the tagged value type.
pub mod value;

pub use counter::PnCounter;
pub use error::{Error, Result};
pub use register::LwwRegister;
pub use segment::Segment;
pub use set::AwSet;
pub use time::{CausalOrder, LamportClock, LamportTime, VersionVector};
pub use types::{Member, ReplicaId};
pub use value::{Kind, Marshaler, SetOperations, Value, PROTO_VERSION};
