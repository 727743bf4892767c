//! Logical-time utilities: the scalar Lamport clock and the version vector.
//!
//! These decide causal order between events across replicas; everything else
//! in the crate is built on top of them.

pub mod lamport;
pub mod vector;

pub use lamport::{LamportClock, LamportTime};
pub use vector::{CausalOrder, Dots, VersionVector};
