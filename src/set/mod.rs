//!
//! The add-wins observed-remove set and its deferred-removal support.

pub mod awset;
pub mod deferred;

pub use awset::AwSet;
pub use deferred::{DeferredMap, DeferredSet};
