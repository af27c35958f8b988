//! Shared value types, errors and the deterministic RNG.

pub mod core;
pub mod error;
pub mod rng;
