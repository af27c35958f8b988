//! Adaptive layout: configuration, computation and memoization.

pub mod cache;
pub mod config;
pub mod engine;
