//! Puppet description, playback, loading and lifecycle.

pub mod definition;
pub mod instance;
pub mod lifecycle;
pub mod loader;
pub mod motion;

#[cfg(test)]
#[path = "../../tests/unit/puppet/fixture.rs"]
pub(crate) mod fixture;
