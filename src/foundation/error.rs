/// Convenience alias used by every fallible API in the crate.
pub type PuppetResult<T> = Result<T, PuppetError>;

/// Error taxonomy for the stage.
///
/// Load and context errors are meant to reach the caller. Configuration errors raised from inside
/// the per-frame path are logged and swallowed by the caller instead of being propagated.
#[derive(thiserror::Error, Debug)]
pub enum PuppetError {
    /// Malformed configuration, e.g. view bounds with `right <= left`.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Puppet definition fetch, parse or texture upload failure.
    #[error("load error: {0}")]
    Load(String),

    /// Drawing-context creation or usage failure.
    #[error("context error: {0}")]
    Context(String),

    /// Invalid argument or invalid document content.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other failure, with its context chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PuppetError {
    /// Build a [`PuppetError::Configuration`].
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`PuppetError::Load`].
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Build a [`PuppetError::Context`].
    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context(msg.into())
    }

    /// Build a [`PuppetError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PuppetError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` for errors raised while loading a puppet.
    pub fn is_load(&self) -> bool {
        matches!(self, Self::Load(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
