//! Error types for this crate.

use thiserror::Error;

/// Catch-all error for this crate. Failures at the engine boundary are fatal
/// by design: the Monte Carlo state is stochastic and partial recovery would
/// bias the sample.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid system or run parameters, detected at initialisation.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A pre-allocated buffer ran out of space mid-run; relaunch with larger
    /// caps.
    #[error("capacity exhausted: {0}")]
    Capacity(String),
    /// Error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Shorthand for results carrying this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
