//! Typed errors for configuration misuse.
//!
//! Everything that touches I/O (store, provider, config file) returns
//! `anyhow::Result`. The variants here cover the cases where a caller hands
//! us a value we do not understand; parsing fails and no state changes.

use thiserror::Error;

/// Invalid-argument errors raised when parsing user-facing option values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Shuffle mode string was not one of the four known modes
    #[error("unknown shuffle mode '{0}' (expected smart, random, sequential or mood)")]
    UnknownShuffleMode(String),

    /// Discovery rate string was not a known preset
    #[error("unknown discovery rate '{0}' (expected conservative, moderate or aggressive)")]
    UnknownRate(String),

    /// Search strategy string was not a known strategy
    #[error("unknown search strategy '{0}' (expected direct, artist, related, genre or mixed)")]
    UnknownStrategy(String),
}
