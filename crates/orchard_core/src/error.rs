//! Error types for the game simulation.
//!
//! The tick itself never fails; these errors come from building a
//! session out of rule data.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Rule data failed to parse.
    #[error("Failed to parse rules: {0}")]
    RulesParse(#[from] ron::error::SpannedError),

    /// Rule data parsed but is unusable. Holds every problem found.
    #[error("Invalid rules: {}", .0.join("; "))]
    InvalidRules(Vec<String>),

    /// A difficulty name did not match any level.
    #[error("Unknown difficulty '{0}' (expected easy, normal or hard)")]
    UnknownDifficulty(String),
}
