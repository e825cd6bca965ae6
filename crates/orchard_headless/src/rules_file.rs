//! Loading rule sets from RON files.

use std::path::Path;

use orchard_core::data::GameRules;
use orchard_core::error::GameError;
use thiserror::Error;

/// Error type for rule file operations.
#[derive(Error, Debug)]
pub enum RulesFileError {
    /// File not found.
    #[error("Rules file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read rules file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse rules: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Failed to serialize RON.
    #[error("Failed to write rules: {0}")]
    WriteError(#[from] ron::Error),
    /// Parsed, but unusable.
    #[error(transparent)]
    Invalid(#[from] GameError),
}

/// Load and validate rules from a RON file.
pub fn load_rules(path: &Path) -> Result<GameRules, RulesFileError> {
    if !path.exists() {
        return Err(RulesFileError::FileNotFound(path.display().to_string()));
    }
    let source = std::fs::read_to_string(path)?;
    let rules: GameRules = ron::from_str(&source)?;
    rules.validate()?;
    tracing::info!(path = %path.display(), "loaded rules");
    Ok(rules)
}

/// Load rules from `path` if given, otherwise the built-in defaults.
pub fn load_rules_or_default(path: Option<&Path>) -> Result<GameRules, RulesFileError> {
    path.map_or_else(|| Ok(GameRules::default()), load_rules)
}

/// Write rules as pretty RON.
pub fn save_rules(rules: &GameRules, path: &Path) -> Result<(), RulesFileError> {
    let text = ron::ser::to_string_pretty(rules, ron::ser::PrettyConfig::default())?;
    std::fs::write(path, text)?;
    Ok(())
}
