//! Analysis configuration.

use thiserror::Error;

/// Default cap on whole-program analysis rounds.
pub const DEFAULT_MAX_ROUNDS: usize = 5;

/// Default comment text that marks the next label as a subroutine entry.
pub const DEFAULT_SUBROUTINE_MARKER: &str = "@SUBROUTINE";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max rounds must be at least 1")]
    ZeroRounds,

    #[error("subroutine marker must not be empty")]
    EmptyMarker,
}

/// Knobs for one analysis of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Rounds of CFG build and dataflow before giving up on a fixed point.
    pub max_rounds: usize,
    /// Substring that marks a subroutine entry on the line above its label.
    pub subroutine_marker: String,
    /// When disabled, markers are ignored and only the main entry is traced.
    pub subroutine_checking: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            subroutine_marker: DEFAULT_SUBROUTINE_MARKER.to_string(),
            subroutine_checking: true,
        }
    }
}

impl AnalysisConfig {
    #[must_use]
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    #[must_use]
    pub fn with_subroutine_marker(mut self, marker: impl Into<String>) -> Self {
        self.subroutine_marker = marker.into();
        self
    }

    #[must_use]
    pub fn with_subroutine_checking(mut self, enabled: bool) -> Self {
        self.subroutine_checking = enabled;
        self
    }

    /// Reject settings the analysis cannot run with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroRounds`] or [`ConfigError::EmptyMarker`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if self.subroutine_marker.trim().is_empty() {
            return Err(ConfigError::EmptyMarker);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.subroutine_marker, "@SUBROUTINE");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_validation() {
        let config = AnalysisConfig::default()
            .with_max_rounds(0)
            .with_subroutine_checking(false);
        assert!(!config.subroutine_checking);
        assert_eq!(config.validate(), Err(ConfigError::ZeroRounds));

        let config = AnalysisConfig::default().with_subroutine_marker("  ");
        assert_eq!(config.validate(), Err(ConfigError::EmptyMarker));
    }
}
