//! Environment-driven settings shared by the library and the CLI.

use crate::analysis::AnalysisConfig;
use std::path::PathBuf;

/// Overrides the history file location.
pub const HISTORY_PATH_ENV: &str = "PROMPT_ARCHITECT_HISTORY";

/// Overrides the analysis model.
pub const ANALYSIS_MODEL_ENV: &str = "PROMPT_ARCHITECT_MODEL";

/// Resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Where history is persisted.
    pub history_path: PathBuf,
    /// Analysis model and sampling.
    pub analysis: AnalysisConfig,
}

impl Settings {
    /// Resolves settings from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let history_path = lookup(HISTORY_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_history_path);

        let mut analysis = AnalysisConfig::default();
        if let Some(model) = lookup(ANALYSIS_MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            analysis = analysis.with_model(model);
        }

        Self {
            history_path,
            analysis,
        }
    }

    /// Replaces the history path.
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }
}

/// `<data dir>/prompt-architect/history.json`, or the working directory when
/// the platform has no data directory.
pub fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("prompt-architect"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("history.json")
}
