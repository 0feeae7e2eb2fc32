use crate::evaluator::DEFAULT_MAX_CALL_DEPTH;
use std::path::PathBuf;
use thiserror::Error;

pub const HISTORY_VAR: &str = "CARLAE_HISTORY";
pub const EDIT_MODE_VAR: &str = "CARLAE_EDIT_MODE";
pub const MAX_DEPTH_VAR: &str = "CARLAE_MAX_DEPTH";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EditMode {
    Vi,
    Emacs,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("CARLAE_EDIT_MODE must be 'vi' or 'emacs', got '{0}'")]
    InvalidEditMode(String),
    #[error("CARLAE_MAX_DEPTH must be a positive integer, got '{0}'")]
    InvalidMaxDepth(String),
}

/// Settings shared by the `carlae` runner and the interactive REPL.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub prompt: String,
    pub history_file: PathBuf,
    pub edit_mode: EditMode,
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prompt: "carlae> ".to_string(),
            history_file: PathBuf::from("carlae_history.txt"),
            edit_mode: EditMode::Vi,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Config {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from the defaults plus whatever `lookup` returns for
    /// each `CARLAE_*` variable.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Some(path) = lookup(HISTORY_VAR) {
            config.history_file = PathBuf::from(path);
        }
        if let Some(mode) = lookup(EDIT_MODE_VAR) {
            config.edit_mode = match mode.trim().to_ascii_lowercase().as_str() {
                "vi" => EditMode::Vi,
                "emacs" => EditMode::Emacs,
                _ => return Err(ConfigError::InvalidEditMode(mode)),
            };
        }
        if let Some(depth) = lookup(MAX_DEPTH_VAR) {
            config.max_call_depth = match depth.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidMaxDepth(depth)),
            };
        }
        Ok(config)
    }
}
