//! Path resolution utilities.

use crate::env::{self, vars};
use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the Atelier base directory (`$ATELIER_HOME` or `~/.atelier`).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::get_var(vars::ATELIER_HOME) {
        return Ok(expand_tilde(&home));
    }
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".atelier"))
}

/// Get the main config file path (`$ATELIER_CONFIG` or `<base>/atelier.json5`).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    if let Some(path) = env::get_var(vars::ATELIER_CONFIG) {
        return Ok(expand_tilde(&path));
    }
    Ok(base_dir()?.join("atelier.json5"))
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
