//! Loading the configuration file from disk.

use super::Config;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name for rebazer within the platform config directory.
const CONFIG_DIR: &str = "rebazer";

/// Filename of the configuration file.
const CONFIG_FILE: &str = "config.toml";

/// Platform-specific default location, e.g. `~/.config/rebazer/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| Error::Config(format!("failed to parse configuration: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Load and validate the configuration file.
///
/// A missing file is an error: there is nothing to poll without it.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "configuration file {} does not exist",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    parse_config(&content).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}
