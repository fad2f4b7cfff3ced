//! Config file discovery and loading.

use std::path::{Path, PathBuf};

use crate::engine::EngineConfig;
use crate::error::ConfigError;

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "TESSERA_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.json";

/// Resolve the default config file location.
///
/// `$TESSERA_CONFIG_DIR/config.json` wins; otherwise the platform config
/// directory is used. Returns `None` when neither can be determined.
pub fn config_path() -> Option<PathBuf> {
  if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
    return Some(PathBuf::from(dir).join(CONFIG_FILE_NAME));
  }

  dirs::config_dir().map(|dir| dir.join("tessera").join(CONFIG_FILE_NAME))
}

/// Load configuration from the default location.
///
/// A missing file yields the defaults.
pub fn load() -> Result<EngineConfig, ConfigError> {
  match config_path() {
    Some(path) => load_from(&path),
    None => Ok(EngineConfig::default()),
  }
}

/// Load configuration from an explicit path.
///
/// A missing file yields the defaults; an unreadable or malformed file is an
/// error.
pub fn load_from(path: &Path) -> Result<EngineConfig, ConfigError> {
  let content = match std::fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(EngineConfig::default()),
    Err(e) => {
      return Err(ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
      });
    }
  };

  if content.trim().is_empty() {
    return Ok(EngineConfig::default());
  }

  serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
    path: path.to_path_buf(),
    source: e,
  })
}
