use serde::{Deserialize, Serialize};

/// Default nesting limit for element and value resolution.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default minimum length for a string to be treated as a secret.
pub const DEFAULT_MIN_SECRET_LENGTH: usize = 8;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Maximum resolution depth before execution fails.
  ///
  /// Resolution assumes an acyclic tree; this bounds runaway recursion such
  /// as a component that always returns another instance of itself.
  pub max_depth: usize,
  /// Execution tree recording.
  pub checkpoint: CheckpointConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_depth: DEFAULT_MAX_DEPTH,
      checkpoint: CheckpointConfig::default(),
    }
  }
}

/// Settings for the in-memory execution tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
  /// Record component invocations into a checkpoint tree.
  pub enabled: bool,
  /// Strings shorter than this are never registered as secrets.
  pub min_secret_length: usize,
}

impl Default for CheckpointConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      min_secret_length: DEFAULT_MIN_SECRET_LENGTH,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_object_uses_defaults() {
    let config: EngineConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, EngineConfig::default());
  }

  #[test]
  fn partial_checkpoint_section_keeps_other_defaults() {
    let config: EngineConfig =
      serde_json::from_str(r#"{ "checkpoint": { "enabled": false } }"#).unwrap();
    assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    assert!(!config.checkpoint.enabled);
    assert_eq!(config.checkpoint.min_secret_length, DEFAULT_MIN_SECRET_LENGTH);
  }
}
