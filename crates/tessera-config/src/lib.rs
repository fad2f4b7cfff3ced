//! Tessera Config
//!
//! This crate contains the serializable configuration types for the Tessera
//! execution engine.
//!
//! Configuration can be loaded from:
//! - an explicit JSON file (via CLI with `--config=config.json`)
//! - `$TESSERA_CONFIG_DIR/config.json`
//! - the platform config directory (`~/.config/tessera/config.json` on Linux)
//!
//! A missing file is not an error: every field has a default, so an empty
//! or absent config yields [`EngineConfig::default`].

mod engine;
mod error;
mod load;

pub use engine::{CheckpointConfig, EngineConfig};
pub use error::ConfigError;
pub use load::{CONFIG_DIR_ENV, config_path, load, load_from};
