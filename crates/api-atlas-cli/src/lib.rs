//! ApiAtlas CLI — configuration, logging, and commands around the core library.

pub mod commands;
pub mod config;
pub mod error;

pub use config::{resolve_config_path, AtlasConfig, OriginConfig};
pub use error::{CliError, CliResult};
