//! Error type for the command line front end.

use api_atlas::AtlasError;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error(transparent)]
    Atlas(#[from] AtlasError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;
