use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;
use crate::job::Phase;

#[derive(Debug, Error)]
pub enum PressError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No manifest at {0}. Run `pdfsqueeze init` first.")]
    ManifestNotFound(PathBuf),

    #[error("A manifest already exists at {0}. Use --force to replace it.")]
    ManifestExists(PathBuf),

    #[error("No API keys configured in {0}. Run `pdfsqueeze keys add <KEY>` first.")]
    NoKeys(PathBuf),

    #[error("Unknown API key: {0}")]
    UnknownKey(String),

    #[error("API key already configured: {0}")]
    DuplicateKey(String),

    #[error("{0} is outside the source area {1}")]
    OutsideSourceArea(PathBuf, PathBuf),

    #[error("{filename} failed during {phase}: {source}")]
    Job {
        filename: String,
        phase: Phase,
        #[source]
        source: Box<PressError>,
    },

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PressError {
    /// The API error at the bottom of a job failure, if there is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            PressError::Api(err) => Some(err),
            PressError::Job { source, .. } => source.api_error(),
            _ => None,
        }
    }
}
