use std::path::PathBuf;

use pullcache_engine::PullError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config file {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Download engine error: {0}")]
    Engine(#[from] PullError),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Shut down after a cache placement failure")]
    FatalShutdown,
}
