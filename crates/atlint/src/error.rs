use std::path::PathBuf;

use thiserror::Error;

/// Checker errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Config(#[from] atlint_cfg::ConfigError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Unknown document: {0}")]
    UnknownDocument(String),
}

pub type Result<T> = std::result::Result<T, Error>;
