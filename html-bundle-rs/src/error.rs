use std::path::PathBuf;

/// Errors surfaced by a bundle run. Any of them aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read document file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse document file: {0}")]
    Parse(String),

    #[error("Failed to read config file {path:?}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Failed to bundle script {entry:?}")]
    Bundle {
        entry: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
