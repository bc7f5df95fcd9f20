use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use vscore::error::CoreError;

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode or decode {}: {source}", .path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to parse configuration {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("{}: {source}", .path.display())]
    Cells {
        path: PathBuf,
        #[source]
        source: CoreError,
    },
}

impl CleanError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        CleanError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn codec(path: &Path, source: bincode::Error) -> Self {
        CleanError::Codec {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn malformed(path: &Path, message: impl Into<String>) -> Self {
        CleanError::Malformed {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn cells(path: &Path, source: CoreError) -> Self {
        CleanError::Cells {
            path: path.to_path_buf(),
            source,
        }
    }
}
