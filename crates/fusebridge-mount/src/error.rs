//! Mount runtime errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while preparing or running a mount.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("mountpoint {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("mount failed: {0}")]
    Mount(#[source] std::io::Error),

    #[error("could not unmount {0}")]
    Unmount(PathBuf),

    #[error("session thread failed: {0}")]
    Session(String),
}

impl MountError {
    pub fn config_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigRead {
            path: path.into(),
            source,
        }
    }

    pub fn config_parse(path: impl Into<PathBuf>, source: ron::error::SpannedError) -> Self {
        Self::ConfigParse {
            path: path.into(),
            source,
        }
    }
}

pub type MountResult<T> = Result<T, MountError>;
