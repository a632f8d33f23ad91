use crate::build::BuildError;
use crate::manifest::ManifestError;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for jsrepo operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No jsrepo.json found in {start}")]
    ConfigNotFound { start: PathBuf },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl Error {
    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO_ERROR",
            Self::ConfigRead { .. } => "CONFIG_READ_FAILED",
            Self::ConfigParse { .. } => "CONFIG_INVALID",
            Self::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            Self::Build(e) => e.code(),
            Self::Manifest(e) => e.code(),
        }
    }
}
