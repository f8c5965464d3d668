//! Error taxonomy for frame extraction.
//!
//! Message-level errors (`Decode`, `Persist`) are logged and counted by the
//! stream extractor. `Handle` ends one stream only. `Config` is raised before
//! any worker starts.

use std::path::PathBuf;

use thiserror::Error;

use crate::mappings::DecodeError;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("stream {stream}: no topic matching {pattern}")]
    StreamAbsent { stream: String, pattern: String },

    #[error("stream {stream} frame {seq}: {source}")]
    Decode {
        stream: String,
        seq: u64,
        #[source]
        source: DecodeError,
    },

    #[error("stream {stream} frame {seq}: failed to write {}: {source}", path.display())]
    Persist {
        stream: String,
        seq: u64,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("bag {}: {source}", path.display())]
    Handle {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn worker for stream {stream}: {source}")]
    Spawn {
        stream: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ExtractError {
    pub(crate) fn handle(path: impl Into<PathBuf>, source: sqlx::Error) -> Self {
        Self::Handle {
            path: path.into(),
            source,
        }
    }
}
