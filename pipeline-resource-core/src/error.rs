//! Error type shared by every stage of the `in` and `out` directions.
//!
//! Collaborator failures arrive as [`BoxError`] and are wrapped here with the
//! context the caller needs (which pipeline, which path). The CLI maps
//! [`Error::DirectoryCreation`] to its own exit code, see [`Error::is_fatal`].

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by collaborator implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// At least one concurrent fetch failed. Reports the failure at the lowest index.
    #[error("failed to fetch config for pipeline '{pipeline}' ({failed} of {total} fetches failed): {source}")]
    Fetch {
        pipeline: String,
        failed: usize,
        total: usize,
        #[source]
        source: BoxError,
    },

    #[error("failed to list pipelines for team '{team}': {source}")]
    List {
        team: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load pipelines file {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("login failed: {source}")]
    Session {
        #[source]
        source: BoxError,
    },

    #[error("failed to set pipeline '{pipeline}': {source}")]
    SetPipeline {
        pipeline: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid request: {0}")]
    Config(String),
}

impl Error {
    /// True when the run cannot continue at all, as opposed to an ordinary failed step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DirectoryCreation { .. })
    }
}
