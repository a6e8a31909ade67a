//! # contract: collaborator interfaces used by the `in` and `out` directions
//!
//! The core never talks to the network, the `fly` tool or the filesystem
//! directly. Each of those concerns sits behind one of the traits below and
//! is injected into [`crate::in_command::InCommand`] or
//! [`crate::out_command::OutCommand`] by the caller.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`. Mocks (`MockRemoteService`,
//!   `MockStorage`, ...) are exported behind the default `test-export-mocks`
//!   feature so the binary crate's tests can use them too.
//!
//! ## Errors
//! - Implementations return [`BoxError`]; the commands wrap it into
//!   [`crate::Error`] with the pipeline or path that was involved.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use crate::error::BoxError;
use crate::model::{PipelineConfig, PipelineRef, PipelineSpec, Team};

/// Read access to pipelines on the remote CI service.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// List every pipeline belonging to `team`, in the order the service returns them.
    async fn list_pipelines(&self, team: &str) -> Result<Vec<PipelineRef>, BoxError>;

    /// Fetch the config document of a single pipeline.
    async fn fetch_config(&self, team: &str, name: &str) -> Result<PipelineConfig, BoxError>;
}

/// Uploads pipeline configs. Used only by the `out` direction.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait PipelineSetter: Send + Sync {
    /// Set (create or update) pipeline `name` from a config file plus optional vars files.
    /// Returns whatever output the underlying tool produced.
    async fn set_pipeline(
        &self,
        name: &str,
        config_path: &Path,
        vars_paths: &[PathBuf],
    ) -> Result<String, BoxError>;
}

/// Establishes an authenticated session against the target.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait Session: Send + Sync {
    async fn login(&self, target: &str, team: &Team, insecure: bool) -> Result<(), BoxError>;
}

/// Minimal filesystem surface needed by the persister.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create `path` and any missing parents. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Write `contents` to `path`, replacing any existing file.
    async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()>;
}

/// Reads a pipelines manifest (a file listing the pipelines to set).
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
pub trait ManifestLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<PipelineSpec>, BoxError>;
}
