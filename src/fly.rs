//! Runs the `fly` CLI for login and `set-pipeline`.
//!
//! Each [`FlyCli`] uses its own target alias so that concurrent runs never
//! overwrite each other's entry in `~/.flyrc`. Callers remove the alias with
//! [`FlyCli::delete_target`] once they are done.
//!
//! [`FlyConfigRemote`] reads configs through `fly get-pipeline`, which is where
//! the `out` direction takes the content it checksums from.

use async_trait::async_trait;
use pipeline_resource_core::contract::{BoxError, PipelineSetter, RemoteService, Session};
use pipeline_resource_core::model::{PipelineConfig, PipelineRef, Team};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use uuid::Uuid;

pub const FLY_BINARY_ENV: &str = "FLY_BINARY_PATH";
const DEFAULT_FLY_BINARY: &str = "fly";

#[derive(Debug, Clone)]
pub struct FlyCli {
    binary: PathBuf,
    target_alias: String,
}

impl FlyCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            target_alias: format!("pipeline-resource-{}", Uuid::new_v4()),
        }
    }

    /// Uses `$FLY_BINARY_PATH`, or `fly` from `PATH`.
    pub fn from_env() -> Self {
        let binary = std::env::var_os(FLY_BINARY_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FLY_BINARY));
        Self::new(binary)
    }

    pub fn target_alias(&self) -> &str {
        &self.target_alias
    }

    /// `fly get-pipeline` output for `name` in the logged-in team, verbatim.
    pub async fn get_pipeline(&self, name: &str) -> Result<String, BoxError> {
        self.run("get-pipeline", vec!["-p".into(), name.into()]).await
    }

    /// Remove this instance's target alias from `~/.flyrc`.
    pub async fn delete_target(&self) -> Result<(), BoxError> {
        self.run("delete-target", Vec::new()).await?;
        tracing::debug!(fly_target = %self.target_alias, "Deleted fly target");
        Ok(())
    }

    /// Run `fly -t <alias> <subcommand> <args...>` and return its stdout.
    /// Arguments are never logged since they may carry credentials.
    async fn run(&self, subcommand: &str, args: Vec<OsString>) -> Result<String, BoxError> {
        tracing::debug!(
            binary = %self.binary.display(),
            fly_target = %self.target_alias,
            subcommand,
            "Running fly"
        );
        let output = Command::new(&self.binary)
            .arg("-t")
            .arg(&self.target_alias)
            .arg(subcommand)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, binary = %self.binary.display(), "Failed to launch fly");
                format!("failed to launch {}: {e}", self.binary.display())
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(subcommand, status = %output.status, stderr = %stderr, "fly exited with non-zero code");
            return Err(format!("fly {subcommand} exited with {}: {}", output.status, stderr.trim()).into());
        }
        tracing::debug!(subcommand, stdout = %stdout, "fly completed");
        Ok(stdout)
    }
}

#[async_trait]
impl Session for FlyCli {
    async fn login(&self, target: &str, team: &Team, insecure: bool) -> Result<(), BoxError> {
        let mut args: Vec<OsString> = vec![
            "-c".into(),
            target.into(),
            "-n".into(),
            team.name.clone().into(),
        ];
        if !team.username.is_empty() {
            args.extend([
                "-u".into(),
                team.username.clone().into(),
                "-p".into(),
                team.password.clone().into(),
            ]);
        }
        if insecure {
            args.push("-k".into());
        }
        self.run("login", args).await?;
        tracing::info!(fly_target = %self.target_alias, team = %team.name, "Logged in with fly");
        Ok(())
    }
}

#[async_trait]
impl PipelineSetter for FlyCli {
    async fn set_pipeline(
        &self,
        name: &str,
        config_path: &Path,
        vars_paths: &[PathBuf],
    ) -> Result<String, BoxError> {
        let mut args: Vec<OsString> = vec![
            "-n".into(),
            "-p".into(),
            name.into(),
            "-c".into(),
            config_path.into(),
        ];
        for vars in vars_paths {
            args.push("-l".into());
            args.push(vars.into());
        }
        self.run("set-pipeline", args).await
    }
}

/// [`RemoteService`] that lists through `listing` and reads each config with
/// `fly get-pipeline`. The fly session must already be logged in to the team.
pub struct FlyConfigRemote<'a, L: ?Sized> {
    listing: &'a L,
    fly: &'a FlyCli,
}

impl<'a, L: RemoteService + ?Sized> FlyConfigRemote<'a, L> {
    pub fn new(listing: &'a L, fly: &'a FlyCli) -> Self {
        Self { listing, fly }
    }
}

#[async_trait]
impl<L: RemoteService + ?Sized> RemoteService for FlyConfigRemote<'_, L> {
    async fn list_pipelines(&self, team: &str) -> Result<Vec<PipelineRef>, BoxError> {
        self.listing.list_pipelines(team).await
    }

    async fn fetch_config(&self, _team: &str, name: &str) -> Result<PipelineConfig, BoxError> {
        let content = self.fly.get_pipeline(name).await?;
        Ok(PipelineConfig {
            content,
            raw_version: None,
        })
    }
}
