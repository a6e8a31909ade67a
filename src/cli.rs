///
/// This module implements the CLI interface of pipeline-resource: command
/// parsing, wiring of the real collaborators, and the stdin/stdout protocol.
///
/// All fetch, aggregate and persist logic lives in `pipeline-resource-core`.
/// This module is strictly CLI glue.
///
/// ## Protocol
/// - The request JSON is read from stdin.
/// - The response JSON is written to stdout. Logs go to stderr.
///
/// ## Exit codes
/// - `0` success, `1` any failure, `3` the destination directory could not be created.
use crate::concourse::ConcourseClient;
use crate::fly::{FlyCli, FlyConfigRemote};
use crate::load_config::{parse_request, YamlManifestLoader};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use pipeline_resource_core::in_command::InCommand;
use pipeline_resource_core::model::{InRequest, OutRequest, Source, Team};
use pipeline_resource_core::out_command::{OutCommand, OutDeps};
use pipeline_resource_core::persist::{self, LocalStorage};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_FATAL: u8 = 3;

/// CLI for pipeline-resource: download pipeline configs, or set pipelines and checksum them.
#[derive(Parser)]
#[clap(
    name = "pipeline-resource",
    version,
    about = "Download pipeline configs of a team, or set pipelines and report a checksum of the team's configs"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write every pipeline config of the source's team to <DIR>/<pipeline>.yml
    In {
        /// Destination directory
        dir: PathBuf,
    },
    /// Set pipelines from config files under <DIR>, then report the checksum of all configs
    Out {
        /// Directory that config, vars and pipelines files are relative to
        dir: PathBuf,
    },
}

/// Read the request from stdin, execute the command, print the response to stdout.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let mut raw = String::new();
    tokio::io::stdin().read_to_string(&mut raw).await?;

    let response = execute(cli.command, &raw).await?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(response.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Execute `command` against a raw request and return the response JSON.
pub async fn execute(command: Commands, raw_request: &str) -> Result<String> {
    match command {
        Commands::In { dir } => {
            let request: InRequest = parse_request(raw_request)?;
            tracing::info!(command = "in", dir = %dir.display(), "Starting in");
            // The destination must exist before anything talks to the service.
            persist::ensure_dir(&LocalStorage, &dir).await?;
            let team = primary_team(&request.source)?;
            let client = ConcourseClient::login(&request.source.target, team, request.source.insecure)
                .await
                .map_err(|e| anyhow!("Failed to authenticate against {}: {e}", request.source.target))?;

            let response = InCommand::new(&client, &LocalStorage, dir).run(request).await?;
            tracing::info!(command = "in", "In complete");
            Ok(serde_json::to_string(&response)?)
        }
        Commands::Out { dir } => {
            let request: OutRequest = parse_request(raw_request)?;
            tracing::info!(command = "out", dir = %dir.display(), "Starting out");
            let team = primary_team(&request.source)?;
            let client = ConcourseClient::login(&request.source.target, team, request.source.insecure)
                .await
                .map_err(|e| anyhow!("Failed to authenticate against {}: {e}", request.source.target))?;
            let fly = FlyCli::from_env();
            let remote = FlyConfigRemote::new(&client, &fly);

            let command = OutCommand::new(
                OutDeps {
                    session: &fly,
                    setter: &fly,
                    remote: &remote,
                    manifest: &YamlManifestLoader,
                },
                dir,
            );
            let result = command.run(request).await;
            if let Err(e) = fly.delete_target().await {
                tracing::warn!(error = %e, fly_target = %fly.target_alias(), "Failed to delete fly target");
            }
            let response = result?;
            tracing::info!(
                command = "out",
                checksum = ?response.version.pipelines_checksum,
                "Out complete"
            );
            Ok(serde_json::to_string(&response)?)
        }
    }
}

fn primary_team(source: &Source) -> Result<&Team> {
    source
        .primary_team()
        .ok_or_else(|| pipeline_resource_core::Error::Config("source.teams must name at least one team".into()).into())
}

/// Process exit code for a failed run.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<pipeline_resource_core::Error>() {
        Some(e) if e.is_fatal() => EXIT_FATAL,
        _ => EXIT_FAILURE,
    }
}
