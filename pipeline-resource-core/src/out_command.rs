//! The write direction: set pipelines from local config files, then fingerprint
//! the resulting remote state of the team.

use std::path::PathBuf;
use tracing::{debug, error, info};

use crate::contract::{BoxError, ManifestLoader, PipelineSetter, RemoteService, Session};
use crate::error::{Error, Result};
use crate::fetch::{fetch_all, FetchOptions};
use crate::model::{OutParams, OutRequest, OutResponse, PipelineSpec};
use crate::persist;

/// Collaborators needed by [`OutCommand`].
pub struct OutDeps<'a, C: ?Sized, P: ?Sized, R: ?Sized, M: ?Sized> {
    pub session: &'a C,
    pub setter: &'a P,
    pub remote: &'a R,
    pub manifest: &'a M,
}

pub struct OutCommand<'a, C: ?Sized, P: ?Sized, R: ?Sized, M: ?Sized> {
    deps: OutDeps<'a, C, P, R, M>,
    sources_dir: PathBuf,
}

impl<'a, C, P, R, M> OutCommand<'a, C, P, R, M>
where
    C: Session + ?Sized,
    P: PipelineSetter + ?Sized,
    R: RemoteService + ?Sized,
    M: ManifestLoader + ?Sized,
{
    pub fn new(deps: OutDeps<'a, C, P, R, M>, sources_dir: impl Into<PathBuf>) -> Self {
        Self {
            deps,
            sources_dir: sources_dir.into(),
        }
    }

    pub async fn run(&self, request: OutRequest) -> Result<OutResponse> {
        debug!(?request, "Received out request");

        let team = request
            .source
            .primary_team()
            .ok_or_else(|| Error::Config("source.teams must name at least one team".into()))?;

        info!(concourse_target = %request.source.target, team = %team.name, "Performing login");
        self.deps
            .session
            .login(&request.source.target, team, request.source.insecure)
            .await
            .map_err(|source| {
                error!(error = %source, "Login failed");
                Error::Session { source }
            })?;
        debug!("Login successful");

        let specs = self.resolve_pipelines(&request.params)?;
        for spec in &specs {
            self.set_pipeline(spec).await?;
        }

        info!(team = %team.name, "Listing pipelines");
        let pipelines = self
            .deps
            .remote
            .list_pipelines(&team.name)
            .await
            .map_err(|source| Error::List {
                team: team.name.clone(),
                source,
            })?;
        debug!(?pipelines, "Found pipelines");

        let options = FetchOptions::with_limit(request.source.max_concurrent_fetches.unwrap_or(0));
        let remote = self.deps.remote;
        let outcomes = fetch_all(&pipelines, &options, move |pipeline| async move {
            let config = remote.fetch_config(&pipeline.team, &pipeline.name).await?;
            debug!(pipeline = %pipeline.name, content = %config.content, "Fetched pipeline config");
            Ok::<_, BoxError>(config.content)
        })
        .await?;

        Ok(OutResponse {
            version: persist::emit_fingerprint(&outcomes),
            metadata: Vec::new(),
        })
    }

    fn resolve_pipelines(&self, params: &OutParams) -> Result<Vec<PipelineSpec>> {
        match &params.pipelines_file {
            Some(file) => {
                let path = self.sources_dir.join(file);
                info!(path = %path.display(), "Loading pipelines file");
                self.deps
                    .manifest
                    .load(&path)
                    .map_err(|source| Error::Manifest { path, source })
            }
            None => Ok(params.pipelines.clone()),
        }
    }

    async fn set_pipeline(&self, spec: &PipelineSpec) -> Result<()> {
        let config_path = self.sources_dir.join(&spec.config_file);
        let vars_paths: Vec<PathBuf> = spec
            .vars_files
            .iter()
            .map(|v| self.sources_dir.join(v))
            .collect();

        info!(
            pipeline = %spec.name,
            config = %config_path.display(),
            vars_files = vars_paths.len(),
            "Setting pipeline"
        );
        let output = self
            .deps
            .setter
            .set_pipeline(&spec.name, &config_path, &vars_paths)
            .await
            .map_err(|source| {
                error!(pipeline = %spec.name, error = %source, "Failed to set pipeline");
                Error::SetPipeline {
                    pipeline: spec.name.clone(),
                    source,
                }
            })?;
        debug!(pipeline = %spec.name, output = %output, "Pipeline set");
        Ok(())
    }
}
