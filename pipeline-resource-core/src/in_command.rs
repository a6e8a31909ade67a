//! The read direction: download every pipeline config of a team into a directory.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::aggregate::{self, PIPELINE_FILE_EXTENSION};
use crate::contract::{RemoteService, Storage};
use crate::error::{Error, Result};
use crate::fetch::{fetch_all, FetchOptions};
use crate::model::{InRequest, InResponse};
use crate::persist;

pub struct InCommand<'a, R: ?Sized, S: ?Sized> {
    remote: &'a R,
    storage: &'a S,
    download_dir: PathBuf,
}

impl<'a, R, S> InCommand<'a, R, S>
where
    R: RemoteService + ?Sized,
    S: Storage + ?Sized,
{
    pub fn new(remote: &'a R, storage: &'a S, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            storage,
            download_dir: download_dir.into(),
        }
    }

    pub async fn run(&self, request: InRequest) -> Result<InResponse> {
        debug!(?request, "Received in request");

        persist::ensure_dir(self.storage, &self.download_dir).await?;

        let team = request
            .source
            .primary_team()
            .ok_or_else(|| Error::Config("source.teams must name at least one team".into()))?
            .name
            .clone();

        info!(team = %team, "Listing pipelines");
        let pipelines = self
            .remote
            .list_pipelines(&team)
            .await
            .map_err(|source| Error::List {
                team: team.clone(),
                source,
            })?;
        debug!(count = pipelines.len(), "Found pipelines");

        let options = FetchOptions::with_limit(request.source.max_concurrent_fetches.unwrap_or(0));
        let remote = self.remote;
        let outcomes = fetch_all(&pipelines, &options, move |pipeline| async move {
            remote
                .fetch_config(&pipeline.team, &pipeline.name)
                .await
                .map(|config| config.content)
        })
        .await?;

        let files = aggregate::to_files(&outcomes, PIPELINE_FILE_EXTENSION);
        persist::persist_files(self.storage, &self.download_dir, &files).await?;

        info!(
            pipelines = outcomes.len(),
            dir = %self.download_dir.display(),
            "In complete"
        );
        Ok(InResponse {
            version: request.version.unwrap_or_default(),
            metadata: Vec::new(),
        })
    }
}
