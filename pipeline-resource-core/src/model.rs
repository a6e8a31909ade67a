//! Request, response and pipeline data types.
//!
//! Requests arrive as JSON on stdin and responses leave as JSON on stdout; the
//! types here are the serde shapes of both, plus the in-memory values the
//! fetch engine passes between stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one pipeline on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub name: String,
    pub team: String,
}

impl PipelineRef {
    pub fn new(name: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team: team.into(),
        }
    }
}

/// A single pipeline's config document as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub content: String,
    /// Version identifier the service attaches to the config, if any.
    pub raw_version: Option<String>,
}

/// Successful result of fetching the pipeline at `index` of the input list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub index: usize,
    pub pipeline: PipelineRef,
    pub content: String,
}

/// One file to be written by the persister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFile {
    pub filename: String,
    pub contents: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Team")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resource source configuration shared by both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub target: String,
    #[serde(default)]
    pub teams: Vec<Team>,
    /// Skip TLS verification when talking to the target.
    #[serde(default)]
    pub insecure: bool,
    /// Upper bound on concurrent config fetches. Unbounded when absent.
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,
}

impl Source {
    /// The team both directions operate on: the first one configured.
    pub fn primary_team(&self) -> Option<&Team> {
        self.teams.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines_checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InRequest {
    pub source: Source,
    #[serde(default)]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InResponse {
    pub version: Version,
    pub metadata: Vec<Metadata>,
}

/// A pipeline to be set by the `out` direction. Paths are relative to the sources directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    pub config_file: String,
    #[serde(default)]
    pub vars_files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutParams {
    #[serde(default)]
    pub pipelines: Vec<PipelineSpec>,
    #[serde(default)]
    pub pipelines_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutRequest {
    pub source: Source,
    #[serde(default)]
    pub params: OutParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutResponse {
    pub version: Version,
    pub metadata: Vec<Metadata>,
}
