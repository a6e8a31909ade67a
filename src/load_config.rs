/// `load_config` module: reads the request JSON and the YAML pipelines file into core types.
///
/// This is the only place where untrusted input is parsed: the request that
/// arrives on stdin, and the optional `pipelines_file` named by an `out`
/// request. Everything downstream works on the typed structs of
/// `pipeline_resource_core::model`.
///
/// # Errors
/// All errors here use `anyhow::Error` for context-rich diagnostics; the
/// [`YamlManifestLoader`] converts them into the core's boxed error at the
/// trait boundary.
use anyhow::{Context, Result};
use pipeline_resource_core::contract::{BoxError, ManifestLoader};
use pipeline_resource_core::model::PipelineSpec;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct PipelinesFile {
    #[serde(default)]
    pipelines: Vec<PipelineSpec>,
}

/// Parse a request received on stdin.
pub fn parse_request<T: DeserializeOwned>(raw: &str) -> Result<T> {
    match serde_json::from_str(raw) {
        Ok(request) => {
            info!(bytes = raw.len(), "Parsed request");
            Ok(request)
        }
        Err(e) => {
            error!(error = %e, "Failed to parse request JSON");
            Err(anyhow::anyhow!("Failed to parse request JSON: {e}"))
        }
    }
}

/// Load the `pipelines:` list of a YAML pipelines file.
pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<PipelineSpec>> {
    let path_ref = path.as_ref();
    info!(manifest_path = ?path_ref, "Loading pipelines file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, manifest_path = ?path_ref, "Failed to read pipelines file");
        e
    })
    .with_context(|| format!("Failed to read pipelines file {}", path_ref.display()))?;

    let parsed: PipelinesFile = match serde_yaml::from_str(&content) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(error = ?e, manifest_path = ?path_ref, "Failed to parse pipelines file YAML");
            return Err(anyhow::anyhow!("Failed to parse pipelines file YAML: {e}"));
        }
    };

    info!(
        manifest_path = ?path_ref,
        pipelines = parsed.pipelines.len(),
        "Pipelines file loaded"
    );
    Ok(parsed.pipelines)
}

/// [`ManifestLoader`] reading YAML files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlManifestLoader;

impl ManifestLoader for YamlManifestLoader {
    fn load(&self, path: &Path) -> std::result::Result<Vec<PipelineSpec>, BoxError> {
        load_manifest(path).map_err(BoxError::from)
    }
}
