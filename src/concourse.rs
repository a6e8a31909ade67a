//! # HTTP client for the CI service API
//!
//! Bridges the core's [`RemoteService`] trait to the service's REST API. The
//! CLI constructs a [`ConcourseClient`] with [`ConcourseClient::login`] and
//! hands it to the `in` or `out` command.
//!
//! - Listing: `GET /api/v1/teams/{team}/pipelines`
//! - Config: `GET /api/v1/teams/{team}/pipelines/{name}/config`; the `config`
//!   member of the response is kept as its raw JSON text, and the
//!   `X-Concourse-Config-Version` header becomes the raw version.
//! - Auth: password grant against `/sky/issuer/token`, then a bearer token on
//!   every request. Teams without a username are queried anonymously.

use async_trait::async_trait;
use pipeline_resource_core::contract::{BoxError, RemoteService};
use pipeline_resource_core::model::{PipelineConfig, PipelineRef, Team};
use serde::Deserialize;
use reqwest::Url;
use serde_json::value::RawValue;

const API_PREFIX: [&str; 2] = ["api", "v1"];
const CONFIG_VERSION_HEADER: &str = "X-Concourse-Config-Version";
const TOKEN_SCOPE: &str = "openid profile email federated:id groups";
// Public client credentials used by the `fly` CLI itself.
const FLY_CLIENT_ID: &str = "fly";
const FLY_CLIENT_SECRET: &str = "Zmx5";

pub struct ConcourseClient {
    http: reqwest::Client,
    target: Url,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPipeline {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ConfigEnvelope {
    config: Box<RawValue>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ConcourseClient {
    /// Unauthenticated client for `target`.
    pub fn new(target: &str, insecure: bool) -> Result<Self, BoxError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()?;
        let target = Url::parse(target).map_err(|e| format!("invalid target URL '{target}': {e}"))?;
        if target.cannot_be_a_base() {
            return Err(format!("target URL '{target}' cannot carry a path").into());
        }
        Ok(Self {
            http,
            target,
            token: None,
        })
    }

    /// Client authenticated as `team`'s user. Falls back to anonymous access when
    /// the team has no username configured.
    pub async fn login(target: &str, team: &Team, insecure: bool) -> Result<Self, BoxError> {
        let mut client = Self::new(target, insecure)?;
        if team.username.is_empty() {
            tracing::info!(team = %team.name, "No username configured, using anonymous access");
            return Ok(client);
        }

        let url = client.url(&["sky", "issuer", "token"]);
        tracing::info!(url = %url, team = %team.name, username = %team.username, "Requesting API token");
        let resp = client
            .http
            .post(url.clone())
            .basic_auth(FLY_CLIENT_ID, Some(FLY_CLIENT_SECRET))
            .form(&[
                ("grant_type", "password"),
                ("username", team.username.as_str()),
                ("password", team.password.as_str()),
                ("scope", TOKEN_SCOPE),
            ])
            .send()
            .await?;
        let body = success_body(&url, resp).await?;
        let token: TokenResponse = serde_json::from_str(&body)?;
        tracing::info!(team = %team.name, "Obtained API token");
        client.token = Some(token.access_token);
        Ok(client)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn get(&self, url: &Url) -> reqwest::RequestBuilder {
        let req = self.http.get(url.clone());
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// `target` with `segments` appended, each one percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.target.clone();
        // Checked in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn api_url(&self, team: &str, rest: &[&str]) -> Url {
        let mut segments: Vec<&str> = API_PREFIX.to_vec();
        segments.extend(["teams", team]);
        segments.extend_from_slice(rest);
        self.url(&segments)
    }
}

/// Body of a successful response, or an error carrying status and body.
async fn success_body(url: &Url, resp: reqwest::Response) -> Result<String, BoxError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        tracing::error!(url = %url, status = %status, body = %body, "API request failed");
        return Err(format!("{url} returned {status}: {body}").into());
    }
    Ok(body)
}

#[async_trait]
impl RemoteService for ConcourseClient {
    async fn list_pipelines(&self, team: &str) -> Result<Vec<PipelineRef>, BoxError> {
        let url = self.api_url(team, &["pipelines"]);
        tracing::debug!(url = %url, "Listing pipelines");
        let resp = self.get(&url).send().await?;
        let body = success_body(&url, resp).await?;
        let pipelines: Vec<ApiPipeline> = serde_json::from_str(&body)?;
        Ok(pipelines
            .into_iter()
            .map(|p| PipelineRef::new(p.name, team))
            .collect())
    }

    async fn fetch_config(&self, team: &str, name: &str) -> Result<PipelineConfig, BoxError> {
        let url = self.api_url(team, &["pipelines", name, "config"]);
        tracing::debug!(url = %url, "Fetching pipeline config");
        let resp = self.get(&url).send().await?;
        let raw_version = resp
            .headers()
            .get(CONFIG_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = success_body(&url, resp).await?;
        let envelope: ConfigEnvelope = serde_json::from_str(&body)?;
        Ok(PipelineConfig {
            content: envelope.config.get().to_string(),
            raw_version,
        })
    }
}
