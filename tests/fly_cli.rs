#![cfg(unix)]

use pipeline_resource::cli::{execute, Commands};
use pipeline_resource::concourse::ConcourseClient;
use pipeline_resource::fly::{FlyCli, FlyConfigRemote, FLY_BINARY_ENV};
use pipeline_resource_core::contract::{PipelineSetter, RemoteService, Session};
use pipeline_resource_core::model::{OutResponse, PipelineRef, Team};
use serde_json::json;
use serial_test::serial;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fake `fly` that appends its arguments to `calls.log` next to itself.
fn fake_fly(dir: &TempDir, body: &str) -> PathBuf {
    let script = dir.path().join("fly");
    let log = dir.path().join("calls.log");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"$*\" >> '{}'\n{body}\n",
            log.display()
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn calls(dir: &TempDir) -> Vec<String> {
    fs::read_to_string(dir.path().join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn team(username: &str, password: &str) -> Team {
    Team {
        name: "main".into(),
        username: username.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn login_passes_target_team_and_credentials() {
    let dir = tempdir().unwrap();
    let fly = FlyCli::new(fake_fly(&dir, "exit 0"));

    fly.login("https://ci.example.com", &team("admin", "s3cret"), true)
        .await
        .expect("login succeeds");

    assert_eq!(
        calls(&dir),
        vec![format!(
            "-t {} login -c https://ci.example.com -n main -u admin -p s3cret -k",
            fly.target_alias()
        )]
    );
}

#[tokio::test]
async fn anonymous_login_omits_credentials() {
    let dir = tempdir().unwrap();
    let fly = FlyCli::new(fake_fly(&dir, "exit 0"));

    fly.login("https://ci.example.com", &team("", ""), false)
        .await
        .expect("login succeeds");

    assert_eq!(
        calls(&dir),
        vec![format!(
            "-t {} login -c https://ci.example.com -n main",
            fly.target_alias()
        )]
    );
}

#[tokio::test]
async fn set_pipeline_is_non_interactive_and_loads_vars_in_order() {
    let dir = tempdir().unwrap();
    let fly = FlyCli::new(fake_fly(&dir, "echo 'configuration updated'"));

    let output = fly
        .set_pipeline(
            "deploy",
            Path::new("/src/ci/deploy.yml"),
            &[PathBuf::from("/src/ci/common.yml"), PathBuf::from("/src/ci/prod.yml")],
        )
        .await
        .expect("set-pipeline succeeds");

    assert_eq!(output.trim(), "configuration updated");
    assert_eq!(
        calls(&dir),
        vec![format!(
            "-t {} set-pipeline -n -p deploy -c /src/ci/deploy.yml -l /src/ci/common.yml -l /src/ci/prod.yml",
            fly.target_alias()
        )]
    );
}

#[tokio::test]
async fn non_zero_exit_is_an_error_with_stderr() {
    let dir = tempdir().unwrap();
    let fly = FlyCli::new(fake_fly(&dir, "echo 'error: invalid pipeline config' >&2\nexit 1"));

    let err = fly
        .set_pipeline("broken", Path::new("broken.yml"), &[])
        .await
        .expect_err("must fail");

    let msg = err.to_string();
    assert!(msg.contains("fly set-pipeline exited"), "unexpected error: {msg}");
    assert!(msg.contains("invalid pipeline config"), "unexpected error: {msg}");
}

#[tokio::test]
async fn missing_binary_is_an_error() {
    let dir = tempdir().unwrap();
    let fly = FlyCli::new(dir.path().join("no-such-fly"));

    let err = fly
        .login("https://ci.example.com", &team("", ""), false)
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("failed to launch"));
}

// Prints a one-line YAML config named after the `-p` argument of `get-pipeline`.
const GET_PIPELINE_BODY: &str = r#"if [ "$3" = "get-pipeline" ]; then printf 'jobs: [%s]\n' "$5"; fi"#;

#[tokio::test]
async fn get_pipeline_returns_fly_output_verbatim() {
    let dir = tempdir().unwrap();
    let fly = FlyCli::new(fake_fly(&dir, GET_PIPELINE_BODY));

    let config = fly.get_pipeline("deploy").await.expect("get-pipeline succeeds");

    assert_eq!(config, "jobs: [deploy]\n");
    assert_eq!(
        calls(&dir),
        vec![format!("-t {} get-pipeline -p deploy", fly.target_alias())]
    );
}

#[tokio::test]
async fn delete_target_removes_the_alias() {
    let dir = tempdir().unwrap();
    let fly = FlyCli::new(fake_fly(&dir, "exit 0"));

    fly.delete_target().await.expect("delete-target succeeds");

    assert_eq!(calls(&dir), vec![format!("-t {} delete-target", fly.target_alias())]);
}

#[tokio::test]
async fn fly_config_remote_lists_via_api_and_reads_via_fly() {
    let dir = tempdir().unwrap();
    let fly = FlyCli::new(fake_fly(&dir, GET_PIPELINE_BODY));
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/teams/main/pipelines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "a" }])))
        .expect(1)
        .mount(&server)
        .await;
    let client = ConcourseClient::new(&server.uri(), false).expect("client");
    let remote = FlyConfigRemote::new(&client, &fly);

    let pipelines = remote.list_pipelines("main").await.expect("listing succeeds");
    assert_eq!(pipelines, vec![PipelineRef::new("a", "main")]);

    let config = remote.fetch_config("main", "a").await.expect("fetch succeeds");
    assert_eq!(config.content, "jobs: [a]\n");
    assert_eq!(config.raw_version, None);
}

#[test]
fn each_instance_gets_its_own_target_alias() {
    let a = FlyCli::new("fly");
    let b = FlyCli::new("fly");
    assert!(a.target_alias().starts_with("pipeline-resource-"));
    assert_ne!(a.target_alias(), b.target_alias());
}

#[tokio::test]
#[serial]
async fn out_sets_pipelines_then_reports_checksum_of_fly_configs() {
    let fly_dir = tempdir().unwrap();
    let script = fake_fly(&fly_dir, GET_PIPELINE_BODY);
    std::env::set_var(FLY_BINARY_ENV, &script);

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/teams/main/pipelines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "a" }, { "name": "b" }])))
        .mount(&server)
        .await;

    let sources = tempdir().unwrap();
    let request = json!({
        "source": { "target": server.uri(), "teams": [{ "name": "main" }] },
        "params": { "pipelines": [{ "name": "a", "config_file": "ci/a.yml", "vars_files": ["ci/vars.yml"] }] }
    });
    let result = execute(
        Commands::Out {
            dir: sources.path().to_path_buf(),
        },
        &request.to_string(),
    )
    .await;
    std::env::remove_var(FLY_BINARY_ENV);

    let response: OutResponse =
        serde_json::from_str(&result.expect("out succeeds")).expect("response is JSON");
    // md5 of "jobs: [a]\njobs: [b]\n"
    assert_eq!(
        response.version.pipelines_checksum.as_deref(),
        Some("a6da87eae4195cb346392e6778b52755")
    );

    let calls = calls(&fly_dir);
    assert_eq!(calls.len(), 5, "unexpected calls: {calls:?}");
    assert!(calls[0].contains(&format!("login -c {} -n main", server.uri())));
    let set = &calls[1];
    assert!(set.contains("set-pipeline -n -p a"), "unexpected call: {set}");
    assert!(set.contains(&format!("-c {}", sources.path().join("ci/a.yml").display())));
    assert!(set.contains(&format!("-l {}", sources.path().join("ci/vars.yml").display())));
    let mut reads: Vec<_> = calls[2..4].to_vec();
    reads.sort();
    assert!(reads[0].ends_with("get-pipeline -p a"), "unexpected calls: {reads:?}");
    assert!(reads[1].ends_with("get-pipeline -p b"), "unexpected calls: {reads:?}");
    assert!(calls[4].ends_with("delete-target"), "unexpected call: {}", calls[4]);
}

#[tokio::test]
#[serial]
async fn out_stops_when_fly_login_fails() {
    let fly_dir = tempdir().unwrap();
    let script = fake_fly(&fly_dir, "echo 'not authorized' >&2\nexit 1");
    std::env::set_var(FLY_BINARY_ENV, &script);

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let sources = tempdir().unwrap();
    let request = json!({
        "source": { "target": server.uri(), "teams": [{ "name": "main" }] },
        "params": { "pipelines": [{ "name": "a", "config_file": "a.yml" }] }
    });
    let result = execute(
        Commands::Out {
            dir: sources.path().to_path_buf(),
        },
        &request.to_string(),
    )
    .await;
    std::env::remove_var(FLY_BINARY_ENV);

    let err = result.expect_err("out must fail");
    assert!(format!("{err:#}").contains("not authorized"), "unexpected error: {err:#}");
    let calls = calls(&fly_dir);
    assert_eq!(calls.len(), 2, "unexpected calls: {calls:?}");
    assert!(calls[0].contains(" login "));
    assert!(calls[1].ends_with("delete-target"));
}
