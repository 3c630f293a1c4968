//! End-to-end tests for the buildsweep binary
//!
//! These tests validate the full CLI workflow including:
//! - A complete extraction pass against mock endpoints
//! - Driver listing
//! - Configuration validation and exit codes

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

/// A source and destination URL that are valid but never contacted
const UNREACHED: &str = "http://127.0.0.1:9";

fn buildsweep() -> Command {
    Command::cargo_bin("buildsweep").unwrap()
}

// ============================================================================
// Extraction Pass
// ============================================================================

#[tokio::test]
async fn test_run_sweeps_a_server_end_to_end() {
    let jenkins = MockServer::start().await;
    let elastic = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [{"name": "app", "url": format!("{}/job/app", jenkins.uri())}]
        })))
        .mount(&jenkins)
        .await;

    Mock::given(method("GET"))
        .and(path("/job/app/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "app",
            "builds": [
                {
                    "number": 1,
                    "timestamp": 1700000000000u64,
                    "duration": 41000,
                    "result": "SUCCESS",
                    "actions": [{"causes": [{"userName": "jdoe"}]}]
                },
                {
                    "number": 2,
                    "timestamp": 1700000300000u64,
                    "duration": 52000,
                    "result": "FAILURE",
                    "actions": []
                }
            ]
        })))
        .mount(&jenkins)
        .await;

    Mock::given(method("POST"))
        .and(path("/jenkins/builds/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": {"hits": []}})))
        .mount(&elastic)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/jenkins/builds/[0-9a-f]{64}$"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&elastic)
        .await;

    let mut cmd = buildsweep();
    cmd.arg("run")
        .arg("--jenkins")
        .arg(jenkins.uri())
        .arg("--elasticsearch")
        .arg(elastic.uri())
        .arg("--workers")
        .arg("2");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1 task units processed"))
        .stdout(predicate::str::contains("2 created"));

    let put_count = elastic
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method.as_str() == "PUT")
        .count();
    assert_eq!(put_count, 2, "each build should be upserted exactly once");
}

#[tokio::test]
async fn test_run_reports_an_unreachable_source() {
    let elastic = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/jenkins/builds/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": {"hits": []}})))
        .mount(&elastic)
        .await;

    let mut cmd = buildsweep();
    cmd.arg("run")
        .arg("--jenkins")
        .arg(UNREACHED)
        .arg("--elasticsearch")
        .arg(elastic.uri())
        .arg("--timeout-secs")
        .arg("2");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Source unavailable"));
}

// ============================================================================
// Driver Listing
// ============================================================================

#[tokio::test]
async fn test_drivers_lists_the_builtin_tags() {
    let mut cmd = buildsweep();
    cmd.arg("drivers");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("builds"));
}

// ============================================================================
// Configuration Validation
// ============================================================================

#[tokio::test]
async fn test_run_rejects_a_non_http_source_url() {
    let mut cmd = buildsweep();
    cmd.arg("run")
        .arg("--jenkins")
        .arg("ftp://ci.example.com")
        .arg("--elasticsearch")
        .arg(UNREACHED);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("must be http or https"));
}

#[tokio::test]
async fn test_run_rejects_an_unknown_driver_tag() {
    let mut cmd = buildsweep();
    cmd.arg("run")
        .arg("--jenkins")
        .arg(UNREACHED)
        .arg("--elasticsearch")
        .arg(UNREACHED)
        .arg("--driver")
        .arg("perforce");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No driver registered"));
}

#[tokio::test]
async fn test_run_rejects_zero_workers() {
    let mut cmd = buildsweep();
    cmd.arg("run")
        .arg("--jenkins")
        .arg(UNREACHED)
        .arg("--elasticsearch")
        .arg(UNREACHED)
        .arg("--workers")
        .arg("0");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Worker count must be at least 1"));
}

#[tokio::test]
async fn test_run_rejects_an_empty_index() {
    let mut cmd = buildsweep();
    cmd.arg("run")
        .arg("--jenkins")
        .arg(UNREACHED)
        .arg("--elasticsearch")
        .arg(UNREACHED)
        .arg("--index")
        .arg("");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("index cannot be empty"));
}

#[tokio::test]
async fn test_unknown_subcommand_is_a_usage_error() {
    let mut cmd = buildsweep();
    cmd.arg("sweep");

    cmd.assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
