//! Integration tests for `reasonfeed send`.

mod fixtures;

use assert_cmd::cargo::cargo_bin_cmd;
use fixtures::{accepted_response, can_bind_localhost, rejected_response};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn temp_home() -> TempDir {
    TempDir::new().expect("create temp reasonfeed home")
}

#[tokio::test]
async fn test_send_prints_assigned_ids() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/agent/message"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({"message": "What is 2+2?"})))
        .respond_with(accepted_response("msg-1", "task-1"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("reasonfeed")
        .env("REASONFEED_HOME", home.path())
        .env("REASONFEED_TOKEN", "test-token")
        .args(["--base-url", &server.uri(), "send", "-m", "What is 2+2?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("accepted message_id=msg-1 task_id=task-1"));
}

#[tokio::test]
async fn test_send_token_flag_beats_env() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/agent/message"))
        .and(header("authorization", "Bearer from-flag"))
        .respond_with(accepted_response("msg-2", "task-2"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("reasonfeed")
        .env("REASONFEED_HOME", home.path())
        .env("REASONFEED_TOKEN", "from-env")
        .env("REASONFEED_BASE_URL", server.uri())
        .args(["send", "--token", "from-flag", "-m", "hi"])
        .assert()
        .success();
}

#[tokio::test]
async fn test_send_rejection_exits_nonzero() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/agent/message"))
        .respond_with(rejected_response("FILTERED_CONTENT", "Message blocked"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("reasonfeed")
        .env("REASONFEED_HOME", home.path())
        .args(["--base-url", &server.uri(), "send", "-m", "spam"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FILTERED_CONTENT"))
        .stderr(predicate::str::contains("Message blocked"));
}

#[tokio::test]
async fn test_send_http_error_is_reported() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/agent/message"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Not authenticated"})),
        )
        .mount(&server)
        .await;

    cargo_bin_cmd!("reasonfeed")
        .env("REASONFEED_HOME", home.path())
        .env_remove("REASONFEED_TOKEN")
        .args(["--base-url", &server.uri(), "send", "-m", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP 401: Not authenticated"));
}

#[test]
fn test_send_empty_message_fails() {
    let home = temp_home();

    cargo_bin_cmd!("reasonfeed")
        .env("REASONFEED_HOME", home.path())
        .args(["--base-url", "http://127.0.0.1:9", "send", "-m", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Message is empty"));
}
