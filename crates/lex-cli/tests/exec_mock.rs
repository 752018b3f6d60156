//! Integration tests for exec mode against a mock backend.


use assert_cmd::cargo::cargo_bin_cmd;
use fixtures::{chat_body, frame, sse_response, tool_output_frame, tool_use_frame};
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer};

/// Creates a temp LEX_HOME directory for test isolation.
fn temp_lex_home() -> TempDir {
    TempDir::new().expect("create temp lex home")
}

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

#[tokio::test]
async fn exec_streams_joined_chunks() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let lex_home = temp_lex_home();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(serde_json::json!({"query": "hi"})))
        .respond_with(sse_response(&chat_body(&["Hello", "world"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("lex")
        .env("LEX_HOME", lex_home.path())
        .args(["--backend-url", &mock_server.uri(), "exec", "-p", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello world"));
}

#[tokio::test]
async fn exec_reports_tool_lifecycle_on_stderr() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let lex_home = temp_lex_home();
    let mock_server = MockServer::start().await;

    let mut body = frame("chunk", "Let me check");
    body.push_str(&tool_use_frame("get_weather"));
    body.push_str(&tool_output_frame("get_weather", "Sunny, 25C"));
    body.push_str(&frame("chunk", "It is sunny."));
    body.push_str(&frame("end", ""));

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(sse_response(&body))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("lex")
        .env("LEX_HOME", lex_home.path())
        .args(["--backend-url", &mock_server.uri(), "exec", "-p", "weather?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Let me check It is sunny."))
        .stderr(predicate::str::contains("get_weather"));
}

#[tokio::test]
async fn exec_http_500_fails_without_retry() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let lex_home = temp_lex_home();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(wiremock::ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("lex")
        .env("LEX_HOME", lex_home.path())
        .args(["--backend-url", &mock_server.uri(), "exec", "-p", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP 500"));
}

#[tokio::test]
async fn exec_tolerates_malformed_tool_payload() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let lex_home = temp_lex_home();
    let mock_server = MockServer::start().await;

    let mut body = frame("tool_use", "{not json");
    body.push_str(&frame("chunk", "Still"));
    body.push_str(&frame("chunk", "fine"));
    body.push_str(&frame("end", ""));

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(sse_response(&body))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("lex")
        .env("LEX_HOME", lex_home.path())
        .args(["--backend-url", &mock_server.uri(), "exec", "-p", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Still fine"));
}

#[tokio::test]
async fn exec_noise_frames_are_ignored() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let lex_home = temp_lex_home();
    let mock_server = MockServer::start().await;

    // A frame without a data line, an unknown event type, and an
    // unterminated tail must all be dropped without aborting the stream.
    let mut body = String::from("event: chunk\n\n");
    body.push_str(&frame("heartbeat", "{}"));
    body.push_str(&chat_body(&["Hello"]));
    body.push_str("event: chunk\ndata: lost tail");

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(sse_response(&body))
        .expect(1)
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("lex")
        .env("LEX_HOME", lex_home.path())
        .args(["--backend-url", &mock_server.uri(), "exec", "-p", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello"))
        .stdout(predicate::str::contains("lost tail").not());
}
