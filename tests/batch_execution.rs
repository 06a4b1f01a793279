//! Batch execution tests against a mocked HTTP service

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use execwire::batch::{BatchClient, BatchError};
use execwire::config::Config;

fn client_for(server: &MockServer) -> BatchClient {
    let mut config = Config::default();
    config.service.http_url = server.uri();
    BatchClient::new(&config)
}

#[tokio::test]
async fn test_execute_posts_wire_body_and_parses_result() {
    let server = MockServer::start().await;

    // The cpp key goes out as c++ with its pinned version, source under
    // `code`, stdin verbatim.
    Mock::given(method("POST"))
        .and(path("/api/execute"))
        .and(body_json(json!({
            "code": "#include <iostream>\nint main() { return 0; }",
            "version": "10.2.0",
            "language": "c++",
            "stdin": "42",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "language": "c++",
            "version": "10.2.0",
            "compile": { "stdout": "", "stderr": "", "code": 0 },
            "run": { "stdout": "Hello World\n", "stderr": "", "code": 0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .execute(
            "#include <iostream>\nint main() { return 0; }",
            "cpp",
            "42",
        )
        .await
        .expect("execution failed");

    assert_eq!(outcome.run.stdout, "Hello World\n");
    assert_eq!(outcome.run.code, Some(0));
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn test_http_error_surfaces_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/execute"))
        .respond_with(ResponseTemplate::new(500).set_body_string("worker pool exhausted"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.execute("print(1)", "python", "").await;

    match result {
        Err(BatchError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "worker pool exhausted");
        }
        other => panic!("expected an HTTP status error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_unknown_language_sends_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/execute"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.execute("puts 1", "ruby", "").await;

    assert!(matches!(result, Err(BatchError::UnsupportedLanguage(_))));
}

#[tokio::test]
async fn test_compile_failure_maps_to_compile_exit_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "compile": { "stdout": "", "stderr": "main.cpp:1:1: error: expected unqualified-id\n", "code": 1 },
            "run": { "stdout": "", "stderr": "", "code": 0 }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .execute("not c++ at all", "cpp", "")
        .await
        .expect("execution failed");

    assert!(outcome.compile.as_ref().is_some_and(|c| c.stderr.contains("error")));
    assert_eq!(outcome.exit_code(), 1);
}
