use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;

const JOB_ID: &str = "0192d7a2-4b6e-7c3d-9f10-2a54c8e6b001";

fn cli() -> Command {
    Command::cargo_bin("stampa-cli").expect("binary built")
}

#[test]
fn submit_prints_the_assigned_job_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/v1/render").json_body(serde_json::json!({
            "inputType": "html",
            "content": "<h1>Hello World</h1>",
            "options": {"format": "pdf"},
        }));
        then.status(202)
            .json_body(serde_json::json!({"jobId": JOB_ID}));
    });

    cli()
        .args([
            "--url",
            &server.base_url(),
            "submit",
            "--input-type",
            "html",
            "--content",
            "<h1>Hello World</h1>",
            "--format",
            "pdf",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(JOB_ID));

    mock.assert();
}

#[test]
fn status_prints_the_job_record() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("/api/v1/status/{JOB_ID}"));
        then.status(200).json_body(serde_json::json!({
            "state": "completed",
            "result": "2026/08/06/artifact.pdf",
            "createdAt": "2026-08-06T10:00:00Z",
            "updatedAt": "2026-08-06T10:00:02Z",
        }));
    });

    cli()
        .args(["--url", &server.base_url(), "status", JOB_ID])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"))
        .stdout(predicate::str::contains("2026/08/06/artifact.pdf"));

    mock.assert();
}

#[test]
fn download_writes_artifact_bytes_to_the_output_file() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("/api/v1/download/{JOB_ID}"));
        then.status(200)
            .header("content-type", "application/pdf")
            .body("%PDF-1.7 fake artifact");
    });

    let dir = tempfile::TempDir::new().expect("temp dir");
    let output = dir.path().join("artifact.pdf");

    cli()
        .args([
            "--url",
            &server.base_url(),
            "download",
            JOB_ID,
            "--output",
            output.to_str().expect("utf8 path"),
        ])
        .assert()
        .success();

    let written = std::fs::read(&output).expect("artifact written");
    assert_eq!(written, b"%PDF-1.7 fake artifact");
    mock.assert();
}

#[test]
fn api_errors_surface_their_code() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/render");
        then.status(400).json_body(serde_json::json!({
            "error": {
                "code": "invalid_input",
                "message": "Submission rejected",
                "hint": "content must not be empty",
            }
        }));
    });

    cli()
        .args([
            "--url",
            &server.base_url(),
            "submit",
            "--input-type",
            "html",
            "--content",
            " ",
            "--format",
            "pdf",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_input"));
}

#[test]
fn wait_returns_once_the_job_is_terminal() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("/api/v1/status/{JOB_ID}"));
        then.status(200).json_body(serde_json::json!({
            "state": "failed",
            "error": "converter invocation failed (exit Some(64)): unsupported format",
            "createdAt": "2026-08-06T10:00:00Z",
            "updatedAt": "2026-08-06T10:00:01Z",
        }));
    });

    cli()
        .args([
            "--url",
            &server.base_url(),
            "wait",
            JOB_ID,
            "--timeout-seconds",
            "5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed"));

    mock.assert();
}

#[test]
fn missing_url_is_a_usage_error() {
    cli()
        .env_remove("STAMPA_URL")
        .args(["status", JOB_ID])
        .assert()
        .failure()
        .stderr(predicate::str::contains("MissingUrl"));
}
