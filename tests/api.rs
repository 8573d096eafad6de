//! Router-level tests for the job API: submit, poll, download.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use stampa::application::queue::{JobQueue, JobStream};
use stampa::application::render::{
    RenderError, RenderRequest, RenderedDocument, Renderer,
};
use stampa::application::store::JobStore;
use stampa::application::worker::{EngineContext, process_render_job};
use stampa::infra::artifacts::ArtifactStore;
use stampa::infra::http::{ApiState, build_api_router};
use stampa::infra::memory::InMemoryJobStore;

const FIXTURE_PDF: &[u8] = b"%PDF-1.7 fixture artifact";

/// Renderer double that returns fixed bytes without external tooling.
struct FixtureRenderer;

#[async_trait::async_trait]
impl Renderer for FixtureRenderer {
    async fn render(&self, _request: RenderRequest<'_>) -> Result<RenderedDocument, RenderError> {
        Ok(RenderedDocument {
            bytes: Bytes::from_static(FIXTURE_PDF),
        })
    }
}

/// Renderer double that always reports a converter failure.
struct FailingRenderer;

#[async_trait::async_trait]
impl Renderer for FailingRenderer {
    async fn render(&self, _request: RenderRequest<'_>) -> Result<RenderedDocument, RenderError> {
        Err(RenderError::Converter {
            exit_code: Some(64),
            stderr: "unsupported format".to_string(),
        })
    }
}

struct Harness {
    router: Router,
    store: Arc<InMemoryJobStore>,
    stream: JobStream,
    ctx: EngineContext,
    _artifacts_dir: tempfile::TempDir,
}

fn harness_with(queue_capacity: usize, renderer: Arc<dyn Renderer>) -> Harness {
    let artifacts_dir = tempfile::TempDir::new().expect("temp dir");
    let store = Arc::new(InMemoryJobStore::new());
    let artifacts =
        Arc::new(ArtifactStore::new(artifacts_dir.path().join("artifacts")).expect("store"));
    let (queue, stream) = JobQueue::bounded(queue_capacity);

    let store_dyn: Arc<dyn JobStore> = store.clone();
    let ctx = EngineContext {
        store: store_dyn.clone(),
        artifacts: artifacts.clone(),
        renderer,
        deadline: Duration::from_secs(5),
    };

    let router = build_api_router(ApiState {
        store: store_dyn,
        queue,
        artifacts,
    });

    Harness {
        router,
        store,
        stream,
        ctx,
        _artifacts_dir: artifacts_dir,
    }
}

fn harness() -> Harness {
    harness_with(16, Arc::new(FixtureRenderer))
}

fn submit_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/render")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn read_body(response: Response) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
}

async fn read_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&read_body(response).await).expect("json body")
}

async fn submit_job(harness: &Harness, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = harness
        .router
        .clone()
        .oneshot(submit_request(body))
        .await
        .expect("response");
    let status = response.status();
    (status, read_json(response).await)
}

fn html_submission() -> serde_json::Value {
    serde_json::json!({
        "inputType": "html",
        "content": "<h1>Hello World</h1>",
        "options": {"format": "pdf"},
    })
}

#[tokio::test]
async fn submit_returns_an_id_that_immediately_resolves() {
    let harness = harness();

    let (status, body) = submit_job(&harness, html_submission()).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let job_id = body["jobId"].as_str().expect("job id").to_string();
    Uuid::parse_str(&job_id).expect("uuid job id");

    let response = harness
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/status/{job_id}")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let status_body = read_json(response).await;
    assert_eq!(status_body["state"], "queued");
    assert!(status_body.get("result").is_none());
    assert!(status_body.get("error").is_none());
}

#[tokio::test]
async fn submitted_ids_are_unique_across_identical_payloads() {
    let harness = harness();

    let (_, first) = submit_job(&harness, html_submission()).await;
    let (_, second) = submit_job(&harness, html_submission()).await;

    // No dedup: identical submissions are independent jobs.
    assert_ne!(first["jobId"], second["jobId"]);
    assert_eq!(harness.store.len(), 2);
}

#[tokio::test]
async fn invalid_submissions_create_no_job_record() {
    let harness = harness();

    let cases = [
        serde_json::json!({"inputType": "url", "content": "not a url", "options": {"format": "pdf"}}),
        serde_json::json!({"inputType": "html", "content": "", "options": {"format": "pdf"}}),
        serde_json::json!({"inputType": "html", "content": "<p>x</p>", "options": {"format": ""}}),
    ];

    for case in cases {
        let response = harness
            .router
            .clone()
            .oneshot(submit_request(case))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["error"]["code"], "invalid_input");
    }

    // An unknown inputType is rejected at deserialization time.
    let response = harness
        .router
        .clone()
        .oneshot(submit_request(serde_json::json!({
            "inputType": "markdown",
            "content": "# hi",
            "options": {"format": "pdf"},
        })))
        .await
        .expect("response");
    assert!(response.status().is_client_error());

    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn full_queue_answers_overloaded_and_rolls_back() {
    let harness = harness_with(1, Arc::new(FixtureRenderer));

    let (status, _) = submit_job(&harness, html_submission()).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let response = harness
        .router
        .clone()
        .oneshot(submit_request(html_submission()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "overloaded");

    // The bounced submission left no record behind.
    assert_eq!(harness.store.len(), 1);

    // Draining one slot makes the next submission succeed.
    harness.stream.recv().await.expect("drained id");
    let (status, _) = submit_job(&harness, html_submission()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let harness = harness();

    for uri in [
        format!("/api/v1/status/{}", Uuid::new_v4()),
        format!("/api/v1/download/{}", Uuid::new_v4()),
        "/api/v1/status/not-a-uuid".to_string(),
    ] {
        let response = harness
            .router
            .clone()
            .oneshot(get_request(&uri))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {uri}");
        let body = read_json(response).await;
        assert_eq!(body["error"]["code"], "not_found");
    }
}

#[tokio::test]
async fn download_lifecycle_from_not_ready_to_stable_bytes() {
    let harness = harness();

    let (_, body) = submit_job(&harness, html_submission()).await;
    let job_id = body["jobId"].as_str().expect("job id").to_string();

    // Before any worker touched the job the artifact is not ready.
    let response = harness
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/download/{job_id}")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let not_ready = read_json(response).await;
    assert_eq!(not_ready["error"]["code"], "not_ready");

    // Drive the job to completion the way a pool worker would.
    let id = harness.stream.recv().await.expect("queued id");
    process_render_job(&harness.ctx, id).await.expect("processed");

    let response = harness
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/status/{job_id}")))
        .await
        .expect("response");
    let status_body = read_json(response).await;
    assert_eq!(status_body["state"], "completed");
    let result = status_body["result"].as_str().expect("artifact reference");
    assert!(!result.is_empty());

    // Terminal reads are idempotent.
    let response = harness
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/status/{job_id}")))
        .await
        .expect("response");
    assert_eq!(read_json(response).await, status_body);

    // Download returns the artifact with its content type, repeatably.
    let mut downloads = Vec::new();
    for _ in 0..2 {
        let response = harness
            .router
            .clone()
            .oneshot(get_request(&format!("/api/v1/download/{job_id}")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/pdf")
        );
        downloads.push(read_body(response).await);
    }
    assert_eq!(downloads[0], downloads[1]);
    assert_eq!(downloads[0].as_ref(), FIXTURE_PDF);
}

#[tokio::test]
async fn url_submissions_render_to_completion() {
    let harness = harness();

    let (status, body) = submit_job(
        &harness,
        serde_json::json!({
            "inputType": "url",
            "content": "https://example.com",
            "options": {"format": "A4"},
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["jobId"].as_str().expect("job id").to_string();

    let id = harness.stream.recv().await.expect("queued id");
    process_render_job(&harness.ctx, id).await.expect("processed");

    let response = harness
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/status/{job_id}")))
        .await
        .expect("response");
    let status_body = read_json(response).await;
    assert_eq!(status_body["state"], "completed");
    assert!(
        !status_body["result"]
            .as_str()
            .expect("artifact reference")
            .is_empty()
    );
}

#[tokio::test]
async fn failed_jobs_report_the_reason_and_refuse_download() {
    let harness = harness_with(16, Arc::new(FailingRenderer));

    let (_, body) = submit_job(&harness, html_submission()).await;
    let job_id = body["jobId"].as_str().expect("job id").to_string();

    let id = harness.stream.recv().await.expect("queued id");
    process_render_job(&harness.ctx, id).await.expect("processed");

    let response = harness
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/status/{job_id}")))
        .await
        .expect("response");
    let status_body = read_json(response).await;
    assert_eq!(status_body["state"], "failed");
    assert!(
        status_body["error"]
            .as_str()
            .expect("failure reason")
            .contains("unsupported format")
    );
    assert!(status_body.get("result").is_none());

    let response = harness
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/download/{job_id}")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_endpoint_answers_no_content() {
    let harness = harness();

    let response = harness
        .router
        .clone()
        .oneshot(get_request("/api/v1/healthz"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
