//! Shared request and response types for the Stampa render job API.
//!
//! The wire format is camelCase JSON and is used verbatim by the server and
//! the command-line client, so the two cannot drift apart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Kind of source content a render job accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiInputKind {
    Url,
    Html,
}

impl ApiInputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiInputKind::Url => "url",
            ApiInputKind::Html => "html",
        }
    }
}

/// Lifecycle states reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiJobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ApiJobState {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiJobState::Queued => "queued",
            ApiJobState::Processing => "processing",
            ApiJobState::Completed => "completed",
            ApiJobState::Failed => "failed",
        }
    }

    /// Whether a status poll can stop: completed and failed are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, ApiJobState::Completed | ApiJobState::Failed)
    }
}

/// Render configuration: `format` selects the output type; every other key
/// is forwarded to the converter untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRenderOptions {
    pub format: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ApiRenderOptions {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Body of `POST /api/v1/render`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSubmitRequest {
    pub input_type: ApiInputKind,
    pub content: String,
    pub options: ApiRenderOptions,
}

/// Response of `POST /api/v1/render`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSubmitResponse {
    pub job_id: Uuid,
}

/// Response of `GET /api/v1/status/{job_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub state: ApiJobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// JSON error envelope carried by every non-2xx API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
