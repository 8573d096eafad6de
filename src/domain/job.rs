//! Render job entity and its lifecycle state machine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use super::error::DomainError;

/// Lifecycle states of a render job.
///
/// Transitions are strictly forward: `Queued` → `Processing` →
/// `Completed` | `Failed`. Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Kind of source content a job renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Url,
    Html,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Url => "url",
            InputKind::Html => "html",
        }
    }
}

/// The source a job renders: a URL to fetch or a raw HTML payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInput {
    pub kind: InputKind,
    pub content: String,
}

impl JobInput {
    /// Validate and construct a job input. URL inputs must parse as
    /// absolute http(s) URLs; HTML inputs must be non-empty.
    pub fn new(kind: InputKind, content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::validation("content must not be empty"));
        }

        if kind == InputKind::Url {
            let parsed = Url::parse(&content)
                .map_err(|err| DomainError::validation(format!("invalid url: {err}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(DomainError::validation(format!(
                    "unsupported url scheme `{}`",
                    parsed.scheme()
                )));
            }
        }

        Ok(Self { kind, content })
    }
}

/// Render configuration. `format` selects the output type; every other key
/// is opaque to the engine and forwarded to the converter untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub format: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RenderOptions {
    pub fn new(
        format: impl Into<String>,
        extra: BTreeMap<String, serde_json::Value>,
    ) -> Result<Self, DomainError> {
        let format = format.into();
        if format.trim().is_empty() {
            return Err(DomainError::validation("options.format must not be empty"));
        }
        Ok(Self { format, extra })
    }
}

/// Opaque reference to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// One render request and its lifecycle record.
///
/// Created once at submission; afterwards only the worker pool (and the
/// stuck-job reaper) mutate state, result, error and `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub input: JobInput,
    pub options: RenderOptions,
    pub state: JobState,
    pub result: Option<ArtifactRef>,
    pub error: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Job {
    pub fn new(input: JobInput, options: RenderOptions) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            input,
            options,
            state: JobState::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the job as picked up by a worker.
    pub fn begin_processing(&mut self) -> Result<(), DomainError> {
        if self.state != JobState::Queued {
            return Err(DomainError::invalid_transition(
                self.state,
                JobState::Processing,
            ));
        }
        self.state = JobState::Processing;
        self.touch();
        Ok(())
    }

    /// Record a successful render and the artifact it produced.
    pub fn complete(&mut self, artifact: ArtifactRef) -> Result<(), DomainError> {
        if self.state != JobState::Processing {
            return Err(DomainError::invalid_transition(
                self.state,
                JobState::Completed,
            ));
        }
        self.state = JobState::Completed;
        self.result = Some(artifact);
        self.error = None;
        self.touch();
        Ok(())
    }

    /// Record a failed render with a human-readable reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        if self.state != JobState::Processing {
            return Err(DomainError::invalid_transition(self.state, JobState::Failed));
        }
        self.state = JobState::Failed;
        self.error = Some(reason.into());
        self.result = None;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        // updated_at is monotonically non-decreasing even if the clock steps back.
        self.updated_at = OffsetDateTime::now_utc().max(self.updated_at);
    }
}
