//! Conversions between the shared wire types and the domain model.

use stampa_api_types::{ApiInputKind, ApiJobState, JobStatusResponse};

use crate::domain::job::{ArtifactRef, InputKind, Job, JobState};

impl From<ApiInputKind> for InputKind {
    fn from(kind: ApiInputKind) -> Self {
        match kind {
            ApiInputKind::Url => InputKind::Url,
            ApiInputKind::Html => InputKind::Html,
        }
    }
}

impl From<JobState> for ApiJobState {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Queued => ApiJobState::Queued,
            JobState::Processing => ApiJobState::Processing,
            JobState::Completed => ApiJobState::Completed,
            JobState::Failed => ApiJobState::Failed,
        }
    }
}

pub fn status_response(job: &Job) -> JobStatusResponse {
    JobStatusResponse {
        state: job.state.into(),
        result: job.result.clone().map(ArtifactRef::into_inner),
        error: job.error.clone(),
        created_at: job.created_at,
        updated_at: job.updated_at,
    }
}
