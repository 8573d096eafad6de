//! Canonical job records and per-id atomic mutation.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{
    error::DomainError,
    job::{ArtifactRef, Job, JobInput, JobState, RenderOptions},
};

/// A validated submission that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub input: JobInput,
    pub options: RenderOptions,
}

/// Mutations a worker (or the stuck-job reaper) may apply to a job.
#[derive(Debug, Clone)]
pub enum JobMutation {
    /// The job was dequeued by a worker.
    Processing,
    /// The render succeeded; record the artifact reference.
    Complete { artifact: ArtifactRef },
    /// The render failed; record the reason.
    Fail { reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found")]
    NotFound,
    #[error("job `{id}` already settled as {state:?}")]
    TerminalState { id: Uuid, state: JobState },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Source of truth for job records.
///
/// `update` must be atomic per id: two racing updates for the same id may
/// not interleave into a mixed state, and the first terminal transition
/// wins — the losing side observes [`StoreError::TerminalState`].
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job in `Queued` state and return the stored record.
    async fn create(&self, new: NewJob) -> Result<Job, StoreError>;

    /// Fetch a snapshot of the job.
    async fn get(&self, id: Uuid) -> Result<Job, StoreError>;

    /// Apply `mutation` atomically with respect to other updates on `id`,
    /// returning the record after the transition.
    async fn update(&self, id: Uuid, mutation: JobMutation) -> Result<Job, StoreError>;

    /// Ids of `Processing` jobs whose last transition happened before
    /// `cutoff`. Feeds the reaper; snapshots are not stable across calls.
    async fn stale_processing(&self, cutoff: OffsetDateTime) -> Result<Vec<Uuid>, StoreError>;

    /// Roll back a submission whose enqueue was rejected.
    ///
    /// This is the only deletion the engine performs; it is never invoked
    /// on a job that has left `Queued`.
    async fn discard(&self, id: Uuid) -> Result<(), StoreError>;
}
