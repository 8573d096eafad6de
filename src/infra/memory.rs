//! In-memory job store backed by a concurrent hash map.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::store::{JobMutation, JobStore, NewJob, StoreError},
    domain::job::{Job, JobState},
};

/// Job store keyed by job id. The map's per-key entry lock serializes
/// mutations for one id without a process-wide lock, which is all the
/// atomicity the store contract asks for.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<Uuid, Job>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, new: NewJob) -> Result<Job, StoreError> {
        let job = Job::new(new.input, new.options);
        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Job, StoreError> {
        self.jobs
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, id: Uuid, mutation: JobMutation) -> Result<Job, StoreError> {
        let mut entry = self.jobs.get_mut(&id).ok_or(StoreError::NotFound)?;
        if entry.state.is_terminal() {
            return Err(StoreError::TerminalState {
                id,
                state: entry.state,
            });
        }

        match mutation {
            JobMutation::Processing => entry.begin_processing()?,
            JobMutation::Complete { artifact } => entry.complete(artifact)?,
            JobMutation::Fail { reason } => entry.fail(reason)?,
        }

        Ok(entry.clone())
    }

    async fn stale_processing(&self, cutoff: OffsetDateTime) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .jobs
            .iter()
            .filter(|entry| entry.state == JobState::Processing && entry.updated_at < cutoff)
            .map(|entry| entry.id)
            .collect())
    }

    async fn discard(&self, id: Uuid) -> Result<(), StoreError> {
        self.jobs
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
