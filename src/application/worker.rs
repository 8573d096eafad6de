//! Worker pool: dequeues job ids, drives the render capability, settles
//! job records. Includes the reaper that expires jobs stuck in
//! `Processing` after a worker died mid-flight.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::join_all;
use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::{task::JoinHandle, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        queue::JobStream,
        render::{RenderRequest, Renderer},
        store::{JobMutation, JobStore, StoreError},
    },
    infra::artifacts::ArtifactStore,
};

/// Shared context handed to every worker and to the reaper.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn JobStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub renderer: Arc<dyn Renderer>,
    /// Per-job processing deadline enforced around the render invocation.
    pub deadline: Duration,
}

/// Fixed set of concurrent executors sharing one queue.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    reaper: JoinHandle<()>,
}

impl WorkerPool {
    /// Spawn `workers` executor tasks plus the reaper.
    pub fn spawn(
        ctx: EngineContext,
        stream: JobStream,
        workers: usize,
        reaper_interval: Duration,
    ) -> Self {
        let handles = (0..workers)
            .map(|index| {
                let ctx = ctx.clone();
                let stream = stream.clone();
                tokio::spawn(run_worker(index, ctx, stream))
            })
            .collect();
        let reaper = tokio::spawn(run_reaper(ctx, reaper_interval));

        Self {
            workers: handles,
            reaper,
        }
    }

    /// Wind the pool down: give workers `grace` to drain in-flight jobs
    /// (the queue must already be closed), then abort whatever is left.
    pub async fn shutdown(self, grace: Duration) {
        self.reaper.abort();
        let _ = self.reaper.await;

        let mut workers = self.workers;
        if tokio::time::timeout(grace, join_all(workers.iter_mut()))
            .await
            .is_err()
        {
            warn!(
                target = "application::worker",
                grace_secs = grace.as_secs(),
                "workers did not drain within the grace period; aborting"
            );
            for handle in &workers {
                handle.abort();
            }
            join_all(workers).await;
        }
    }
}

async fn run_worker(index: usize, ctx: EngineContext, stream: JobStream) {
    info!(target = "application::worker", worker = index, "worker started");

    while let Some(job_id) = stream.recv().await {
        if let Err(err) = process_render_job(&ctx, job_id).await {
            // A single job's failure is recorded on its record; the worker
            // itself always resumes dequeuing.
            warn!(
                target = "application::worker",
                worker = index,
                job_id = %job_id,
                error = %err,
                "job processing error; worker resuming"
            );
        }
    }

    debug!(
        target = "application::worker",
        worker = index,
        "queue closed; worker exiting"
    );
}

/// Drive one job from `Queued` to a terminal state.
pub async fn process_render_job(ctx: &EngineContext, job_id: Uuid) -> Result<(), StoreError> {
    let started_at = Instant::now();

    let job = match ctx.store.update(job_id, JobMutation::Processing).await {
        Ok(job) => job,
        Err(StoreError::NotFound) => {
            warn!(
                target = "application::worker",
                job_id = %job_id,
                "queue entry without a stored job; skipping"
            );
            return Ok(());
        }
        Err(StoreError::TerminalState { state, .. }) => {
            debug!(
                target = "application::worker",
                job_id = %job_id,
                state = state.as_str(),
                "job already settled before pickup; skipping"
            );
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    let request = RenderRequest {
        job_id,
        input: &job.input,
        options: &job.options,
    };

    let mutation = match timeout(ctx.deadline, ctx.renderer.render(request)).await {
        Ok(Ok(document)) => {
            match ctx
                .artifacts
                .put(job_id, &job.options.format, document.bytes)
                .await
            {
                Ok(stored) => JobMutation::Complete {
                    artifact: stored.reference,
                },
                Err(err) => JobMutation::Fail {
                    reason: format!("failed to store artifact: {err}"),
                },
            }
        }
        Ok(Err(err)) => JobMutation::Fail {
            reason: err.to_string(),
        },
        Err(_) => JobMutation::Fail {
            reason: format!(
                "processing deadline of {}s exceeded",
                ctx.deadline.as_secs()
            ),
        },
    };

    settle(ctx, job_id, mutation, started_at.elapsed()).await;
    Ok(())
}

async fn settle(ctx: &EngineContext, job_id: Uuid, mutation: JobMutation, elapsed: Duration) {
    let completed = matches!(mutation, JobMutation::Complete { .. });

    match ctx.store.update(job_id, mutation).await {
        Ok(job) => {
            histogram!("stampa_render_duration_ms").record(elapsed.as_millis() as f64);
            if completed {
                counter!("stampa_jobs_completed_total").increment(1);
                info!(
                    target = "application::worker",
                    job_id = %job_id,
                    format = %job.options.format,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "job completed"
                );
            } else {
                counter!("stampa_jobs_failed_total").increment(1);
                info!(
                    target = "application::worker",
                    job_id = %job_id,
                    error = job.error.as_deref().unwrap_or(""),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "job failed"
                );
            }
        }
        // The reaper (or a racing settle) got there first; terminal states
        // are immutable, so the earlier outcome stands.
        Err(StoreError::TerminalState { state, .. }) => {
            debug!(
                target = "application::worker",
                job_id = %job_id,
                state = state.as_str(),
                "job settled concurrently; keeping earlier outcome"
            );
        }
        Err(err) => {
            warn!(
                target = "application::worker",
                job_id = %job_id,
                error = %err,
                "failed to settle job"
            );
        }
    }
}

async fn run_reaper(ctx: EngineContext, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // Skip the first immediate tick
    loop {
        ticker.tick().await;
        if let Err(err) = expire_stale_jobs(&ctx, interval).await {
            warn!(
                target = "application::worker",
                error = %err,
                "reaper sweep failed"
            );
        }
    }
}

/// Force-fail `Processing` jobs whose last transition is older than the
/// deadline plus `grace`. Covers workers that died mid-job so pollers
/// observe a terminal state in bounded time.
pub async fn expire_stale_jobs(ctx: &EngineContext, grace: Duration) -> Result<usize, StoreError> {
    let cutoff = OffsetDateTime::now_utc() - (ctx.deadline + grace);
    let stale = ctx.store.stale_processing(cutoff).await?;
    let mut expired = 0usize;

    for id in stale {
        let mutation = JobMutation::Fail {
            reason: format!(
                "processing deadline of {}s exceeded",
                ctx.deadline.as_secs()
            ),
        };
        match ctx.store.update(id, mutation).await {
            Ok(_) => {
                expired += 1;
                counter!("stampa_jobs_failed_total").increment(1);
                warn!(
                    target = "application::worker",
                    job_id = %id,
                    "stuck job forcibly failed by reaper"
                );
            }
            Err(StoreError::TerminalState { .. }) | Err(StoreError::NotFound) => {}
            Err(err) => {
                warn!(
                    target = "application::worker",
                    job_id = %id,
                    error = %err,
                    "reaper could not settle stuck job"
                );
            }
        }
    }

    Ok(expired)
}
