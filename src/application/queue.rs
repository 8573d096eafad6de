//! Bounded FIFO queue of pending job ids.
//!
//! The queue decouples submission from execution: the API enqueues ids
//! without blocking, workers suspend on an empty queue. A full queue is
//! explicit backpressure — enqueue fails fast instead of growing without
//! bound.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use metrics::gauge;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at capacity; the submitter should retry later.
    #[error("job queue is full")]
    Full,
    /// The worker pool has shut down; no further work is accepted.
    #[error("job queue is closed")]
    Closed,
}

/// Submission half of the queue. Cheap to clone; ids only — the job store
/// keeps the canonical record.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Uuid>,
    depth: Arc<AtomicUsize>,
}

/// Consumption half, shared by every worker in the pool.
#[derive(Clone)]
pub struct JobStream {
    rx: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    depth: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Build a queue with the given capacity, returning the submission and
    /// consumption halves.
    pub fn bounded(capacity: usize) -> (JobQueue, JobStream) {
        let (tx, rx) = mpsc::channel(capacity);
        let depth = Arc::new(AtomicUsize::new(0));
        (
            JobQueue {
                tx,
                depth: depth.clone(),
            },
            JobStream {
                rx: Arc::new(Mutex::new(rx)),
                depth,
            },
        )
    }

    /// Append a job id. Never blocks: a full queue answers [`QueueError::Full`].
    pub fn enqueue(&self, id: Uuid) -> Result<(), QueueError> {
        self.tx.try_send(id).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;

        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        gauge!("stampa_queue_depth").set(depth as f64);
        debug!(
            target = "application::queue",
            job_id = %id,
            depth,
            "job id enqueued"
        );
        Ok(())
    }

    /// Number of ids currently waiting.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStream {
    /// Wait for the next job id in FIFO order.
    ///
    /// Suspends while the queue is empty; resolves to `None` once every
    /// submission handle is gone, which is the pool's shutdown signal.
    pub async fn recv(&self) -> Option<Uuid> {
        let id = self.rx.lock().await.recv().await;
        if id.is_some() {
            let depth = self.depth.fetch_sub(1, Ordering::SeqCst) - 1;
            gauge!("stampa_queue_depth").set(depth as f64);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_ids_in_submission_order() {
        let (queue, stream) = JobQueue::bounded(8);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();

        queue.enqueue(first).expect("enqueue first");
        queue.enqueue(second).expect("enqueue second");
        queue.enqueue(third).expect("enqueue third");

        assert_eq!(stream.recv().await, Some(first));
        assert_eq!(stream.recv().await, Some(second));
        assert_eq!(stream.recv().await, Some(third));
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let (queue, stream) = JobQueue::bounded(2);
        queue.enqueue(Uuid::new_v4()).expect("first fits");
        queue.enqueue(Uuid::new_v4()).expect("second fits");

        assert_eq!(queue.enqueue(Uuid::new_v4()), Err(QueueError::Full));
        assert_eq!(queue.len(), 2);

        // Draining one slot frees capacity for the next submission.
        stream.recv().await.expect("drain one");
        queue.enqueue(Uuid::new_v4()).expect("slot freed");
    }

    #[tokio::test]
    async fn recv_suspends_until_an_id_arrives() {
        let (queue, stream) = JobQueue::bounded(1);
        let id = Uuid::new_v4();

        let waiter = tokio::spawn(async move { stream.recv().await });
        tokio::task::yield_now().await;
        queue.enqueue(id).expect("enqueue");

        assert_eq!(waiter.await.expect("join"), Some(id));
    }

    #[tokio::test]
    async fn dropping_all_senders_signals_shutdown() {
        let (queue, stream) = JobQueue::bounded(1);
        drop(queue);
        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn depth_tracks_enqueue_and_recv() {
        let (queue, stream) = JobQueue::bounded(4);
        assert!(queue.is_empty());

        queue.enqueue(Uuid::new_v4()).expect("enqueue");
        queue.enqueue(Uuid::new_v4()).expect("enqueue");
        assert_eq!(queue.len(), 2);

        stream.recv().await.expect("recv");
        assert_eq!(queue.len(), 1);
    }
}
