// ============================================================================
// Background Jobs
// ============================================================================
//
// In-process job queue with bounded retries. A job gets `attempts` tries per
// run; when the last try fails it is requeued after `requeue_delay`, at most
// `max_requeues` times, and then dropped.
//
// ============================================================================

pub mod handlers;

pub use handlers::{
    EMAIL_QUEUE, EmailJob, EmailJobHandler, LogMailer, LogUserSink, Mailer, USER_SYNC_QUEUE,
    UserSink, UserSyncJob, UserSyncJobHandler,
};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error("invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("queue '{0}' is closed")]
    Closed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub payload: Value,
    /// Times this job was put back after exhausting its attempts
    pub requeued: u32,
}

impl Job {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            payload,
            requeued: 0,
        }
    }

    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, JobError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), JobError>;
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub attempts: u32,
    pub requeue_delay: Duration,
    pub max_requeues: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            requeue_delay: Duration::from_secs(24 * 60 * 60),
            max_requeues: 5,
        }
    }
}

/// Outcome counters of one queue
#[derive(Debug, Default)]
pub struct QueueStats {
    completed: AtomicU64,
    failed_attempts: AtomicU64,
    requeued: AtomicU64,
    dropped: AtomicU64,
}

impl QueueStats {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::SeqCst)
    }

    pub fn requeued(&self) -> u64 {
        self.requeued.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Producer side of a queue; cheap to clone
#[derive(Clone)]
pub struct JobQueue {
    name: Arc<str>,
    sender: mpsc::UnboundedSender<Job>,
    stats: Arc<QueueStats>,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue").field("name", &self.name).finish()
    }
}

impl JobQueue {
    /// Create a queue and spawn its worker
    ///
    /// The worker stops once every `JobQueue` clone is dropped and no delayed
    /// requeue is pending.
    pub fn start(
        name: impl Into<String>,
        handler: Arc<dyn JobHandler>,
        config: QueueConfig,
    ) -> (Self, JoinHandle<()>) {
        let name: Arc<str> = Arc::from(name.into());
        let (sender, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(QueueStats::default());

        let worker = Worker {
            queue: Arc::clone(&name),
            handler,
            config,
            stats: Arc::clone(&stats),
            requeue: sender.downgrade(),
        };
        let handle = tokio::spawn(worker.run(receiver));

        (Self { name, sender, stats }, handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Enqueue a job, returning its id
    pub fn enqueue<P: Serialize>(&self, job_name: &str, payload: &P) -> Result<String, JobError> {
        let job = Job::new(job_name, serde_json::to_value(payload)?);
        let id = job.id.clone();
        self.sender
            .send(job)
            .map_err(|_| JobError::Closed(self.name.to_string()))?;
        debug!(queue = %self.name, job = %id, name = job_name, "job enqueued");
        Ok(id)
    }
}

struct Worker {
    queue: Arc<str>,
    handler: Arc<dyn JobHandler>,
    config: QueueConfig,
    stats: Arc<QueueStats>,
    requeue: mpsc::WeakUnboundedSender<Job>,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = receiver.recv().await {
            self.process(job).await;
        }
        debug!(queue = %self.queue, "worker stopped");
    }

    async fn process(&self, mut job: Job) {
        let attempts = self.config.attempts.max(1);

        for attempt in 1..=attempts {
            match self.handler.handle(&job).await {
                Ok(()) => {
                    self.stats.completed.fetch_add(1, Ordering::SeqCst);
                    info!(queue = %self.queue, job = %job.id, attempt, "job completed");
                    return;
                }
                Err(err) => {
                    self.stats.failed_attempts.fetch_add(1, Ordering::SeqCst);
                    warn!(queue = %self.queue, job = %job.id, attempt, error = %err, "job attempt failed");
                }
            }
        }

        error!(queue = %self.queue, job = %job.id, requeued = job.requeued, "job final attempt failed");

        if job.requeued >= self.config.max_requeues {
            self.stats.dropped.fetch_add(1, Ordering::SeqCst);
            error!(queue = %self.queue, job = %job.id, "job dropped after maximum requeues");
            return;
        }

        let Some(sender) = self.requeue.upgrade() else {
            self.stats.dropped.fetch_add(1, Ordering::SeqCst);
            warn!(queue = %self.queue, job = %job.id, "queue closed, job dropped");
            return;
        };

        job.requeued += 1;
        self.stats.requeued.fetch_add(1, Ordering::SeqCst);
        info!(queue = %self.queue, job = %job.id, requeued = job.requeued, "job requeued");

        let delay = self.config.requeue_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver only goes away when the worker task is aborted
            let _ = sender.send(job);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    struct FlakyHandler {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, _job: &Job) -> Result<(), JobError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(JobError::Failed(format!("call {}", call)));
            }
            Ok(())
        }
    }

    fn flaky(failures: u32) -> Arc<FlakyHandler> {
        Arc::new(FlakyHandler {
            calls: AtomicU32::new(0),
            failures,
        })
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        while !condition() {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_within_attempts() {
        let handler = flaky(2);
        let (queue, _worker) = JobQueue::start("test", handler.clone(), QueueConfig::default());

        queue.enqueue("sync", &json!({ "n": 1 })).unwrap();
        wait_until(|| queue.stats().completed() == 1).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(queue.stats().requeued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeued_after_final_attempt() {
        let handler = flaky(3);
        let (queue, _worker) = JobQueue::start("test", handler.clone(), QueueConfig::default());

        let started = tokio::time::Instant::now();
        queue.enqueue("sync", &json!({})).unwrap();
        wait_until(|| queue.stats().completed() == 1).await;

        assert_eq!(queue.stats().requeued(), 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= Duration::from_secs(24 * 60 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_after_max_requeues() {
        let handler = flaky(u32::MAX);
        let (queue, _worker) = JobQueue::start("test", handler.clone(), QueueConfig::default());

        queue.enqueue("sync", &json!({})).unwrap();
        wait_until(|| queue.stats().dropped() == 1).await;

        assert_eq!(queue.stats().requeued(), 5);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 18);
    }

    #[tokio::test]
    async fn test_worker_stops_when_queue_dropped() {
        let (queue, worker) = JobQueue::start("test", flaky(0), QueueConfig::default());
        drop(queue);
        worker.await.unwrap();
    }
}
