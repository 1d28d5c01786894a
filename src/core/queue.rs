//! Background job queue
//!
//! Mutations enqueue jobs through the [`JobQueue`] trait and never wait for
//! them to run. [`InMemoryQueue`] is a FIFO with at-least-once delivery: a
//! failing job is re-queued until it exhausts its retry budget.
//!
//! ```rust,ignore
//! let queue = InMemoryQueue::new();
//! let mut registry = JobRegistry::new();
//! registry.register("CallWebhookJob", Arc::new(my_handler));
//!
//! queue.add("CallWebhookJob", json!({...}), JobOptions::with_retry_limit(3)).await?;
//! let report = queue.work(&registry).await;
//! ```

use crate::core::error::QueueError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

const QUEUE_NAME: &str = "in-memory";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    /// Number of retries after the first failed attempt
    pub retry_limit: u32,
}

impl JobOptions {
    pub fn with_retry_limit(retry_limit: u32) -> Self {
        Self { retry_limit }
    }
}

/// A job waiting in a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedJob {
    pub id: Uuid,
    pub name: String,
    pub payload: Value,
    pub options: JobOptions,
    /// Failed attempts so far
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Sink for background jobs
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn add(&self, job_name: &str, payload: Value, options: JobOptions)
    -> Result<(), QueueError>;
}

/// Executes jobs of one name
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &QueuedJob) -> anyhow::Result<()>;
}

/// Job handlers keyed by job name
#[derive(Default, Clone)]
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_name.into(), handler);
    }

    pub fn get(&self, job_name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_name).cloned()
    }
}

/// Outcome of a [`InMemoryQueue::work`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkReport {
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
}

/// In-process FIFO queue
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    jobs: Arc<Mutex<VecDeque<QueuedJob>>>,
    failed: Arc<Mutex<Vec<QueuedJob>>>,
    notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the pending jobs
    pub fn pending(&self) -> Vec<QueuedJob> {
        self.jobs
            .lock()
            .map(|jobs| jobs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Pending jobs with the given name
    pub fn pending_named(&self, job_name: &str) -> Vec<QueuedJob> {
        self.pending()
            .into_iter()
            .filter(|job| job.name == job_name)
            .collect()
    }

    /// Jobs dropped after exhausting their retries
    pub fn failed_jobs(&self) -> Vec<QueuedJob> {
        self.failed
            .lock()
            .map(|jobs| jobs.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting jobs; a spawned worker exits once the queue drains
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn pop(&self) -> Option<QueuedJob> {
        self.jobs.lock().ok().and_then(|mut jobs| jobs.pop_front())
    }

    fn push(&self, job: QueuedJob) -> Result<(), QueueError> {
        self.jobs
            .lock()
            .map_err(|_| QueueError::Closed {
                queue: QUEUE_NAME.to_string(),
            })?
            .push_back(job);
        self.notify.notify_one();
        Ok(())
    }

    fn bury(&self, job: QueuedJob) {
        if let Ok(mut failed) = self.failed.lock() {
            failed.push(job);
        }
    }

    /// Run jobs until the queue is empty
    pub async fn work(&self, registry: &JobRegistry) -> WorkReport {
        let mut report = WorkReport::default();

        while let Some(mut job) = self.pop() {
            let Some(handler) = registry.get(&job.name) else {
                let err = QueueError::UnknownJob {
                    job: job.name.clone(),
                };
                tracing::error!(job_id = %job.id, error = %err, "dropping job");
                report.failed += 1;
                self.bury(job);
                continue;
            };

            match handler.handle(&job).await {
                Ok(()) => {
                    tracing::debug!(job = %job.name, job_id = %job.id, "job completed");
                    report.completed += 1;
                }
                Err(err) if job.attempts < job.options.retry_limit => {
                    job.attempts += 1;
                    tracing::debug!(
                        job = %job.name,
                        job_id = %job.id,
                        attempt = job.attempts,
                        error = %err,
                        "job failed, retrying"
                    );
                    report.retried += 1;
                    if self.push(job).is_err() {
                        report.failed += 1;
                    }
                }
                Err(err) => {
                    tracing::error!(
                        job = %job.name,
                        job_id = %job.id,
                        retries = job.attempts,
                        error = %err,
                        "job exhausted its retries"
                    );
                    report.failed += 1;
                    self.bury(job);
                }
            }
        }

        report
    }

    /// Process jobs in the background as they arrive
    pub fn spawn_worker(&self, registry: Arc<JobRegistry>) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            loop {
                queue.work(&registry).await;
                if queue.is_closed() && queue.is_empty() {
                    break;
                }
                queue.notify.notified().await;
            }
        })
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn add(
        &self,
        job_name: &str,
        payload: Value,
        options: JobOptions,
    ) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed {
                queue: QUEUE_NAME.to_string(),
            });
        }
        self.push(QueuedJob {
            id: Uuid::new_v4(),
            name: job_name.to_string(),
            payload,
            options,
            attempts: 0,
            enqueued_at: Utc::now(),
        })
    }
}
