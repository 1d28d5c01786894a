//! Webhook fan-out and delivery
//!
//! The runner only enqueues `CallWebhookJobsJob`s. Register the handlers of
//! this module on a [`JobRegistry`] to turn them into HTTP calls:
//!
//! ```rust,ignore
//! let queue = Arc::new(InMemoryQueue::new());
//! let webhooks = WebhookRegistry::new();
//! let registry = webhook_job_registry(webhooks, queue.clone(), sender, JobOptions::with_retry_limit(3));
//! queue.spawn_worker(Arc::new(registry));
//! ```

pub mod handlers;
pub mod registry;
pub mod sender;

pub use handlers::{
    CallWebhookJobData, CallWebhookJobHandler, CallWebhookJobsJobHandler, WebhookObjectMetadata,
};
pub use registry::{Webhook, WebhookRegistry};
#[cfg(feature = "webhook-http")]
pub use sender::HttpWebhookSender;
pub use sender::{LoggingWebhookSender, WebhookSender};

use crate::core::queue::{JobOptions, JobQueue, JobRegistry};
use crate::runner::webhooks::{CALL_WEBHOOK_JOB, CALL_WEBHOOK_JOBS_JOB};
use std::sync::Arc;

/// Job registry with both webhook handlers registered
pub fn webhook_job_registry(
    webhooks: WebhookRegistry,
    queue: Arc<dyn JobQueue>,
    sender: Arc<dyn WebhookSender>,
    options: JobOptions,
) -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register(
        CALL_WEBHOOK_JOBS_JOB,
        Arc::new(CallWebhookJobsJobHandler::new(webhooks, queue, options)),
    );
    registry.register(CALL_WEBHOOK_JOB, Arc::new(CallWebhookJobHandler::new(sender)));
    registry
}
