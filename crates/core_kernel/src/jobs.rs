//! Background job contracts
//!
//! Services never run slow side effects (payouts, notifications) inline.
//! They describe the work as a [`Job`] and hand it to a [`JobDispatcher`],
//! which owns queueing, priority, retries, backoff and timeouts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{Cancelled, Context};
use crate::identifiers::JobId;
use crate::ports::PortError;

/// Queue used when a job does not name one
pub const DEFAULT_QUEUE: &str = "default";

/// Delay policy between failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetryBackoff {
    /// `base × 2^(attempt-1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
    /// `step × attempt`
    Linear { step: Duration },
    Fixed { delay: Duration },
}

impl RetryBackoff {
    pub fn exponential(base: Duration) -> Self {
        RetryBackoff::Exponential {
            base,
            max: Duration::from_secs(300),
        }
    }

    pub fn linear(step: Duration) -> Self {
        RetryBackoff::Linear { step }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            RetryBackoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(attempt - 1);
                base.saturating_mul(factor).min(max)
            }
            RetryBackoff::Linear { step } => step.saturating_mul(attempt),
            RetryBackoff::Fixed { delay } => delay,
        }
    }
}

impl Default for RetryBackoff {
    fn default() -> Self {
        RetryBackoff::exponential(Duration::from_secs(1))
    }
}

/// Failure of a single job attempt
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl JobError {
    pub fn failed(message: impl Into<String>) -> Self {
        JobError::Failed(message.into())
    }

    /// Whether another attempt could succeed
    ///
    /// Port errors are retried only when transient; a missing record or a
    /// rejected write fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::Port(e) => e.is_transient(),
            JobError::Failed(_) | JobError::Cancelled(_) => true,
        }
    }
}

/// A unit of background work
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Stable name used in logs and dead-letter records
    fn job_type(&self) -> &'static str;

    fn queue_name(&self) -> &str {
        DEFAULT_QUEUE
    }

    fn max_retries(&self) -> u32 {
        3
    }

    fn retry_backoff(&self) -> RetryBackoff {
        RetryBackoff::default()
    }

    /// Higher runs first within a queue
    fn priority(&self) -> i32 {
        0
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// Executes one attempt; `ctx` is cancelled when the attempt times out
    async fn perform(&self, ctx: &Context) -> Result<(), JobError>;
}

/// Submission side of the job dispatcher
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Enqueues `job`; `ctx` only bounds the submission itself
    async fn perform(&self, ctx: &Context, job: Arc<dyn Job>) -> Result<JobId, PortError>;

    /// Enqueues `job` so that cancelling `ctx` also cancels its execution
    async fn perform_with_context(&self, ctx: &Context, job: Arc<dyn Job>) -> Result<JobId, PortError>;
}

/// Test double for the dispatcher contract
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use tokio::sync::Mutex;

    /// A submitted job as seen by the recording dispatcher
    #[derive(Clone)]
    pub struct RecordedJob {
        pub id: JobId,
        pub job: Arc<dyn Job>,
        pub linked_to_caller: bool,
    }

    /// Records submissions without running them
    #[derive(Default)]
    pub struct RecordingDispatcher {
        jobs: Mutex<Vec<RecordedJob>>,
    }

    impl RecordingDispatcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn jobs(&self) -> Vec<RecordedJob> {
            self.jobs.lock().await.clone()
        }

        pub async fn jobs_of_type(&self, job_type: &str) -> Vec<RecordedJob> {
            self.jobs
                .lock()
                .await
                .iter()
                .filter(|r| r.job.job_type() == job_type)
                .cloned()
                .collect()
        }

        /// Runs every recorded job once, in submission order
        pub async fn run_all(&self, ctx: &Context) -> Vec<Result<(), JobError>> {
            let jobs = self.jobs.lock().await.clone();
            let mut results = Vec::with_capacity(jobs.len());
            for recorded in jobs {
                results.push(recorded.job.perform(ctx).await);
            }
            results
        }

        async fn record(&self, ctx: &Context, job: Arc<dyn Job>, linked: bool) -> Result<JobId, PortError> {
            ctx.check()?;
            let id = JobId::new_v7();
            self.jobs.lock().await.push(RecordedJob { id, job, linked_to_caller: linked });
            Ok(id)
        }
    }

    #[async_trait]
    impl JobDispatcher for RecordingDispatcher {
        async fn perform(&self, ctx: &Context, job: Arc<dyn Job>) -> Result<JobId, PortError> {
            self.record(ctx, job, false).await
        }

        async fn perform_with_context(&self, ctx: &Context, job: Arc<dyn Job>) -> Result<JobId, PortError> {
            self.record(ctx, job, true).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_port_errors_are_retryable() {
        assert!(JobError::from(PortError::connection("refused")).is_retryable());
        assert!(!JobError::from(PortError::not_found("Claim", "c-1")).is_retryable());
        assert!(!JobError::from(PortError::validation("bad amount")).is_retryable());
        assert!(JobError::failed("gateway hiccup").is_retryable());
    }

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let backoff = RetryBackoff::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(5),
        };
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(4), Duration::from_secs(5));
    }

    #[test]
    fn test_linear_backoff() {
        let backoff = RetryBackoff::linear(Duration::from_millis(250));
        assert_eq!(backoff.delay(1), Duration::from_millis(250));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        assert_eq!(RetryBackoff::default().delay(0), Duration::from_secs(1));
    }
}
