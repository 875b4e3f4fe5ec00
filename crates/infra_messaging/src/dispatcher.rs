//! Background job dispatcher
//!
//! Jobs are routed by [`Job::queue_name`] to a lazily created queue. Each
//! queue is a priority heap (higher priority first, then enqueue order)
//! served by its own pool of worker tasks.
//!
//! Every attempt runs in a separate task under a context derived from the
//! submitter's context (for `perform_with_context`) or the dispatcher's root
//! context, with the job's timeout as deadline. Timeouts and panics count as
//! failed attempts. A failed job is re-queued after its backoff delay until
//! `max_retries` retries were spent, then moved to the dead-letter list.
//! Jobs failing with a permanent port error skip the retries.
//! The list keeps the newest `dead_letter_capacity` entries.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use core_kernel::{
    CancelHandle, Context, HealthCheckResult, HealthCheckable, Job, JobDispatcher, JobError,
    JobId, PortError,
};

use crate::error::MessagingError;

/// Worker pool sizing and shutdown behaviour
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Workers for queues without an explicit entry
    pub default_workers: usize,
    /// Per-queue worker counts
    pub queue_workers: HashMap<String, usize>,
    /// How long `shutdown` waits for queued and running jobs
    pub shutdown_timeout: Duration,
    /// Dead letters retained before the oldest are evicted
    pub dead_letter_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_workers: 2,
            queue_workers: HashMap::new(),
            shutdown_timeout: Duration::from_secs(30),
            dead_letter_capacity: 1000,
        }
    }
}

impl DispatcherConfig {
    pub fn with_queue(mut self, queue: impl Into<String>, workers: usize) -> Self {
        self.queue_workers.insert(queue.into(), workers);
        self
    }

    pub fn with_dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.dead_letter_capacity = capacity;
        self
    }

    fn workers_for(&self, queue: &str) -> usize {
        self.queue_workers
            .get(queue)
            .copied()
            .unwrap_or(self.default_workers)
            .max(1)
    }
}

/// A job that exhausted its retries
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub job_id: JobId,
    pub job_type: String,
    pub queue: String,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
}

/// Dispatcher counters
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub succeeded: u64,
    pub failed_attempts: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub cancelled: u64,
    pub queues: usize,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    succeeded: AtomicU64,
    failed_attempts: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    cancelled: AtomicU64,
}

struct QueuedJob {
    id: JobId,
    job: Arc<dyn Job>,
    priority: i32,
    seq: u64,
    /// Attempts already made
    attempt: u32,
    /// Submitter's context when cancellation is linked
    parent: Option<Context>,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // BinaryHeap is a max-heap: higher priority wins, then the lower sequence number.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Queue {
    heap: Mutex<BinaryHeap<QueuedJob>>,
    notify: Notify,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Queue {
    fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, job: QueuedJob) {
        self.heap.lock().unwrap_or_else(|e| e.into_inner()).push(job);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<QueuedJob> {
        self.heap.lock().unwrap_or_else(|e| e.into_inner()).pop()
    }

    fn depth(&self) -> usize {
        self.heap.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

struct Inner {
    config: DispatcherConfig,
    queues: Mutex<HashMap<String, Arc<Queue>>>,
    seq: AtomicU64,
    closed: AtomicBool,
    root: Context,
    root_handle: CancelHandle,
    dead_letters: Mutex<VecDeque<DeadLetter>>,
    counters: Counters,
}

impl Inner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn queue(self: &Arc<Self>, name: &str) -> Arc<Queue> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(queue) = queues.get(name) {
            return Arc::clone(queue);
        }

        let queue = Arc::new(Queue::new());
        let workers = self.config.workers_for(name);
        {
            let mut handles = queue.workers.lock().unwrap_or_else(|e| e.into_inner());
            for worker in 0..workers {
                handles.push(tokio::spawn(worker_loop(
                    Arc::clone(self),
                    name.to_string(),
                    Arc::clone(&queue),
                    worker,
                )));
            }
        }
        info!(queue = name, workers, "Job queue started");
        queues.insert(name.to_string(), Arc::clone(&queue));
        queue
    }

    fn enqueue(self: &Arc<Self>, job: Arc<dyn Job>, parent: Option<Context>) -> JobId {
        let id = JobId::new_v7();
        let queue_name = job.queue_name().to_string();
        let queued = QueuedJob {
            id,
            priority: job.priority(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            attempt: 0,
            parent,
            job,
        };
        debug!(job_id = %id, job_type = queued.job.job_type(), queue = %queue_name, priority = queued.priority, "Job enqueued");
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        self.queue(&queue_name).push(queued);
        id
    }
}

/// Per-queue worker pools executing [`Job`]s
///
/// Cheap to clone; clones share the same queues.
///
/// # Example
///
/// ```rust,ignore
/// let dispatcher = JobDispatcherService::new(
///     DispatcherConfig::default().with_queue("payouts", 4),
/// );
/// dispatcher.perform(&ctx, Arc::new(job)).await?;
/// ```
#[derive(Clone)]
pub struct JobDispatcherService {
    inner: Arc<Inner>,
}

impl JobDispatcherService {
    pub fn new(config: DispatcherConfig) -> Self {
        let (root, root_handle) = Context::background().with_cancel();
        Self {
            inner: Arc::new(Inner {
                config,
                queues: Mutex::new(HashMap::new()),
                seq: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                root,
                root_handle,
                dead_letters: Mutex::new(VecDeque::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Jobs that exhausted their retries, oldest first
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner
            .dead_letters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Removes and returns the retained dead letters, oldest first
    pub fn drain_dead_letters(&self) -> Vec<DeadLetter> {
        self.inner
            .dead_letters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }

    /// Jobs waiting in `queue` (not counting running or backing-off jobs)
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(queue)
            .map(|q| q.depth())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> DispatcherStats {
        let c = &self.inner.counters;
        DispatcherStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed_attempts: c.failed_attempts.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
            dead_lettered: c.dead_lettered.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            queues: self.inner.queues.lock().unwrap_or_else(|e| e.into_inner()).len(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Stops accepting jobs, lets workers drain their queues, then cancels
    /// whatever is still running once the shutdown timeout passes
    pub async fn shutdown(&self) -> DispatcherStats {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return self.stats();
        }

        let queues: Vec<(String, Arc<Queue>)> = self
            .inner
            .queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, q)| (name.clone(), Arc::clone(q)))
            .collect();
        for (_, queue) in &queues {
            queue.notify.notify_waiters();
        }

        let deadline = tokio::time::Instant::now() + self.inner.config.shutdown_timeout;
        let mut timed_out = false;
        for (name, queue) in &queues {
            let handles: Vec<JoinHandle<()>> =
                std::mem::take(&mut *queue.workers.lock().unwrap_or_else(|e| e.into_inner()));
            for mut handle in handles {
                if timed_out {
                    handle.abort();
                    continue;
                }
                if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                    warn!(queue = %name, "Job workers did not finish before shutdown timeout");
                    timed_out = true;
                    self.inner.root_handle.cancel();
                    handle.abort();
                }
            }
            let left = queue.depth();
            if left > 0 {
                warn!(queue = %name, jobs = left, "Jobs left unprocessed at shutdown");
            }
        }
        self.inner.root_handle.cancel();

        let stats = self.stats();
        info!(
            succeeded = stats.succeeded,
            dead_lettered = stats.dead_lettered,
            "Job dispatcher stopped"
        );
        stats
    }

    async fn submit(&self, ctx: &Context, job: Arc<dyn Job>, link: bool) -> Result<JobId, PortError> {
        ctx.check()?;
        if self.inner.is_closed() {
            return Err(MessagingError::Closed("job dispatcher").into());
        }
        let parent = if link { Some(ctx.clone()) } else { None };
        Ok(self.inner.enqueue(job, parent))
    }
}

impl Default for JobDispatcherService {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

#[async_trait]
impl JobDispatcher for JobDispatcherService {
    async fn perform(&self, ctx: &Context, job: Arc<dyn Job>) -> Result<JobId, PortError> {
        self.submit(ctx, job, false).await
    }

    async fn perform_with_context(&self, ctx: &Context, job: Arc<dyn Job>) -> Result<JobId, PortError> {
        self.submit(ctx, job, true).await
    }
}

#[async_trait]
impl HealthCheckable for JobDispatcherService {
    async fn health_check(&self) -> HealthCheckResult {
        if self.is_closed() {
            HealthCheckResult::unhealthy("job-dispatcher", 0, "job dispatcher is shut down")
        } else {
            HealthCheckResult::healthy("job-dispatcher", 0)
        }
    }
}

async fn worker_loop(inner: Arc<Inner>, queue_name: String, queue: Arc<Queue>, worker: usize) {
    debug!(queue = %queue_name, worker, "Job worker started");
    loop {
        let notified = queue.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match queue.pop() {
            Some(job) => run_attempt(&inner, &queue_name, &queue, job).await,
            None if inner.is_closed() => break,
            None => notified.await,
        }
    }
    debug!(queue = %queue_name, worker, "Job worker stopped");
}

enum Outcome {
    Succeeded,
    Failed { reason: String, retryable: bool },
}

impl Outcome {
    fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
            retryable: true,
        }
    }
}

async fn run_attempt(inner: &Arc<Inner>, queue_name: &str, queue: &Arc<Queue>, mut queued: QueuedJob) {
    let base = queued.parent.clone().unwrap_or_else(|| inner.root.clone());
    if let Err(c) = base.check() {
        info!(job_id = %queued.id, job_type = queued.job.job_type(), reason = %c, "Job cancelled before execution");
        inner.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        return;
    }

    queued.attempt += 1;
    let timeout = queued.job.timeout();
    let (ctx, handle) = base.with_timeout(timeout);
    let job = Arc::clone(&queued.job);
    let mut task: JoinHandle<Result<(), JobError>> = tokio::spawn(async move { job.perform(&ctx).await });

    let outcome = match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(Ok(()))) => Outcome::Succeeded,
        Ok(Ok(Err(e))) => Outcome::Failed {
            reason: e.to_string(),
            retryable: e.is_retryable(),
        },
        Ok(Err(join)) if join.is_panic() => Outcome::failed("job panicked"),
        Ok(Err(_)) => Outcome::failed("job aborted"),
        Err(_) => {
            handle.cancel();
            task.abort();
            Outcome::failed(format!("timed out after {}ms", timeout.as_millis()))
        }
    };

    let (reason, retryable) = match outcome {
        Outcome::Succeeded => {
            inner.counters.succeeded.fetch_add(1, Ordering::Relaxed);
            debug!(job_id = %queued.id, job_type = queued.job.job_type(), attempt = queued.attempt, "Job succeeded");
            return;
        }
        Outcome::Failed { reason, retryable } => (reason, retryable),
    };
    inner.counters.failed_attempts.fetch_add(1, Ordering::Relaxed);

    if base.is_cancelled() {
        info!(job_id = %queued.id, job_type = queued.job.job_type(), "Job cancelled by its caller; not retrying");
        inner.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        return;
    }

    if retryable && queued.attempt <= queued.job.max_retries() {
        let delay = queued.job.retry_backoff().delay(queued.attempt);
        warn!(
            job_id = %queued.id,
            job_type = queued.job.job_type(),
            queue = queue_name,
            attempt = queued.attempt,
            delay_ms = delay.as_millis() as u64,
            error = %reason,
            "Job attempt failed; retrying"
        );
        inner.counters.retried.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::clone(queue);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => queue.push(queued),
                _ = base.cancelled() => {}
            }
        });
        return;
    }

    error!(
        job_id = %queued.id,
        job_type = queued.job.job_type(),
        queue = queue_name,
        attempts = queued.attempt,
        error = %reason,
        "Job exhausted its retries; moved to dead letters"
    );
    inner.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
    let capacity = inner.config.dead_letter_capacity;
    if capacity == 0 {
        return;
    }
    let mut dead_letters = inner.dead_letters.lock().unwrap_or_else(|e| e.into_inner());
    while dead_letters.len() >= capacity {
        if let Some(evicted) = dead_letters.pop_front() {
            warn!(job_id = %evicted.job_id, job_type = %evicted.job_type, "Dead letter evicted");
        }
    }
    dead_letters.push_back(DeadLetter {
        job_id: queued.id,
        job_type: queued.job.job_type().to_string(),
        queue: queue_name.to_string(),
        attempts: queued.attempt,
        last_error: reason,
        failed_at: Utc::now(),
    });
}
