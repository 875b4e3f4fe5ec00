//! Cancellation context
//!
//! Every suspension point in the system (repository access, event publishing,
//! job submission, configuration reload, payment processing) receives a
//! [`Context`]. A context is cancelled explicitly through its [`CancelHandle`]
//! or implicitly when its deadline passes; cancelling a parent cancels every
//! child derived from it.
//!
//! ```rust,ignore
//! let (ctx, handle) = Context::background().with_timeout(Duration::from_secs(5));
//! repo.get_by_id(&ctx, id).await?;
//! handle.cancel();
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Why a context stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Error returned when work is attempted on a stopped context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct Cancelled {
    reason: CancelReason,
}

impl Cancelled {
    pub fn new(reason: CancelReason) -> Self {
        Self { reason }
    }

    pub fn reason(&self) -> CancelReason {
        self.reason
    }
}

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new(deadline: Option<Instant>) -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
            deadline,
            children: Mutex::new(Vec::new()),
        })
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
        let children = {
            let mut guard = self.children.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// A cloneable cancellation scope
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.inner.cancelled.load(Ordering::SeqCst))
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

/// Handle that cancels the context it was created with
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<Inner>,
}

impl CancelHandle {
    /// Cancels the context and all of its descendants
    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A root context that is never cancelled on its own
    pub fn background() -> Self {
        Self { inner: Inner::new(None) }
    }

    /// Derives a child that can be cancelled independently of the parent
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        self.derive(self.inner.deadline)
    }

    /// Derives a child whose deadline is `timeout` from now (or the parent's, if sooner)
    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelHandle) {
        let candidate = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        self.derive(Some(deadline))
    }

    fn derive(&self, deadline: Option<Instant>) -> (Context, CancelHandle) {
        let child = Inner::new(deadline);
        {
            let mut children = self.inner.children.lock().unwrap_or_else(|e| e.into_inner());
            children.retain(|w| w.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        if self.inner.cancelled.load(Ordering::SeqCst) {
            child.cancel();
        }
        let handle = CancelHandle { inner: Arc::clone(&child) };
        (Context { inner: child }, handle)
    }

    /// Returns the deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Returns true once the context was cancelled or its deadline passed
    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Returns `Err(Cancelled)` if the context has stopped
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Err(Cancelled::new(CancelReason::Cancelled));
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(Cancelled::new(CancelReason::DeadlineExceeded))
            }
            _ => Ok(()),
        }
    }

    /// Resolves when the context stops
    pub async fn cancelled(&self) -> Cancelled {
        loop {
            let notified = self.inner.notify.notified();
            if let Err(c) = self.check() {
                return c;
            }
            match self.inner.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Runs `fut` to completion unless the context stops first
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        self.check()?;
        tokio::select! {
            biased;
            c = self.cancelled() => Err(c),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_is_never_cancelled() {
        let ctx = Context::background();
        assert!(ctx.check().is_ok());
        assert!(ctx.deadline().is_none());
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_children() {
        let (parent, handle) = Context::background().with_cancel();
        let (child, _child_handle) = parent.with_cancel();
        let (grandchild, _) = child.with_timeout(Duration::from_secs(60));

        handle.cancel();

        assert!(child.is_cancelled());
        assert_eq!(grandchild.check().unwrap_err().reason(), CancelReason::Cancelled);
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_cancel_parent() {
        let parent = Context::background();
        let (_child, handle) = parent.with_cancel();
        handle.cancel();
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let (ctx, _handle) = Context::background().with_timeout(Duration::from_millis(50));
        let reason = ctx.cancelled().await.reason();
        assert_eq!(reason, CancelReason::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_cancelled_when_deadline_hits_first() {
        let (ctx, _handle) = Context::background().with_timeout(Duration::from_millis(10));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_child_of_cancelled_parent_starts_cancelled() {
        let (parent, handle) = Context::background().with_cancel();
        handle.cancel();
        let (child, _) = parent.with_cancel();
        assert!(child.is_cancelled());
    }
}
