//! Periodic driver for the lifecycle sweeps
//!
//! Each sweep has its own interval and its own async mutex: two runs of the
//! same sweep never overlap, while different sweeps proceed in parallel.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use core_kernel::{text_enum, CancelHandle, Context};

use crate::error::PolicyError;
use crate::lifecycle::{PolicyLifecycleService, SweepReport};

text_enum! {
    pub enum SweepKind {
        ExpiredPolicies => "expired_policies",
        GracePeriodExpirations => "grace_period_expirations",
        AutoRenewals => "auto_renewals",
        RenewalReminders => "renewal_reminders",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub expired_policies_interval: Duration,
    pub grace_period_interval: Duration,
    pub auto_renewal_interval: Duration,
    pub renewal_reminder_interval: Duration,
    pub reminder_days_ahead: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            expired_policies_interval: Duration::from_secs(3600),
            grace_period_interval: Duration::from_secs(3600),
            auto_renewal_interval: Duration::from_secs(6 * 3600),
            renewal_reminder_interval: Duration::from_secs(24 * 3600),
            reminder_days_ahead: 30,
        }
    }
}

impl SchedulerConfig {
    fn interval(&self, kind: SweepKind) -> Duration {
        match kind {
            SweepKind::ExpiredPolicies => self.expired_policies_interval,
            SweepKind::GracePeriodExpirations => self.grace_period_interval,
            SweepKind::AutoRenewals => self.auto_renewal_interval,
            SweepKind::RenewalReminders => self.renewal_reminder_interval,
        }
    }
}

struct Guards {
    expired: Mutex<()>,
    grace: Mutex<()>,
    renewals: Mutex<()>,
    reminders: Mutex<()>,
}

impl Guards {
    fn for_kind(&self, kind: SweepKind) -> &Mutex<()> {
        match kind {
            SweepKind::ExpiredPolicies => &self.expired,
            SweepKind::GracePeriodExpirations => &self.grace,
            SweepKind::AutoRenewals => &self.renewals,
            SweepKind::RenewalReminders => &self.reminders,
        }
    }
}

pub struct LifecycleScheduler {
    service: Arc<PolicyLifecycleService>,
    config: SchedulerConfig,
    guards: Guards,
    root: Context,
    root_handle: CancelHandle,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl LifecycleScheduler {
    pub fn new(service: Arc<PolicyLifecycleService>, config: SchedulerConfig) -> Arc<Self> {
        let (root, root_handle) = Context::background().with_cancel();
        Arc::new(Self {
            service,
            config,
            guards: Guards {
                expired: Mutex::new(()),
                grace: Mutex::new(()),
                renewals: Mutex::new(()),
                reminders: Mutex::new(()),
            },
            root,
            root_handle,
            tasks: StdMutex::new(Vec::new()),
        })
    }

    /// Spawns one timer loop per sweep
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !tasks.is_empty() {
            return;
        }
        for kind in SweepKind::ALL.iter().copied() {
            let scheduler = Arc::clone(self);
            tasks.push(tokio::spawn(async move { scheduler.run_loop(kind).await }));
        }
        info!(sweeps = SweepKind::ALL.len(), "Lifecycle scheduler started");
    }

    async fn run_loop(&self, kind: SweepKind) {
        let mut ticker = tokio::time::interval(self.config.interval(kind));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = self.root.cancelled() => break,
                _ = ticker.tick() => {
                    match self.run_sweep(kind).await {
                        Ok(report) if !report.failures.is_empty() => {
                            warn!(sweep = %kind, failures = report.failures.len(), "Sweep finished with failures");
                        }
                        Ok(_) => {}
                        Err(e) if self.root.is_cancelled() => {
                            info!(sweep = %kind, error = %e, "Sweep interrupted by shutdown");
                            break;
                        }
                        Err(e) => error!(sweep = %kind, error = %e, "Sweep failed"),
                    }
                }
            }
        }
    }

    /// Runs one sweep now, waiting for any run of the same sweep in progress
    pub async fn run_sweep(&self, kind: SweepKind) -> Result<SweepReport, PolicyError> {
        let _guard = self.guards.for_kind(kind).lock().await;
        let ctx = &self.root;
        match kind {
            SweepKind::ExpiredPolicies => self.service.process_expired_policies(ctx).await,
            SweepKind::GracePeriodExpirations => self.service.process_grace_period_expirations(ctx).await,
            SweepKind::AutoRenewals => self.service.process_auto_renewals(ctx).await,
            SweepKind::RenewalReminders => {
                self.service
                    .send_renewal_reminders(ctx, self.config.reminder_days_ahead)
                    .await
            }
        }
    }

    /// Cancels in-flight sweeps and waits for the timer loops to exit
    pub async fn shutdown(&self) {
        self.root_handle.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
        info!("Lifecycle scheduler stopped");
    }
}
