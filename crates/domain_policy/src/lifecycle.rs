//! Policy lifecycle: renewal, cancellation and the periodic sweeps
//!
//! # Renewal
//!
//! A policy is renewable while active, unexpired, not yet renewed and
//! within `renewal_window_days` of its expiration. The successor starts
//! `pending`; a successful payment promotes it to `active`, otherwise it
//! waits out a grace period. The source policy gets a `renewal_date` so it
//! is never renewed twice.
//!
//! # Cancellation
//!
//! Refund = `premium × unused_ratio × cancellation_refund_factor`, paid as a
//! negative-amount payment when positive.
//!
//! # Sweeps
//!
//! Each sweep works policy by policy and records failures in its
//! [`SweepReport`] instead of aborting, except on cancellation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use core_kernel::{
    text_enum, Context, Currency, DomainEvent, ErrorKind, EventPayload, EventPublisher, JobDispatcher,
    PaymentId, PolicyId,
};
use domain_billing::{BillingError, PaymentRequest, PaymentService, RefundRequest};
use domain_rules::RulesManager;

use crate::error::PolicyError;
use crate::notification::{NotificationJob, NotificationType};
use crate::policy::{PaymentFrequency, Policy, PolicyStatus};
use crate::ports::PolicyRepository;

/// Overrides for a renewal; unset fields carry over from the source policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenewalOptions {
    pub effective_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub coverage_amount: Option<Decimal>,
    pub payment_frequency: Option<PaymentFrequency>,
    pub auto_renew: Option<bool>,
    /// Charge the renewal premium immediately with this method
    pub payment_method: Option<String>,
}

text_enum! {
    pub enum RenewalStatus {
        Renewed => "renewed",
        PendingPayment => "pending_payment",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalResult {
    pub success: bool,
    pub status: RenewalStatus,
    pub old_policy_id: PolicyId,
    pub new_policy_id: Option<PolicyId>,
    pub new_premium: Decimal,
    pub currency: Currency,
    pub effective_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub payment_id: Option<PaymentId>,
    pub grace_period_end: Option<DateTime<Utc>>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationResult {
    pub policy_id: PolicyId,
    pub status: PolicyStatus,
    pub cancelled_at: DateTime<Utc>,
    pub refund_amount: Decimal,
    pub currency: Currency,
    pub refund_payment_id: Option<PaymentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub policy_id: PolicyId,
    pub error: String,
}

/// Outcome of one sweep run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep: String,
    /// Policies matched by the sweep's predicate
    pub examined: usize,
    /// Policies the sweep changed or notified
    pub processed: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(sweep: &str, examined: usize) -> Self {
        Self {
            sweep: sweep.to_string(),
            examined,
            processed: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, policy_id: PolicyId, outcome: Result<(), PolicyError>) -> Result<(), PolicyError> {
        match outcome {
            Ok(()) => self.processed += 1,
            Err(e) if e.kind() == ErrorKind::Cancelled => return Err(e),
            Err(e) => {
                warn!(sweep = %self.sweep, policy_id = %policy_id, error = %e, "Sweep step failed");
                self.failures.push(SweepFailure {
                    policy_id,
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Premium of a renewal
///
/// `old × (new coverage / old coverage) × increase × frequency multiplier`,
/// rounded to the currency.
pub fn renewal_premium(
    policy: &Policy,
    coverage_amount: Decimal,
    increase: Decimal,
    frequency_multiplier: Decimal,
) -> Decimal {
    let ratio = if policy.coverage_amount.is_zero() {
        Decimal::ONE
    } else {
        coverage_amount / policy.coverage_amount
    };
    (policy.premium * ratio * increase * frequency_multiplier).round_dp(policy.currency.decimal_places())
}

/// Refund owed when cancelling at `at`
pub fn cancellation_refund(policy: &Policy, at: DateTime<Utc>, refund_factor: Decimal) -> Decimal {
    let unused = policy.coverage_period().unused_ratio(at);
    (policy.premium * unused * refund_factor)
        .max(Decimal::ZERO)
        .round_dp(policy.currency.decimal_places())
}

pub struct PolicyLifecycleService {
    policies: Arc<dyn PolicyRepository>,
    payments: Arc<PaymentService>,
    publisher: Arc<dyn EventPublisher>,
    dispatcher: Arc<dyn JobDispatcher>,
    rules: Arc<RulesManager>,
}

impl PolicyLifecycleService {
    pub fn new(
        policies: Arc<dyn PolicyRepository>,
        payments: Arc<PaymentService>,
        publisher: Arc<dyn EventPublisher>,
        dispatcher: Arc<dyn JobDispatcher>,
        rules: Arc<RulesManager>,
    ) -> Self {
        Self {
            policies,
            payments,
            publisher,
            dispatcher,
            rules,
        }
    }

    /// Renews a policy into a new one
    ///
    /// # Errors
    ///
    /// - `NotEligible` when the policy is not active, already expired or
    ///   renewed, or outside the renewal window
    /// - `Validation` for an empty term or non-positive coverage override
    #[instrument(skip(self, ctx, options), fields(policy_id = %policy_id))]
    pub async fn renew_policy(
        &self,
        ctx: &Context,
        policy_id: PolicyId,
        options: RenewalOptions,
    ) -> Result<RenewalResult, PolicyError> {
        let rules = self.rules.get_config();
        let lifecycle = &rules.policy_lifecycle;
        let now = Utc::now();

        let mut old = self.policies.get_by_id(ctx, policy_id).await?;
        if old.status != PolicyStatus::Active {
            return Err(PolicyError::not_eligible(format!("policy is {}", old.status)));
        }
        if old.expiration_date < now {
            return Err(PolicyError::not_eligible("policy has already expired"));
        }
        if old.renewal_date.is_some() {
            return Err(PolicyError::not_eligible("policy has already been renewed"));
        }
        if old.expiration_date - now > Duration::days(lifecycle.renewal_window_days) {
            return Err(PolicyError::not_eligible(format!(
                "policy expires in {} days; renewal opens {} days before expiration",
                old.days_until_expiration(now),
                lifecycle.renewal_window_days
            )));
        }

        let effective_date = options.effective_date.unwrap_or(old.expiration_date);
        let expiration_date = match options.expiration_date {
            Some(date) => date,
            None => effective_date
                .checked_add_months(Months::new(12))
                .unwrap_or(effective_date + Duration::days(365)),
        };
        let coverage_amount = options.coverage_amount.unwrap_or(old.coverage_amount);
        let frequency = options.payment_frequency.unwrap_or(old.payment_frequency);
        let new_premium = renewal_premium(
            &old,
            coverage_amount,
            lifecycle.renewal_premium_increase,
            lifecycle.frequency_multiplier(frequency.as_str()),
        );

        let mut renewed = Policy::new(
            old.product_id,
            old.user_id,
            new_premium,
            coverage_amount,
            old.currency,
            effective_date,
            expiration_date,
        )?;
        renewed.payment_frequency = frequency;
        renewed.auto_renew = options.auto_renew.unwrap_or(old.auto_renew);
        renewed.renewed_from = Some(old.id);
        let grace_days = u32::try_from(lifecycle.grace_period_days).unwrap_or(0);
        renewed.await_payment(grace_days, now);
        let mut renewed = self.policies.create(ctx, &renewed).await?;

        let source = old.clone();
        old.renewal_date = Some(now);
        old.updated_at = now;
        if let Err(e) = self.policies.update(ctx, &old).await {
            self.withdraw_renewal(&renewed, None).await;
            return Err(e.into());
        }

        let mut payment_id = None;
        let mut message = "Renewal awaiting payment".to_string();
        if let Some(method) = options.payment_method {
            if renewed.premium.is_zero() {
                renewed.activate()?;
                renewed = self.policies.update(ctx, &renewed).await?;
                message = "Renewal activated with no premium due".to_string();
            } else {
                let request = PaymentRequest {
                    user_id: renewed.user_id,
                    policy_id: Some(renewed.id),
                    subscription_id: None,
                    amount: renewed.premium,
                    currency: renewed.currency,
                    payment_method: method,
                    description: Some(format!("Renewal of {}", old.policy_number)),
                };
                match self.payments.process_payment(ctx, request).await {
                    Ok(payment) => {
                        payment_id = Some(payment.id);
                        renewed.activate()?;
                        renewed = self.policies.update(ctx, &renewed).await?;
                        message = "Policy renewed".to_string();
                    }
                    Err(BillingError::PaymentFailed { payment_id: failed, reason }) => {
                        warn!(payment_id = %failed, reason = %reason, "Renewal payment failed");
                        payment_id = Some(failed);
                        message = format!("Renewal payment failed: {}", reason);
                    }
                    Err(e) => {
                        warn!(error = %e, "Renewal payment aborted; withdrawing renewal");
                        self.withdraw_renewal(&renewed, Some(&source)).await;
                        return Err(e.into());
                    }
                }
            }
        }

        let status = if renewed.status == PolicyStatus::Active {
            RenewalStatus::Renewed
        } else {
            RenewalStatus::PendingPayment
        };
        info!(new_policy_id = %renewed.id, status = %status, premium = %renewed.premium, "Policy renewal processed");

        self.publish(
            ctx,
            DomainEvent::new(
                renewed.id,
                EventPayload::PolicyCreated {
                    policy_id: renewed.id,
                    policy_number: renewed.policy_number.clone(),
                    user_id: renewed.user_id,
                    product_id: renewed.product_id,
                    premium: renewed.premium,
                    currency: renewed.currency,
                    renewed_from: Some(old.id),
                },
            ),
        )
        .await;
        self.publish(
            ctx,
            DomainEvent::new(
                old.id,
                EventPayload::PolicyRenewed {
                    old_policy_id: old.id,
                    new_policy_id: renewed.id,
                    user_id: renewed.user_id,
                    new_premium: renewed.premium,
                    currency: renewed.currency,
                    status: status.to_string(),
                },
            ),
        )
        .await;
        self.notify(
            ctx,
            NotificationJob::new(
                NotificationType::PolicyRenewal,
                renewed.id,
                renewed.user_id,
                json!({
                    "old_policy_id": old.id,
                    "policy_number": renewed.policy_number,
                    "premium": renewed.premium,
                    "status": status,
                }),
            ),
        )
        .await;

        Ok(RenewalResult {
            success: true,
            status,
            old_policy_id: old.id,
            new_policy_id: Some(renewed.id),
            new_premium: renewed.premium,
            currency: renewed.currency,
            effective_date: renewed.effective_date,
            expiration_date: renewed.expiration_date,
            payment_id,
            grace_period_end: renewed.grace_period_end,
            message,
        })
    }

    /// Undoes the writes of a renewal whose payment never settled
    ///
    /// Runs detached from the caller's context, which may be the reason the
    /// payment was abandoned.
    async fn withdraw_renewal(&self, renewed: &Policy, source: Option<&Policy>) {
        let detached = Context::background();
        if let Err(e) = self.policies.soft_delete(&detached, renewed.id).await {
            warn!(policy_id = %renewed.id, error = %e, "Failed to withdraw renewal");
        }
        if let Some(source) = source {
            if let Err(e) = self.policies.update(&detached, source).await {
                warn!(policy_id = %source.id, error = %e, "Failed to clear renewal date");
            }
        }
    }

    /// Cancels an active policy and refunds the unused premium
    ///
    /// `at` defaults to now.
    #[instrument(skip(self, ctx, reason), fields(policy_id = %policy_id))]
    pub async fn cancel_policy(
        &self,
        ctx: &Context,
        policy_id: PolicyId,
        reason: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<CancellationResult, PolicyError> {
        let rules = self.rules.get_config();
        let at = at.unwrap_or_else(Utc::now);

        let mut policy = self.policies.get_by_id(ctx, policy_id).await?;
        if policy.status != PolicyStatus::Active {
            return Err(PolicyError::not_eligible(format!("policy is {}", policy.status)));
        }
        let refund_amount = cancellation_refund(&policy, at, rules.policy_lifecycle.cancellation_refund_factor);

        let active = policy.clone();
        policy.cancel(reason, at)?;
        let policy = self.policies.update(ctx, &policy).await?;

        let refund_payment_id = if refund_amount > Decimal::ZERO {
            let refund = self
                .payments
                .record_refund(
                    ctx,
                    RefundRequest {
                        user_id: policy.user_id,
                        policy_id: Some(policy.id),
                        amount: refund_amount,
                        currency: policy.currency,
                        reason: format!("Cancellation of {}", policy.policy_number),
                    },
                )
                .await;
            match refund {
                Ok(refund) => Some(refund.id),
                Err(e) => {
                    warn!(error = %e, "Cancellation refund failed; restoring policy");
                    if let Err(undo) = self.policies.update(&Context::background(), &active).await {
                        warn!(error = %undo, "Failed to restore cancelled policy");
                    }
                    return Err(e.into());
                }
            }
        } else {
            None
        };
        info!(refund_amount = %refund_amount, "Policy cancelled");

        self.publish(
            ctx,
            DomainEvent::new(
                policy.id,
                EventPayload::PolicyCancelled {
                    policy_id: policy.id,
                    user_id: policy.user_id,
                    reason: reason.to_string(),
                    refund_amount,
                    currency: policy.currency,
                },
            ),
        )
        .await;
        self.notify(
            ctx,
            NotificationJob::new(
                NotificationType::PolicyCancellation,
                policy.id,
                policy.user_id,
                json!({"reason": reason, "refund_amount": refund_amount}),
            ),
        )
        .await;

        Ok(CancellationResult {
            policy_id: policy.id,
            status: policy.status,
            cancelled_at: at,
            refund_amount,
            currency: policy.currency,
            refund_payment_id,
        })
    }

    /// Moves active policies past their expiration date to `expired`
    #[instrument(skip(self, ctx))]
    pub async fn process_expired_policies(&self, ctx: &Context) -> Result<SweepReport, PolicyError> {
        let now = Utc::now();
        let candidates = self.policies.find_expired_active(ctx, now).await?;
        let mut report = SweepReport::new("expired_policies", candidates.len());
        for policy in candidates {
            ctx.check()?;
            let id = policy.id;
            let outcome = self.expire(ctx, policy, now).await;
            report.record(id, outcome)?;
        }
        info!(examined = report.examined, processed = report.processed, "Expiration sweep finished");
        Ok(report)
    }

    async fn expire(&self, ctx: &Context, mut policy: Policy, now: DateTime<Utc>) -> Result<(), PolicyError> {
        if !policy.expire_if_elapsed(now) {
            return Ok(());
        }
        let policy = self.policies.update(ctx, &policy).await?;
        self.publish(
            ctx,
            DomainEvent::new(
                policy.id,
                EventPayload::PolicyExpired {
                    policy_id: policy.id,
                    user_id: policy.user_id,
                    expiration_date: policy.expiration_date,
                },
            ),
        )
        .await;
        self.notify(
            ctx,
            NotificationJob::new(
                NotificationType::PolicyExpired,
                policy.id,
                policy.user_id,
                json!({"expiration_date": policy.expiration_date}),
            ),
        )
        .await;
        Ok(())
    }

    /// Cancels pending policies whose grace period has elapsed
    #[instrument(skip(self, ctx))]
    pub async fn process_grace_period_expirations(&self, ctx: &Context) -> Result<SweepReport, PolicyError> {
        let now = Utc::now();
        let candidates = self.policies.find_grace_period_elapsed(ctx, now).await?;
        let mut report = SweepReport::new("grace_period_expirations", candidates.len());
        for policy in candidates {
            ctx.check()?;
            let id = policy.id;
            let outcome = self.lapse(ctx, policy, now).await;
            report.record(id, outcome)?;
        }
        info!(examined = report.examined, processed = report.processed, "Grace period sweep finished");
        Ok(report)
    }

    async fn lapse(&self, ctx: &Context, mut policy: Policy, now: DateTime<Utc>) -> Result<(), PolicyError> {
        policy.cancel("grace period expired", now)?;
        let policy = self.policies.update(ctx, &policy).await?;
        self.publish(
            ctx,
            DomainEvent::new(
                policy.id,
                EventPayload::PolicyGracePeriodExpired {
                    policy_id: policy.id,
                    user_id: policy.user_id,
                },
            ),
        )
        .await;
        self.notify(
            ctx,
            NotificationJob::new(
                NotificationType::GracePeriodExpired,
                policy.id,
                policy.user_id,
                json!({"grace_period_end": policy.grace_period_end}),
            ),
        )
        .await;
        Ok(())
    }

    /// Renews every auto-renewing policy inside the renewal window
    #[instrument(skip(self, ctx))]
    pub async fn process_auto_renewals(&self, ctx: &Context) -> Result<SweepReport, PolicyError> {
        let rules = self.rules.get_config();
        if !rules.policy_lifecycle.auto_renewal_enabled {
            info!("Auto-renewal disabled");
            return Ok(SweepReport::new("auto_renewals", 0));
        }
        let window = u32::try_from(rules.policy_lifecycle.renewal_window_days).unwrap_or(0);
        let candidates = self
            .policies
            .find_auto_renewal_candidates(ctx, Utc::now(), window)
            .await?;
        let mut report = SweepReport::new("auto_renewals", candidates.len());
        for policy in candidates {
            ctx.check()?;
            let outcome = self
                .renew_policy(ctx, policy.id, RenewalOptions::default())
                .await
                .map(|_| ());
            report.record(policy.id, outcome)?;
        }
        info!(examined = report.examined, processed = report.processed, "Auto-renewal sweep finished");
        Ok(report)
    }

    /// Publishes a reminder for each active policy expiring within `days_ahead`
    #[instrument(skip(self, ctx))]
    pub async fn send_renewal_reminders(&self, ctx: &Context, days_ahead: i64) -> Result<SweepReport, PolicyError> {
        let now = Utc::now();
        let candidates = self.upcoming(ctx, now, days_ahead).await?;
        let mut report = SweepReport::new("renewal_reminders", candidates.len());
        for policy in candidates {
            ctx.check()?;
            let days = policy.days_until_expiration(now);
            self.publish(
                ctx,
                DomainEvent::new(
                    policy.id,
                    EventPayload::PolicyRenewalReminder {
                        policy_id: policy.id,
                        user_id: policy.user_id,
                        expiration_date: policy.expiration_date,
                        days_until_expiration: days,
                    },
                ),
            )
            .await;
            self.notify(
                ctx,
                NotificationJob::new(
                    NotificationType::RenewalReminder,
                    policy.id,
                    policy.user_id,
                    json!({"days_until_expiration": days, "policy_number": policy.policy_number}),
                ),
            )
            .await;
            report.record(policy.id, Ok(()))?;
        }
        Ok(report)
    }

    /// Active policies expiring within `days`, soonest first
    pub async fn get_upcoming_renewals(&self, ctx: &Context, days: i64) -> Result<Vec<Policy>, PolicyError> {
        self.upcoming(ctx, Utc::now(), days).await
    }

    async fn upcoming(&self, ctx: &Context, now: DateTime<Utc>, days: i64) -> Result<Vec<Policy>, PolicyError> {
        if days < 0 {
            return Err(PolicyError::validation("days must not be negative"));
        }
        Ok(self
            .policies
            .find_expiring_between(ctx, now, now + Duration::days(days))
            .await?)
    }

    async fn publish(&self, ctx: &Context, event: DomainEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.publisher.publish(ctx, event).await {
            warn!(event_type, error = %e, "Failed to publish lifecycle event");
        }
    }

    async fn notify(&self, ctx: &Context, job: NotificationJob) {
        let notification_type = job.notification_type;
        if let Err(e) = self.dispatcher.perform(ctx, Arc::new(job)).await {
            warn!(notification_type = %notification_type, error = %e, "Failed to dispatch notification");
        }
    }
}
