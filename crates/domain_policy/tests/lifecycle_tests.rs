//! Integration tests for renewal, cancellation, the sweeps and the scheduler

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;

use core_kernel::events::event_types;
use core_kernel::events::mock::RecordingPublisher;
use core_kernel::jobs::mock::RecordingDispatcher;
use core_kernel::{Context, Currency, CustomerId, ErrorKind, EventPayload, ProductId};
use domain_billing::ports::mock::InMemoryPaymentRepository;
use domain_billing::{PaymentService, PaymentStatus, SimulatedGateway};
use domain_rules::RulesManager;

use domain_policy::ports::mock::InMemoryPolicyRepository;
use domain_policy::{
    LifecycleScheduler, PaymentFrequency, Policy, PolicyError, PolicyFilter, PolicyLifecycleService, PolicyRepository,
    PolicyStatus, RenewalOptions, RenewalStatus, SchedulerConfig, SweepKind,
};

struct Harness {
    ctx: Context,
    service: Arc<PolicyLifecycleService>,
    policies: Arc<InMemoryPolicyRepository>,
    payments: Arc<InMemoryPaymentRepository>,
    publisher: Arc<RecordingPublisher>,
    dispatcher: Arc<RecordingDispatcher>,
}

fn harness() -> Harness {
    harness_with_gateway(SimulatedGateway::new(dec!(1000000), StdDuration::ZERO))
}

fn harness_with_gateway(gateway: SimulatedGateway) -> Harness {
    let policies = Arc::new(InMemoryPolicyRepository::new());
    let payments = Arc::new(InMemoryPaymentRepository::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let payment_service = Arc::new(PaymentService::new(
        payments.clone(),
        Arc::new(gateway),
        publisher.clone(),
    ));
    let service = Arc::new(PolicyLifecycleService::new(
        policies.clone(),
        payment_service,
        publisher.clone(),
        dispatcher.clone(),
        Arc::new(RulesManager::with_defaults()),
    ));
    Harness {
        ctx: Context::background(),
        service,
        policies,
        payments,
        publisher,
        dispatcher,
    }
}

/// An active annual policy expiring `days_left` days from now
fn expiring_in(days_left: i64) -> Policy {
    expiring_after(Duration::days(days_left))
}

fn expiring_after(remaining: Duration) -> Policy {
    let end = Utc::now() + remaining;
    let mut policy = Policy::new(
        ProductId::new(),
        CustomerId::new(),
        dec!(1200),
        dec!(100000),
        Currency::USD,
        end - Duration::days(365),
        end,
    )
    .unwrap();
    policy.payment_frequency = PaymentFrequency::Annually;
    policy
}

async fn store(h: &Harness, policy: &Policy) {
    h.policies.create(&h.ctx, policy).await.unwrap();
}

// ============================================================================
// Renewal Tests
// ============================================================================

mod renewal_tests {
    use super::*;

    #[tokio::test]
    async fn test_renewal_with_payment_activates_successor() {
        let h = harness();
        let policy = expiring_in(10);
        store(&h, &policy).await;

        let result = h
            .service
            .renew_policy(
                &h.ctx,
                policy.id,
                RenewalOptions {
                    payment_method: Some("card".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.status, RenewalStatus::Renewed);
        // 1200 × 1.03 × 0.95
        assert_eq!(result.new_premium, dec!(1174.20));
        assert_eq!(result.effective_date, policy.expiration_date);

        let new_id = result.new_policy_id.unwrap();
        let renewed = h.policies.get_by_id(&h.ctx, new_id).await.unwrap();
        assert_eq!(renewed.status, PolicyStatus::Active);
        assert_eq!(renewed.renewed_from, Some(policy.id));
        assert!(renewed.grace_period_end.is_none());

        let old = h.policies.get_by_id(&h.ctx, policy.id).await.unwrap();
        assert!(old.renewal_date.is_some());

        let renewed_events = h.publisher.events_of_type(event_types::POLICY_RENEWED).await;
        assert_eq!(renewed_events.len(), 1);
        assert!(matches!(
            &renewed_events[0].payload,
            EventPayload::PolicyRenewed { status, .. } if status == "renewed"
        ));
        assert_eq!(h.publisher.events_of_type(event_types::POLICY_CREATED).await.len(), 1);
        assert_eq!(h.dispatcher.jobs_of_type("notification").await.len(), 1);
    }

    #[tokio::test]
    async fn test_renewal_without_payment_waits_in_grace_period() {
        let h = harness();
        let policy = expiring_in(5);
        store(&h, &policy).await;

        let result = h
            .service
            .renew_policy(&h.ctx, policy.id, RenewalOptions::default())
            .await
            .unwrap();

        assert_eq!(result.status, RenewalStatus::PendingPayment);
        let grace_end = result.grace_period_end.unwrap();
        assert_eq!((grace_end - Utc::now()).num_days(), 14);
        let renewed = h.policies.get_by_id(&h.ctx, result.new_policy_id.unwrap()).await.unwrap();
        assert_eq!(renewed.status, PolicyStatus::Pending);
    }

    #[tokio::test]
    async fn test_declined_payment_leaves_pending_payment() {
        let h = harness();
        let policy = expiring_in(5);
        store(&h, &policy).await;

        let result = h
            .service
            .renew_policy(
                &h.ctx,
                policy.id,
                RenewalOptions {
                    payment_method: Some("declined".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.status, RenewalStatus::PendingPayment);
        let payment = h.payments.all().await.into_iter().next().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(result.payment_id, Some(payment.id));
    }

    #[tokio::test]
    async fn test_frequency_and_coverage_change_premium() {
        let h = harness();
        let policy = expiring_in(5);
        store(&h, &policy).await;

        let result = h
            .service
            .renew_policy(
                &h.ctx,
                policy.id,
                RenewalOptions {
                    coverage_amount: Some(dec!(200000)),
                    payment_frequency: Some(PaymentFrequency::Monthly),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        // 1200 × 2 × 1.03 × 1.05
        assert_eq!(result.new_premium, dec!(2595.60));
    }

    #[tokio::test]
    async fn test_outside_window_not_eligible() {
        let h = harness();
        let policy = expiring_in(90);
        store(&h, &policy).await;
        let err = h
            .service
            .renew_policy(&h.ctx, policy.id, RenewalOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::NotEligible(_)));
    }

    #[tokio::test]
    async fn test_window_counts_partial_days() {
        let h = harness();
        let policy = expiring_after(Duration::days(30) + Duration::hours(22));
        store(&h, &policy).await;
        let err = h
            .service
            .renew_policy(&h.ctx, policy.id, RenewalOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::NotEligible(_)));
    }

    #[tokio::test]
    async fn test_abandoned_payment_withdraws_renewal() {
        let h = harness_with_gateway(SimulatedGateway::new(dec!(1000000), StdDuration::from_millis(300)));
        let policy = expiring_in(10);
        store(&h, &policy).await;
        let options = RenewalOptions {
            payment_method: Some("card".to_string()),
            ..Default::default()
        };

        let (ctx, _handle) = h.ctx.with_timeout(StdDuration::from_millis(50));
        let err = h
            .service
            .renew_policy(&ctx, policy.id, options.clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let source = h.policies.get_by_id(&h.ctx, policy.id).await.unwrap();
        assert!(source.renewal_date.is_none());
        assert_eq!(h.policies.count(&h.ctx, &PolicyFilter::default()).await.unwrap(), 1);
        let attempt = h.payments.all().await.into_iter().next().unwrap();
        assert_eq!(attempt.status, PaymentStatus::Failed);
        assert!(h.publisher.events_of_type(event_types::POLICY_RENEWED).await.is_empty());

        let result = h.service.renew_policy(&h.ctx, policy.id, options).await.unwrap();
        assert_eq!(result.status, RenewalStatus::Renewed);
    }

    #[tokio::test]
    async fn test_policy_renewed_only_once() {
        let h = harness();
        let policy = expiring_in(10);
        store(&h, &policy).await;
        h.service
            .renew_policy(&h.ctx, policy.id, RenewalOptions::default())
            .await
            .unwrap();
        let again = h.service.renew_policy(&h.ctx, policy.id, RenewalOptions::default()).await;
        assert!(matches!(again, Err(PolicyError::NotEligible(_))));
    }

    #[tokio::test]
    async fn test_cancelled_policy_not_renewable() {
        let h = harness();
        let mut policy = expiring_in(10);
        policy.cancel("customer request", Utc::now()).unwrap();
        store(&h, &policy).await;
        let err = h
            .service
            .renew_policy(&h.ctx, policy.id, RenewalOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::NotEligible(_)));
    }
}

// ============================================================================
// Cancellation Tests
// ============================================================================

mod cancellation_tests {
    use super::*;

    #[tokio::test]
    async fn test_refund_at_quarter_term() {
        let h = harness();
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let policy = Policy::new(
            ProductId::new(),
            CustomerId::new(),
            dec!(1200),
            dec!(100000),
            Currency::USD,
            start,
            start + Duration::days(360),
        )
        .unwrap();
        store(&h, &policy).await;

        let result = h
            .service
            .cancel_policy(&h.ctx, policy.id, "customer request", Some(start + Duration::days(90)))
            .await
            .unwrap();

        assert_eq!(result.status, PolicyStatus::Cancelled);
        assert_eq!(result.refund_amount, dec!(810));

        let refund = h.payments.all().await.into_iter().next().unwrap();
        assert_eq!(refund.amount, dec!(-810));
        assert_eq!(refund.status, PaymentStatus::Refunded);
        assert_eq!(result.refund_payment_id, Some(refund.id));

        let stored = h.policies.get_by_id(&h.ctx, policy.id).await.unwrap();
        assert_eq!(stored.status, PolicyStatus::Cancelled);
        assert_eq!(stored.cancellation_reason.as_deref(), Some("customer request"));
        assert_eq!(h.publisher.events_of_type(event_types::POLICY_CANCELLED).await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_after_term_has_no_refund() {
        let h = harness();
        let policy = expiring_in(1);
        store(&h, &policy).await;

        let result = h
            .service
            .cancel_policy(&h.ctx, policy.id, "moving", Some(policy.expiration_date))
            .await
            .unwrap();

        assert_eq!(result.refund_amount, dec!(0));
        assert!(result.refund_payment_id.is_none());
        assert_eq!(result.status, PolicyStatus::Cancelled);
        assert!(h.payments.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_refund_keeps_policy_active() {
        let h = harness_with_gateway(SimulatedGateway::new(dec!(100), StdDuration::ZERO));
        let policy = expiring_in(300);
        store(&h, &policy).await;

        let err = h
            .service
            .cancel_policy(&h.ctx, policy.id, "customer request", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::Billing(_)));

        let stored = h.policies.get_by_id(&h.ctx, policy.id).await.unwrap();
        assert_eq!(stored.status, PolicyStatus::Active);
        assert!(stored.cancelled_at.is_none());
        assert!(h.payments.all().await.is_empty());
        assert!(h.publisher.events_of_type(event_types::POLICY_CANCELLED).await.is_empty());
    }

    #[tokio::test]
    async fn test_only_active_policies_cancel() {
        let h = harness();
        let mut policy = expiring_in(30);
        policy.await_payment(15, Utc::now());
        store(&h, &policy).await;
        let err = h.service.cancel_policy(&h.ctx, policy.id, "x", None).await.unwrap_err();
        assert!(matches!(err, PolicyError::NotEligible(_)));
    }
}

// ============================================================================
// Sweep Tests
// ============================================================================

mod sweep_tests {
    use super::*;

    #[tokio::test]
    async fn test_expired_sweep() {
        let h = harness();
        let elapsed = expiring_in(-2);
        let current = expiring_in(100);
        store(&h, &elapsed).await;
        store(&h, &current).await;

        let report = h.service.process_expired_policies(&h.ctx).await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.processed, 1);

        let stored = h.policies.get_by_id(&h.ctx, elapsed.id).await.unwrap();
        assert_eq!(stored.status, PolicyStatus::Expired);
        assert_eq!(h.publisher.events_of_type(event_types::POLICY_EXPIRED).await.len(), 1);

        let second = h.service.process_expired_policies(&h.ctx).await.unwrap();
        assert_eq!(second.examined, 0);
    }

    #[tokio::test]
    async fn test_grace_period_sweep_cancels_unpaid() {
        let h = harness();
        let mut unpaid = expiring_in(300);
        unpaid.await_payment(15, Utc::now() - Duration::days(20));
        let mut waiting = expiring_in(300);
        waiting.await_payment(15, Utc::now());
        store(&h, &unpaid).await;
        store(&h, &waiting).await;

        let report = h.service.process_grace_period_expirations(&h.ctx).await.unwrap();
        assert_eq!(report.processed, 1);

        let stored = h.policies.get_by_id(&h.ctx, unpaid.id).await.unwrap();
        assert_eq!(stored.status, PolicyStatus::Cancelled);
        let untouched = h.policies.get_by_id(&h.ctx, waiting.id).await.unwrap();
        assert_eq!(untouched.status, PolicyStatus::Pending);
        assert_eq!(
            h.publisher.events_of_type(event_types::POLICY_GRACE_PERIOD_EXPIRED).await.len(),
            1
        );
        let jobs = h.dispatcher.jobs_of_type("notification").await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job.queue_name(), "notifications");
    }

    #[tokio::test]
    async fn test_auto_renewal_sweep_renews_once() {
        let h = harness();
        let mut auto = expiring_in(10);
        auto.auto_renew = true;
        let manual = expiring_in(10);
        store(&h, &auto).await;
        store(&h, &manual).await;

        let report = h.service.process_auto_renewals(&h.ctx).await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.processed, 1);
        assert!(report.failures.is_empty());

        let again = h.service.process_auto_renewals(&h.ctx).await.unwrap();
        assert_eq!(again.examined, 0);
    }

    #[tokio::test]
    async fn test_reminders_for_expiring_policies() {
        let h = harness();
        store(&h, &expiring_in(10)).await;
        store(&h, &expiring_in(20)).await;
        store(&h, &expiring_in(60)).await;

        let report = h.service.send_renewal_reminders(&h.ctx, 30).await.unwrap();
        assert_eq!(report.processed, 2);

        let reminders = h.publisher.events_of_type(event_types::POLICY_RENEWAL_REMINDER).await;
        assert_eq!(reminders.len(), 2);
        let upcoming = h.service.get_upcoming_renewals(&h.ctx, 30).await.unwrap();
        assert!(upcoming[0].expiration_date <= upcoming[1].expiration_date);
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_sweep() {
        let h = harness();
        store(&h, &expiring_in(-1)).await;
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();
        assert!(h.service.process_expired_policies(&ctx).await.is_err());
    }
}

// ============================================================================
// Scheduler Tests
// ============================================================================

mod scheduler_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_sweep_on_demand() {
        let h = harness();
        store(&h, &expiring_in(-1)).await;
        let scheduler = LifecycleScheduler::new(h.service.clone(), SchedulerConfig::default());

        let report = scheduler.run_sweep(SweepKind::ExpiredPolicies).await.unwrap();
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn test_started_scheduler_runs_and_stops() {
        let h = harness();
        let policy = expiring_in(-1);
        store(&h, &policy).await;
        let scheduler = LifecycleScheduler::new(h.service.clone(), SchedulerConfig::default());

        scheduler.start();
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        scheduler.shutdown().await;

        let stored = h.policies.get_by_id(&h.ctx, policy.id).await.unwrap();
        assert_eq!(stored.status, PolicyStatus::Expired);
    }
}
