//! End-to-end scenarios across the domain services
//!
//! These drive the services together the way the API does: a customer is
//! quoted, buys a policy, claims against it and is paid out; policies are
//! renewed, cancelled and swept by the scheduler.

use chrono::Duration;
use rust_decimal_macros::dec;

use core_kernel::events::event_types;
use core_kernel::{ErrorKind, PageRequest};
use domain_billing::{PaymentFilter, PaymentStatus};
use domain_claims::{ClaimStatus, StageId, StageStatus, WorkflowStatus};
use domain_policy::{
    NewPolicy, PolicyRepository, PolicyStatus, QuoteStatus, RenewalOptions, RenewalStatus, SchedulerConfig, SweepKind,
};

use test_utils::*;

mod purchase_to_payout {
    use super::*;

    #[tokio::test]
    async fn test_quote_policy_claim_and_payout() {
        let h = ServiceHarness::new();
        let customer = h.seed_customer(&CustomerBuilder::new().established().build()).await.unwrap();
        let product = h.products.create(&h.ctx, Fixtures::new_product("home")).await.unwrap();

        let quote = h
            .quotes
            .create(&h.ctx, Fixtures::pricing_request(&customer, &product))
            .await
            .unwrap();
        assert_eq!(quote.status, QuoteStatus::Pending);
        assert!(quote.final_price > dec!(0));

        let effective = Dates::days_ago(200);
        let policy = h
            .policies
            .create(
                &h.ctx,
                NewPolicy {
                    product_id: product.id,
                    user_id: customer.id,
                    quote_id: Some(quote.id),
                    premium: quote.final_price,
                    coverage_amount: quote.coverage_amount,
                    currency: quote.currency,
                    payment_frequency: quote.payment_frequency,
                    effective_date: effective,
                    expiration_date: effective + Duration::days(365),
                    auto_renew: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(h.quotes.get(&h.ctx, quote.id).await.unwrap().status, QuoteStatus::Used);
        assert_events_published(&h.publisher, event_types::POLICY_CREATED, 1).await;

        let mut input = Fixtures::new_claim(&policy, dec!(2450));
        input.documents.push(domain_claims::ClaimDocument::new("photos.zip", 90_000, "application/zip"));
        let claim = h.claims.create(&h.ctx, input).await.unwrap();

        let workflow = h.workflows.process_claim(&h.ctx, claim.id).await.unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Completed);
        assert_stage_order(
            &workflow,
            &[
                StageId::InitialReview,
                StageId::FraudDetection,
                StageId::PolicyValidation,
                StageId::DamageAssessment,
                StageId::ApprovalDecision,
                StageId::PayoutProcessing,
            ],
        );
        assert_stage_status(&workflow, StageId::ApprovalDecision, StageStatus::Completed);
        assert_eq!(h.claims.get(&h.ctx, claim.id).await.unwrap().status, ClaimStatus::Approved);

        assert_jobs_dispatched(&h.dispatcher, "claim_payout", 1).await;
        let results = h.dispatcher.run_all(&h.ctx).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let paid = h.claims.get(&h.ctx, claim.id).await.unwrap();
        assert_eq!(paid.status, ClaimStatus::Paid);
        assert_eq!(paid.paid_amount, dec!(2450));

        let payouts = h
            .payments
            .list(
                &h.ctx,
                &PaymentFilter {
                    claim_id: Some(claim.id),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(payouts.total_count, 1);
        assert_eq!(payouts.items[0].amount, dec!(-2450));
        assert_eq!(payouts.items[0].status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_second_quote_use_is_rejected() {
        let h = ServiceHarness::new();
        let customer = h.seed_customer(&CustomerBuilder::new().established().build()).await.unwrap();
        let product = h.products.create(&h.ctx, Fixtures::new_product("auto")).await.unwrap();
        let quote = h
            .quotes
            .create(&h.ctx, Fixtures::pricing_request(&customer, &product))
            .await
            .unwrap();

        let issue = || NewPolicy {
            product_id: product.id,
            user_id: customer.id,
            quote_id: Some(quote.id),
            premium: quote.final_price,
            coverage_amount: quote.coverage_amount,
            currency: quote.currency,
            payment_frequency: quote.payment_frequency,
            effective_date: quote.effective_date,
            expiration_date: quote.expiration_date,
            auto_renew: false,
        };
        h.policies.create(&h.ctx, issue()).await.unwrap();
        assert_error_kind(h.policies.create(&h.ctx, issue()).await, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_underwriting_uses_stored_customer() {
        let h = ServiceHarness::new();
        let customer = h.seed_customer(&CustomerBuilder::new().established().build()).await.unwrap();
        let product = h.seed_product(&Fixtures::product()).await.unwrap();

        let profile = h
            .risk
            .assess_risk(&h.ctx, &Fixtures::risk_request(&customer, &product))
            .await
            .unwrap();
        assert_eq!(profile.user_id, customer.id);

        let stranger = Fixtures::customer();
        assert_error_kind(
            h.risk.assess_risk(&h.ctx, &Fixtures::risk_request(&stranger, &product)).await,
            ErrorKind::NotFound,
        );
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_cancellation_refunds_through_payments() {
        let h = ServiceHarness::new();
        let (customer, product, _) = h.seed_insured().await.unwrap();
        let policy = h
            .seed_policy(&PolicyBuilder::new(customer.id, product.id).term_days(360).build())
            .await
            .unwrap();

        let result = h
            .lifecycle
            .cancel_policy(&h.ctx, policy.id, "customer request", None)
            .await
            .unwrap();
        assert_eq!(result.status, PolicyStatus::Cancelled);
        assert!(result.refund_amount > dec!(0));
        assert!(result.refund_amount < policy.premium);

        let refunds = h
            .payments
            .list(
                &h.ctx,
                &PaymentFilter {
                    policy_id: Some(policy.id),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(refunds.total_count, 1);
        assert_eq!(refunds.items[0].amount, -result.refund_amount);
        assert_eq!(refunds.items[0].status, PaymentStatus::Refunded);

        assert_error_kind(
            h.lifecycle.cancel_policy(&h.ctx, policy.id, "again", None).await,
            ErrorKind::Validation,
        );
    }

    #[tokio::test]
    async fn test_paid_renewal_links_successor() {
        let h = ServiceHarness::new();
        let customer = h.seed_customer(&Fixtures::customer()).await.unwrap();
        let product = h.seed_product(&Fixtures::product()).await.unwrap();
        let policy = h
            .seed_policy(&PolicyBuilder::new(customer.id, product.id).expiring_in(10).build())
            .await
            .unwrap();

        let result = h
            .lifecycle
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
        assert_eq!(result.status, RenewalStatus::Renewed);
        assert!(result.payment_id.is_some());

        let successor = h.policies.get(&h.ctx, result.new_policy_id.unwrap()).await.unwrap();
        assert_eq!(successor.renewed_from, Some(policy.id));
        assert_eq!(successor.status, PolicyStatus::Active);
        assert_eq!(successor.effective_date, policy.expiration_date);
        assert_jobs_dispatched(&h.dispatcher, "notification", 1).await;
    }

    #[tokio::test]
    async fn test_upcoming_renewals_window() {
        let h = ServiceHarness::new();
        let (customer, product) = (Fixtures::customer(), Fixtures::product());
        for days in [5, 25, 90] {
            h.seed_policy(&PolicyBuilder::new(customer.id, product.id).expiring_in(days).build())
                .await
                .unwrap();
        }

        let upcoming = h.lifecycle.get_upcoming_renewals(&h.ctx, 30).await.unwrap();
        assert_eq!(upcoming.len(), 2);
        assert!(upcoming[0].expiration_date <= upcoming[1].expiration_date);
        assert_error_kind(h.lifecycle.get_upcoming_renewals(&h.ctx, -1).await, ErrorKind::Validation);
    }
}

mod scheduler {
    use super::*;

    #[tokio::test]
    async fn test_sweeps_on_demand() {
        let h = ServiceHarness::new();
        let (customer, product) = (Fixtures::customer(), Fixtures::product());
        let lapsed = h
            .seed_policy(&PolicyBuilder::new(customer.id, product.id).expiring_in(-2).build())
            .await
            .unwrap();
        let unpaid = h
            .seed_policy(
                &PolicyBuilder::new(customer.id, product.id)
                    .awaiting_payment_until(Dates::days_ago(1))
                    .build(),
            )
            .await
            .unwrap();
        let scheduler = h.scheduler(SchedulerConfig::default());

        let expired = scheduler.run_sweep(SweepKind::ExpiredPolicies).await.unwrap();
        assert_eq!(expired.processed, 1);
        let grace = scheduler.run_sweep(SweepKind::GracePeriodExpirations).await.unwrap();
        assert_eq!(grace.processed, 1);

        let lapsed = h.policy_repo.get_by_id(&h.ctx, lapsed.id).await.unwrap();
        assert_eq!(lapsed.status, PolicyStatus::Expired);
        let unpaid = h.policy_repo.get_by_id(&h.ctx, unpaid.id).await.unwrap();
        assert_eq!(unpaid.status, PolicyStatus::Cancelled);

        assert_events_published(&h.publisher, event_types::POLICY_EXPIRED, 1).await;
        assert_events_published(&h.publisher, event_types::POLICY_GRACE_PERIOD_EXPIRED, 1).await;
    }

    #[tokio::test]
    async fn test_auto_renewal_sweep_skips_manual_policies() {
        let h = ServiceHarness::new();
        let (customer, product) = (Fixtures::customer(), Fixtures::product());
        h.seed_policy(
            &PolicyBuilder::new(customer.id, product.id)
                .expiring_in(7)
                .auto_renew(true)
                .build(),
        )
        .await
        .unwrap();
        h.seed_policy(&PolicyBuilder::new(customer.id, product.id).expiring_in(7).build())
            .await
            .unwrap();

        let report = h.scheduler(SchedulerConfig::default()).run_sweep(SweepKind::AutoRenewals).await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.processed, 1);
        assert!(report.failures.is_empty());
        assert_events_published(&h.publisher, event_types::POLICY_RENEWED, 1).await;
    }
}

mod postgres {
    use super::*;
    use domain_party::CustomerRepository;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_fixture_customer_round_trips_through_postgres() {
        let db = shared_test_database().await.unwrap();
        db.clear_data().await.unwrap();
        let repo = db.customers();
        let ctx = core_kernel::Context::background();

        let customer = CustomerBuilder::new().established().build();
        repo.create(&ctx, &customer).await.unwrap();

        let stored = repo.get_by_id(&ctx, customer.id).await.unwrap();
        assert_eq!(stored.email, customer.email);
        assert_eq!(stored.addresses.len(), 1);
    }
}
