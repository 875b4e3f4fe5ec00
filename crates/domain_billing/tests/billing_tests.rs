//! Integration tests for payment processing

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::events::event_types;
use core_kernel::events::mock::RecordingPublisher;
use core_kernel::{ClaimId, Context, Currency, CustomerId, ErrorKind, PageRequest, PolicyId};

use domain_billing::ports::mock::InMemoryPaymentRepository;
use domain_billing::{
    BillingError, PaymentFilter, PaymentRequest, PaymentService, PaymentStatus, PayoutRequest,
    RefundRequest, SimulatedGateway,
};

struct Harness {
    service: PaymentService,
    payments: Arc<InMemoryPaymentRepository>,
    publisher: Arc<RecordingPublisher>,
}

fn harness_with(gateway: SimulatedGateway) -> Harness {
    let payments = Arc::new(InMemoryPaymentRepository::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let service = PaymentService::new(payments.clone(), Arc::new(gateway), publisher.clone());
    Harness { service, payments, publisher }
}

fn harness() -> Harness {
    harness_with(SimulatedGateway::new(dec!(10000), Duration::ZERO))
}

fn charge(user_id: CustomerId, amount: Decimal, method: &str) -> PaymentRequest {
    PaymentRequest {
        user_id,
        policy_id: Some(PolicyId::new()),
        subscription_id: None,
        amount,
        currency: Currency::USD,
        payment_method: method.to_string(),
        description: None,
    }
}

// ============================================================================
// Charge Tests
// ============================================================================

mod charge_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_charge_completes_and_publishes() {
        let h = harness();
        let payment = h
            .service
            .process_payment(&Context::background(), charge(CustomerId::new(), dec!(1200), "card"))
            .await
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.transaction_id.is_some());
        assert_eq!(h.publisher.events_of_type(event_types::PAYMENT_COMPLETED).await.len(), 1);
    }

    #[tokio::test]
    async fn test_declined_charge_is_stored_failed() {
        let h = harness();
        let err = h
            .service
            .process_payment(&Context::background(), charge(CustomerId::new(), dec!(50), "declined"))
            .await
            .unwrap_err();

        let payment_id = match err {
            BillingError::PaymentFailed { payment_id, .. } => payment_id,
            other => panic!("unexpected error: {other}"),
        };
        let stored = h.service.get(&Context::background(), payment_id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("card declined"));
        assert!(stored.failed_at.is_some());
        assert_eq!(h.publisher.events_of_type(event_types::PAYMENT_FAILED).await.len(), 1);
    }

    #[tokio::test]
    async fn test_amount_over_gateway_limit_fails() {
        let h = harness();
        let result = h
            .service
            .process_payment(&Context::background(), charge(CustomerId::new(), dec!(10000.01), "card"))
            .await;
        assert!(matches!(result, Err(BillingError::PaymentFailed { .. })));
    }

    #[tokio::test]
    async fn test_invalid_request_persists_nothing() {
        let h = harness();
        let ctx = Context::background();

        let zero = h.service.process_payment(&ctx, charge(CustomerId::new(), Decimal::ZERO, "card")).await;
        let no_method = h.service.process_payment(&ctx, charge(CustomerId::new(), dec!(10), "")).await;

        assert_eq!(zero.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(no_method.unwrap_err().kind(), ErrorKind::Validation);
        assert!(h.payments.all().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_charge_records_failure() {
        let h = harness_with(SimulatedGateway::new(dec!(10000), Duration::from_secs(5)));
        let (ctx, _handle) = Context::background().with_timeout(Duration::from_secs(1));

        let err = h
            .service
            .process_payment(&ctx, charge(CustomerId::new(), dec!(100), "card"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        let stored = h.payments.all().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, PaymentStatus::Failed);
        assert_eq!(stored[0].failure_reason.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_already_cancelled_context_writes_nothing() {
        let h = harness();
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();

        let result = h.service.process_payment(&ctx, charge(CustomerId::new(), dec!(100), "card")).await;

        assert!(result.is_err());
        assert!(h.payments.all().await.is_empty());
    }
}

// ============================================================================
// Refund and Payout Tests
// ============================================================================

mod refund_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancellation_refund_is_negative_payment() {
        let h = harness();
        let policy_id = PolicyId::new();
        let refund = h
            .service
            .record_refund(
                &Context::background(),
                RefundRequest {
                    user_id: CustomerId::new(),
                    policy_id: Some(policy_id),
                    amount: dec!(810),
                    currency: Currency::USD,
                    reason: "policy cancelled".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(refund.amount, dec!(-810));
        assert_eq!(refund.refund_amount, dec!(810));
        assert_eq!(refund.status, PaymentStatus::Refunded);
        assert_eq!(refund.policy_id, Some(policy_id));
        assert_eq!(h.publisher.events_of_type(event_types::PAYMENT_REFUNDED).await.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_refund_of_charge() {
        let h = harness();
        let ctx = Context::background();
        let payment = h
            .service
            .process_payment(&ctx, charge(CustomerId::new(), dec!(300), "card"))
            .await
            .unwrap();

        let refunded = h.service.refund_payment(&ctx, payment.id, dec!(100)).await.unwrap();
        assert_eq!(refunded.refund_amount, dec!(100));
        assert_eq!(refunded.status, PaymentStatus::Completed);

        let err = h.service.refund_payment(&ctx, payment.id, dec!(250)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let full = h.service.refund_payment(&ctx, payment.id, dec!(200)).await.unwrap();
        assert_eq!(full.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_payout_is_idempotent_per_claim() {
        let h = harness();
        let ctx = Context::background();
        let request = PayoutRequest {
            claim_id: ClaimId::new(),
            user_id: CustomerId::new(),
            policy_id: PolicyId::new(),
            amount: dec!(4500),
            currency: Currency::USD,
        };

        let first = h.service.record_payout(&ctx, request.clone()).await.unwrap();
        let second = h.service.record_payout(&ctx, request.clone()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.amount, dec!(-4500));
        assert!(first.is_payout());
        let filter = PaymentFilter {
            claim_id: Some(request.claim_id),
            ..Default::default()
        };
        assert_eq!(h.service.list(&ctx, &filter, PageRequest::default()).await.unwrap().total_count, 1);
    }
}

// ============================================================================
// Listing Tests
// ============================================================================

mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_filters_by_user_and_status() {
        let h = harness();
        let ctx = Context::background();
        let user = CustomerId::new();
        for amount in [dec!(10), dec!(20), dec!(30)] {
            h.service.process_payment(&ctx, charge(user, amount, "card")).await.unwrap();
        }
        let _ = h.service.process_payment(&ctx, charge(user, dec!(40), "declined")).await;
        h.service
            .process_payment(&ctx, charge(CustomerId::new(), dec!(50), "card"))
            .await
            .unwrap();

        let filter = PaymentFilter {
            user_id: Some(user),
            status: Some(PaymentStatus::Completed),
            ..Default::default()
        };
        let page = h.service.list(&ctx, &filter, PageRequest::new(Some(1), Some(2))).await.unwrap();

        assert_eq!(page.total_count, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more());
    }
}
