//! Domain events
//!
//! Domain events represent significant occurrences in the marketplace. They
//! are published through an [`EventPublisher`] (the in-process event bus in
//! production) and delivered to subscribed [`EventHandler`]s.
//!
//! The event type string is derived from the payload variant, so a published
//! event can never carry a type that disagrees with its data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::Context;
use crate::identifiers::{ClaimId, CustomerId, EventId, PaymentId, PolicyId, ProductId, QuoteId, WorkflowId};
use crate::money::Currency;
use crate::ports::PortError;

/// Event type names, usable as subscription filters
pub mod event_types {
    pub const USER_REGISTERED: &str = "user.registered";
    pub const QUOTE_CREATED: &str = "quote.created";
    pub const POLICY_CREATED: &str = "policy.created";
    pub const POLICY_RENEWED: &str = "policy.renewed";
    pub const POLICY_CANCELLED: &str = "policy.cancelled";
    pub const POLICY_EXPIRED: &str = "policy.expired";
    pub const POLICY_RENEWAL_REMINDER: &str = "policy.renewal_reminder";
    pub const POLICY_GRACE_PERIOD_EXPIRED: &str = "policy.grace_period_expired";
    pub const CLAIM_SUBMITTED: &str = "claim.submitted";
    pub const CLAIM_STATUS_CHANGED: &str = "claim.status_changed";
    pub const CLAIM_WORKFLOW_COMPLETED: &str = "claim.workflow_completed";
    pub const FRAUD_ANALYSIS_COMPLETED: &str = "fraud.analysis_completed";
    pub const PAYMENT_COMPLETED: &str = "payment.completed";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const PAYMENT_REFUNDED: &str = "payment.refunded";
}

/// Typed event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    UserRegistered {
        user_id: CustomerId,
        email: String,
    },
    QuoteCreated {
        quote_id: QuoteId,
        quote_number: String,
        user_id: CustomerId,
        product_id: ProductId,
        final_price: Decimal,
        currency: Currency,
    },
    PolicyCreated {
        policy_id: PolicyId,
        policy_number: String,
        user_id: CustomerId,
        product_id: ProductId,
        premium: Decimal,
        currency: Currency,
        renewed_from: Option<PolicyId>,
    },
    PolicyRenewed {
        old_policy_id: PolicyId,
        new_policy_id: PolicyId,
        user_id: CustomerId,
        new_premium: Decimal,
        currency: Currency,
        status: String,
    },
    PolicyCancelled {
        policy_id: PolicyId,
        user_id: CustomerId,
        reason: String,
        refund_amount: Decimal,
        currency: Currency,
    },
    PolicyExpired {
        policy_id: PolicyId,
        user_id: CustomerId,
        expiration_date: DateTime<Utc>,
    },
    PolicyRenewalReminder {
        policy_id: PolicyId,
        user_id: CustomerId,
        expiration_date: DateTime<Utc>,
        days_until_expiration: i64,
    },
    PolicyGracePeriodExpired {
        policy_id: PolicyId,
        user_id: CustomerId,
    },
    ClaimSubmitted {
        claim_id: ClaimId,
        claim_number: String,
        policy_id: PolicyId,
        user_id: CustomerId,
        claim_amount: Decimal,
        currency: Currency,
    },
    ClaimStatusChanged {
        claim_id: ClaimId,
        from: String,
        to: String,
        reason: Option<String>,
    },
    ClaimWorkflowCompleted {
        claim_id: ClaimId,
        workflow_id: WorkflowId,
        status: String,
        final_stage: String,
    },
    FraudAnalysisCompleted {
        claim_id: ClaimId,
        customer_id: CustomerId,
        score: f64,
        risk_level: String,
        requires_review: bool,
        confidence: f64,
        factor_names: Vec<String>,
    },
    PaymentCompleted {
        payment_id: PaymentId,
        user_id: CustomerId,
        policy_id: Option<PolicyId>,
        amount: Decimal,
        currency: Currency,
        transaction_id: String,
    },
    PaymentFailed {
        payment_id: PaymentId,
        user_id: CustomerId,
        amount: Decimal,
        currency: Currency,
        reason: String,
    },
    PaymentRefunded {
        payment_id: PaymentId,
        user_id: CustomerId,
        policy_id: Option<PolicyId>,
        refund_amount: Decimal,
        currency: Currency,
    },
}

impl EventPayload {
    /// Returns the event type name for this payload
    pub fn event_type(&self) -> &'static str {
        use event_types::*;
        match self {
            EventPayload::UserRegistered { .. } => USER_REGISTERED,
            EventPayload::QuoteCreated { .. } => QUOTE_CREATED,
            EventPayload::PolicyCreated { .. } => POLICY_CREATED,
            EventPayload::PolicyRenewed { .. } => POLICY_RENEWED,
            EventPayload::PolicyCancelled { .. } => POLICY_CANCELLED,
            EventPayload::PolicyExpired { .. } => POLICY_EXPIRED,
            EventPayload::PolicyRenewalReminder { .. } => POLICY_RENEWAL_REMINDER,
            EventPayload::PolicyGracePeriodExpired { .. } => POLICY_GRACE_PERIOD_EXPIRED,
            EventPayload::ClaimSubmitted { .. } => CLAIM_SUBMITTED,
            EventPayload::ClaimStatusChanged { .. } => CLAIM_STATUS_CHANGED,
            EventPayload::ClaimWorkflowCompleted { .. } => CLAIM_WORKFLOW_COMPLETED,
            EventPayload::FraudAnalysisCompleted { .. } => FRAUD_ANALYSIS_COMPLETED,
            EventPayload::PaymentCompleted { .. } => PAYMENT_COMPLETED,
            EventPayload::PaymentFailed { .. } => PAYMENT_FAILED,
            EventPayload::PaymentRefunded { .. } => PAYMENT_REFUNDED,
        }
    }
}

/// An event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: EventId,
    /// Identifier of the domain object the event concerns
    pub aggregate_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl DomainEvent {
    /// Wraps a payload for the given aggregate, stamped now
    pub fn new(aggregate_id: impl Into<Uuid>, payload: EventPayload) -> Self {
        Self {
            id: EventId::new_v7(),
            aggregate_id: aggregate_id.into(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

/// Error a handler may return; it is logged and never retried
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Publisher side of the event bus
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Schedules delivery to every subscribed handler and returns
    async fn publish(&self, ctx: &Context, event: DomainEvent) -> Result<(), PortError>;
}

/// A subscriber that receives events of the types it was registered for
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError>;
}

/// Test doubles for the publisher contract
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    /// Records every published event; can be switched to fail
    #[derive(Debug, Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<DomainEvent>>,
        fail: AtomicBool,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        /// A publisher whose every publish call fails
        pub fn failing() -> Self {
            let publisher = Self::default();
            publisher.fail.store(true, Ordering::SeqCst);
            publisher
        }

        pub async fn events(&self) -> Vec<DomainEvent> {
            self.events.lock().await.clone()
        }

        pub async fn events_of_type(&self, event_type: &str) -> Vec<DomainEvent> {
            self.events
                .lock()
                .await
                .iter()
                .filter(|e| e.event_type() == event_type)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, ctx: &Context, event: DomainEvent) -> Result<(), PortError> {
            ctx.check()?;
            if self.fail.load(Ordering::SeqCst) {
                return Err(PortError::unavailable("event bus"));
            }
            self.events.lock().await.push(event);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_type_follows_payload() {
        let claim_id = ClaimId::new();
        let event = DomainEvent::new(
            claim_id,
            EventPayload::ClaimStatusChanged {
                claim_id,
                from: "submitted".to_string(),
                to: "approved".to_string(),
                reason: None,
            },
        );
        assert_eq!(event.event_type(), event_types::CLAIM_STATUS_CHANGED);
        assert_eq!(event.aggregate_id, *claim_id.as_uuid());
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let payload = EventPayload::PolicyCancelled {
            policy_id: PolicyId::new(),
            user_id: CustomerId::new(),
            reason: "customer request".to_string(),
            refund_amount: dec!(810),
            currency: Currency::USD,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "policy_cancelled");
        assert_eq!(json["currency"], "USD");
    }

    #[tokio::test]
    async fn test_recording_publisher_filters_by_type() {
        let publisher = mock::RecordingPublisher::new();
        let ctx = Context::background();
        let user_id = CustomerId::new();
        publisher
            .publish(&ctx, DomainEvent::new(user_id, EventPayload::UserRegistered {
                user_id,
                email: "a@example.com".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(publisher.events_of_type(event_types::USER_REGISTERED).await.len(), 1);
        assert!(publisher.events_of_type(event_types::POLICY_CREATED).await.is_empty());
    }
}
