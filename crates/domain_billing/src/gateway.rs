//! Payment gateway port
//!
//! The marketplace talks to card processors through [`PaymentGateway`].
//! [`SimulatedGateway`] stands in for a real processor: it approves charges
//! after a short latency and declines the `"declined"` method or anything
//! above its per-transaction limit.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use core_kernel::{Cancelled, Context, Currency, CustomerId, PaymentId};

/// Method name the simulated gateway always declines
pub const DECLINED_METHOD: &str = "declined";

/// What the gateway is asked to move
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub payment_id: PaymentId,
    pub user_id: CustomerId,
    /// Always positive; direction is given by the method called
    pub amount: Decimal,
    pub currency: Currency,
    pub payment_method: String,
}

/// Acknowledgement from the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub transaction_id: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("declined: {0}")]
    Declined(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl GatewayError {
    /// Reason stored on a failed payment
    pub fn failure_reason(&self) -> String {
        match self {
            GatewayError::Declined(reason) => reason.clone(),
            GatewayError::Unavailable(reason) => format!("gateway unavailable: {}", reason),
            GatewayError::Cancelled(_) => "cancelled".to_string(),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Collects money from the customer
    async fn charge(&self, ctx: &Context, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayError>;

    /// Sends money to the customer (refunds, claim payouts)
    async fn disburse(&self, ctx: &Context, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayError>;
}

/// In-process stand-in for a card processor
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    limit: Decimal,
    latency: Duration,
}

impl SimulatedGateway {
    pub fn new(limit: Decimal, latency: Duration) -> Self {
        Self { limit, latency }
    }

    pub fn limit(&self) -> Decimal {
        self.limit
    }

    async fn settle(&self, ctx: &Context, prefix: &str) -> Result<GatewayReceipt, GatewayError> {
        if !self.latency.is_zero() {
            ctx.run(tokio::time::sleep(self.latency)).await?;
        } else {
            ctx.check()?;
        }
        Ok(GatewayReceipt {
            transaction_id: format!("{}-{}", prefix, uuid::Uuid::now_v7().simple()),
        })
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(dec!(1000000), Duration::from_millis(10))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, ctx: &Context, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayError> {
        if request.payment_method.eq_ignore_ascii_case(DECLINED_METHOD) {
            return Err(GatewayError::Declined("card declined".to_string()));
        }
        if request.amount > self.limit {
            return Err(GatewayError::Declined(format!(
                "amount {} {} exceeds gateway limit {}",
                request.amount, request.currency, self.limit
            )));
        }
        self.settle(ctx, "TXN").await
    }

    async fn disburse(&self, ctx: &Context, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayError> {
        if request.amount > self.limit {
            return Err(GatewayError::Declined(format!(
                "disbursement {} {} exceeds gateway limit {}",
                request.amount, request.currency, self.limit
            )));
        }
        self.settle(ctx, "DSB").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: Decimal, method: &str) -> GatewayRequest {
        GatewayRequest {
            payment_id: PaymentId::new(),
            user_id: CustomerId::new(),
            amount,
            currency: Currency::USD,
            payment_method: method.to_string(),
        }
    }

    #[tokio::test]
    async fn test_declined_method_fails() {
        let gateway = SimulatedGateway::new(dec!(1000), Duration::ZERO);
        let err = gateway
            .charge(&Context::background(), &request(dec!(10), "declined"))
            .await
            .unwrap_err();
        assert_eq!(err.failure_reason(), "card declined");
    }

    #[tokio::test]
    async fn test_amount_above_limit_fails() {
        let gateway = SimulatedGateway::new(dec!(1000), Duration::ZERO);
        let result = gateway.charge(&Context::background(), &request(dec!(1000.01), "card")).await;
        assert!(matches!(result, Err(GatewayError::Declined(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_context_aborts_charge() {
        let gateway = SimulatedGateway::new(dec!(1000), Duration::from_secs(5));
        let (ctx, _handle) = Context::background().with_timeout(Duration::from_secs(1));
        let err = gateway.charge(&ctx, &request(dec!(10), "card")).await.unwrap_err();
        assert_eq!(err.failure_reason(), "cancelled");
    }

    #[tokio::test]
    async fn test_receipt_carries_transaction_id() {
        let gateway = SimulatedGateway::new(dec!(1000), Duration::ZERO);
        let receipt = gateway.charge(&Context::background(), &request(dec!(10), "card")).await.unwrap();
        assert!(receipt.transaction_id.starts_with("TXN-"));
    }
}
