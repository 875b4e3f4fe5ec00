//! Billing Domain
//!
//! Money moving between customers and the marketplace: premium charges,
//! cancellation refunds and claim payouts.
//!
//! Charges carry a positive amount. Refunds and payouts are recorded as
//! negative amounts, so a customer's payments sum to their net position.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{PaymentRequest, PaymentService};
//!
//! let payment = service
//!     .process_payment(&ctx, PaymentRequest {
//!         user_id,
//!         policy_id: Some(policy_id),
//!         subscription_id: None,
//!         amount: dec!(1200),
//!         currency: Currency::USD,
//!         payment_method: "card".into(),
//!         description: None,
//!     })
//!     .await?;
//! ```

pub mod error;
pub mod gateway;
pub mod payment;
pub mod ports;
pub mod service;

pub use error::BillingError;
pub use gateway::{GatewayError, GatewayReceipt, GatewayRequest, PaymentGateway, SimulatedGateway, DECLINED_METHOD};
pub use payment::{Payment, PaymentStatus, PAYOUT_METHOD};
pub use ports::{PaymentFilter, PaymentRepository};
pub use service::{PaymentRequest, PaymentService, PayoutRequest, RefundRequest};
