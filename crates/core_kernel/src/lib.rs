//! Core Kernel - Foundational types for the insurance marketplace
//!
//! This crate provides the building blocks shared by every domain crate:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers and business numbers
//! - Coverage periods and year-fraction helpers
//! - Port error types and the repository marker traits
//! - A cancellation [`Context`](context::Context) threaded through every suspension point
//! - Domain events and the publisher contract used by the event bus
//! - Background job contracts used by the job dispatcher
//! - Pagination primitives for list endpoints

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;
pub mod ports;
pub mod context;
pub mod events;
pub mod jobs;
pub mod pagination;
pub mod text_enum;
#[cfg(any(test, feature = "mock"))]
pub mod memory;

pub use money::{Money, Currency, MoneyError, Rate};
pub use temporal::{CoveragePeriod, TemporalError, years_between};
pub use identifiers::{
    CustomerId, ProductId, PartnerId, QuoteId, PolicyId, ClaimId, PaymentId,
    SubscriptionId, WorkflowId, EventId, JobId, business_number,
};
pub use error::{CoreError, ErrorKind};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
pub use context::{Context, CancelHandle, Cancelled, CancelReason};
pub use events::{DomainEvent, EventPayload, EventPublisher, EventHandler, HandlerError};
pub use jobs::{Job, JobDispatcher, JobError, RetryBackoff, DEFAULT_QUEUE};
pub use pagination::{PageRequest, Page, DEFAULT_PER_PAGE, MAX_PER_PAGE};
