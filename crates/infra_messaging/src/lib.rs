//! Messaging Infrastructure
//!
//! This crate provides the two asynchronous backbones the domain services
//! rely on:
//!
//! - [`EventBus`]: in-process publish/subscribe keyed by event type. Each
//!   subscription owns a bounded queue drained by its own task, so one slow
//!   or failing handler never delays another, and events from a single
//!   publisher reach a handler in publish order.
//! - [`JobDispatcherService`]: per-queue worker pools executing [`Job`]s by
//!   priority with retries, backoff, per-attempt timeouts and a dead-letter
//!   list.
//!
//! Both implement the contracts defined in `core_kernel`
//! ([`EventPublisher`], [`JobDispatcher`]), so domain crates never depend on
//! this crate directly.
//!
//! [`Job`]: core_kernel::Job
//! [`EventPublisher`]: core_kernel::EventPublisher
//! [`JobDispatcher`]: core_kernel::JobDispatcher

pub mod error;
pub mod event_bus;
pub mod dispatcher;

pub use error::MessagingError;
pub use event_bus::{EventBus, EventBusConfig, EventBusStats, LoggingHandler, DrainReport};
pub use dispatcher::{JobDispatcherService, DispatcherConfig, DispatcherStats, DeadLetter};
