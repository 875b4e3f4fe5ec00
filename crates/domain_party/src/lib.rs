//! Party Domain
//!
//! Customers of the marketplace: identity, contact details, compliance
//! state (KYC, AML), risk profile and loyalty tier.
//!
//! # Modules
//!
//! - [`customer`]: the customer aggregate and its input types
//! - [`address`]: postal addresses
//! - [`ports`]: the [`CustomerRepository`] port and its in-memory adapter
//! - [`service`]: [`CustomerService`], which publishes `user.registered`

pub mod address;
pub mod customer;
pub mod error;
pub mod ports;
pub mod service;

pub use address::{Address, AddressType};
pub use customer::{
    AmlStatus, Customer, CustomerStatus, CustomerTier, CustomerUpdate, KycStatus, NewCustomer,
    RiskProfile,
};
pub use error::PartyError;
pub use ports::{CustomerFilter, CustomerRepository};
pub use service::CustomerService;
