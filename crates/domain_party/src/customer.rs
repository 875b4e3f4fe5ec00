//! Customer aggregate
//!
//! A customer is the account holder behind quotes, policies, claims and
//! payments. Pricing, risk and fraud scoring read the compliance flags and
//! account age exposed here.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{text_enum, years_between, CustomerId};

use crate::address::Address;

text_enum! {
    /// Account status
    pub enum CustomerStatus {
        Active => "active",
        Inactive => "inactive",
        Pending => "pending",
        Suspended => "suspended",
        Closed => "closed",
    }
}

text_enum! {
    /// Know-your-customer verification state
    pub enum KycStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Verified => "verified",
        Failed => "failed",
        Expired => "expired",
    }
}

text_enum! {
    /// Anti-money-laundering screening state
    pub enum AmlStatus {
        Pending => "pending",
        Cleared => "cleared",
        Flagged => "flagged",
        Blocked => "blocked",
    }
}

text_enum! {
    pub enum RiskProfile {
        Low => "low",
        Medium => "medium",
        High => "high",
        VeryHigh => "very_high",
    }
}

text_enum! {
    /// Loyalty tier
    pub enum CustomerTier {
        Bronze => "bronze",
        Silver => "silver",
        Gold => "gold",
        Platinum => "platinum",
    }
}

/// A marketplace customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub status: CustomerStatus,
    pub kyc_status: KycStatus,
    pub aml_status: AmlStatus,
    pub risk_profile: RiskProfile,
    pub customer_tier: CustomerTier,
    pub addresses: Vec<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Creates an active customer with pending compliance checks
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CustomerId::new_v7(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: None,
            date_of_birth: None,
            status: CustomerStatus::Active,
            kyc_status: KycStatus::Pending,
            aml_status: AmlStatus::Pending,
            risk_profile: RiskProfile::Low,
            customer_tier: CustomerTier::Bronze,
            addresses: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }

    pub fn is_kyc_verified(&self) -> bool {
        self.kyc_status == KycStatus::Verified
    }

    pub fn is_aml_cleared(&self) -> bool {
        self.aml_status == AmlStatus::Cleared
    }

    /// High or very-high risk profile
    pub fn is_high_risk(&self) -> bool {
        matches!(self.risk_profile, RiskProfile::High | RiskProfile::VeryHigh)
    }

    /// Tier as an ordinal, bronze = 0 through platinum = 3
    pub fn tier_level(&self) -> u8 {
        match self.customer_tier {
            CustomerTier::Bronze => 0,
            CustomerTier::Silver => 1,
            CustomerTier::Gold => 2,
            CustomerTier::Platinum => 3,
        }
    }

    /// The address flagged primary, else the first one
    pub fn get_primary_address(&self) -> Option<&Address> {
        self.addresses
            .iter()
            .find(|a| a.is_primary)
            .or_else(|| self.addresses.first())
    }

    pub fn country(&self) -> Option<&str> {
        self.get_primary_address().map(|a| a.country.as_str())
    }

    /// Whole days since the account was opened
    pub fn account_age_days(&self, at: DateTime<Utc>) -> i64 {
        (at - self.created_at).num_days().max(0)
    }

    /// Fractional years since the account was opened
    pub fn account_age_years(&self, at: DateTime<Utc>) -> Decimal {
        if at <= self.created_at {
            return Decimal::ZERO;
        }
        years_between(self.created_at, at)
    }

    /// Age in completed years, if the date of birth is known
    pub fn age(&self, on: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth?;
        let mut age = on.year() - dob.year();
        if (on.month(), on.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

/// Input for registering a customer
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCustomer {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "first_name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "last_name is required"))]
    pub last_name: String,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub addresses: Vec<Address>,
}

impl NewCustomer {
    pub fn into_customer(self) -> Customer {
        let mut customer = Customer::new(self.email, self.first_name, self.last_name);
        customer.phone = self.phone;
        customer.date_of_birth = self.date_of_birth;
        customer.addresses = self.addresses;
        customer
    }
}

/// Partial update of a customer; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CustomerUpdate {
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
    pub status: Option<CustomerStatus>,
    pub kyc_status: Option<KycStatus>,
    pub aml_status: Option<AmlStatus>,
    pub risk_profile: Option<RiskProfile>,
    pub customer_tier: Option<CustomerTier>,
    pub addresses: Option<Vec<Address>>,
}

impl CustomerUpdate {
    /// Applies the present fields to `customer` and bumps `updated_at`
    pub fn apply(self, customer: &mut Customer) {
        if let Some(email) = self.email {
            customer.email = email;
        }
        if let Some(first_name) = self.first_name {
            customer.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            customer.last_name = last_name;
        }
        if self.phone.is_some() {
            customer.phone = self.phone;
        }
        if let Some(status) = self.status {
            customer.status = status;
        }
        if let Some(kyc) = self.kyc_status {
            customer.kyc_status = kyc;
        }
        if let Some(aml) = self.aml_status {
            customer.aml_status = aml;
        }
        if let Some(risk) = self.risk_profile {
            customer.risk_profile = risk;
        }
        if let Some(tier) = self.customer_tier {
            customer.customer_tier = tier;
        }
        if let Some(addresses) = self.addresses {
            customer.addresses = addresses;
        }
        customer.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressType;
    use chrono::Duration;

    #[test]
    fn test_new_customer_defaults() {
        let customer = Customer::new("jane@example.com", "Jane", "Doe");
        assert!(customer.is_active());
        assert!(!customer.is_kyc_verified());
        assert!(!customer.is_aml_cleared());
        assert!(!customer.is_high_risk());
        assert_eq!(customer.tier_level(), 0);
        assert_eq!(customer.full_name(), "Jane Doe");
    }

    #[test]
    fn test_primary_address_preferred() {
        let mut customer = Customer::new("a@example.com", "A", "B");
        customer.addresses.push(Address::new(AddressType::Mailing, "1 Main St", "Austin", "78701", "US"));
        customer.addresses.push(
            Address::new(AddressType::Residential, "2 High St", "Leeds", "LS1", "GB").primary(),
        );
        assert_eq!(customer.country(), Some("GB"));
    }

    #[test]
    fn test_account_age() {
        let mut customer = Customer::new("a@example.com", "A", "B");
        let now = Utc::now();
        customer.created_at = now - Duration::days(730);
        assert_eq!(customer.account_age_days(now), 730);
        assert_eq!(customer.account_age_years(now), Decimal::TWO);
        assert_eq!(customer.account_age_years(customer.created_at - Duration::days(1)), Decimal::ZERO);
    }

    #[test]
    fn test_age_before_birthday() {
        let mut customer = Customer::new("a@example.com", "A", "B");
        customer.date_of_birth = NaiveDate::from_ymd_opt(1990, 6, 15);
        assert_eq!(customer.age(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), Some(33));
        assert_eq!(customer.age(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), Some(34));
    }

    #[test]
    fn test_new_customer_validation() {
        let input = NewCustomer {
            email: "not-an-email".to_string(),
            first_name: "".to_string(),
            last_name: "Doe".to_string(),
            phone: None,
            date_of_birth: None,
            addresses: Vec::new(),
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("first_name"));
    }
}
