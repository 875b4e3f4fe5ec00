//! Insurance products offered by partners

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{text_enum, Currency, PartnerId, ProductId};

use crate::error::PolicyError;

text_enum! {
    pub enum ProductStatus {
        Active => "active",
        Inactive => "inactive",
        Draft => "draft",
        Discontinued => "discontinued",
    }
}

/// Product lines with their own base rates; anything else prices at the default rate
pub mod categories {
    pub const AUTO: &str = "auto";
    pub const HOME: &str = "home";
    pub const LIFE: &str = "life";
    pub const HEALTH: &str = "health";
    pub const BUSINESS: &str = "business";
}

/// A product a partner sells through the marketplace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub partner_id: PartnerId,
    pub name: String,
    pub description: Option<String>,
    /// Lowercase product line, e.g. `auto`
    pub category: String,
    pub base_price: Decimal,
    pub coverage_amount: Decimal,
    pub coverage_period_days: u32,
    pub currency: Currency,
    pub status: ProductStatus,
    pub effective_date: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// True when the product is active and on sale at `at`
    pub fn is_available(&self, at: DateTime<Utc>) -> bool {
        self.status == ProductStatus::Active
            && self.effective_date <= at
            && self.expiration_date.map_or(true, |end| at < end)
    }
}

/// Input for creating a product
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewProduct {
    pub partner_id: PartnerId,
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "category is required"))]
    pub category: String,
    pub base_price: Decimal,
    pub coverage_amount: Decimal,
    #[validate(range(min = 1, max = 3650))]
    pub coverage_period_days: u32,
    #[serde(default)]
    pub currency: Currency,
    pub status: Option<ProductStatus>,
    pub effective_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl NewProduct {
    pub fn into_product(self) -> Result<Product, PolicyError> {
        self.validate()?;
        if self.base_price < Decimal::ZERO {
            return Err(PolicyError::validation("base_price must not be negative"));
        }
        if self.coverage_amount <= Decimal::ZERO {
            return Err(PolicyError::validation("coverage_amount must be positive"));
        }
        let now = Utc::now();
        let effective_date = self.effective_date.unwrap_or(now);
        if let Some(end) = self.expiration_date {
            if end <= effective_date {
                return Err(PolicyError::validation("expiration_date must be after effective_date"));
            }
        }
        Ok(Product {
            id: ProductId::new_v7(),
            partner_id: self.partner_id,
            name: self.name,
            description: self.description,
            category: self.category.trim().to_ascii_lowercase(),
            base_price: self.base_price,
            coverage_amount: self.coverage_amount,
            coverage_period_days: self.coverage_period_days,
            currency: self.currency,
            status: self.status.unwrap_or(ProductStatus::Active),
            effective_date,
            expiration_date: self.expiration_date,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial product update
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub base_price: Option<Decimal>,
    pub coverage_amount: Option<Decimal>,
    #[validate(range(min = 1, max = 3650))]
    pub coverage_period_days: Option<u32>,
    pub status: Option<ProductStatus>,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl ProductUpdate {
    pub fn apply(self, product: &mut Product) -> Result<(), PolicyError> {
        self.validate()?;
        if let Some(name) = self.name {
            product.name = name;
        }
        if self.description.is_some() {
            product.description = self.description;
        }
        if let Some(price) = self.base_price {
            if price < Decimal::ZERO {
                return Err(PolicyError::validation("base_price must not be negative"));
            }
            product.base_price = price;
        }
        if let Some(coverage) = self.coverage_amount {
            if coverage <= Decimal::ZERO {
                return Err(PolicyError::validation("coverage_amount must be positive"));
            }
            product.coverage_amount = coverage;
        }
        if let Some(days) = self.coverage_period_days {
            product.coverage_period_days = days;
        }
        if let Some(status) = self.status {
            product.status = status;
        }
        if let Some(end) = self.expiration_date {
            if end <= product.effective_date {
                return Err(PolicyError::validation("expiration_date must be after effective_date"));
            }
            product.expiration_date = Some(end);
        }
        product.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn input() -> NewProduct {
        NewProduct {
            partner_id: PartnerId::new(),
            name: "Motor Comprehensive".to_string(),
            description: None,
            category: " Auto ".to_string(),
            base_price: dec!(500),
            coverage_amount: dec!(100000),
            coverage_period_days: 365,
            currency: Currency::USD,
            status: None,
            effective_date: None,
            expiration_date: None,
        }
    }

    #[test]
    fn test_category_is_normalised() {
        let product = input().into_product().unwrap();
        assert_eq!(product.category, categories::AUTO);
        assert!(product.is_available(Utc::now() + Duration::seconds(1)));
    }

    #[test]
    fn test_rejects_non_positive_coverage() {
        let mut bad = input();
        bad.coverage_amount = Decimal::ZERO;
        assert!(matches!(bad.into_product(), Err(PolicyError::Validation(_))));
    }

    #[test]
    fn test_expired_product_unavailable() {
        let mut product = input().into_product().unwrap();
        product.expiration_date = Some(product.effective_date + Duration::days(1));
        assert!(!product.is_available(product.effective_date + Duration::days(2)));
    }
}
