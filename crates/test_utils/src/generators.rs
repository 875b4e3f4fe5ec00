//! Property-Based Test Generators
//!
//! proptest strategies producing inputs that satisfy the domain's own
//! validation, so properties exercise the engines rather than the validators.

use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use core_kernel::{Currency, CustomerId, ProductId};
use domain_policy::{PaymentFrequency, PricingRequest};

/// Strategy for generating Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::JPY),
        Just(Currency::CHF),
        Just(Currency::INR),
        Just(Currency::AUD),
        Just(Currency::CAD),
        Just(Currency::SGD),
        Just(Currency::HKD),
    ]
}

pub fn payment_frequency_strategy() -> impl Strategy<Value = PaymentFrequency> {
    prop_oneof![
        Just(PaymentFrequency::Monthly),
        Just(PaymentFrequency::Quarterly),
        Just(PaymentFrequency::Annually),
    ]
}

/// Positive amounts with up to two decimal places, 0.01 to 10,000,000
pub fn positive_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Coverage amounts in whole units, 1,000 to 5,000,000
pub fn coverage_strategy() -> impl Strategy<Value = Decimal> {
    (1_000i64..5_000_000i64).prop_map(Decimal::from)
}

/// Percentages between 0 and 100 with two decimals
pub fn percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..10_000u32).prop_map(|n| Decimal::new(i64::from(n), 2))
}

/// Requested discount names, including ones the rules may not know
pub fn discounts_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop_oneof![
            Just("multi_policy".to_string()),
            Just("loyalty".to_string()),
            Just("safe_driver".to_string()),
            Just("bundle".to_string()),
            "[a-z_]{3,12}",
        ],
        0..4,
    )
}

/// Free-form risk data, sometimes with numeric `custom_factors`
pub fn risk_factors_strategy() -> impl Strategy<Value = BTreeMap<String, Value>> {
    let custom = prop::collection::btree_map("[a-z]{3,8}", -50i32..50i32, 0..3);
    (custom, any::<bool>()).prop_map(|(custom, high_risk)| {
        let mut factors = BTreeMap::new();
        if !custom.is_empty() {
            let custom: serde_json::Map<String, Value> =
                custom.into_iter().map(|(k, v)| (k, json!(v))).collect();
            factors.insert("custom_factors".to_string(), Value::Object(custom));
        }
        if high_risk {
            factors.insert("high_risk_area".to_string(), json!(true));
        }
        factors
    })
}

/// Valid pricing requests for the given customer and product
///
/// Terms start within the next year and run 30 days to three years.
pub fn pricing_request_strategy(user_id: CustomerId, product_id: ProductId) -> impl Strategy<Value = PricingRequest> {
    (
        coverage_strategy(),
        currency_strategy(),
        payment_frequency_strategy(),
        0i64..365,
        30i64..1095,
        risk_factors_strategy(),
        discounts_strategy(),
    )
        .prop_map(move |(coverage, currency, frequency, start_offset, term, risk_factors, discounts)| {
            let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);
            let effective_date = base + Duration::days(start_offset);
            PricingRequest {
                product_id,
                user_id,
                coverage_amount: coverage,
                currency,
                payment_frequency: frequency,
                effective_date,
                expiration_date: effective_date + Duration::days(term),
                risk_factors,
                discounts,
                options: BTreeMap::new(),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_amounts_are_positive(amount in positive_amount_strategy()) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount.scale() <= 2);
        }

        #[test]
        fn generated_requests_pass_validation(
            request in pricing_request_strategy(CustomerId::new(), ProductId::new())
        ) {
            prop_assert!(request.validate().is_ok());
        }
    }
}
