//! Integration tests for core_kernel

use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

use core_kernel::context::{CancelReason, Context};
use core_kernel::error::{CoreError, ErrorKind};
use core_kernel::money::{Currency, Money, MoneyError, Rate};
use core_kernel::ports::PortError;
use core_kernel::temporal::{years_between, CoveragePeriod};
use core_kernel::{PageRequest, Page, PolicyId};

// ============================================================================
// Error Tests
// ============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_core_error_validation_kind() {
        let error = CoreError::validation("Invalid input");
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(error.to_string().contains("Validation error"));
    }

    #[test]
    fn test_core_error_from_money_error() {
        let money_error = MoneyError::UnknownCurrency("XYZ".to_string());
        let core_error: CoreError = money_error.into();
        assert!(matches!(core_error, CoreError::Money(_)));
        assert_eq!(core_error.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_port_error_kinds() {
        assert_eq!(PortError::not_found("Claim", "x").kind(), ErrorKind::NotFound);
        assert_eq!(PortError::connection("refused").kind(), ErrorKind::Io);
        assert_eq!(PortError::internal("boom").kind(), ErrorKind::Io);
    }
}

// ============================================================================
// Money Tests
// ============================================================================

mod money_tests {
    use super::*;

    #[test]
    fn test_percentage_of_coverage() {
        let coverage = Money::new(dec!(100000), Currency::USD);
        assert_eq!(Rate::from_percentage(dec!(-5)).apply(&coverage).amount(), dec!(-5000));
        assert_eq!(Rate::from_percentage(dec!(0.05)).apply(&coverage).amount(), dec!(50));
    }

    #[test]
    fn test_round_to_currency() {
        assert_eq!(Money::new(dec!(809.99999), Currency::USD).round_to_currency().amount(), dec!(810.00));
        assert_eq!(Money::new(dec!(99.6), Currency::JPY).round_to_currency().amount(), dec!(100));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::new(dec!(9500), Currency::USD).to_string(), "USD 9500.00");
    }
}

// ============================================================================
// Temporal Tests
// ============================================================================

mod temporal_tests {
    use super::*;

    #[test]
    fn test_half_year_term() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::days(73);
        assert_eq!(years_between(start, end), dec!(0.2));
    }

    #[test]
    fn test_contains_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let period = CoveragePeriod::new(start, end).unwrap();
        assert!(period.contains(start));
        assert!(period.contains(end));
        assert!(!period.contains(end + chrono::Duration::seconds(1)));
    }
}

// ============================================================================
// Context Tests
// ============================================================================

mod context_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_child_timeout_never_exceeds_parent_deadline() {
        let (parent, _h) = Context::background().with_timeout(Duration::from_secs(1));
        let (child, _h2) = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(child.check().unwrap_err().reason(), CancelReason::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let (ctx, handle) = Context::background().with_cancel();
        let waiter = tokio::spawn({
            let ctx = ctx.clone();
            async move { ctx.cancelled().await.reason() }
        });
        tokio::task::yield_now().await;
        handle.cancel();
        assert_eq!(waiter.await.unwrap(), CancelReason::Cancelled);
    }
}

// ============================================================================
// Pagination and Identifier Tests
// ============================================================================

mod pagination_tests {
    use super::*;

    #[test]
    fn test_total_count_independent_of_page() {
        let first: Page<u8> = Page::new(vec![1, 2], 45, PageRequest::new(Some(1), Some(20)));
        let last: Page<u8> = Page::new(vec![1], 45, PageRequest::new(Some(3), Some(20)));
        assert_eq!(first.total_count, last.total_count);
        assert!(first.has_more());
        assert!(!last.has_more());
        assert_eq!(last.last_page(), 3);
    }

    #[test]
    fn test_ids_serialize_as_canonical_uuid() {
        let id = PolicyId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }
}
