//! Temporal types for coverage periods
//!
//! Policies, products and quotes all describe an interval of cover. The
//! pricing engine pro-rates by the fraction of a year the interval spans,
//! and cancellation refunds by the fraction still unused.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;

/// Errors that can occur with temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: end {end} must be after start {start}")]
    InvalidPeriod { start: String, end: String },
}

/// Returns the number of (365-day) years between two instants
///
/// Negative when `to` precedes `from`.
pub fn years_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    Decimal::from((to - from).num_seconds()) / Decimal::from(SECONDS_PER_YEAR)
}

/// A half-open interval `[start, end)` of insurance cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoveragePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CoveragePeriod {
    /// Creates a new period, rejecting empty or inverted intervals
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TemporalError> {
        if end <= start {
            return Err(TemporalError::InvalidPeriod {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Returns true if the instant falls inside the period (inclusive of both bounds)
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    /// Returns the length of the period
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns the length of the period in years
    pub fn years(&self) -> Decimal {
        years_between(self.start, self.end)
    }

    /// Returns the fraction of the period not yet consumed at `at`, clamped to `[0, 1]`
    pub fn unused_ratio(&self, at: DateTime<Utc>) -> Decimal {
        let total = self.duration().num_seconds();
        if total <= 0 {
            return Decimal::ZERO;
        }
        let used = (at - self.start).num_seconds().max(0);
        (Decimal::from(total - used) / Decimal::from(total)).clamp(Decimal::ZERO, Decimal::ONE)
    }

    /// Returns the whole days remaining until the end of the period
    pub fn days_remaining(&self, at: DateTime<Utc>) -> i64 {
        (self.end - at).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_invalid_period_rejected() {
        assert!(CoveragePeriod::new(date(2024, 3, 15), date(2024, 3, 15)).is_err());
        assert!(CoveragePeriod::new(date(2024, 3, 15), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_full_year_is_one() {
        let period = CoveragePeriod::new(date(2024, 3, 15), date(2025, 3, 15)).unwrap();
        assert_eq!(period.years(), dec!(1));
    }

    #[test]
    fn test_unused_ratio_quarter_used() {
        let period = CoveragePeriod::new(date(2024, 1, 1), date(2024, 12, 26)).unwrap();
        let at = period.start + Duration::days(90);
        assert_eq!(period.unused_ratio(at), dec!(0.75));
    }

    #[test]
    fn test_unused_ratio_clamped() {
        let period = CoveragePeriod::new(date(2024, 1, 1), date(2025, 1, 1)).unwrap();
        assert_eq!(period.unused_ratio(date(2026, 1, 1)), Decimal::ZERO);
        assert_eq!(period.unused_ratio(date(2023, 1, 1)), Decimal::ONE);
    }
}
