//! Strongly-typed identifiers for domain entities
//!
//! Using newtype wrappers around UUIDs provides type safety and prevents
//! accidental mixing of different identifier types. Identifiers serialize
//! and display in the canonical 8-4-4-4-12 form; the prefix is only used
//! for human-facing business numbers and log correlation.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix
            pub fn prefix() -> &'static str {
                $prefix
            }

            /// Returns the prefixed form used in logs, e.g. `POL-<uuid>`
            pub fn to_prefixed(&self) -> String {
                format!("{}-{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_id!(CustomerId, "CUS");
define_id!(PartnerId, "PTN");
define_id!(ProductId, "PRD");
define_id!(QuoteId, "QTE");
define_id!(PolicyId, "POL");
define_id!(ClaimId, "CLM");
define_id!(PaymentId, "PAY");
define_id!(SubscriptionId, "SUB");
define_id!(WorkflowId, "WFL");
define_id!(EventId, "EVT");
define_id!(JobId, "JOB");

/// Generates a human-facing business number such as `POL-2024-3F9A01C2`
///
/// The suffix is taken from a fresh random UUID, so collisions are unlikely
/// but still guarded by the unique constraint on the owning table.
pub fn business_number(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().as_u128() as u32;
    format!("{}-{}-{:08X}", prefix, at.year(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_canonical_uuid() {
        let id = PolicyId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
        assert_eq!(id.to_string().len(), 36);
    }

    #[test]
    fn test_prefixed_parsing() {
        let original = ClaimId::new();
        let parsed: ClaimId = original.to_prefixed().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_business_number_format() {
        let at = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 3, 15, 0, 0, 0).unwrap();
        let number = business_number("QTE", at);
        assert!(number.starts_with("QTE-2024-"));
        assert_eq!(number.len(), "QTE-2024-".len() + 8);
    }
}
