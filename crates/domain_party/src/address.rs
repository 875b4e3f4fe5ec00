//! Postal addresses

use serde::{Deserialize, Serialize};

use core_kernel::text_enum;

text_enum! {
    pub enum AddressType {
        Residential => "residential",
        Mailing => "mailing",
        Business => "business",
        Billing => "billing",
    }
}

/// A postal address; `country` is ISO 3166-1 alpha-2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address_type: AddressType,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_primary: bool,
}

impl Address {
    pub fn new(
        address_type: AddressType,
        line1: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            address_type,
            line1: line1.into(),
            line2: None,
            city: city.into(),
            state: None,
            postal_code: postal_code.into(),
            country: country.into(),
            is_primary: false,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Marks this address as the primary one
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Single-line rendering for notifications
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = &self.line2 {
            parts.push(line2);
        }
        parts.push(&self.city);
        if let Some(state) = &self.state {
            parts.push(state);
        }
        parts.push(&self.postal_code);
        parts.push(&self.country);
        parts.join(", ")
    }
}
