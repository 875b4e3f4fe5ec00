//! Claim aggregate
//!
//! # Lifecycle
//!
//! ```text
//! submitted ──▶ under_review ──▶ approved ──payout──▶ paid
//!     │               │              ▲
//!     └───────────────┴──▶ denied ───┘ (manual override)
//! ```
//!
//! `paid` is terminal. `policy_id`, `user_id`, `claim_number`,
//! `incident_date` and `reported_date` never change after creation, and
//! `0 ≤ paid_amount ≤ claim_amount` always holds.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{business_number, text_enum, ClaimId, Currency, CustomerId, PolicyId};

use crate::error::ClaimError;

text_enum! {
    pub enum ClaimStatus {
        Submitted => "submitted",
        UnderReview => "under_review",
        Approved => "approved",
        Denied => "denied",
        Paid => "paid",
    }
}

impl ClaimStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Paid)
    }

    pub fn can_transition_to(&self, target: ClaimStatus) -> bool {
        use ClaimStatus::*;
        match (self, target) {
            (a, b) if *a == b => true,
            (Submitted, UnderReview | Approved | Denied) => true,
            (UnderReview, Approved | Denied) => true,
            (Approved, Paid | UnderReview | Denied) => true,
            (Denied, UnderReview | Approved) => true,
            _ => false,
        }
    }
}

/// Metadata of an uploaded supporting document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDocument {
    pub name: String,
    /// Bytes
    pub size: i64,
    pub content_type: String,
    pub upload_date: DateTime<Utc>,
}

impl ClaimDocument {
    pub fn new(name: impl Into<String>, size: i64, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            content_type: content_type.into(),
            upload_date: Utc::now(),
        }
    }
}

/// A claim against a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub claim_number: String,
    pub policy_id: PolicyId,
    pub user_id: CustomerId,
    pub title: String,
    pub description: String,
    pub claim_amount: Decimal,
    pub paid_amount: Decimal,
    pub currency: Currency,
    pub status: ClaimStatus,
    pub incident_date: DateTime<Utc>,
    pub reported_date: DateTime<Utc>,
    pub resolved_date: Option<DateTime<Utc>>,
    pub denial_reason: Option<String>,
    pub documents: Vec<ClaimDocument>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// Number of documents with content
    pub fn supporting_documents(&self) -> usize {
        self.documents.iter().filter(|d| d.size > 0).count()
    }

    /// Whole days between the incident and the report
    pub fn reporting_delay_days(&self) -> i64 {
        (self.reported_date - self.incident_date).num_days()
    }

    pub fn transition_to(&mut self, target: ClaimStatus) -> Result<(), ClaimError> {
        if !self.status.can_transition_to(target) {
            return Err(ClaimError::transition(self.status, target));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records the outcome of adjudication
    ///
    /// `denied` needs a reason and resolves the claim; `approved` resolves
    /// it and clears any earlier denial; `under_review` reopens it.
    pub fn decide(&mut self, outcome: ClaimStatus, reason: Option<String>, at: DateTime<Utc>) -> Result<(), ClaimError> {
        match outcome {
            ClaimStatus::Denied => {
                let reason = reason
                    .filter(|r| !r.trim().is_empty())
                    .ok_or_else(|| ClaimError::validation("a denial needs a reason"))?;
                self.transition_to(ClaimStatus::Denied)?;
                self.denial_reason = Some(reason);
                self.resolved_date = Some(at);
            }
            ClaimStatus::Approved => {
                self.transition_to(ClaimStatus::Approved)?;
                self.denial_reason = None;
                self.resolved_date = Some(at);
            }
            ClaimStatus::UnderReview => {
                self.transition_to(ClaimStatus::UnderReview)?;
                self.denial_reason = None;
                self.resolved_date = None;
            }
            other => return Err(ClaimError::transition(self.status, other)),
        }
        Ok(())
    }

    /// Settles an approved claim in full
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> Result<(), ClaimError> {
        if self.status != ClaimStatus::Approved {
            return Err(ClaimError::transition(self.status, ClaimStatus::Paid));
        }
        self.transition_to(ClaimStatus::Paid)?;
        self.paid_amount = self.claim_amount;
        self.resolved_date.get_or_insert(at);
        Ok(())
    }
}

/// Input for submitting a claim
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewClaim {
    pub policy_id: PolicyId,
    pub user_id: CustomerId,
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "description is required"))]
    pub description: String,
    pub claim_amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    pub incident_date: DateTime<Utc>,
    /// Defaults to the submission time
    #[serde(default)]
    pub reported_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub documents: Vec<ClaimDocument>,
}

impl NewClaim {
    pub fn into_claim(self, now: DateTime<Utc>) -> Result<Claim, ClaimError> {
        self.validate()?;
        if self.claim_amount <= Decimal::ZERO {
            return Err(ClaimError::validation("claim_amount must be positive"));
        }
        if self.incident_date > now {
            return Err(ClaimError::validation("incident_date cannot be in the future"));
        }
        let reported_date = self.reported_date.unwrap_or(now);
        if reported_date < self.incident_date {
            return Err(ClaimError::validation("reported_date cannot precede incident_date"));
        }
        Ok(Claim {
            id: ClaimId::new_v7(),
            claim_number: business_number("CLM", now),
            policy_id: self.policy_id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            claim_amount: self.claim_amount.round_dp(self.currency.decimal_places()),
            paid_amount: Decimal::ZERO,
            currency: self.currency,
            status: ClaimStatus::Submitted,
            incident_date: self.incident_date,
            reported_date,
            resolved_date: None,
            denial_reason: None,
            documents: self.documents,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial claim update
///
/// Identity and date fields may be echoed back but must match the stored
/// values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimUpdate {
    pub policy_id: Option<PolicyId>,
    pub user_id: Option<CustomerId>,
    pub claim_number: Option<String>,
    pub incident_date: Option<DateTime<Utc>>,
    pub reported_date: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub claim_amount: Option<Decimal>,
    pub paid_amount: Option<Decimal>,
    pub status: Option<ClaimStatus>,
    pub denial_reason: Option<String>,
    pub documents: Option<Vec<ClaimDocument>>,
}

impl ClaimUpdate {
    pub fn apply(self, claim: &mut Claim) -> Result<(), ClaimError> {
        if self.policy_id.is_some_and(|p| p != claim.policy_id) {
            return Err(ClaimError::Immutable("policy_id"));
        }
        if self.user_id.is_some_and(|u| u != claim.user_id) {
            return Err(ClaimError::Immutable("user_id"));
        }
        if self.claim_number.as_ref().is_some_and(|n| *n != claim.claim_number) {
            return Err(ClaimError::Immutable("claim_number"));
        }
        if self.incident_date.is_some_and(|d| d != claim.incident_date) {
            return Err(ClaimError::Immutable("incident_date"));
        }
        if self.reported_date.is_some_and(|d| d != claim.reported_date) {
            return Err(ClaimError::Immutable("reported_date"));
        }

        let claim_amount = self.claim_amount.unwrap_or(claim.claim_amount);
        let paid_amount = self.paid_amount.unwrap_or(claim.paid_amount);
        if claim_amount <= Decimal::ZERO {
            return Err(ClaimError::validation("claim_amount must be positive"));
        }
        if paid_amount < Decimal::ZERO || paid_amount > claim_amount {
            return Err(ClaimError::validation("paid_amount must be between 0 and claim_amount"));
        }
        if let Some(title) = self.title {
            if title.trim().is_empty() {
                return Err(ClaimError::validation("title is required"));
            }
            claim.title = title;
        }
        if let Some(description) = self.description {
            if description.trim().is_empty() {
                return Err(ClaimError::validation("description is required"));
            }
            claim.description = description;
        }
        if let Some(status) = self.status {
            match status {
                ClaimStatus::Denied | ClaimStatus::Approved | ClaimStatus::UnderReview => {
                    claim.decide(status, self.denial_reason, Utc::now())?
                }
                other => claim.transition_to(other)?,
            }
        }
        if let Some(documents) = self.documents {
            claim.documents = documents;
        }
        claim.claim_amount = claim_amount;
        claim.paid_amount = paid_amount;
        claim.updated_at = Utc::now();
        Ok(())
    }
}
