//! Claim workflow model
//!
//! A workflow is an explicit stage table plus a pointer to the current
//! stage. Stage handlers live in [`crate::processing`]; this module only
//! knows how stages are laid out for a claim and how their statuses roll
//! up into the workflow status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{text_enum, ClaimId, WorkflowId};
use domain_rules::ClaimProcessingRules;

use crate::claim::Claim;
use crate::error::ClaimError;

text_enum! {
    pub enum StageId {
        InitialReview => "initial_review",
        FraudDetection => "fraud_detection",
        PolicyValidation => "policy_validation",
        DamageAssessment => "damage_assessment",
        SeniorReview => "senior_review",
        ExecutiveApproval => "executive_approval",
        ApprovalDecision => "approval_decision",
        PayoutProcessing => "payout_processing",
    }
}

impl StageId {
    pub fn display_name(&self) -> &'static str {
        match self {
            StageId::InitialReview => "Initial Review",
            StageId::FraudDetection => "Fraud Detection",
            StageId::PolicyValidation => "Policy Validation",
            StageId::DamageAssessment => "Damage Assessment",
            StageId::SeniorReview => "Senior Review",
            StageId::ExecutiveApproval => "Executive Approval",
            StageId::ApprovalDecision => "Approval Decision",
            StageId::PayoutProcessing => "Payout Processing",
        }
    }

    /// Stages that judge the claim, as opposed to acting on the judgement
    pub fn is_evaluation(&self) -> bool {
        !matches!(self, StageId::ApprovalDecision | StageId::PayoutProcessing)
    }
}

text_enum! {
    pub enum StageStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
}

impl StageStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped)
    }
}

text_enum! {
    pub enum StageResult {
        Approved => "approved",
        Declined => "declined",
        RequiresReview => "requires_review",
    }
}

text_enum! {
    pub enum WorkflowStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub stage_id: StageId,
    pub name: String,
    pub status: StageStatus,
    /// `None` until the stage has run
    pub result: Option<StageResult>,
    pub decision: String,
    pub comments: String,
    pub assigned_to: Option<String>,
    pub auto_approved: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Stage {
    pub fn new(stage_id: StageId) -> Self {
        Self {
            stage_id,
            name: stage_id.display_name().to_string(),
            status: StageStatus::Pending,
            result: None,
            decision: String::new(),
            comments: String::new(),
            assigned_to: None,
            auto_approved: false,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Stage::new(self.stage_id);
    }

    /// Records a result; a declined stage is failed, everything else completed
    pub fn finish(&mut self, outcome: StageOutcome, at: DateTime<Utc>) {
        self.status = if outcome.result == StageResult::Declined {
            StageStatus::Failed
        } else {
            StageStatus::Completed
        };
        self.auto_approved = outcome.result == StageResult::Approved && outcome.auto;
        self.result = Some(outcome.result);
        self.decision = outcome.decision;
        if let Some(comments) = outcome.comments {
            self.comments = comments;
        }
        self.completed_at = Some(at);
    }

    /// Records a handler error; the stage has no result
    pub fn fail(&mut self, error: &ClaimError, at: DateTime<Utc>) {
        self.status = StageStatus::Failed;
        self.result = None;
        self.comments = error.to_string();
        self.completed_at = Some(at);
    }

    pub fn skip(&mut self, reason: &str, at: DateTime<Utc>) {
        self.status = StageStatus::Skipped;
        self.comments = reason.to_string();
        self.completed_at = Some(at);
    }
}

/// What a stage handler decided
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub result: StageResult,
    pub decision: String,
    pub comments: Option<String>,
    /// Decided by the handler rather than a person
    pub auto: bool,
}

impl StageOutcome {
    pub fn approved(decision: impl Into<String>) -> Self {
        Self {
            result: StageResult::Approved,
            decision: decision.into(),
            comments: None,
            auto: true,
        }
    }

    pub fn declined(decision: impl Into<String>) -> Self {
        Self {
            result: StageResult::Declined,
            decision: decision.into(),
            comments: None,
            auto: true,
        }
    }

    pub fn requires_review(decision: impl Into<String>) -> Self {
        Self {
            result: StageResult::RequiresReview,
            decision: decision.into(),
            comments: None,
            auto: true,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }
}

/// Processing state of one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub claim_id: ClaimId,
    pub stages: Vec<Stage>,
    /// Index into `stages`; equals `stages.len()` once every stage has run
    pub current_stage: usize,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    /// Lays out the stages for a claim
    ///
    /// Senior review and executive approval are only added above their
    /// configured amounts.
    pub fn for_claim(claim: &Claim, rules: &ClaimProcessingRules, now: DateTime<Utc>) -> Self {
        let mut ids = vec![
            StageId::InitialReview,
            StageId::FraudDetection,
            StageId::PolicyValidation,
            StageId::DamageAssessment,
        ];
        if claim.claim_amount > rules.senior_review_threshold {
            ids.push(StageId::SeniorReview);
        }
        if claim.claim_amount > rules.executive_approval_threshold {
            ids.push(StageId::ExecutiveApproval);
        }
        ids.push(StageId::ApprovalDecision);
        ids.push(StageId::PayoutProcessing);

        Self {
            id: WorkflowId::new_v7(),
            claim_id: claim.id,
            stages: ids.into_iter().map(Stage::new).collect(),
            current_stage: 0,
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.stage_id).collect()
    }

    pub fn position(&self, stage_id: StageId) -> Option<usize> {
        self.stages.iter().position(|s| s.stage_id == stage_id)
    }

    pub fn stage(&self, stage_id: StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    pub fn stage_mut(&mut self, stage_id: StageId) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.stage_id == stage_id)
    }

    pub fn current(&self) -> Option<&Stage> {
        self.stages.get(self.current_stage)
    }

    pub fn is_finished(&self) -> bool {
        self.current_stage >= self.stages.len()
    }

    /// Advances the pointer past the current stage and any later stage
    /// that has already finished
    pub fn move_to_next_stage(&mut self, at: DateTime<Utc>) {
        self.current_stage += 1;
        while self
            .stages
            .get(self.current_stage)
            .is_some_and(|s| s.status.is_finished())
        {
            self.current_stage += 1;
        }
        self.refresh_status(at);
    }

    /// Marks every pending evaluation stage after `from` as skipped
    pub fn skip_remaining_evaluation(&mut self, from: usize, reason: &str, at: DateTime<Utc>) {
        for stage in self.stages.iter_mut().skip(from + 1) {
            if stage.stage_id.is_evaluation() && stage.status == StageStatus::Pending {
                stage.skip(reason, at);
            }
        }
    }

    /// Results of the stages before `approval_decision`
    pub fn evaluation_results(&self) -> impl Iterator<Item = (&Stage, StageResult)> {
        self.stages
            .iter()
            .filter(|s| s.stage_id.is_evaluation())
            .filter_map(|s| s.result.map(|r| (s, r)))
    }

    /// Recomputes the aggregate status from the stages
    pub fn refresh_status(&mut self, at: DateTime<Utc>) {
        let previous = self.status;
        self.status = if self.stages.iter().any(|s| s.status == StageStatus::Failed) {
            WorkflowStatus::Failed
        } else if self.stages.iter().any(|s| s.status == StageStatus::InProgress) {
            WorkflowStatus::InProgress
        } else if self.is_finished() {
            WorkflowStatus::Completed
        } else if self.stages.iter().all(|s| s.status == StageStatus::Pending) {
            WorkflowStatus::Pending
        } else {
            WorkflowStatus::InProgress
        };
        if self.status != previous {
            self.updated_at = at;
        }
        self.completed_at = if self.is_finished() {
            Some(self.completed_at.unwrap_or(at))
        } else {
            None
        };
    }

    /// Stops the workflow at the current stage
    pub fn abort(&mut self, at: DateTime<Utc>) {
        self.current_stage = self.stages.len();
        self.status = WorkflowStatus::Failed;
        self.updated_at = at;
        self.completed_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::NewClaim;
    use chrono::Duration;
    use core_kernel::{Currency, CustomerId, PolicyId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn claim(amount: Decimal) -> Claim {
        NewClaim {
            policy_id: PolicyId::new(),
            user_id: CustomerId::new(),
            title: "Water damage".to_string(),
            description: "Burst pipe in the kitchen".to_string(),
            claim_amount: amount,
            currency: Currency::USD,
            incident_date: Utc::now() - Duration::days(2),
            reported_date: None,
            documents: vec![],
        }
        .into_claim(Utc::now())
        .unwrap()
    }

    #[test]
    fn test_small_claim_has_six_stages() {
        let wf = Workflow::for_claim(&claim(dec!(5000)), &ClaimProcessingRules::default(), Utc::now());
        assert_eq!(
            wf.stage_ids(),
            vec![
                StageId::InitialReview,
                StageId::FraudDetection,
                StageId::PolicyValidation,
                StageId::DamageAssessment,
                StageId::ApprovalDecision,
                StageId::PayoutProcessing,
            ]
        );
        assert_eq!(wf.status, WorkflowStatus::Pending);
    }

    #[test]
    fn test_escalation_stages_by_amount() {
        let rules = ClaimProcessingRules::default();
        let boundary = Workflow::for_claim(&claim(dec!(50000)), &rules, Utc::now());
        assert!(boundary.position(StageId::SeniorReview).is_none());

        let senior = Workflow::for_claim(&claim(dec!(60000)), &rules, Utc::now());
        assert!(senior.position(StageId::SeniorReview).is_some());
        assert!(senior.position(StageId::ExecutiveApproval).is_none());

        let executive = Workflow::for_claim(&claim(dec!(150000)), &rules, Utc::now());
        assert_eq!(executive.stages.len(), 8);
        assert_eq!(executive.position(StageId::ExecutiveApproval), Some(5));
    }

    #[test]
    fn test_declined_stage_fails() {
        let mut stage = Stage::new(StageId::PolicyValidation);
        stage.finish(StageOutcome::declined("policy is not active"), Utc::now());
        assert_eq!(stage.status, StageStatus::Failed);
        assert_eq!(stage.result, Some(StageResult::Declined));
        assert!(!stage.auto_approved);
    }

    #[test]
    fn test_move_skips_finished_stages() {
        let mut wf = Workflow::for_claim(&claim(dec!(5000)), &ClaimProcessingRules::default(), Utc::now());
        wf.stages[0].finish(StageOutcome::declined("missing title"), Utc::now());
        wf.skip_remaining_evaluation(0, "declined earlier", Utc::now());
        wf.move_to_next_stage(Utc::now());
        assert_eq!(wf.current().map(|s| s.stage_id), Some(StageId::ApprovalDecision));
        assert_eq!(wf.status, WorkflowStatus::Failed);
        assert!(wf.completed_at.is_none());
    }

    #[test]
    fn test_failed_stage_fails_workflow_before_it_ends() {
        let mut wf = Workflow::for_claim(&claim(dec!(5000)), &ClaimProcessingRules::default(), Utc::now());
        let now = Utc::now();
        wf.stages[0].finish(StageOutcome::approved("complete"), now);
        wf.move_to_next_stage(now);
        assert_eq!(wf.status, WorkflowStatus::InProgress);

        wf.stages[1].finish(StageOutcome::declined("fraud score too high"), now);
        wf.move_to_next_stage(now);
        assert!(!wf.is_finished());
        assert_eq!(wf.status, WorkflowStatus::Failed);
    }

    #[test]
    fn test_status_rolls_up() {
        let mut wf = Workflow::for_claim(&claim(dec!(500)), &ClaimProcessingRules::default(), Utc::now());
        let now = Utc::now();
        for i in 0..wf.stages.len() {
            wf.stages[i].finish(StageOutcome::approved("ok"), now);
            wf.move_to_next_stage(now);
        }
        assert!(wf.is_finished());
        assert_eq!(wf.status, WorkflowStatus::Completed);
        assert!(wf.completed_at.is_some());
    }
}
