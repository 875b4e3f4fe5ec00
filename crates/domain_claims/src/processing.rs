//! Staged claim processing
//!
//! A claim runs through a fixed sequence of stages. Each stage handler
//! returns approved, declined or requires_review. A decline short-circuits
//! the remaining evaluation stages, but `approval_decision` still runs so
//! the claim ends up denied with the declining stage's reason. The
//! workflow is persisted after every stage.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use core_kernel::{
    ClaimId, Context, DomainEvent, ErrorKind, EventPayload, EventPublisher, JobDispatcher,
};
use domain_billing::PaymentService;
use domain_policy::{Policy, PolicyRepository};
use domain_rules::{BusinessRules, RulesManager};

use crate::claim::{Claim, ClaimStatus};
use crate::error::ClaimError;
use crate::fraud::FraudDetectionService;
use crate::payout::PayoutJob;
use crate::ports::{ClaimRepository, WorkflowRepository};
use crate::workflow::{StageId, StageOutcome, StageResult, StageStatus, Workflow};

/// A reviewer's decision for one stage
#[derive(Debug, Clone, Deserialize)]
pub struct StageOverride {
    pub result: StageResult,
    pub decision: String,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

enum StageStep {
    Done(StageOutcome),
    Skip(String),
}

pub struct ClaimWorkflowService {
    claims: Arc<dyn ClaimRepository>,
    policies: Arc<dyn PolicyRepository>,
    workflows: Arc<dyn WorkflowRepository>,
    fraud: Arc<FraudDetectionService>,
    payments: Arc<PaymentService>,
    dispatcher: Arc<dyn JobDispatcher>,
    publisher: Arc<dyn EventPublisher>,
    rules: Arc<RulesManager>,
}

impl ClaimWorkflowService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        claims: Arc<dyn ClaimRepository>,
        policies: Arc<dyn PolicyRepository>,
        workflows: Arc<dyn WorkflowRepository>,
        fraud: Arc<FraudDetectionService>,
        payments: Arc<PaymentService>,
        dispatcher: Arc<dyn JobDispatcher>,
        publisher: Arc<dyn EventPublisher>,
        rules: Arc<RulesManager>,
    ) -> Self {
        Self {
            claims,
            policies,
            workflows,
            fraud,
            payments,
            dispatcher,
            publisher,
            rules,
        }
    }

    /// Creates the workflow for a submitted claim and runs it to the end
    ///
    /// # Errors
    ///
    /// `Duplicate` when the claim already has a workflow, `Validation` when
    /// the claim is no longer `submitted`.
    #[instrument(skip(self, ctx), fields(claim_id = %claim_id))]
    pub async fn process_claim(&self, ctx: &Context, claim_id: ClaimId) -> Result<Workflow, ClaimError> {
        let claim = self.claims.get_by_id(ctx, claim_id).await?;
        match self.workflows.get_by_claim(ctx, claim_id).await {
            Ok(_) => {
                return Err(ClaimError::Duplicate(format!(
                    "claim {} already has a workflow",
                    claim.claim_number
                )))
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        if claim.status != ClaimStatus::Submitted {
            return Err(ClaimError::validation(format!(
                "claim {} is {}; only submitted claims can be processed",
                claim.claim_number, claim.status
            )));
        }

        let rules = self.rules.get_config();
        let workflow = Workflow::for_claim(&claim, &rules.claim_processing, Utc::now());
        let workflow = self.workflows.save(ctx, &workflow).await?;
        info!(workflow_id = %workflow.id, stages = workflow.stages.len(), "Claim workflow created");

        self.run(ctx, workflow, claim, &rules).await
    }

    /// Returns the stored workflow without running anything
    pub async fn get_workflow_status(&self, ctx: &Context, claim_id: ClaimId) -> Result<Workflow, ClaimError> {
        Ok(self.workflows.get_by_claim(ctx, claim_id).await?)
    }

    /// Applies a reviewer's decision to one evaluation stage and resumes
    ///
    /// Every later stage that was skipped or errored, plus the approval and
    /// payout stages, goes back to pending so the decision is re-derived.
    #[instrument(skip(self, ctx, decision), fields(claim_id = %claim_id, stage = %stage_id))]
    pub async fn update_workflow_stage(
        &self,
        ctx: &Context,
        claim_id: ClaimId,
        stage_id: StageId,
        decision: StageOverride,
    ) -> Result<Workflow, ClaimError> {
        if !stage_id.is_evaluation() {
            return Err(ClaimError::validation(format!(
                "stage {stage_id} is derived and cannot be overridden"
            )));
        }
        let mut workflow = self.workflows.get_by_claim(ctx, claim_id).await?;
        let claim = self.claims.get_by_id(ctx, claim_id).await?;
        if claim.status == ClaimStatus::Paid {
            return Err(ClaimError::validation(format!(
                "claim {} is already paid",
                claim.claim_number
            )));
        }
        let index = workflow.position(stage_id).ok_or_else(|| ClaimError::NotFound {
            entity: "WorkflowStage".to_string(),
            id: stage_id.to_string(),
        })?;

        let now = Utc::now();
        for stage in workflow.stages.iter_mut().skip(index + 1) {
            let errored = stage.status == StageStatus::Failed && stage.result.is_none();
            if !stage.stage_id.is_evaluation() || stage.status == StageStatus::Skipped || errored {
                stage.reset();
            }
        }

        let declined = decision.result == StageResult::Declined;
        let stage = &mut workflow.stages[index];
        stage.finish(
            StageOutcome {
                result: decision.result,
                decision: decision.decision,
                comments: decision.comments,
                auto: false,
            },
            now,
        );
        if decision.assigned_to.is_some() {
            stage.assigned_to = decision.assigned_to;
        }
        if declined {
            workflow.skip_remaining_evaluation(index, "Skipped after an earlier decline", now);
        }

        workflow.current_stage = index;
        workflow.completed_at = None;
        workflow.move_to_next_stage(now);
        let workflow = self.workflows.save(ctx, &workflow).await?;
        info!(status = %workflow.status, "Workflow stage overridden");

        let rules = self.rules.get_config();
        self.run(ctx, workflow, claim, &rules).await
    }

    async fn run(
        &self,
        ctx: &Context,
        mut workflow: Workflow,
        mut claim: Claim,
        rules: &BusinessRules,
    ) -> Result<Workflow, ClaimError> {
        let policy = match self.policies.get_by_id(ctx, claim.policy_id).await {
            Ok(policy) => Some(policy),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let mut last_stage = workflow.current().map(|s| s.stage_id);

        while let Some(stage_id) = workflow.current().map(|s| s.stage_id) {
            ctx.check()?;
            let index = workflow.current_stage;
            last_stage = Some(stage_id);
            let now = Utc::now();
            workflow.stages[index].status = StageStatus::InProgress;
            workflow.stages[index].started_at = Some(now);

            let step = self
                .execute_stage(ctx, stage_id, &workflow, &mut claim, policy.as_ref(), rules)
                .await;
            let now = Utc::now();
            match step {
                Ok(StageStep::Done(outcome)) => {
                    let declined = outcome.result == StageResult::Declined;
                    info!(stage = %stage_id, result = %outcome.result, decision = %outcome.decision, "Stage finished");
                    workflow.stages[index].finish(outcome, now);
                    if declined {
                        workflow.skip_remaining_evaluation(index, "Skipped after an earlier decline", now);
                    }
                    workflow.move_to_next_stage(now);
                }
                Ok(StageStep::Skip(reason)) => {
                    info!(stage = %stage_id, reason = %reason, "Stage skipped");
                    workflow.stages[index].skip(&reason, now);
                    workflow.move_to_next_stage(now);
                }
                Err(e) if e.kind() == ErrorKind::Cancelled => return Err(e),
                Err(e) => {
                    warn!(stage = %stage_id, error = %e, "Stage failed");
                    workflow.stages[index].fail(&e, now);
                    workflow.abort(now);
                }
            }
            workflow = self.workflows.save(ctx, &workflow).await?;
        }

        info!(workflow_id = %workflow.id, status = %workflow.status, "Claim workflow finished");
        let event = DomainEvent::new(
            claim.id,
            EventPayload::ClaimWorkflowCompleted {
                claim_id: claim.id,
                workflow_id: workflow.id,
                status: workflow.status.to_string(),
                final_stage: last_stage.map(|s| s.to_string()).unwrap_or_default(),
            },
        );
        if let Err(e) = self.publisher.publish(ctx, event).await {
            warn!(error = %e, "Failed to publish claim.workflow_completed");
        }
        Ok(workflow)
    }

    async fn execute_stage(
        &self,
        ctx: &Context,
        stage_id: StageId,
        workflow: &Workflow,
        claim: &mut Claim,
        policy: Option<&Policy>,
        rules: &BusinessRules,
    ) -> Result<StageStep, ClaimError> {
        let processing = &rules.claim_processing;
        let outcome = match stage_id {
            StageId::InitialReview => initial_review(claim, policy),
            StageId::FraudDetection => return self.fraud_detection(ctx, claim, rules).await,
            StageId::PolicyValidation => policy_validation(claim, policy),
            StageId::DamageAssessment => {
                if claim.claim_amount > processing.damage_review_threshold {
                    StageOutcome::requires_review(format!(
                        "Amount {} exceeds the damage review threshold {}",
                        claim.claim_amount, processing.damage_review_threshold
                    ))
                } else if claim.supporting_documents() >= processing.min_supporting_documents {
                    StageOutcome::approved("Damage documented")
                } else {
                    StageOutcome::requires_review(format!(
                        "At least {} supporting documents are required",
                        processing.min_supporting_documents
                    ))
                }
            }
            StageId::SeniorReview => {
                let mut outcome = StageOutcome::requires_review("Awaiting senior adjuster review");
                outcome.comments = Some("Assigned to senior_adjuster".to_string());
                outcome
            }
            StageId::ExecutiveApproval => {
                let mut outcome = StageOutcome::requires_review("Awaiting executive approval");
                outcome.comments = Some("Assigned to claims_executive".to_string());
                outcome
            }
            StageId::ApprovalDecision => self.approval_decision(ctx, workflow, claim).await?,
            StageId::PayoutProcessing => return self.payout_processing(ctx, claim).await,
        };
        Ok(StageStep::Done(outcome))
    }

    async fn fraud_detection(&self, ctx: &Context, claim: &Claim, rules: &BusinessRules) -> Result<StageStep, ClaimError> {
        let score = match self.fraud.analyze(ctx, claim).await {
            Ok(score) => score,
            Err(ClaimError::FraudDetectionDisabled) => {
                return Ok(StageStep::Skip("Fraud detection is disabled".to_string()))
            }
            Err(e) => return Err(e),
        };
        let processing = &rules.claim_processing;
        let summary = format!("Fraud score {:.2} ({})", score.score, score.risk_level);
        let outcome = if score.score >= processing.fraud_decline_score {
            StageOutcome::declined(format!("{summary} is above the decline score"))
        } else if score.score >= processing.fraud_review_score || score.requires_review {
            StageOutcome::requires_review(format!("{summary} needs manual review"))
        } else {
            StageOutcome::approved(summary)
        };
        Ok(StageStep::Done(outcome.with_comments(score.recommendations.join("; "))))
    }

    async fn approval_decision(
        &self,
        ctx: &Context,
        workflow: &Workflow,
        claim: &mut Claim,
    ) -> Result<StageOutcome, ClaimError> {
        let declined = workflow
            .evaluation_results()
            .find(|(_, result)| *result == StageResult::Declined)
            .map(|(stage, _)| stage.decision.clone());
        let review = workflow
            .evaluation_results()
            .any(|(_, result)| result == StageResult::RequiresReview);

        let (target, reason, outcome) = match (declined, review) {
            (Some(reason), _) => (
                ClaimStatus::Denied,
                Some(reason.clone()),
                StageOutcome::declined(format!("Claim denied: {reason}")),
            ),
            (None, true) => (
                ClaimStatus::UnderReview,
                None,
                StageOutcome::requires_review("Claim held for manual review"),
            ),
            (None, false) => (ClaimStatus::Approved, None, StageOutcome::approved("Claim approved")),
        };

        let from = claim.status;
        if from != target || claim.denial_reason != reason {
            claim.decide(target, reason.clone(), Utc::now())?;
            *claim = self.claims.update(ctx, claim).await?;
            info!(from = %from, to = %target, "Claim status decided");
            let event = DomainEvent::new(
                claim.id,
                EventPayload::ClaimStatusChanged {
                    claim_id: claim.id,
                    from: from.to_string(),
                    to: target.to_string(),
                    reason,
                },
            );
            if let Err(e) = self.publisher.publish(ctx, event).await {
                warn!(error = %e, "Failed to publish claim.status_changed");
            }
        }
        Ok(outcome)
    }

    async fn payout_processing(&self, ctx: &Context, claim: &Claim) -> Result<StageStep, ClaimError> {
        if claim.status != ClaimStatus::Approved {
            return Ok(StageStep::Skip(format!("Claim is {}; no payout", claim.status)));
        }
        let job = PayoutJob::new(
            claim.id,
            self.claims.clone(),
            self.payments.clone(),
            self.publisher.clone(),
        );
        let job_id = self.dispatcher.perform(ctx, Arc::new(job)).await?;
        Ok(StageStep::Done(StageOutcome::approved(format!("Payout job {job_id} queued"))))
    }
}

fn initial_review(claim: &Claim, policy: Option<&Policy>) -> StageOutcome {
    if claim.title.trim().is_empty() || claim.description.trim().is_empty() {
        return StageOutcome::declined("Claim is missing a title or description");
    }
    if claim.claim_amount <= rust_decimal::Decimal::ZERO {
        return StageOutcome::declined("Claim amount must be positive");
    }
    let Some(policy) = policy else {
        return StageOutcome::declined("Policy not found");
    };
    if !policy.covers(claim.incident_date) {
        return StageOutcome::declined(format!(
            "Incident date {} is outside the policy period",
            claim.incident_date.date_naive()
        ));
    }
    StageOutcome::approved("Initial review passed")
}

fn policy_validation(claim: &Claim, policy: Option<&Policy>) -> StageOutcome {
    let Some(policy) = policy else {
        return StageOutcome::declined("Policy not found");
    };
    if !policy.is_active() {
        return StageOutcome::declined(format!("Policy {} is {}", policy.policy_number, policy.status));
    }
    if policy.user_id != claim.user_id {
        return StageOutcome::declined("Claimant is not the policyholder");
    }
    if claim.claim_amount > policy.coverage_amount {
        return StageOutcome::declined(format!(
            "Claim amount {} exceeds coverage {}",
            claim.claim_amount, policy.coverage_amount
        ));
    }
    StageOutcome::approved("Policy in force and covers the amount")
}
