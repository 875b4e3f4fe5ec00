//! Custom Test Assertions
//!
//! Assertion helpers for domain types that give more meaningful failure
//! messages than bare `assert!`s.

use std::fmt::Debug;

use rust_decimal::Decimal;

use core_kernel::events::mock::RecordingPublisher;
use core_kernel::jobs::mock::{RecordedJob, RecordingDispatcher};
use core_kernel::{CoreError, DomainEvent, ErrorKind, PortError};
use domain_billing::BillingError;
use domain_claims::{ClaimError, StageId, StageStatus, Workflow};
use domain_party::PartyError;
use domain_policy::PolicyError;
use domain_rules::RulesError;

/// Errors that classify themselves with an [`ErrorKind`]
pub trait Classified {
    fn error_kind(&self) -> ErrorKind;
}

macro_rules! classified {
    ($($error:ty),* $(,)?) => {
        $(
            impl Classified for $error {
                fn error_kind(&self) -> ErrorKind {
                    self.kind()
                }
            }
        )*
    };
}

classified!(CoreError, PortError, PartyError, BillingError, PolicyError, ClaimError, RulesError);

/// Asserts that `result` failed with an error of `expected` kind
pub fn assert_error_kind<T: Debug, E: Classified + Debug>(result: Result<T, E>, expected: ErrorKind) -> E {
    match result {
        Ok(value) => panic!("expected a {expected:?} error, got Ok({value:?})"),
        Err(e) => {
            assert_eq!(e.error_kind(), expected, "unexpected error kind for {e:?}");
            e
        }
    }
}

/// Asserts that two amounts differ by at most `tolerance`
pub fn assert_decimal_approx_eq(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "amounts differ by more than tolerance: actual={actual}, expected={expected}, diff={diff}, tolerance={tolerance}"
    );
}

/// Asserts exactly `count` events of `event_type` were published and returns them
pub async fn assert_events_published(publisher: &RecordingPublisher, event_type: &str, count: usize) -> Vec<DomainEvent> {
    let events = publisher.events_of_type(event_type).await;
    assert_eq!(
        events.len(),
        count,
        "expected {count} '{event_type}' events, got {}",
        events.len()
    );
    events
}

/// Asserts exactly `count` jobs of `job_type` were submitted and returns them
pub async fn assert_jobs_dispatched(dispatcher: &RecordingDispatcher, job_type: &str, count: usize) -> Vec<RecordedJob> {
    let jobs = dispatcher.jobs_of_type(job_type).await;
    assert_eq!(jobs.len(), count, "expected {count} '{job_type}' jobs, got {}", jobs.len());
    jobs
}

/// Asserts the status of one stage of a workflow
pub fn assert_stage_status(workflow: &Workflow, stage_id: StageId, expected: StageStatus) {
    let stage = workflow
        .stage(stage_id)
        .unwrap_or_else(|| panic!("workflow has no {stage_id} stage"));
    assert_eq!(
        stage.status, expected,
        "stage {stage_id} is {} (decision: {:?})",
        stage.status, stage.decision
    );
}

/// Asserts the workflow's stages appear in exactly this order
pub fn assert_stage_order(workflow: &Workflow, expected: &[StageId]) {
    let actual: Vec<StageId> = workflow.stages.iter().map(|s| s.stage_id).collect();
    assert_eq!(actual, expected, "unexpected stage layout");
}
