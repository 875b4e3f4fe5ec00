//! Pricing, risk and underwriting calculators
//!
//! These routes evaluate requests without persisting anything.

use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use core_kernel::Context;
use domain_policy::{
    DecisionReview, PricingRequest, PricingResult, PricingScenario, RiskAssessmentRequest, RiskProfile,
    ScenarioComparison, UnderwritingDecision, UnderwritingRequest,
};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub base: PricingRequest,
    pub scenarios: Vec<PricingScenario>,
}

pub async fn calculate_premium(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(request): ApiJson<PricingRequest>,
) -> Result<Json<PricingResult>, ApiError> {
    Ok(Json(state.pricing.calculate_premium(&ctx, &request).await?))
}

pub async fn compare_scenarios(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(request): ApiJson<CompareRequest>,
) -> Result<Json<ScenarioComparison>, ApiError> {
    if request.scenarios.is_empty() {
        return Err(ApiError::bad_request("at least one scenario is required"));
    }
    let comparison = state
        .pricing
        .compare_scenarios(&ctx, &request.base, &request.scenarios)
        .await?;
    Ok(Json(comparison))
}

pub async fn assess_risk(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(request): ApiJson<RiskAssessmentRequest>,
) -> Result<Json<RiskProfile>, ApiError> {
    Ok(Json(state.risk.assess_risk(&ctx, &request).await?))
}

pub async fn evaluate(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(request): ApiJson<UnderwritingRequest>,
) -> Result<Json<UnderwritingDecision>, ApiError> {
    Ok(Json(state.underwriting.evaluate(&ctx, &request).await?))
}

/// Applies a manual review to an earlier decision
pub async fn review(
    State(state): State<AppState>,
    ApiJson(review): ApiJson<DecisionReview>,
) -> Result<Json<UnderwritingDecision>, ApiError> {
    Ok(Json(state.underwriting.review(review)?))
}
