//! Claim handlers, including fraud analysis and the processing workflow

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use core_kernel::{ClaimId, Context, Currency, CustomerId, PageRequest, PolicyId};
use domain_claims::{Claim, ClaimFilter, ClaimStatus, ClaimUpdate, FraudScore, NewClaim, StageId, StageOverride, Workflow};

use super::created;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, Paginated};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ClaimQuery {
    pub user_id: Option<CustomerId>,
    pub policy_id: Option<PolicyId>,
    pub status: Option<ClaimStatus>,
    pub currency: Option<Currency>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ClaimQuery {
    fn split(self) -> (ClaimFilter, PageRequest) {
        let filter = ClaimFilter {
            user_id: self.user_id,
            policy_id: self.policy_id,
            status: self.status,
            currency: self.currency,
        };
        (filter, PageRequest::new(self.page, self.per_page))
    }
}

pub async fn create_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(input): ApiJson<NewClaim>,
) -> Result<(StatusCode, Json<Claim>), ApiError> {
    Ok(created(state.claims.create(&ctx, input).await?))
}

pub async fn list_claims(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    OriginalUri(uri): OriginalUri,
    ApiQuery(query): ApiQuery<ClaimQuery>,
) -> Result<Paginated<Claim>, ApiError> {
    let (filter, page) = query.split();
    let claims = state.claims.list(&ctx, &filter, page).await?;
    Ok(Paginated::new(claims, &uri))
}

pub async fn get_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<ClaimId>,
) -> Result<Json<Claim>, ApiError> {
    Ok(Json(state.claims.get(&ctx, id).await?))
}

pub async fn get_claim_by_number(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(number): ApiPath<String>,
) -> Result<Json<Claim>, ApiError> {
    Ok(Json(state.claims.get_by_number(&ctx, &number).await?))
}

pub async fn update_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<ClaimId>,
    ApiJson(update): ApiJson<ClaimUpdate>,
) -> Result<Json<Claim>, ApiError> {
    Ok(Json(state.claims.update(&ctx, id, update).await?))
}

pub async fn delete_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<ClaimId>,
) -> Result<StatusCode, ApiError> {
    state.claims.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn analyze_fraud(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<ClaimId>,
) -> Result<Json<FraudScore>, ApiError> {
    Ok(Json(state.fraud.analyze_claim(&ctx, id).await?))
}

/// Runs (or resumes) the claim's processing workflow
pub async fn process_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<ClaimId>,
) -> Result<Json<Workflow>, ApiError> {
    Ok(Json(state.workflows.process_claim(&ctx, id).await?))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<ClaimId>,
) -> Result<Json<Workflow>, ApiError> {
    Ok(Json(state.workflows.get_workflow_status(&ctx, id).await?))
}

/// Records a reviewer's decision for one evaluation stage
pub async fn update_workflow_stage(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath((id, stage)): ApiPath<(ClaimId, StageId)>,
    ApiJson(decision): ApiJson<StageOverride>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow = state.workflows.update_workflow_stage(&ctx, id, stage, decision).await?;
    Ok(Json(workflow))
}
