//! Policy handlers, including renewal and cancellation

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use core_kernel::{Context, Currency, CustomerId, PageRequest, PolicyId, ProductId};
use domain_policy::{
    CancellationResult, NewPolicy, Policy, PolicyFilter, PolicyStatus, PolicyUpdate, RenewalOptions, RenewalResult,
};

use super::created;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, Paginated};
use crate::AppState;

const DEFAULT_RENEWAL_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct PolicyQuery {
    pub user_id: Option<CustomerId>,
    pub product_id: Option<ProductId>,
    pub status: Option<PolicyStatus>,
    pub currency: Option<Currency>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PolicyQuery {
    fn split(self) -> (PolicyFilter, PageRequest) {
        let filter = PolicyFilter {
            user_id: self.user_id,
            product_id: self.product_id,
            status: self.status,
            currency: self.currency,
        };
        (filter, PageRequest::new(self.page, self.per_page))
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
    #[serde(default)]
    pub cancellation_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

pub async fn create_policy(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(input): ApiJson<NewPolicy>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    Ok(created(state.policies.create(&ctx, input).await?))
}

pub async fn list_policies(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    OriginalUri(uri): OriginalUri,
    ApiQuery(query): ApiQuery<PolicyQuery>,
) -> Result<Paginated<Policy>, ApiError> {
    let (filter, page) = query.split();
    let policies = state.policies.list(&ctx, &filter, page).await?;
    Ok(Paginated::new(policies, &uri))
}

pub async fn get_policy(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<PolicyId>,
) -> Result<Json<Policy>, ApiError> {
    Ok(Json(state.policies.get(&ctx, id).await?))
}

pub async fn get_policy_by_number(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(number): ApiPath<String>,
) -> Result<Json<Policy>, ApiError> {
    Ok(Json(state.policies.get_by_number(&ctx, &number).await?))
}

pub async fn update_policy(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<PolicyId>,
    ApiJson(update): ApiJson<PolicyUpdate>,
) -> Result<Json<Policy>, ApiError> {
    Ok(Json(state.policies.update(&ctx, id, update).await?))
}

pub async fn delete_policy(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<PolicyId>,
) -> Result<StatusCode, ApiError> {
    state.policies.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Renews an active or expired policy; an empty object renews on the same terms
pub async fn renew_policy(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<PolicyId>,
    ApiJson(options): ApiJson<RenewalOptions>,
) -> Result<(StatusCode, Json<RenewalResult>), ApiError> {
    Ok(created(state.lifecycle.renew_policy(&ctx, id, options).await?))
}

pub async fn cancel_policy(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<PolicyId>,
    ApiJson(request): ApiJson<CancelRequest>,
) -> Result<Json<CancellationResult>, ApiError> {
    if request.reason.trim().is_empty() {
        return Err(ApiError::bad_request("reason is required"));
    }
    let result = state
        .lifecycle
        .cancel_policy(&ctx, id, &request.reason, request.cancellation_date)
        .await?;
    Ok(Json(result))
}

/// Active policies expiring within `days` (default 30)
pub async fn upcoming_renewals(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiQuery(query): ApiQuery<UpcomingQuery>,
) -> Result<Json<Vec<Policy>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_RENEWAL_WINDOW_DAYS);
    if days <= 0 {
        return Err(ApiError::bad_request("days must be positive"));
    }
    Ok(Json(state.lifecycle.get_upcoming_renewals(&ctx, days).await?))
}
