//! Payment handlers

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use core_kernel::{ClaimId, Context, CustomerId, PageRequest, PaymentId, PolicyId};
use domain_billing::{Payment, PaymentFilter, PaymentRequest, PaymentStatus};

use super::created;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, Paginated};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub user_id: Option<CustomerId>,
    pub policy_id: Option<PolicyId>,
    pub claim_id: Option<ClaimId>,
    pub status: Option<PaymentStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PaymentQuery {
    fn split(self) -> (PaymentFilter, PageRequest) {
        let filter = PaymentFilter {
            user_id: self.user_id,
            policy_id: self.policy_id,
            claim_id: self.claim_id,
            status: self.status,
        };
        (filter, PageRequest::new(self.page, self.per_page))
    }
}

/// Charges the customer through the payment gateway
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(request): ApiJson<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    Ok(created(state.payments.process_payment(&ctx, request).await?))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    OriginalUri(uri): OriginalUri,
    ApiQuery(query): ApiQuery<PaymentQuery>,
) -> Result<Paginated<Payment>, ApiError> {
    let (filter, page) = query.split();
    let payments = state.payments.list(&ctx, &filter, page).await?;
    Ok(Paginated::new(payments, &uri))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<PaymentId>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(state.payments.get(&ctx, id).await?))
}
