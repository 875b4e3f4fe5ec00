//! Customer handlers

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use core_kernel::{Context, CustomerId, PageRequest};
use domain_party::{Customer, CustomerFilter, CustomerStatus, CustomerTier, CustomerUpdate, KycStatus, NewCustomer};

use super::created;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, Paginated};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub email: Option<String>,
    pub status: Option<CustomerStatus>,
    pub kyc_status: Option<KycStatus>,
    pub customer_tier: Option<CustomerTier>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl CustomerQuery {
    fn split(self) -> (CustomerFilter, PageRequest) {
        let filter = CustomerFilter {
            email: self.email,
            status: self.status,
            kyc_status: self.kyc_status,
            customer_tier: self.customer_tier,
        };
        (filter, PageRequest::new(self.page, self.per_page))
    }
}

pub async fn create_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(input): ApiJson<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state.customers.register(&ctx, input).await?;
    Ok(created(customer))
}

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    OriginalUri(uri): OriginalUri,
    ApiQuery(query): ApiQuery<CustomerQuery>,
) -> Result<Paginated<Customer>, ApiError> {
    let (filter, page) = query.split();
    let customers = state.customers.list(&ctx, &filter, page).await?;
    Ok(Paginated::new(customers, &uri))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<CustomerId>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.customers.get(&ctx, id).await?))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<CustomerId>,
    ApiJson(update): ApiJson<CustomerUpdate>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.customers.update(&ctx, id, update).await?))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<CustomerId>,
) -> Result<StatusCode, ApiError> {
    state.customers.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
