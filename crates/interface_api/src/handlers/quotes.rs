//! Quote handlers

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use core_kernel::{Context, Currency, CustomerId, PageRequest, ProductId, QuoteId};
use domain_policy::{PricingRequest, Quote, QuoteFilter, QuoteStatus, QuoteUpdate};

use super::created;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, Paginated};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct QuoteQuery {
    pub user_id: Option<CustomerId>,
    pub product_id: Option<ProductId>,
    pub status: Option<QuoteStatus>,
    pub currency: Option<Currency>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl QuoteQuery {
    fn split(self) -> (QuoteFilter, PageRequest) {
        let filter = QuoteFilter {
            user_id: self.user_id,
            product_id: self.product_id,
            status: self.status,
            currency: self.currency,
        };
        (filter, PageRequest::new(self.page, self.per_page))
    }
}

/// Prices the request and stores the result as a quote
pub async fn create_quote(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(request): ApiJson<PricingRequest>,
) -> Result<(StatusCode, Json<Quote>), ApiError> {
    Ok(created(state.quotes.create(&ctx, request).await?))
}

pub async fn list_quotes(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    OriginalUri(uri): OriginalUri,
    ApiQuery(query): ApiQuery<QuoteQuery>,
) -> Result<Paginated<Quote>, ApiError> {
    let (filter, page) = query.split();
    let quotes = state.quotes.list(&ctx, &filter, page).await?;
    Ok(Paginated::new(quotes, &uri))
}

pub async fn get_quote(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<QuoteId>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(state.quotes.get(&ctx, id).await?))
}

pub async fn get_quote_by_number(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(number): ApiPath<String>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(state.quotes.get_by_number(&ctx, &number).await?))
}

pub async fn update_quote(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<QuoteId>,
    ApiJson(update): ApiJson<QuoteUpdate>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(state.quotes.update(&ctx, id, update).await?))
}

pub async fn expire_quote(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<QuoteId>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(state.quotes.expire(&ctx, id).await?))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<QuoteId>,
) -> Result<StatusCode, ApiError> {
    state.quotes.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
