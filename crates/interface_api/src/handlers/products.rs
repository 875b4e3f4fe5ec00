//! Product catalogue handlers

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use core_kernel::{Context, Currency, PageRequest, PartnerId, ProductId};
use domain_policy::{NewProduct, Product, ProductFilter, ProductStatus, ProductUpdate};

use super::created;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, Paginated};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub partner_id: Option<PartnerId>,
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    pub currency: Option<Currency>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    fn split(self) -> (ProductFilter, PageRequest) {
        let filter = ProductFilter {
            partner_id: self.partner_id,
            category: self.category,
            status: self.status,
            currency: self.currency,
        };
        (filter, PageRequest::new(self.page, self.per_page))
    }
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(input): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    Ok(created(state.products.create(&ctx, input).await?))
}

pub async fn list_products(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    OriginalUri(uri): OriginalUri,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Paginated<Product>, ApiError> {
    let (filter, page) = query.split();
    let products = state.products.list(&ctx, &filter, page).await?;
    Ok(Paginated::new(products, &uri))
}

pub async fn get_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.products.get(&ctx, id).await?))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(update): ApiJson<ProductUpdate>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.products.update(&ctx, id, update).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode, ApiError> {
    state.products.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
