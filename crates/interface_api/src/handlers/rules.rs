//! Business rules administration

use axum::{extract::State, Extension, Json};
use serde_json::Value;

use core_kernel::Context;
use domain_rules::{BusinessRules, RulesMetadata, RulesSection};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::AppState;

pub async fn get_rules(State(state): State<AppState>) -> Json<BusinessRules> {
    Json(BusinessRules::clone(&state.rules.get_config()))
}

/// Replaces the whole snapshot; an invalid document leaves the current one in place
pub async fn replace_rules(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiJson(rules): ApiJson<BusinessRules>,
) -> Result<Json<BusinessRules>, ApiError> {
    let snapshot = state.rules.update_config(&ctx, rules).await?;
    Ok(Json(BusinessRules::clone(&snapshot)))
}

pub async fn get_version(State(state): State<AppState>) -> Json<RulesMetadata> {
    Json(state.rules.get_metadata())
}

/// Re-reads the rules file
pub async fn reload_rules(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
) -> Result<Json<RulesMetadata>, ApiError> {
    state.rules.load_config(&ctx).await?;
    Ok(Json(state.rules.get_metadata()))
}

pub async fn get_section(
    State(state): State<AppState>,
    ApiPath(section): ApiPath<String>,
) -> Result<Json<Value>, ApiError> {
    let section: RulesSection = section.parse()?;
    Ok(Json(state.rules.get_section(section)?))
}

pub async fn replace_section(
    State(state): State<AppState>,
    Extension(ctx): Extension<Context>,
    ApiPath(section): ApiPath<String>,
    ApiJson(value): ApiJson<Value>,
) -> Result<Json<Value>, ApiError> {
    let section: RulesSection = section.parse()?;
    state.rules.update_section(&ctx, section, value).await?;
    Ok(Json(state.rules.get_section(section)?))
}
