//! Health check handler

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use core_kernel::{AdapterHealth, HealthCheckResult, HealthCheckable};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: AdapterHealth,
    /// Unix seconds
    pub timestamp: i64,
    pub version: String,
    pub services: BTreeMap<String, AdapterHealth>,
}

/// Probes every repository and infrastructure component concurrently
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let repos = &state.repositories;
    let mut names: Vec<String> = ["customers", "products", "quotes", "policies", "claims", "workflows", "payments"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut checks = vec![
        repos.customers.health_check(),
        repos.products.health_check(),
        repos.quotes.health_check(),
        repos.policies.health_check(),
        repos.claims.health_check(),
        repos.workflows.health_check(),
        repos.payments.health_check(),
    ];
    for probe in state.probes.iter() {
        checks.push(probe.health_check());
    }

    let results = join_all(checks).await;
    for result in results.iter().skip(names.len()) {
        names.push(result.adapter_id.clone());
    }
    for result in results.iter().filter(|r| r.status != AdapterHealth::Healthy) {
        warn!(adapter = %result.adapter_id, status = %result.status.as_str(), message = ?result.message, "Health check failed");
    }

    Json(HealthResponse {
        status: overall(&results),
        timestamp: Utc::now().timestamp(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: names.into_iter().zip(results.into_iter().map(|r| r.status)).collect(),
    })
}

/// `degraded` as soon as any component is not healthy
fn overall(components: &[HealthCheckResult]) -> AdapterHealth {
    if components.iter().all(|c| c.status == AdapterHealth::Healthy) {
        AdapterHealth::Healthy
    } else {
        AdapterHealth::Degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_component_degrades_overall() {
        let healthy = HealthCheckResult::healthy("a", 1);
        let unhealthy = HealthCheckResult::unhealthy("b", 1, "down");
        assert_eq!(overall(&[healthy.clone()]), AdapterHealth::Healthy);
        assert_eq!(overall(&[healthy, unhealthy]), AdapterHealth::Degraded);
        assert_eq!(overall(&[]), AdapterHealth::Healthy);
    }
}
