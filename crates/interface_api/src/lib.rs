//! HTTP API Layer
//!
//! REST surface of the insurance marketplace, built on Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one module per resource, plus the pricing, risk and
//!   underwriting calculators and the rules admin routes
//! - **Middleware**: request context (deadline and cancellation), audit logging
//! - **Extractors**: JSON, path and query extraction that reject with [`ApiError`]
//! - **Error Handling**: domain error kinds mapped to status codes
//!
//! Services are assembled from a [`Repositories`] bundle, so the same router
//! runs against PostgreSQL in production and in-memory adapters in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState, Infrastructure, Repositories};
//!
//! let state = AppState::new(repositories, infrastructure, config.request_timeout());
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use core_kernel::{EventPublisher, HealthCheckable, JobDispatcher};
use domain_billing::{PaymentGateway, PaymentRepository, PaymentService};
use domain_claims::{
    ClaimRepository, ClaimService, ClaimWorkflowService, FraudDetectionService, WorkflowRepository,
};
use domain_party::{CustomerRepository, CustomerService};
use domain_policy::{
    PolicyLifecycleService, PolicyRepository, PolicyService, PricingEngine, ProductRepository, ProductService,
    QuoteRepository, QuoteService, RiskAssessmentService, UnderwritingService,
};
use domain_rules::RulesManager;

use crate::handlers::{claims, customers, health, payments, policies, products, quotes, rules, underwriting};
use crate::middleware::{audit_middleware, request_context};

pub use crate::config::ApiConfig;
pub use crate::error::ApiError;

/// Persistence adapters behind every service
#[derive(Clone)]
pub struct Repositories {
    pub customers: Arc<dyn CustomerRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub policies: Arc<dyn PolicyRepository>,
    pub claims: Arc<dyn ClaimRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub payments: Arc<dyn PaymentRepository>,
}

/// Messaging, payment and configuration collaborators
#[derive(Clone)]
pub struct Infrastructure {
    pub publisher: Arc<dyn EventPublisher>,
    pub dispatcher: Arc<dyn JobDispatcher>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub rules: Arc<RulesManager>,
    /// Extra components reported by `/healthz`, such as the event bus
    pub probes: Vec<Arc<dyn HealthCheckable>>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub customers: Arc<CustomerService>,
    pub products: Arc<ProductService>,
    pub quotes: Arc<QuoteService>,
    pub policies: Arc<PolicyService>,
    pub claims: Arc<ClaimService>,
    pub payments: Arc<PaymentService>,
    pub pricing: Arc<PricingEngine>,
    pub risk: Arc<RiskAssessmentService>,
    pub underwriting: Arc<UnderwritingService>,
    pub fraud: Arc<FraudDetectionService>,
    pub workflows: Arc<ClaimWorkflowService>,
    pub lifecycle: Arc<PolicyLifecycleService>,
    pub rules: Arc<RulesManager>,
    pub repositories: Repositories,
    pub probes: Arc<Vec<Arc<dyn HealthCheckable>>>,
    pub request_timeout: Duration,
}

impl AppState {
    /// Wires every service over the given adapters
    pub fn new(repos: Repositories, infra: Infrastructure, request_timeout: Duration) -> Self {
        let Infrastructure {
            publisher,
            dispatcher,
            gateway,
            rules,
            probes,
        } = infra;

        let payments = Arc::new(PaymentService::new(repos.payments.clone(), gateway, publisher.clone()));
        let pricing = Arc::new(PricingEngine::new(
            repos.products.clone(),
            repos.customers.clone(),
            rules.clone(),
        ));
        let risk = Arc::new(RiskAssessmentService::new(
            repos.customers.clone(),
            repos.products.clone(),
            repos.policies.clone(),
            rules.clone(),
        ));
        let underwriting = Arc::new(UnderwritingService::new(risk.clone(), pricing.clone(), rules.clone()));
        let fraud = Arc::new(FraudDetectionService::new(
            repos.claims.clone(),
            repos.policies.clone(),
            repos.customers.clone(),
            publisher.clone(),
            rules.clone(),
        ));
        let workflows = Arc::new(ClaimWorkflowService::new(
            repos.claims.clone(),
            repos.policies.clone(),
            repos.workflows.clone(),
            fraud.clone(),
            payments.clone(),
            dispatcher.clone(),
            publisher.clone(),
            rules.clone(),
        ));
        let lifecycle = Arc::new(PolicyLifecycleService::new(
            repos.policies.clone(),
            payments.clone(),
            publisher.clone(),
            dispatcher,
            rules.clone(),
        ));

        Self {
            customers: Arc::new(CustomerService::new(repos.customers.clone(), publisher.clone())),
            products: Arc::new(ProductService::new(repos.products.clone())),
            quotes: Arc::new(QuoteService::new(
                repos.quotes.clone(),
                repos.products.clone(),
                pricing.clone(),
                publisher.clone(),
            )),
            policies: Arc::new(PolicyService::new(
                repos.policies.clone(),
                repos.products.clone(),
                repos.quotes.clone(),
                publisher.clone(),
            )),
            claims: Arc::new(ClaimService::new(repos.claims.clone(), repos.policies.clone(), publisher)),
            payments,
            pricing,
            risk,
            underwriting,
            fraud,
            workflows,
            lifecycle,
            rules,
            repositories: repos,
            probes: Arc::new(probes),
            request_timeout,
        }
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    let customer_routes = Router::new()
        .route("/", get(customers::list_customers).post(customers::create_customer))
        .route(
            "/:id",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        );

    let product_routes = Router::new()
        .route("/", get(products::list_products).post(products::create_product))
        .route(
            "/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        );

    let quote_routes = Router::new()
        .route("/", get(quotes::list_quotes).post(quotes::create_quote))
        .route("/number/:number", get(quotes::get_quote_by_number))
        .route(
            "/:id",
            get(quotes::get_quote).put(quotes::update_quote).delete(quotes::delete_quote),
        )
        .route("/:id/expire", post(quotes::expire_quote));

    let policy_routes = Router::new()
        .route("/", get(policies::list_policies).post(policies::create_policy))
        .route("/number/:number", get(policies::get_policy_by_number))
        .route("/renewals/upcoming", get(policies::upcoming_renewals))
        .route(
            "/:id",
            get(policies::get_policy)
                .put(policies::update_policy)
                .delete(policies::delete_policy),
        )
        .route("/:id/renew", post(policies::renew_policy))
        .route("/:id/cancel", post(policies::cancel_policy));

    let claim_routes = Router::new()
        .route("/", get(claims::list_claims).post(claims::create_claim))
        .route("/number/:number", get(claims::get_claim_by_number))
        .route(
            "/:id",
            get(claims::get_claim).put(claims::update_claim).delete(claims::delete_claim),
        )
        .route("/:id/fraud-analysis", post(claims::analyze_fraud))
        .route("/:id/process", post(claims::process_claim))
        .route("/:id/workflow", get(claims::get_workflow))
        .route("/:id/workflow/stages/:stage_id", put(claims::update_workflow_stage));

    let payment_routes = Router::new()
        .route("/", get(payments::list_payments).post(payments::create_payment))
        .route("/:id", get(payments::get_payment));

    let rules_routes = Router::new()
        .route("/", get(rules::get_rules).put(rules::replace_rules))
        .route("/version", get(rules::get_version))
        .route("/reload", post(rules::reload_rules))
        .route("/:section", get(rules::get_section).put(rules::replace_section));

    let api_routes = Router::new()
        .nest("/customers", customer_routes)
        .nest("/products", product_routes)
        .nest("/quotes", quote_routes)
        .nest("/policies", policy_routes)
        .nest("/claims", claim_routes)
        .nest("/payments", payment_routes)
        .nest("/rules", rules_routes)
        .route("/pricing/calculate", post(underwriting::calculate_premium))
        .route("/pricing/compare", post(underwriting::compare_scenarios))
        .route("/risk/assess", post(underwriting::assess_risk))
        .route("/underwriting/evaluate", post(underwriting::evaluate))
        .route("/underwriting/review", post(underwriting::review));

    Router::new()
        .route("/healthz", get(health::health_check))
        .nest("/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(axum_middleware::from_fn(audit_middleware))
                .layer(axum_middleware::from_fn_with_state(state.clone(), request_context)),
        )
        .with_state(state)
}
