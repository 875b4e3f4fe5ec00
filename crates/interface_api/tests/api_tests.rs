//! HTTP tests against the full router over in-memory adapters

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};

use core_kernel::events::event_types;
use domain_billing::SimulatedGateway;
use interface_api::{create_router, AppState, Infrastructure, Repositories};
use test_utils::{CustomerBuilder, PolicyBuilder, ServiceHarness, GATEWAY_LIMIT};

struct Harness {
    server: TestServer,
    /// Shares its repositories and recorders with the router
    seed: ServiceHarness,
}

fn harness() -> Harness {
    let seed = ServiceHarness::new();
    let repositories = Repositories {
        customers: seed.customer_repo.clone(),
        products: seed.product_repo.clone(),
        quotes: seed.quote_repo.clone(),
        policies: seed.policy_repo.clone(),
        claims: seed.claim_repo.clone(),
        workflows: seed.workflow_repo.clone(),
        payments: seed.payment_repo.clone(),
    };
    let infrastructure = Infrastructure {
        publisher: seed.publisher.clone(),
        dispatcher: seed.dispatcher.clone(),
        gateway: Arc::new(SimulatedGateway::new(GATEWAY_LIMIT, Duration::from_millis(0))),
        rules: seed.rules.clone(),
        probes: vec![],
    };
    let state = AppState::new(repositories, infrastructure, Duration::from_secs(5));
    let server = TestServer::new(create_router(state)).unwrap();
    Harness { server, seed }
}

async fn create_customer(server: &TestServer, email: &str) -> Value {
    let response = server
        .post("/v1/customers")
        .json(&json!({
            "email": email,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "date_of_birth": "1985-04-12"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()
}

async fn create_product(server: &TestServer) -> Value {
    let response = server
        .post("/v1/products")
        .json(&json!({
            "partner_id": uuid::Uuid::new_v4(),
            "name": "Gadget Cover",
            "category": "Electronics",
            "base_price": "120.00",
            "coverage_amount": "5000.00",
            "coverage_period_days": 365,
            "currency": "USD"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()
}

async fn create_policy(server: &TestServer, customer: &Value, product: &Value) -> Value {
    let now = Utc::now();
    let response = server
        .post("/v1/policies")
        .json(&json!({
            "product_id": product["id"],
            "user_id": customer["id"],
            "premium": "240.00",
            "coverage_amount": "5000.00",
            "currency": "USD",
            "effective_date": now - ChronoDuration::days(30),
            "expiration_date": now + ChronoDuration::days(335)
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()
}

#[tokio::test]
async fn test_healthz_reports_every_repository() {
    let h = harness();
    let response = h.server.get("/healthz").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"].as_object().map(|m| m.len()), Some(7));
    assert_eq!(body["services"]["claims"], "healthy");
    assert!(body["timestamp"].as_i64().is_some());
}

#[tokio::test]
async fn test_customer_crud_and_events() {
    let h = harness();
    let customer = create_customer(&h.server, "ada@example.com").await;
    let id = customer["id"].as_str().unwrap().to_string();

    let fetched = h.server.get(&format!("/v1/customers/{id}")).await;
    assert_eq!(fetched.status_code(), StatusCode::OK);
    assert_eq!(fetched.json::<Value>()["email"], "ada@example.com");

    let updated = h
        .server
        .put(&format!("/v1/customers/{id}"))
        .json(&json!({"customer_tier": "gold"}))
        .await;
    assert_eq!(updated.status_code(), StatusCode::OK);
    assert_eq!(updated.json::<Value>()["customer_tier"], "gold");

    let deleted = h.server.delete(&format!("/v1/customers/{id}")).await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
    let gone = h.server.get(&format!("/v1/customers/{id}")).await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);

    let registered = h.seed.publisher.events_of_type(event_types::USER_REGISTERED).await;
    assert_eq!(registered.len(), 1);
}

#[tokio::test]
async fn test_duplicate_email_is_bad_request() {
    let h = harness();
    create_customer(&h.server, "dup@example.com").await;
    let response = h
        .server
        .post("/v1/customers")
        .json(&json!({"email": "DUP@example.com", "first_name": "A", "last_name": "B"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_malformed_json_uses_error_body() {
    let h = harness();
    let response = h.server.post("/v1/customers").json(&json!({"email": 42})).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_unknown_id_is_not_found_and_bad_uuid_is_bad_request() {
    let h = harness();
    let missing = h.server.get(&format!("/v1/policies/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

    let malformed = h.server.get("/v1/policies/not-a-uuid").await;
    assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_returns_array_with_link_header() {
    let h = harness();
    for i in 0..3 {
        create_customer(&h.server, &format!("user{i}@example.com")).await;
    }

    let response = h
        .server
        .get("/v1/customers")
        .add_query_param("page", 1)
        .add_query_param("per_page", 2)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>().as_array().map(Vec::len), Some(2));
    let link = response.headers().get("link").unwrap().to_str().unwrap().to_string();
    assert!(link.contains("page=2&per_page=2>; rel=\"next\""));
    assert!(link.contains("rel=\"first\""));

    let last = h
        .server
        .get("/v1/customers")
        .add_query_param("page", 2)
        .add_query_param("per_page", 2)
        .await;
    let link = last.headers().get("link").unwrap().to_str().unwrap().to_string();
    assert!(!link.contains("rel=\"next\""));
}

#[tokio::test]
async fn test_quote_then_policy_consumes_quote() {
    let h = harness();
    let customer = create_customer(&h.server, "quote@example.com").await;
    let product = create_product(&h.server).await;
    let now = Utc::now();

    let quote = h
        .server
        .post("/v1/quotes")
        .json(&json!({
            "product_id": product["id"],
            "user_id": customer["id"],
            "coverage_amount": "5000.00",
            "effective_date": now,
            "expiration_date": now + ChronoDuration::days(365)
        }))
        .await;
    assert_eq!(quote.status_code(), StatusCode::CREATED);
    let quote = quote.json::<Value>();
    assert_eq!(quote["status"], "pending");

    let number = quote["quote_number"].as_str().unwrap();
    let by_number = h.server.get(&format!("/v1/quotes/number/{number}")).await;
    assert_eq!(by_number.json::<Value>()["id"], quote["id"]);

    let policy = h
        .server
        .post("/v1/policies")
        .json(&json!({
            "product_id": product["id"],
            "user_id": customer["id"],
            "quote_id": quote["id"],
            "premium": quote["final_price"],
            "coverage_amount": "5000.00",
            "effective_date": now,
            "expiration_date": now + ChronoDuration::days(365)
        }))
        .await;
    assert_eq!(policy.status_code(), StatusCode::CREATED);

    let used = h.server.get(&format!("/v1/quotes/{}", quote["id"].as_str().unwrap())).await;
    assert_eq!(used.json::<Value>()["status"], "used");
}

#[tokio::test]
async fn test_cancel_policy_refunds_and_rejects_second_cancel() {
    let h = harness();
    let customer = create_customer(&h.server, "cancel@example.com").await;
    let product = create_product(&h.server).await;
    let policy = create_policy(&h.server, &customer, &product).await;
    let id = policy["id"].as_str().unwrap();

    let cancelled = h
        .server
        .post(&format!("/v1/policies/{id}/cancel"))
        .json(&json!({"reason": "moved abroad"}))
        .await;
    assert_eq!(cancelled.status_code(), StatusCode::OK);
    let result = cancelled.json::<Value>();
    assert_eq!(result["status"], "cancelled");
    assert!(result["refund_payment_id"].is_string());

    let again = h
        .server
        .post(&format!("/v1/policies/{id}/cancel"))
        .json(&json!({"reason": "again"}))
        .await;
    assert_eq!(again.status_code(), StatusCode::BAD_REQUEST);

    let refunds = h
        .server
        .get("/v1/payments")
        .add_query_param("policy_id", id)
        .await;
    assert_eq!(refunds.json::<Value>().as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_upcoming_renewals_window() {
    let h = harness();
    let customer = create_customer(&h.server, "renew@example.com").await;
    let product = create_product(&h.server).await;
    create_policy(&h.server, &customer, &product).await;

    let none = h.server.get("/v1/policies/renewals/upcoming").add_query_param("days", 30).await;
    assert_eq!(none.json::<Value>().as_array().map(Vec::len), Some(0));

    let all = h.server.get("/v1/policies/renewals/upcoming").add_query_param("days", 400).await;
    assert_eq!(all.json::<Value>().as_array().map(Vec::len), Some(1));

    let invalid = h.server.get("/v1/policies/renewals/upcoming").add_query_param("days", 0).await;
    assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_claim_fraud_analysis_and_workflow() {
    let h = harness();
    let customer = create_customer(&h.server, "claim@example.com").await;
    let product = create_product(&h.server).await;
    let policy = create_policy(&h.server, &customer, &product).await;

    let claim = h
        .server
        .post("/v1/claims")
        .json(&json!({
            "policy_id": policy["id"],
            "user_id": customer["id"],
            "title": "Cracked screen",
            "description": "Dropped the phone on the stairs",
            "claim_amount": "300.00",
            "incident_date": Utc::now() - ChronoDuration::days(2)
        }))
        .await;
    assert_eq!(claim.status_code(), StatusCode::CREATED);
    let claim = claim.json::<Value>();
    let id = claim["id"].as_str().unwrap();

    let fraud = h.server.post(&format!("/v1/claims/{id}/fraud-analysis")).await;
    assert_eq!(fraud.status_code(), StatusCode::OK);
    assert!(fraud.json::<Value>()["factors"].is_array());

    let missing = h.server.get(&format!("/v1/claims/{id}/workflow")).await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

    let processed = h.server.post(&format!("/v1/claims/{id}/process")).await;
    assert_eq!(processed.status_code(), StatusCode::OK);
    let workflow = processed.json::<Value>();
    assert_eq!(workflow["claim_id"], claim["id"]);
    assert!(!workflow["stages"].as_array().unwrap().is_empty());

    let again = h.server.post(&format!("/v1/claims/{id}/process")).await;
    assert_eq!(again.status_code(), StatusCode::BAD_REQUEST);

    let derived = h
        .server
        .put(&format!("/v1/claims/{id}/workflow/stages/payout_processing"))
        .json(&json!({"result": "approved", "decision": "pay"}))
        .await;
    assert_eq!(derived.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_claim_against_someone_elses_policy_is_rejected() {
    let h = harness();
    let owner = create_customer(&h.server, "owner@example.com").await;
    let other = create_customer(&h.server, "other@example.com").await;
    let product = create_product(&h.server).await;
    let policy = create_policy(&h.server, &owner, &product).await;

    let response = h
        .server
        .post("/v1/claims")
        .json(&json!({
            "policy_id": policy["id"],
            "user_id": other["id"],
            "title": "Theft",
            "description": "Stolen",
            "claim_amount": "100.00",
            "incident_date": Utc::now() - ChronoDuration::days(1)
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pricing_compare_reports_difference() {
    let h = harness();
    let customer = create_customer(&h.server, "price@example.com").await;
    let product = create_product(&h.server).await;
    let now = Utc::now();
    let request = |coverage: &str| {
        json!({
            "product_id": product["id"],
            "user_id": customer["id"],
            "coverage_amount": coverage,
            "effective_date": now,
            "expiration_date": now + ChronoDuration::days(365)
        })
    };

    let single = h.server.post("/v1/pricing/calculate").json(&request("5000.00")).await;
    assert_eq!(single.status_code(), StatusCode::OK);
    assert!(single.json::<Value>()["final_premium"].is_string());

    let compared = h
        .server
        .post("/v1/pricing/compare")
        .json(&json!({
            "base": request("5000.00"),
            "scenarios": [{"name": "double", "request": request("10000.00")}]
        }))
        .await;
    assert_eq!(compared.status_code(), StatusCode::OK);
    let body = compared.json::<Value>();
    assert_eq!(body["scenarios"][0]["name"], "double");

    let empty = h
        .server
        .post("/v1/pricing/compare")
        .json(&json!({"base": request("5000.00"), "scenarios": []}))
        .await;
    assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_risk_assessment_for_unknown_customer_is_not_found() {
    let h = harness();
    let product = create_product(&h.server).await;
    let response = h
        .server
        .post("/v1/risk/assess")
        .json(&json!({
            "user_id": uuid::Uuid::new_v4(),
            "product_id": product["id"],
            "coverage_amount": "5000.00"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rules_sections_round_trip_and_reject_invalid() {
    let h = harness();

    let version = h.server.get("/v1/rules/version").await;
    assert_eq!(version.json::<Value>()["version"], "1.0.0");

    let section = h.server.get("/v1/rules/pricing").await;
    assert_eq!(section.status_code(), StatusCode::OK);
    let pricing = section.json::<Value>();

    let unknown = h.server.get("/v1/rules/nonsense").await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);

    let replaced = h.server.put("/v1/rules/pricing").json(&pricing).await;
    assert_eq!(replaced.status_code(), StatusCode::OK);

    let invalid = h.server.put("/v1/rules/pricing").json(&json!("not an object")).await;
    assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

    let reloaded = h.server.post("/v1/rules/reload").await;
    assert_eq!(reloaded.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let h = harness();
    let response = h.server.get("/healthz").await;
    assert!(response.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn test_seeded_policy_is_listed_and_claimable() {
    let h = harness();
    let customer = h.seed.seed_customer(&CustomerBuilder::new().established().build()).await.unwrap();
    let policy = h
        .seed
        .seed_policy(
            &PolicyBuilder::new(customer.id, core_kernel::ProductId::new())
                .effective(Utc::now() - ChronoDuration::days(200))
                .build(),
        )
        .await
        .unwrap();

    let listed = h
        .server
        .get("/v1/policies")
        .add_query_param("user_id", customer.id.to_string())
        .await;
    assert_eq!(listed.status_code(), StatusCode::OK);
    let listed = listed.json::<Vec<Value>>();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], policy.id.to_string());

    let claim = h
        .server
        .post("/v1/claims")
        .json(&json!({
            "policy_id": policy.id,
            "user_id": customer.id,
            "title": "Stolen bicycle",
            "description": "Taken from the shed overnight",
            "claim_amount": "800.00",
            "currency": "USD",
            "incident_date": (Utc::now() - ChronoDuration::days(2)).to_rfc3339()
        }))
        .await;
    assert_eq!(claim.status_code(), StatusCode::CREATED);
    assert_eq!(claim.json::<Value>()["status"], "submitted");
}
