//! Adapter tests against a throwaway PostgreSQL container
//!
//! These need a Docker daemon:
//!
//! ```text
//! cargo test -p infra_db -- --ignored
//! ```

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::testcontainers::ContainerAsync;

use core_kernel::{AdapterHealth, Context, Currency, ErrorKind, HealthCheckable, ProductId};
use domain_billing::{Payment, PaymentFilter, PaymentRepository};
use domain_claims::{ClaimDocument, ClaimFilter, ClaimRepository, ClaimStatus, NewClaim, Workflow, WorkflowRepository};
use domain_party::{Address, AddressType, Customer, CustomerFilter, CustomerRepository};
use domain_policy::{Policy, PolicyFilter, PolicyRepository, PolicyStatus, Quote, QuoteRepository};
use domain_rules::ClaimProcessingRules;
use infra_db::{
    create_pool, run_migrations, DatabaseConfig, DatabasePool, PgClaimRepository, PgCustomerRepository,
    PgPaymentRepository, PgPolicyRepository, PgQuoteRepository, PgWorkflowRepository,
};

async fn database() -> (ContainerAsync<Postgres>, DatabasePool) {
    let node = Postgres::default().start().await.expect("start postgres container");
    let host = node.get_host().await.expect("container host");
    let port = node.get_host_port_ipv4(5432).await.expect("container port");
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");
    let pool = create_pool(DatabaseConfig::new(url).max_connections(5).min_connections(1))
        .await
        .expect("connect");
    run_migrations(&pool).await.expect("migrate");
    (node, pool)
}

fn policy(user: &Customer, effective_offset_days: i64, term_days: i64) -> Policy {
    let effective = Utc::now() + Duration::days(effective_offset_days);
    let mut policy = Policy::new(
        ProductId::new_v7(),
        user.id,
        dec!(1200),
        dec!(100000),
        Currency::USD,
        effective,
        effective + Duration::days(term_days),
    )
    .expect("valid policy");
    policy.status = PolicyStatus::Active;
    policy
}

#[tokio::test]
#[ignore = "requires docker"]
async fn customers_round_trip_and_soft_delete() {
    let (_node, pool) = database().await;
    let ctx = Context::background();
    let repo = PgCustomerRepository::new(pool);
    assert_eq!(repo.health_check().await.status, AdapterHealth::Healthy);

    let mut customer = Customer::new("Ana.Silva@example.com", "Ana", "Silva");
    let mut address = Address::new(AddressType::Residential, "Rua Augusta 1", "Lisboa", "1100-048", "PT");
    address.is_primary = true;
    customer.addresses.push(address);
    repo.create(&ctx, &customer).await.unwrap();

    let found = repo.get_by_email(&ctx, "ana.silva@EXAMPLE.com").await.unwrap();
    assert_eq!(found.id, customer.id);
    assert_eq!(found.country(), Some("PT"));

    let duplicate = Customer::new("ana.silva@example.com", "Other", "Person");
    let err = repo.create(&ctx, &duplicate).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    repo.soft_delete(&ctx, customer.id).await.unwrap();
    assert!(repo.get_by_id(&ctx, customer.id).await.unwrap_err().is_not_found());
    assert_eq!(repo.count(&ctx, &CustomerFilter::default()).await.unwrap(), 0);
    assert!(repo.soft_delete(&ctx, customer.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn policy_sweep_predicates() {
    let (_node, pool) = database().await;
    let ctx = Context::background();
    let repo = PgPolicyRepository::new(pool);
    let owner = Customer::new("owner@example.com", "Owner", "One");
    let now = Utc::now();

    // expired yesterday
    let expired = policy(&owner, -366, 365);
    // expires in 10 days, renewable
    let mut renewable = policy(&owner, -355, 365);
    renewable.auto_renew = true;
    // expires in 20 days
    let later = policy(&owner, -345, 365);
    // awaiting payment past its grace period
    let mut lapsed = policy(&owner, -30, 365);
    lapsed.status = PolicyStatus::Pending;
    lapsed.grace_period_end = Some(now - Duration::days(1));

    for p in [&expired, &renewable, &later, &lapsed] {
        repo.create(&ctx, p).await.unwrap();
    }

    let found = repo.find_expired_active(&ctx, now).await.unwrap();
    assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![expired.id]);

    let grace = repo.find_grace_period_elapsed(&ctx, now).await.unwrap();
    assert_eq!(grace.iter().map(|p| p.id).collect::<Vec<_>>(), vec![lapsed.id]);

    let expiring = repo.find_expiring_between(&ctx, now, now + Duration::days(30)).await.unwrap();
    assert_eq!(expiring.iter().map(|p| p.id).collect::<Vec<_>>(), vec![renewable.id, later.id]);

    let candidates = repo.find_auto_renewal_candidates(&ctx, now, 30).await.unwrap();
    assert_eq!(candidates.iter().map(|p| p.id).collect::<Vec<_>>(), vec![renewable.id]);

    let filter = PolicyFilter {
        status: Some(PolicyStatus::Active),
        ..Default::default()
    };
    assert_eq!(repo.count(&ctx, &filter).await.unwrap(), 3);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn policy_update_keeps_identity_columns() {
    let (_node, pool) = database().await;
    let ctx = Context::background();
    let repo = PgPolicyRepository::new(pool);
    let owner = Customer::new("owner@example.com", "Owner", "One");
    let original = policy(&owner, 0, 365);
    repo.create(&ctx, &original).await.unwrap();

    let mut changed = original.clone();
    changed.policy_number = "POL-TAMPERED".into();
    changed.premium = dec!(1500);
    let stored = repo.update(&ctx, &changed).await.unwrap();

    assert_eq!(stored.policy_number, original.policy_number);
    assert_eq!(stored.premium, dec!(1500));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn quotes_keep_risk_factors() {
    let (_node, pool) = database().await;
    let ctx = Context::background();
    let repo = PgQuoteRepository::new(pool);
    let now = Utc::now();
    let mut quote = Quote::new(
        ProductId::new_v7(),
        Customer::new("q@example.com", "Q", "Uote").id,
        dec!(50000),
        dec!(500),
        dec!(540),
        Currency::EUR,
        now + Duration::days(30),
        now,
        now + Duration::days(365),
    );
    quote.risk_factors = vec!["young_driver".into(), "urban_area".into()];
    repo.create(&ctx, &quote).await.unwrap();

    let found = repo.get_by_number(&ctx, &quote.quote_number).await.unwrap();
    assert_eq!(found.risk_factors, quote.risk_factors);
    assert_eq!(found.currency, Currency::EUR);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn claims_and_workflow_documents() {
    let (_node, pool) = database().await;
    let ctx = Context::background();
    let claims = PgClaimRepository::new(pool.clone());
    let workflows = PgWorkflowRepository::new(pool);
    let owner = Customer::new("c@example.com", "C", "Laimant");
    let now = Utc::now();

    let claim = NewClaim {
        policy_id: policy(&owner, -10, 365).id,
        user_id: owner.id,
        title: "Burst pipe".into(),
        description: "Kitchen flooded".into(),
        claim_amount: dec!(2450),
        currency: Currency::USD,
        incident_date: now - Duration::days(2),
        reported_date: None,
        documents: vec![
            ClaimDocument::new("photo.jpg", 2048, "image/jpeg"),
            ClaimDocument::new("invoice.pdf", 4096, "application/pdf"),
        ],
    }
    .into_claim(now)
    .unwrap();
    claims.create(&ctx, &claim).await.unwrap();

    let mut loaded = claims.get_by_number(&ctx, &claim.claim_number).await.unwrap();
    assert_eq!(loaded.documents.len(), 2);
    loaded.decide(ClaimStatus::Approved, None, now).unwrap();
    claims.update(&ctx, &loaded).await.unwrap();

    let approved = ClaimFilter {
        status: Some(ClaimStatus::Approved),
        ..Default::default()
    };
    assert_eq!(claims.list(&ctx, &approved, 10, 0).await.unwrap().len(), 1);

    let mut workflow = Workflow::for_claim(&claim, &ClaimProcessingRules::default(), now);
    workflows.save(&ctx, &workflow).await.unwrap();
    workflow.move_to_next_stage(now);
    workflows.save(&ctx, &workflow).await.unwrap();

    let stored = workflows.get_by_claim(&ctx, claim.id).await.unwrap();
    assert_eq!(stored.current_stage, workflow.current_stage);
    assert_eq!(stored.stages, workflow.stages);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn payments_list_oldest_first() {
    let (_node, pool) = database().await;
    let ctx = Context::background();
    let repo = PgPaymentRepository::new(pool);
    let payer = Customer::new("p@example.com", "P", "Ayer");

    let first = Payment::new(payer.id, dec!(100), Currency::USD, "card");
    let mut second = Payment::new(payer.id, dec!(-40), Currency::USD, "bank_transfer");
    repo.create(&ctx, &first).await.unwrap();
    repo.create(&ctx, &second).await.unwrap();

    second.complete("TXN-1").unwrap();
    let stored = repo.update(&ctx, &second).await.unwrap();
    assert_eq!(stored.transaction_id.as_deref(), Some("TXN-1"));

    let filter = PaymentFilter {
        user_id: Some(payer.id),
        ..Default::default()
    };
    let listed = repo.list(&ctx, &filter, 10, 0).await.unwrap();
    assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![first.id, second.id]);
    assert_eq!(repo.count(&ctx, &filter).await.unwrap(), 2);
}
