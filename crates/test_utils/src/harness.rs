//! Service Harness
//!
//! Every domain service wired over the in-memory repositories, a recording
//! event publisher, a recording job dispatcher and a simulated gateway. The
//! concrete repositories stay reachable so tests can seed and inspect them.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use core_kernel::events::mock::RecordingPublisher;
use core_kernel::jobs::mock::RecordingDispatcher;
use core_kernel::{Context, PortError};
use domain_billing::ports::mock::InMemoryPaymentRepository;
use domain_billing::{PaymentService, SimulatedGateway};
use domain_claims::ports::mock::{InMemoryClaimRepository, InMemoryWorkflowRepository};
use domain_claims::{ClaimRepository, ClaimService, ClaimWorkflowService, FraudDetectionService};
use domain_party::ports::mock::InMemoryCustomerRepository;
use domain_party::{Customer, CustomerRepository, CustomerService};
use domain_policy::ports::mock::{InMemoryPolicyRepository, InMemoryProductRepository, InMemoryQuoteRepository};
use domain_policy::{
    LifecycleScheduler, Policy, PolicyLifecycleService, PolicyRepository, PolicyService, PricingEngine, Product,
    ProductRepository, ProductService, QuoteService, RiskAssessmentService, SchedulerConfig, UnderwritingService,
};
use domain_rules::RulesManager;

use crate::fixtures::Fixtures;

/// Per-charge ceiling of the harness gateway
pub const GATEWAY_LIMIT: rust_decimal::Decimal = dec!(1000000);

pub struct ServiceHarness {
    pub ctx: Context,

    pub customer_repo: Arc<InMemoryCustomerRepository>,
    pub product_repo: Arc<InMemoryProductRepository>,
    pub quote_repo: Arc<InMemoryQuoteRepository>,
    pub policy_repo: Arc<InMemoryPolicyRepository>,
    pub claim_repo: Arc<InMemoryClaimRepository>,
    pub workflow_repo: Arc<InMemoryWorkflowRepository>,
    pub payment_repo: Arc<InMemoryPaymentRepository>,

    pub publisher: Arc<RecordingPublisher>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub rules: Arc<RulesManager>,

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
}

impl Default for ServiceHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceHarness {
    /// A harness running on the default business rules
    pub fn new() -> Self {
        Self::with_rules(RulesManager::with_defaults())
    }

    pub fn with_rules(rules: RulesManager) -> Self {
        let customer_repo = Arc::new(InMemoryCustomerRepository::new());
        let product_repo = Arc::new(InMemoryProductRepository::new());
        let quote_repo = Arc::new(InMemoryQuoteRepository::new());
        let policy_repo = Arc::new(InMemoryPolicyRepository::new());
        let claim_repo = Arc::new(InMemoryClaimRepository::new());
        let workflow_repo = Arc::new(InMemoryWorkflowRepository::new());
        let payment_repo = Arc::new(InMemoryPaymentRepository::new());

        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let rules = Arc::new(rules);

        let payments = Arc::new(PaymentService::new(
            payment_repo.clone(),
            Arc::new(SimulatedGateway::new(GATEWAY_LIMIT, Duration::ZERO)),
            publisher.clone(),
        ));
        let pricing = Arc::new(PricingEngine::new(product_repo.clone(), customer_repo.clone(), rules.clone()));
        let risk = Arc::new(RiskAssessmentService::new(
            customer_repo.clone(),
            product_repo.clone(),
            policy_repo.clone(),
            rules.clone(),
        ));
        let underwriting = Arc::new(UnderwritingService::new(risk.clone(), pricing.clone(), rules.clone()));
        let fraud = Arc::new(FraudDetectionService::new(
            claim_repo.clone(),
            policy_repo.clone(),
            customer_repo.clone(),
            publisher.clone(),
            rules.clone(),
        ));
        let workflows = Arc::new(ClaimWorkflowService::new(
            claim_repo.clone(),
            policy_repo.clone(),
            workflow_repo.clone(),
            fraud.clone(),
            payments.clone(),
            dispatcher.clone(),
            publisher.clone(),
            rules.clone(),
        ));
        let lifecycle = Arc::new(PolicyLifecycleService::new(
            policy_repo.clone(),
            payments.clone(),
            publisher.clone(),
            dispatcher.clone(),
            rules.clone(),
        ));

        Self {
            ctx: Context::background(),
            customers: Arc::new(CustomerService::new(customer_repo.clone(), publisher.clone())),
            products: Arc::new(ProductService::new(product_repo.clone())),
            quotes: Arc::new(QuoteService::new(
                quote_repo.clone(),
                product_repo.clone(),
                pricing.clone(),
                publisher.clone(),
            )),
            policies: Arc::new(PolicyService::new(
                policy_repo.clone(),
                product_repo.clone(),
                quote_repo.clone(),
                publisher.clone(),
            )),
            claims: Arc::new(ClaimService::new(claim_repo.clone(), policy_repo.clone(), publisher.clone())),
            customer_repo,
            product_repo,
            quote_repo,
            policy_repo,
            claim_repo,
            workflow_repo,
            payment_repo,
            publisher,
            dispatcher,
            rules,
            payments,
            pricing,
            risk,
            underwriting,
            fraud,
            workflows,
            lifecycle,
        }
    }

    /// A scheduler over this harness's lifecycle service; not started
    pub fn scheduler(&self, config: SchedulerConfig) -> Arc<LifecycleScheduler> {
        LifecycleScheduler::new(self.lifecycle.clone(), config)
    }

    pub async fn seed_customer(&self, customer: &Customer) -> Result<Customer, PortError> {
        self.customer_repo.create(&self.ctx, customer).await
    }

    pub async fn seed_product(&self, product: &Product) -> Result<Product, PortError> {
        self.product_repo.create(&self.ctx, product).await
    }

    pub async fn seed_policy(&self, policy: &Policy) -> Result<Policy, PortError> {
        self.policy_repo.create(&self.ctx, policy).await
    }

    pub async fn seed_claim(&self, claim: &domain_claims::Claim) -> Result<domain_claims::Claim, PortError> {
        self.claim_repo.create(&self.ctx, claim).await
    }

    /// Stores a fixture customer, an `auto` product and an active policy
    /// linking them
    pub async fn seed_insured(&self) -> Result<(Customer, Product, Policy), PortError> {
        let customer = self.seed_customer(&Fixtures::customer()).await?;
        let product = self.seed_product(&Fixtures::product()).await?;
        let policy = self.seed_policy(&Fixtures::active_policy(&customer, &product)).await?;
        Ok((customer, product, policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_records_are_visible_to_services() {
        let h = ServiceHarness::new();
        let (customer, product, policy) = h.seed_insured().await.expect("seed");

        assert_eq!(h.customers.get(&h.ctx, customer.id).await.expect("customer").email, customer.email);
        assert_eq!(h.products.get(&h.ctx, product.id).await.expect("product").id, product.id);
        assert_eq!(h.policies.get(&h.ctx, policy.id).await.expect("policy").user_id, customer.id);
    }
}
