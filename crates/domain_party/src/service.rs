//! Customer service

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use core_kernel::{
    Context, CustomerId, DomainEvent, EventPayload, EventPublisher, Page, PageRequest,
};

use crate::customer::{Customer, CustomerUpdate, NewCustomer};
use crate::error::PartyError;
use crate::ports::{CustomerFilter, CustomerRepository};

/// Registration and maintenance of customer accounts
pub struct CustomerService {
    customers: Arc<dyn CustomerRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl CustomerService {
    pub fn new(customers: Arc<dyn CustomerRepository>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { customers, publisher }
    }

    /// Registers a customer and announces it with `user.registered`
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, `Duplicate` when the email is taken.
    #[instrument(skip(self, ctx, input), fields(email = %input.email))]
    pub async fn register(&self, ctx: &Context, input: NewCustomer) -> Result<Customer, PartyError> {
        input.validate()?;
        let customer = self.customers.create(ctx, &input.into_customer()).await?;
        info!(customer_id = %customer.id, "Customer registered");

        let event = DomainEvent::new(
            customer.id,
            EventPayload::UserRegistered {
                user_id: customer.id,
                email: customer.email.clone(),
            },
        );
        if let Err(e) = self.publisher.publish(ctx, event).await {
            warn!(customer_id = %customer.id, error = %e, "Failed to publish user.registered");
        }
        Ok(customer)
    }

    pub async fn get(&self, ctx: &Context, id: CustomerId) -> Result<Customer, PartyError> {
        Ok(self.customers.get_by_id(ctx, id).await?)
    }

    pub async fn get_by_email(&self, ctx: &Context, email: &str) -> Result<Customer, PartyError> {
        Ok(self.customers.get_by_email(ctx, email).await?)
    }

    pub async fn list(
        &self,
        ctx: &Context,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<Customer>, PartyError> {
        let items = self.customers.list(ctx, filter, page.limit(), page.offset()).await?;
        let total = self.customers.count(ctx, filter).await?;
        Ok(Page::new(items, total, page))
    }

    #[instrument(skip(self, ctx, update), fields(customer_id = %id))]
    pub async fn update(
        &self,
        ctx: &Context,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, PartyError> {
        update.validate()?;
        let mut customer = self.customers.get_by_id(ctx, id).await?;
        update.apply(&mut customer);
        Ok(self.customers.update(ctx, &customer).await?)
    }

    #[instrument(skip(self, ctx), fields(customer_id = %id))]
    pub async fn delete(&self, ctx: &Context, id: CustomerId) -> Result<(), PartyError> {
        self.customers.soft_delete(ctx, id).await?;
        info!("Customer deleted");
        Ok(())
    }
}
