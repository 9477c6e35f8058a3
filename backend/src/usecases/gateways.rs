use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    domain::value_objects::reseller_packages::RoamifyCatalogResponse,
    payments::stripe_client::{CreatePaymentIntent, StripeClient, StripeEvent, StripePaymentIntent, StripeRefund},
    reseller::roamify_client::{EsimActivation, ResellerOrder, RoamifyClient, RoamifyError},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Stripe customer id for `email`, created on first purchase.
    async fn find_or_create_customer(&self, email: &str, name: Option<String>) -> AnyResult<String>;

    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntent,
    ) -> AnyResult<StripePaymentIntent>;

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: &str,
    ) -> AnyResult<StripeRefund>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn find_or_create_customer(&self, email: &str, name: Option<String>) -> AnyResult<String> {
        if let Some(customer_id) = self.find_customer_by_email(email).await? {
            return Ok(customer_id);
        }
        self.create_customer(email, name.as_deref()).await
    }

    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntent,
    ) -> AnyResult<StripePaymentIntent> {
        self.create_payment_intent(&request).await
    }

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: &str,
    ) -> AnyResult<StripeRefund> {
        self.create_refund(payment_intent_id, idempotency_key).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResellerGateway: Send + Sync {
    async fn list_packages(&self) -> Result<RoamifyCatalogResponse, RoamifyError>;

    async fn create_esim_order(
        &self,
        package_id: &str,
        quantity: u32,
    ) -> Result<ResellerOrder, RoamifyError>;

    async fn apply_esim(&self, esim_id: &str) -> Result<EsimActivation, RoamifyError>;

    async fn check_health(&self) -> bool;
}

#[async_trait]
impl ResellerGateway for RoamifyClient {
    async fn list_packages(&self) -> Result<RoamifyCatalogResponse, RoamifyError> {
        self.list_packages().await
    }

    async fn create_esim_order(
        &self,
        package_id: &str,
        quantity: u32,
    ) -> Result<ResellerOrder, RoamifyError> {
        self.create_esim_order(package_id, quantity).await
    }

    async fn apply_esim(&self, esim_id: &str) -> Result<EsimActivation, RoamifyError> {
        self.apply_esim(esim_id).await
    }

    async fn check_health(&self) -> bool {
        self.check_health().await
    }
}
