use std::{collections::HashMap, sync::Arc};

use anyhow::anyhow;
use crates::{
    domain::{
        entities::orders::{InsertOrderEntity, OrderEntity, OrderFulfillmentChangeset},
        repositories::{my_packages::MyPackageRepository, orders::OrderRepository},
        value_objects::{
            enums::order_statuses::OrderStatus,
            esim_codes::{MAX_ESIM_CODE_ATTEMPTS, generate_esim_code, lpa_payload},
            orders::{CreatePaymentIntentRequest, CreatePaymentIntentResponse, WebhookOutcome},
            packages::cents_to_price,
        },
    },
    observability::SystemMetrics,
    payments::stripe_client::{CreatePaymentIntent, StripeClient, StripePaymentIntent},
};
use tracing::{error, info, warn};

use super::{
    gateways::{PaymentGateway, ResellerGateway},
    packages::find_package_by_reference,
};
use crate::axum_http::error_responses::AppError;

pub type UseCaseResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub default_currency: String,
    /// Host used in the fallback LPA payload when the reseller cannot deliver.
    pub esim_provider_host: String,
}

pub struct PaymentUseCase<M, O, P, G>
where
    M: MyPackageRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
    G: ResellerGateway + Send + Sync + 'static,
{
    package_repo: Arc<M>,
    order_repo: Arc<O>,
    payments: Arc<P>,
    reseller: Arc<G>,
    metrics: Arc<SystemMetrics>,
    settings: CheckoutSettings,
}

fn validate_email(email: &str) -> UseCaseResult<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !email.chars().any(char::is_whitespace);
    if !valid {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    Ok(email)
}

fn normalize_currency(currency: Option<&str>, default: &str) -> UseCaseResult<String> {
    let currency = currency
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(default)
        .to_lowercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(format!("Unsupported currency: {currency}")));
    }
    Ok(currency)
}

impl<M, O, P, G> PaymentUseCase<M, O, P, G>
where
    M: MyPackageRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
    G: ResellerGateway + Send + Sync + 'static,
{
    pub fn new(
        package_repo: Arc<M>,
        order_repo: Arc<O>,
        payments: Arc<P>,
        reseller: Arc<G>,
        metrics: Arc<SystemMetrics>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            package_repo,
            order_repo,
            payments,
            reseller,
            metrics,
            settings,
        }
    }

    async fn unique_esim_code(&self) -> UseCaseResult<String> {
        for attempt in 1..=MAX_ESIM_CODE_ATTEMPTS {
            let code = generate_esim_code(&mut rand::thread_rng());
            let taken = self
                .order_repo
                .esim_code_exists(code.clone())
                .await
                .map_err(AppError::Database)?;
            if !taken {
                return Ok(code);
            }
            warn!(attempt, "payments: eSIM code collision, regenerating");
        }
        Err(AppError::Internal(anyhow!(
            "no unique eSIM code after {MAX_ESIM_CODE_ATTEMPTS} attempts"
        )))
    }

    /// Prices from `my_packages` only; the client never sends an amount.
    pub async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> UseCaseResult<CreatePaymentIntentResponse> {
        let email = validate_email(&request.email)?;
        let reference = request.package_id.trim();
        if reference.is_empty() {
            return Err(AppError::Validation("packageId is required".to_string()));
        }
        let currency = normalize_currency(
            request.currency.as_deref(),
            &self.settings.default_currency,
        )?;
        let customer_name = request.name.filter(|n| !n.trim().is_empty());

        let package = find_package_by_reference(self.package_repo.as_ref(), reference)
            .await
            .map_err(|err| {
                error!(reference, db_error = ?err, "payments: failed to load package");
                AppError::Database(err)
            })?
            .filter(|p| p.visible)
            .ok_or_else(|| AppError::NotFound("Package".to_string()))?;

        if package.sale_price_cents <= 0 {
            warn!(package_id = %package.id, "payments: package has no sale price");
            return Err(AppError::Validation("Package is not available for sale".to_string()));
        }

        let customer_id = self
            .payments
            .find_or_create_customer(&email, customer_name.clone())
            .await
            .map_err(|err| {
                error!(error = ?err, "payments: stripe customer lookup failed");
                AppError::external("Stripe", "failed to prepare customer")
            })?;

        let esim_code = self.unique_esim_code().await?;

        let order = self
            .order_repo
            .insert(InsertOrderEntity {
                package_id: package.id,
                package_name: package.name.clone(),
                package_slug: package.slug.clone(),
                reseller_package_id: package.reseller_id.clone(),
                customer_email: email.clone(),
                customer_name,
                amount_cents: package.sale_price_cents,
                currency: currency.clone(),
                status: OrderStatus::Pending.to_string(),
                esim_code: esim_code.clone(),
                stripe_customer_id: Some(customer_id.clone()),
            })
            .await
            .map_err(|err| {
                error!(package_id = %package.id, db_error = ?err, "payments: failed to create order");
                AppError::Database(err)
            })?;

        let metadata = HashMap::from([
            ("orderId".to_string(), order.id.to_string()),
            ("packageId".to_string(), package.id.to_string()),
            ("packageName".to_string(), package.name.clone()),
            ("packageSlug".to_string(), package.slug.clone().unwrap_or_default()),
            ("esimCode".to_string(), esim_code),
            ("email".to_string(), email.clone()),
        ]);

        let intent = match self
            .payments
            .create_payment_intent(CreatePaymentIntent {
                amount_minor: package.sale_price_cents,
                currency: currency.clone(),
                customer_id: Some(customer_id),
                receipt_email: Some(email),
                description: Some(format!("eSIM: {}", package.name)),
                metadata,
                idempotency_key: format!("order-{}", order.id),
            })
            .await
        {
            Ok(intent) => intent,
            Err(err) => {
                error!(order_id = %order.id, error = ?err, "payments: payment intent creation failed");
                self.metrics.track_payment(false);
                if let Err(err) = self
                    .order_repo
                    .update_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
                    .await
                {
                    error!(order_id = %order.id, db_error = ?err, "payments: failed to cancel order");
                }
                return Err(AppError::Payment("Could not start the payment".to_string()));
            }
        };

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            error!(order_id = %order.id, payment_intent_id = %intent.id, "payments: intent has no client secret");
            AppError::Payment("Could not start the payment".to_string())
        })?;

        self.order_repo
            .attach_payment_intent(order.id, intent.id.clone())
            .await
            .map_err(|err| {
                error!(order_id = %order.id, db_error = ?err, "payments: failed to store payment intent id");
                AppError::Database(err)
            })?;

        info!(
            order_id = %order.id,
            package_id = %package.id,
            payment_intent_id = %intent.id,
            amount_cents = package.sale_price_cents,
            %currency,
            "payments: payment intent created"
        );

        Ok(CreatePaymentIntentResponse {
            client_secret,
            payment_intent_id: intent.id,
            order_id: order.id,
            amount: cents_to_price(package.sale_price_cents),
            currency,
        })
    }

    /// Verifies and dispatches a Stripe event. Fulfillment problems are recorded on the
    /// order and never turned into a non-2xx answer, so Stripe does not redeliver.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> UseCaseResult<WebhookOutcome> {
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation("Missing Stripe-Signature header".to_string()))?;

        let event = self
            .payments
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "payments: webhook signature rejected");
                AppError::Validation("Invalid webhook signature".to_string())
            })?;

        info!(event_id = ?event.id, event_type = %event.type_, "payments: webhook received");

        let Some(intent) = StripeClient::extract_payment_intent(&event) else {
            if event.type_.starts_with("payment_intent.") {
                return Err(AppError::Validation("Malformed payment intent payload".to_string()));
            }
            return Ok(WebhookOutcome::Ignored);
        };

        match event.type_.as_str() {
            "payment_intent.succeeded" => self.handle_payment_succeeded(intent).await,
            "payment_intent.payment_failed" => {
                self.metrics.track_payment(false);
                let reason = intent
                    .last_payment_error
                    .as_ref()
                    .and_then(|e| e.message.clone())
                    .unwrap_or_else(|| "Payment failed".to_string());
                warn!(payment_intent_id = %intent.id, %reason, "payments: payment failed");
                Ok(WebhookOutcome::PaymentFailed)
            }
            "payment_intent.canceled" => self.handle_payment_canceled(intent).await,
            _ => Ok(WebhookOutcome::Ignored),
        }
    }

    async fn order_for_intent(&self, intent: &StripePaymentIntent) -> UseCaseResult<Option<OrderEntity>> {
        let order = self
            .order_repo
            .find_by_payment_intent_id(intent.id.clone())
            .await
            .map_err(AppError::Database)?;
        if order.is_some() {
            return Ok(order);
        }

        // The intent id is attached after creation; metadata covers the gap.
        let Some(order_id) = intent
            .metadata
            .get("orderId")
            .and_then(|id| uuid::Uuid::parse_str(id).ok())
        else {
            return Ok(None);
        };
        self.order_repo
            .find_by_id(order_id)
            .await
            .map_err(AppError::Database)
    }

    async fn handle_payment_succeeded(
        &self,
        intent: StripePaymentIntent,
    ) -> UseCaseResult<WebhookOutcome> {
        let Some(order) = self.order_for_intent(&intent).await? else {
            warn!(payment_intent_id = %intent.id, "payments: no order for succeeded payment");
            return Ok(WebhookOutcome::Ignored);
        };

        if intent.amount.is_some_and(|amount| amount != order.amount_cents) {
            warn!(
                order_id = %order.id,
                expected = order.amount_cents,
                received = ?intent.amount,
                "payments: paid amount differs from order amount"
            );
        }

        let order = match self
            .order_repo
            .update_status(order.id, OrderStatus::Pending, OrderStatus::Paid)
            .await
            .map_err(AppError::Database)?
        {
            Some(paid) => {
                self.metrics.track_payment(true);
                info!(order_id = %paid.id, payment_intent_id = %intent.id, "payments: order paid");
                paid
            }
            None if order.status.parse::<OrderStatus>().ok() == Some(OrderStatus::Paid) => order,
            None => {
                info!(order_id = %order.id, status = %order.status, "payments: webhook already processed");
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
        };

        // Redeliveries can race the first delivery; only the claim holder orders.
        let claimed = self
            .order_repo
            .claim_fulfillment(order.id)
            .await
            .map_err(AppError::Database)?;
        if !claimed {
            info!(order_id = %order.id, "payments: fulfillment already claimed");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        self.fulfill(&order).await
    }

    async fn handle_payment_canceled(
        &self,
        intent: StripePaymentIntent,
    ) -> UseCaseResult<WebhookOutcome> {
        let Some(order) = self.order_for_intent(&intent).await? else {
            return Ok(WebhookOutcome::Ignored);
        };
        let cancelled = self
            .order_repo
            .update_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .map_err(AppError::Database)?;

        if cancelled.is_none() {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }
        info!(order_id = %order.id, payment_intent_id = %intent.id, "payments: order cancelled");
        Ok(WebhookOutcome::Cancelled)
    }

    /// Orders the eSIM from the reseller and stores what came back.
    async fn fulfill(&self, order: &OrderEntity) -> UseCaseResult<WebhookOutcome> {
        let (changeset, outcome) = match self.order_from_reseller(order).await {
            Ok(changeset) => (changeset, WebhookOutcome::Fulfilled),
            Err(mut changeset) => {
                self.metrics.track_fulfillment_failure();
                if changeset.lpa_code.is_none() {
                    changeset.lpa_code = lpa_payload(
                        &self.settings.esim_provider_host,
                        &order.esim_code,
                        &order.package_name,
                    )
                    .ok();
                }
                (changeset, WebhookOutcome::FulfillmentFailed)
            }
        };

        let reseller_order_id = changeset.reseller_order_id.clone();
        let reseller_esim_id = changeset.reseller_esim_id.clone();
        self.order_repo
            .record_fulfillment(order.id, changeset)
            .await
            .map_err(|err| {
                error!(
                    order_id = %order.id,
                    reseller_order_id = ?reseller_order_id,
                    reseller_esim_id = ?reseller_esim_id,
                    db_error = ?err,
                    "payments: failed to record fulfillment"
                );
                AppError::Database(err)
            })?;
        Ok(outcome)
    }

    async fn order_from_reseller(
        &self,
        order: &OrderEntity,
    ) -> Result<OrderFulfillmentChangeset, OrderFulfillmentChangeset> {
        let Some(reseller_package_id) = order.reseller_package_id.as_deref() else {
            error!(order_id = %order.id, "payments: package has no reseller id");
            return Err(OrderFulfillmentChangeset {
                fulfillment_error: Some("Package has no reseller id".to_string()),
                ..Default::default()
            });
        };

        let reseller_order = self
            .reseller
            .create_esim_order(reseller_package_id, 1)
            .await
            .map_err(|err| {
                error!(order_id = %order.id, reseller_package_id, error = %err, "payments: reseller order failed");
                OrderFulfillmentChangeset {
                    fulfillment_error: Some(format!("Reseller order failed: {err}")),
                    ..Default::default()
                }
            })?;

        let mut changeset = OrderFulfillmentChangeset {
            reseller_order_id: reseller_order.order_id.clone(),
            reseller_esim_id: Some(reseller_order.esim_id.clone()),
            ..Default::default()
        };

        match self.reseller.apply_esim(&reseller_order.esim_id).await {
            Ok(activation) => {
                changeset.lpa_code = activation.lpa_code;
                changeset.qr_code_url = activation.qr_code_url;
                changeset.activation_code = activation.activation_code;
                info!(
                    order_id = %order.id,
                    reseller_order_id = ?reseller_order.order_id,
                    esim_id = %reseller_order.esim_id,
                    "payments: eSIM delivered"
                );
                Ok(changeset)
            }
            Err(err) => {
                error!(order_id = %order.id, esim_id = %reseller_order.esim_id, error = %err, "payments: eSIM activation failed");
                changeset.fulfillment_error = Some(format!("eSIM activation failed: {err}"));
                Err(changeset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::gateways::{MockPaymentGateway, MockResellerGateway};
    use chrono::Utc;
    use crates::{
        domain::{
            entities::my_packages::MyPackageEntity,
            repositories::{my_packages::MockMyPackageRepository, orders::MockOrderRepository},
        },
        payments::stripe_client::{StripeEvent, StripeEventData},
        reseller::roamify_client::{EsimActivation, ResellerOrder, RoamifyError},
    };
    use mockall::predicate::eq;
    use serde_json::json;
    use uuid::Uuid;

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            default_currency: "eur".to_string(),
            esim_provider_host: "esimfly.al".to_string(),
        }
    }

    fn package() -> MyPackageEntity {
        let now = Utc::now();
        MyPackageEntity {
            id: Uuid::new_v4(),
            name: "Greece 1GB".to_string(),
            country_name: "Greece".to_string(),
            country_code: "GR".to_string(),
            data_amount: 1.0,
            days: 7,
            base_price_cents: 350,
            sale_price_cents: 499,
            profit_cents: 149,
            reseller_id: Some("esim-greece-7days-1gb-all".to_string()),
            region: None,
            slug: Some("esim-greece-7days-1gb-all".to_string()),
            visible: true,
            show_on_frontend: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn order(status: OrderStatus) -> OrderEntity {
        let now = Utc::now();
        OrderEntity {
            id: Uuid::new_v4(),
            package_id: Uuid::new_v4(),
            package_name: "Greece 1GB".to_string(),
            package_slug: Some("esim-greece-7days-1gb-all".to_string()),
            reseller_package_id: Some("esim-greece-7days-1gb-all".to_string()),
            customer_email: "buyer@example.com".to_string(),
            customer_name: None,
            amount_cents: 499,
            currency: "eur".to_string(),
            status: status.to_string(),
            esim_code: "ESIM-AB12-CD34-EF56".to_string(),
            payment_intent_id: Some("pi_1".to_string()),
            stripe_customer_id: Some("cus_1".to_string()),
            reseller_order_id: None,
            reseller_esim_id: None,
            lpa_code: None,
            qr_code_url: None,
            activation_code: None,
            fulfillment_error: None,
            fulfillment_started_at: None,
            refund_id: None,
            paid_at: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn intent(id: &str) -> StripePaymentIntent {
        StripePaymentIntent {
            id: id.to_string(),
            client_secret: Some(format!("{id}_secret")),
            status: Some("requires_payment_method".to_string()),
            amount: Some(499),
            currency: Some("eur".to_string()),
            customer: Some("cus_1".to_string()),
            metadata: HashMap::new(),
            last_payment_error: None,
        }
    }

    fn event(type_: &str, object: serde_json::Value) -> StripeEvent {
        StripeEvent {
            id: Some("evt_1".to_string()),
            type_: type_.to_string(),
            created: None,
            livemode: Some(false),
            data: StripeEventData { object },
        }
    }

    fn usecase(
        packages: MockMyPackageRepository,
        orders: MockOrderRepository,
        payments: MockPaymentGateway,
        reseller: MockResellerGateway,
    ) -> (
        PaymentUseCase<MockMyPackageRepository, MockOrderRepository, MockPaymentGateway, MockResellerGateway>,
        Arc<SystemMetrics>,
    ) {
        let metrics = Arc::new(SystemMetrics::new());
        let usecase = PaymentUseCase::new(
            Arc::new(packages),
            Arc::new(orders),
            Arc::new(payments),
            Arc::new(reseller),
            Arc::clone(&metrics),
            settings(),
        );
        (usecase, metrics)
    }

    fn request(package_id: &str) -> CreatePaymentIntentRequest {
        CreatePaymentIntentRequest {
            package_id: package_id.to_string(),
            email: " Buyer@Example.com ".to_string(),
            name: Some("Buyer".to_string()),
            currency: None,
        }
    }

    #[tokio::test]
    async fn intent_amount_comes_from_the_package() {
        let package = package();
        let package_id = package.id;

        let mut packages = MockMyPackageRepository::new();
        packages
            .expect_find_by_id()
            .with(eq(package_id))
            .returning(move |_| Ok(Some(package.clone())));

        let mut orders = MockOrderRepository::new();
        orders.expect_esim_code_exists().returning(|_| Ok(false));
        orders
            .expect_insert()
            .withf(|row| row.amount_cents == 499 && row.status == "pending" && row.customer_email == "buyer@example.com")
            .returning(|row| {
                let mut created = order(OrderStatus::Pending);
                created.esim_code = row.esim_code;
                created.payment_intent_id = None;
                Ok(created)
            });
        orders
            .expect_attach_payment_intent()
            .withf(|_, pi| pi == "pi_1")
            .returning(|_, _| Ok(()));

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_find_or_create_customer()
            .withf(|email, _| email.contains("buyer@example.com"))
            .returning(|_, _| Ok("cus_1".to_string()));
        payments
            .expect_create_payment_intent()
            .withf(|req| {
                req.amount_minor == 499
                    && req.currency == "eur"
                    && req.idempotency_key.starts_with("order-")
                    && req.metadata.contains_key("orderId")
            })
            .returning(|_| Ok(intent("pi_1")));

        let (usecase, _) = usecase(packages, orders, payments, MockResellerGateway::new());
        let response = usecase
            .create_payment_intent(request(&package_id.to_string()))
            .await
            .unwrap();

        assert_eq!(response.client_secret, "pi_1_secret");
        assert_eq!(response.amount, 4.99);
        assert_eq!(response.currency, "eur");
    }

    #[tokio::test]
    async fn unknown_package_is_not_found() {
        let mut packages = MockMyPackageRepository::new();
        packages.expect_find_by_slug().returning(|_| Ok(None));

        let mut payments = MockPaymentGateway::new();
        payments.expect_create_payment_intent().never();

        let (usecase, _) = usecase(packages, MockOrderRepository::new(), payments, MockResellerGateway::new());
        let err = usecase
            .create_payment_intent(request("esim-mars-7days-1gb-all"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_before_any_lookup() {
        let mut packages = MockMyPackageRepository::new();
        packages.expect_find_by_slug().never();

        let (usecase, _) = usecase(packages, MockOrderRepository::new(), MockPaymentGateway::new(), MockResellerGateway::new());
        let mut req = request("esim-greece-7days-1gb-all");
        req.email = "not-an-email".to_string();
        assert!(matches!(
            usecase.create_payment_intent(req).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn stripe_failure_cancels_the_pending_order() {
        let package = package();
        let mut packages = MockMyPackageRepository::new();
        packages
            .expect_find_by_slug()
            .returning(move |_| Ok(Some(package.clone())));

        let pending = order(OrderStatus::Pending);
        let pending_id = pending.id;
        let mut orders = MockOrderRepository::new();
        orders.expect_esim_code_exists().returning(|_| Ok(false));
        orders.expect_insert().returning(move |_| Ok(pending.clone()));
        orders
            .expect_update_status()
            .with(eq(pending_id), eq(OrderStatus::Pending), eq(OrderStatus::Cancelled))
            .times(1)
            .returning(|_, _, _| Ok(None));

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_find_or_create_customer()
            .returning(|_, _| Ok("cus_1".to_string()));
        payments
            .expect_create_payment_intent()
            .returning(|_| Err(anyhow!("card_declined")));

        let (usecase, metrics) = usecase(packages, orders, payments, MockResellerGateway::new());
        let err = usecase
            .create_payment_intent(request("esim-greece-7days-1gb-all"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Payment(_)));
        assert_eq!(metrics.snapshot().payments_failed, 1);
    }

    #[tokio::test]
    async fn succeeded_payment_marks_paid_and_fulfills() {
        let paid = order(OrderStatus::Paid);
        let order_id = paid.id;
        let pending = OrderEntity {
            status: OrderStatus::Pending.to_string(),
            ..paid.clone()
        };

        let mut orders = MockOrderRepository::new();
        orders
            .expect_find_by_payment_intent_id()
            .with(eq("pi_1".to_string()))
            .returning(move |_| Ok(Some(pending.clone())));
        orders
            .expect_update_status()
            .with(eq(order_id), eq(OrderStatus::Pending), eq(OrderStatus::Paid))
            .returning(move |_, _, _| Ok(Some(paid.clone())));
        orders
            .expect_claim_fulfillment()
            .with(eq(order_id))
            .times(1)
            .returning(|_| Ok(true));
        orders
            .expect_record_fulfillment()
            .withf(move |id, changes| {
                *id == order_id
                    && changes.reseller_esim_id.as_deref() == Some("8944")
                    && changes.lpa_code.as_deref() == Some("LPA:1$smdp.io$ABC")
                    && changes.fulfillment_error.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_verify_webhook_signature()
            .returning(|_, _| Ok(event("payment_intent.succeeded", json!({ "id": "pi_1", "amount": 499 }))));

        let mut reseller = MockResellerGateway::new();
        reseller
            .expect_create_esim_order()
            .withf(|package_id, quantity| package_id.contains("esim-greece-7days-1gb-all") && *quantity == 1)
            .returning(|_, _| {
                Ok(ResellerOrder {
                    order_id: Some("ro_1".to_string()),
                    esim_id: "8944".to_string(),
                })
            });
        reseller.expect_apply_esim().returning(|_| {
            Ok(EsimActivation {
                lpa_code: Some("LPA:1$smdp.io$ABC".to_string()),
                qr_code_url: Some("https://qr/1.png".to_string()),
                activation_code: Some("ABC".to_string()),
                ios_quick_install: None,
            })
        });

        let (usecase, metrics) = usecase(MockMyPackageRepository::new(), orders, payments, reseller);
        let outcome = usecase.handle_webhook(b"{}", Some("t=1,v1=abc")).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Fulfilled);
        assert_eq!(metrics.snapshot().payments_succeeded, 1);
    }

    #[tokio::test]
    async fn reseller_failure_is_recorded_not_raised() {
        let paid = order(OrderStatus::Paid);
        let pending = OrderEntity {
            status: OrderStatus::Pending.to_string(),
            ..paid.clone()
        };

        let mut orders = MockOrderRepository::new();
        orders
            .expect_find_by_payment_intent_id()
            .returning(move |_| Ok(Some(pending.clone())));
        orders
            .expect_update_status()
            .returning(move |_, _, _| Ok(Some(paid.clone())));
        orders.expect_claim_fulfillment().returning(|_| Ok(true));
        orders
            .expect_record_fulfillment()
            .withf(|_, changes| {
                changes.fulfillment_error.is_some()
                    && changes.lpa_code.as_deref()
                        == Some("LPA:1$esimfly.al$ESIM-AB12-CD34-EF56$$Greece 1GB")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_verify_webhook_signature()
            .returning(|_, _| Ok(event("payment_intent.succeeded", json!({ "id": "pi_1" }))));

        let mut reseller = MockResellerGateway::new();
        reseller
            .expect_create_esim_order()
            .returning(|_, _| Err(RoamifyError::InvalidResponse("no eSIM id".to_string())));
        reseller.expect_apply_esim().never();

        let (usecase, metrics) = usecase(MockMyPackageRepository::new(), orders, payments, reseller);
        let outcome = usecase.handle_webhook(b"{}", Some("t=1,v1=abc")).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::FulfillmentFailed);
        assert_eq!(metrics.snapshot().fulfillment_failures, 1);
    }

    #[tokio::test]
    async fn redelivered_event_is_not_fulfilled_twice() {
        let mut done = order(OrderStatus::Paid);
        done.reseller_esim_id = Some("8944".to_string());

        let mut orders = MockOrderRepository::new();
        orders
            .expect_find_by_payment_intent_id()
            .returning(move |_| Ok(Some(done.clone())));
        orders.expect_update_status().returning(|_, _, _| Ok(None));
        orders.expect_claim_fulfillment().returning(|_| Ok(false));
        orders.expect_record_fulfillment().never();

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_verify_webhook_signature()
            .returning(|_, _| Ok(event("payment_intent.succeeded", json!({ "id": "pi_1" }))));

        let mut reseller = MockResellerGateway::new();
        reseller.expect_create_esim_order().never();

        let (usecase, _) = usecase(MockMyPackageRepository::new(), orders, payments, reseller);
        let outcome = usecase.handle_webhook(b"{}", Some("t=1,v1=abc")).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::AlreadyProcessed);
    }

    #[tokio::test]
    async fn redelivery_during_fulfillment_does_not_order_again() {
        let in_flight = order(OrderStatus::Paid);
        let order_id = in_flight.id;

        let mut orders = MockOrderRepository::new();
        orders
            .expect_find_by_payment_intent_id()
            .returning(move |_| Ok(Some(in_flight.clone())));
        orders.expect_update_status().returning(|_, _, _| Ok(None));
        orders
            .expect_claim_fulfillment()
            .with(eq(order_id))
            .times(1)
            .returning(|_| Ok(false));
        orders.expect_record_fulfillment().never();

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_verify_webhook_signature()
            .returning(|_, _| Ok(event("payment_intent.succeeded", json!({ "id": "pi_1" }))));

        let mut reseller = MockResellerGateway::new();
        reseller.expect_create_esim_order().never();
        reseller.expect_apply_esim().never();

        let (usecase, _) = usecase(MockMyPackageRepository::new(), orders, payments, reseller);
        let outcome = usecase.handle_webhook(b"{}", Some("t=1,v1=abc")).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::AlreadyProcessed);
    }

    #[tokio::test]
    async fn unrecorded_fulfillment_is_an_error() {
        let paid = order(OrderStatus::Paid);
        let pending = OrderEntity {
            status: OrderStatus::Pending.to_string(),
            ..paid.clone()
        };

        let mut orders = MockOrderRepository::new();
        orders
            .expect_find_by_payment_intent_id()
            .returning(move |_| Ok(Some(pending.clone())));
        orders
            .expect_update_status()
            .returning(move |_, _, _| Ok(Some(paid.clone())));
        orders.expect_claim_fulfillment().returning(|_| Ok(true));
        orders
            .expect_record_fulfillment()
            .times(1)
            .returning(|_, _| Err(anyhow!("connection reset")));

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_verify_webhook_signature()
            .returning(|_, _| Ok(event("payment_intent.succeeded", json!({ "id": "pi_1" }))));

        let mut reseller = MockResellerGateway::new();
        reseller.expect_create_esim_order().times(1).returning(|_, _| {
            Ok(ResellerOrder {
                order_id: Some("ro_1".to_string()),
                esim_id: "8944".to_string(),
            })
        });
        reseller.expect_apply_esim().returning(|_| {
            Ok(EsimActivation {
                lpa_code: Some("LPA:1$smdp.io$ABC".to_string()),
                qr_code_url: None,
                activation_code: None,
                ios_quick_install: None,
            })
        });

        let (usecase, _) = usecase(MockMyPackageRepository::new(), orders, payments, reseller);
        assert!(matches!(
            usecase.handle_webhook(b"{}", Some("t=1,v1=abc")).await,
            Err(AppError::Database(_))
        ));
    }

    #[tokio::test]
    async fn bad_signature_is_a_validation_error() {
        let mut payments = MockPaymentGateway::new();
        payments
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow!("signature mismatch")));

        let (usecase, _) = usecase(MockMyPackageRepository::new(), MockOrderRepository::new(), payments, MockResellerGateway::new());
        assert!(matches!(
            usecase.handle_webhook(b"{}", Some("t=1,v1=bad")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            usecase.handle_webhook(b"{}", None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn canceled_intent_cancels_pending_order() {
        let pending = order(OrderStatus::Pending);
        let order_id = pending.id;
        let cancelled = OrderEntity {
            status: OrderStatus::Cancelled.to_string(),
            ..pending.clone()
        };

        let mut orders = MockOrderRepository::new();
        orders
            .expect_find_by_payment_intent_id()
            .returning(move |_| Ok(Some(pending.clone())));
        orders
            .expect_update_status()
            .with(eq(order_id), eq(OrderStatus::Pending), eq(OrderStatus::Cancelled))
            .returning(move |_, _, _| Ok(Some(cancelled.clone())));

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_verify_webhook_signature()
            .returning(|_, _| Ok(event("payment_intent.canceled", json!({ "id": "pi_1" }))));

        let (usecase, _) = usecase(MockMyPackageRepository::new(), orders, payments, MockResellerGateway::new());
        let outcome = usecase.handle_webhook(b"{}", Some("t=1,v1=abc")).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Cancelled);
    }

    #[test]
    fn currency_must_be_an_iso_code() {
        assert_eq!(normalize_currency(None, "eur").unwrap(), "eur");
        assert_eq!(normalize_currency(Some(" USD "), "eur").unwrap(), "usd");
        assert!(normalize_currency(Some("euro"), "eur").is_err());
    }
}
