use crate::{
    axum_http::middlewares::{RateLimiter, rate_limit},
    config::config_model::DotEnvyConfig,
    usecases::{
        gateways::{PaymentGateway, ResellerGateway},
        payments::{CheckoutSettings, PaymentUseCase},
    },
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    middleware,
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::{
        repositories::{my_packages::MyPackageRepository, orders::OrderRepository},
        value_objects::orders::CreatePaymentIntentRequest,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{my_packages::MyPackagePostgres, orders::OrderPostgres},
    },
    observability::SystemMetrics,
    payments::stripe_client::StripeClient,
    reseller::roamify_client::RoamifyClient,
};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tracing::info;

/// Checkout and the Stripe webhook share one use case; they are mounted at
/// `/api/payments` and `/api/stripe` respectively.
pub struct PaymentRouters {
    pub payments: Router,
    pub stripe: Router,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    stripe_client: Arc<StripeClient>,
    reseller: Arc<RoamifyClient>,
    metrics: Arc<SystemMetrics>,
) -> PaymentRouters {
    let my_package_repository = MyPackagePostgres::new(Arc::clone(&db_pool));
    let order_repository = OrderPostgres::new(Arc::clone(&db_pool));

    let usecase = Arc::new(PaymentUseCase::new(
        Arc::new(my_package_repository),
        Arc::new(order_repository),
        stripe_client,
        reseller,
        metrics,
        CheckoutSettings {
            default_currency: config.orders.default_currency.clone(),
            esim_provider_host: config.orders.esim_provider_host.clone(),
        },
    ));

    let limiter = Arc::new(RateLimiter::new(
        config.orders.rate_limit_max,
        Duration::from_secs(config.orders.rate_limit_window_secs),
    ));

    let payments = Router::new()
        .route("/create-intent", post(create_payment_intent))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit))
        .with_state(Arc::clone(&usecase));

    let stripe = Router::new()
        .route("/webhook", post(stripe_webhook))
        .with_state(usecase);

    PaymentRouters { payments, stripe }
}

pub async fn create_payment_intent<M, O, P, G>(
    State(usecase): State<Arc<PaymentUseCase<M, O, P, G>>>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> impl IntoResponse
where
    M: MyPackageRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
    G: ResellerGateway + Send + Sync + 'static,
{
    info!(package = %request.package_id, "payments: create intent request received");
    match usecase.create_payment_intent(request).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Takes the raw body; the signature is computed over the exact bytes Stripe sent.
pub async fn stripe_webhook<M, O, P, G>(
    State(usecase): State<Arc<PaymentUseCase<M, O, P, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    M: MyPackageRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
    G: ResellerGateway + Send + Sync + 'static,
{
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    match usecase.handle_webhook(&body, signature).await {
        Ok(outcome) => Json(json!({ "received": true, "outcome": outcome })).into_response(),
        Err(err) => err.into_response(),
    }
}
