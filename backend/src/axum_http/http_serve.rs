use crate::{
    axum_http::{
        default_routers,
        middlewares::track_response_time,
        routers::{self, payments::PaymentRouters},
    },
    config::config_model::DotEnvyConfig,
};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::get,
};
use crates::{
    infra::db::postgres::postgres_connection::PgPoolSquad,
    observability::SystemMetrics,
    payments::stripe_client::StripeClient,
    reseller::roamify_client::{RoamifyClient, RoamifyConfig},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let metrics = Arc::new(SystemMetrics::new());

    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    ));
    let roamify_client = Arc::new(RoamifyClient::new(
        RoamifyConfig {
            api_url: config.roamify.api_url.clone(),
            api_key: config.roamify.api_key.clone(),
            max_retries: config.roamify.max_retries,
            retry_delay: Duration::from_millis(config.roamify.retry_delay_ms),
        },
        Arc::clone(&metrics),
    )?);

    let PaymentRouters { payments, stripe } = routers::payments::routes(
        Arc::clone(&db_pool),
        Arc::clone(&config),
        Arc::clone(&stripe_client),
        Arc::clone(&roamify_client),
        Arc::clone(&metrics),
    );

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/packages", routers::packages::routes(Arc::clone(&db_pool)))
        .nest(
            "/api/sync",
            routers::sync::routes(Arc::clone(&db_pool), Arc::clone(&roamify_client)),
        )
        .nest(
            "/api/admin",
            routers::admin::routes(
                Arc::clone(&db_pool),
                stripe_client,
                roamify_client,
                Arc::clone(&metrics),
            ),
        )
        .nest("/api/payments", payments)
        .nest("/api/stripe", stripe)
        .route("/api/health-check", get(default_routers::health_check))
        .layer(middleware::from_fn_with_state(metrics, track_response_time))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(cors_layer(&config.cors.allowed_origins)?)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(stage = %config.stage, "Server is running on port {}", config.backend_server.port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_rejects_malformed_origins() {
        assert!(cors_layer(&[]).is_ok());
        assert!(cors_layer(&["https://esimfly.al".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
