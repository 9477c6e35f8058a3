mod alert_webhook;
mod config;
mod layer;
pub mod metrics;
mod notifier;

use alert_webhook::AlertWebhookSink;
use anyhow::Result;
use config::ObservabilityConfig;
use layer::AlertLayer;
use notifier::{AlertNotifier, AlertSink};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, filter::LevelFilter};

pub use metrics::{MetricsSnapshot, SystemMetrics};

/// Installs the global subscriber: `RUST_LOG` filtered fmt output with local RFC3339
/// timestamps, plus the alert webhook when `ALERT_WEBHOOK_URL` is configured.
/// Must run inside the Tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);
    let mut warnings = config.warnings.clone();

    let alert_layer = config
        .alert_webhook
        .as_ref()
        .and_then(|alert| match AlertWebhookSink::new(alert.webhook_url.clone()) {
            Ok(sink) => Some((sink, alert.min_level)),
            Err(err) => {
                warnings.push(format!("alert webhook client failed to build: {err}"));
                None
            }
        })
        .map(|(sink, min_level)| {
            let sink: Arc<dyn AlertSink> = Arc::new(sink);
            let notifier = AlertNotifier::spawn(vec![sink]);
            AlertLayer::new(notifier, config.service_context.clone(), min_level)
                .with_filter(LevelFilter::from_level(min_level))
        });
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    let ctx = &config.service_context;
    for warning in &warnings {
        warn!(
            service = %ctx.service_name,
            environment = %ctx.environment,
            component = %ctx.component,
            %warning,
            "observability: config warning"
        );
    }
    info!(
        service = %ctx.service_name,
        environment = %ctx.environment,
        component = %ctx.component,
        alerts_enabled,
        "observability: tracing initialized"
    );

    Ok(())
}
