use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::{StatusCode, header::AUTHORIZATION};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    domain::value_objects::reseller_packages::RoamifyCatalogResponse,
    observability::SystemMetrics,
};

pub const DEFAULT_ROAMIFY_API_URL: &str = "https://api.getroamify.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RoamifyError {
    #[error("roamify returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("roamify request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected roamify response: {0}")]
    InvalidResponse(String),
}

impl RoamifyError {
    /// Client errors are final. Everything else may succeed on another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RoamifyError::Status { status, .. } => !status.is_client_error(),
            RoamifyError::Transport(_) => true,
            RoamifyError::InvalidResponse(_) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoamifyConfig {
    pub api_url: String,
    pub api_key: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResellerOrder {
    pub order_id: Option<String>,
    pub esim_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EsimActivation {
    pub lpa_code: Option<String>,
    pub qr_code_url: Option<String>,
    pub activation_code: Option<String>,
    pub ios_quick_install: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderData {
    id: Option<String>,
    order_id: Option<String>,
    #[serde(default)]
    items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
struct OrderItem {
    #[serde(rename = "esimId")]
    esim_id: Option<String>,
    iccid: Option<String>,
    esim_code: Option<String>,
    code: Option<String>,
}

impl OrderItem {
    fn esim_id(&self) -> Option<&str> {
        [&self.esim_id, &self.iccid, &self.esim_code, &self.code]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .find(|v| !v.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApplyData {
    esim: Option<ApplyEsim>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyEsim {
    lpa_code: Option<String>,
    qr_code_url: Option<String>,
    activation_code: Option<String>,
    ios_quick_install: Option<String>,
}

/// Bearer-token client for the Roamify reseller API. Every attempt is recorded in
/// [`SystemMetrics`].
pub struct RoamifyClient {
    http: reqwest::Client,
    config: RoamifyConfig,
    metrics: Arc<SystemMetrics>,
}

impl RoamifyClient {
    pub fn new(config: RoamifyConfig, metrics: Arc<SystemMetrics>) -> Result<Self, RoamifyError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            config,
            metrics,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, RoamifyError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RoamifyError::Status { status, body });
        }
        Ok(resp.json::<T>().await?)
    }

    /// Up to `max_retries` attempts, `retry_delay * attempt` apart. Client errors are
    /// returned immediately.
    async fn with_retries<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RoamifyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RoamifyError>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt: u32 = 1;

        loop {
            let started = Instant::now();
            let result = call().await;
            self.metrics
                .track_reseller_call(result.is_ok(), started.elapsed());

            match result {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= max_attempts || !err.is_retryable() => {
                    error!(operation, attempt, error = %err, "roamify: request failed");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.config.retry_delay * attempt;
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "roamify: attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// `GET /api/esim/packages`
    pub async fn list_packages(&self) -> Result<RoamifyCatalogResponse, RoamifyError> {
        self.with_retries("list_packages", || async {
            let resp = self
                .http
                .get(self.url("/api/esim/packages"))
                .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
                .send()
                .await?;
            Self::read_json::<RoamifyCatalogResponse>(resp).await
        })
        .await
    }

    /// `POST /api/esim/order` for a single package.
    pub async fn create_esim_order(
        &self,
        package_id: &str,
        quantity: u32,
    ) -> Result<ResellerOrder, RoamifyError> {
        let payload = json!({ "items": [{ "packageId": package_id, "quantity": quantity }] });

        let order = self
            .with_retries("create_esim_order", || async {
                let resp = self
                    .http
                    .post(self.url("/api/esim/order"))
                    .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
                    .json(&payload)
                    .send()
                    .await?;
                let envelope = Self::read_json::<Envelope<OrderData>>(resp).await?;
                parse_order(envelope)
            })
            .await?;

        info!(
            package_id,
            reseller_order_id = ?order.order_id,
            esim_id = %order.esim_id,
            "roamify: esim order created"
        );
        Ok(order)
    }

    /// `POST /api/esim/apply`: activation material for an ordered eSIM.
    pub async fn apply_esim(&self, esim_id: &str) -> Result<EsimActivation, RoamifyError> {
        let payload = json!({ "esimId": esim_id });

        self.with_retries("apply_esim", || async {
            let resp = self
                .http
                .post(self.url("/api/esim/apply"))
                .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
                .json(&payload)
                .send()
                .await?;
            let envelope = Self::read_json::<Envelope<ApplyData>>(resp).await?;
            parse_activation(envelope)
        })
        .await
    }

    /// `GET /api/health`, single attempt.
    pub async fn check_health(&self) -> bool {
        let started = Instant::now();
        let result = self
            .http
            .get(self.url("/api/health"))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;
        let healthy = matches!(&result, Ok(resp) if resp.status() == StatusCode::OK);
        self.metrics.track_reseller_call(healthy, started.elapsed());

        if let Err(err) = result {
            warn!(error = %err, "roamify: health check failed");
        }
        healthy
    }
}

fn parse_order(envelope: Envelope<OrderData>) -> Result<ResellerOrder, RoamifyError> {
    let data = envelope
        .data
        .ok_or_else(|| RoamifyError::InvalidResponse("order response has no data".to_string()))?;
    let esim_id = data
        .items
        .first()
        .and_then(OrderItem::esim_id)
        .ok_or_else(|| RoamifyError::InvalidResponse("order response has no eSIM id".to_string()))?
        .to_string();

    Ok(ResellerOrder {
        order_id: data.id.or(data.order_id),
        esim_id,
    })
}

fn parse_activation(envelope: Envelope<ApplyData>) -> Result<EsimActivation, RoamifyError> {
    if envelope.status.as_deref() != Some("success") {
        return Err(RoamifyError::InvalidResponse(format!(
            "apply returned status {:?}",
            envelope.status
        )));
    }
    let esim = envelope
        .data
        .and_then(|d| d.esim)
        .ok_or_else(|| RoamifyError::InvalidResponse("apply response has no eSIM".to_string()))?;

    Ok(EsimActivation {
        lpa_code: esim.lpa_code,
        qr_code_url: esim.qr_code_url,
        activation_code: esim.activation_code,
        ios_quick_install: esim.ios_quick_install,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn client(max_retries: u32) -> (RoamifyClient, Arc<SystemMetrics>) {
        let metrics = Arc::new(SystemMetrics::new());
        let client = RoamifyClient::new(
            RoamifyConfig {
                api_url: "http://127.0.0.1:9/".to_string(),
                api_key: "test".to_string(),
                max_retries,
                retry_delay: Duration::ZERO,
            },
            Arc::clone(&metrics),
        )
        .unwrap();
        (client, metrics)
    }

    #[test]
    fn urls_join_without_double_slash() {
        let (client, _) = client(3);
        assert_eq!(
            client.url("/api/esim/packages"),
            "http://127.0.0.1:9/api/esim/packages"
        );
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_limit() {
        let (client, metrics) = client(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = client
            .with_retries("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RoamifyError::Status {
                    status: StatusCode::BAD_GATEWAY,
                    body: String::new(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.reseller_api_calls, 3);
        assert_eq!(snapshot.reseller_api_errors, 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (client, metrics) = client(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = client
            .with_retries("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RoamifyError::Status {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                    body: "bad package".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(RoamifyError::Status { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.snapshot().reseller_api_errors, 1);
    }

    #[tokio::test]
    async fn recovers_after_a_transient_failure() {
        let (client, metrics) = client(3);
        let calls = AtomicU32::new(0);

        let result = client
            .with_retries("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(RoamifyError::InvalidResponse("empty".to_string()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.reseller_api_calls, 2);
        assert_eq!(snapshot.reseller_api_errors, 1);
    }

    #[test]
    fn order_esim_id_falls_back_through_aliases() {
        let envelope: Envelope<OrderData> = serde_json::from_value(json!({
            "data": { "orderId": "ord_1", "items": [{ "iccid": "8944" }] }
        }))
        .unwrap();
        let order = parse_order(envelope).unwrap();
        assert_eq!(order.order_id.as_deref(), Some("ord_1"));
        assert_eq!(order.esim_id, "8944");
    }

    #[test]
    fn order_without_esim_id_is_rejected() {
        let envelope: Envelope<OrderData> =
            serde_json::from_value(json!({ "data": { "id": "ord_1", "items": [{}] } })).unwrap();
        assert!(matches!(
            parse_order(envelope),
            Err(RoamifyError::InvalidResponse(_))
        ));
    }

    #[test]
    fn activation_requires_success_status() {
        let ok: Envelope<ApplyData> = serde_json::from_value(json!({
            "status": "success",
            "data": { "esim": {
                "lpaCode": "LPA:1$smdp.io$CODE",
                "qrCodeUrl": "https://qr/1.png",
                "activationCode": "CODE",
                "iosQuickInstall": "https://esimsetup.apple.com/1"
            }}
        }))
        .unwrap();
        let activation = parse_activation(ok).unwrap();
        assert_eq!(activation.lpa_code.as_deref(), Some("LPA:1$smdp.io$CODE"));

        let failed: Envelope<ApplyData> =
            serde_json::from_value(json!({ "status": "error" })).unwrap();
        assert!(parse_activation(failed).is_err());
    }
}
