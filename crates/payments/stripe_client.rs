use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
/// Signed webhook payloads older than this are rejected as replays.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Minimal Stripe client built on reqwest. Amounts are in minor units.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripePaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripePaymentError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripeRefund {
    pub id: String,
    pub status: Option<String>,
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePaymentIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub customer_id: Option<String>,
    pub receipt_email: Option<String>,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
    /// Sent as `Idempotency-Key` so a retried request never charges twice.
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: STRIPE_API_BASE.to_string(),
            secret_key,
            webhook_secret,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .map(|envelope| envelope.error)
            .ok();

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        let message = details
            .and_then(|d| d.message)
            .unwrap_or_else(|| status.to_string());
        bail!("Stripe API request failed: {context}: {message} (request_id={request_id:?})");
    }

    /// https://stripe.com/docs/api/customers/list
    pub async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .get(format!("{}/v1/customers", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "list customers").await?;

        let customers: StripeList<StripeCustomer> = resp.json().await?;
        Ok(customers.data.into_iter().next().map(|c| c.id))
    }

    /// https://stripe.com/docs/api/customers/create
    pub async fn create_customer(&self, email: &str, name: Option<&str>) -> Result<String> {
        let mut body = vec![("email", email.to_string())];
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            body.push(("name", name.to_string()));
        }

        let resp = self
            .http
            .post(format!("{}/v1/customers", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create customer").await?;

        let customer: StripeCustomer = resp.json().await?;
        Ok(customer.id)
    }

    /// https://stripe.com/docs/api/payment_intents/create
    pub async fn create_payment_intent(
        &self,
        request: &CreatePaymentIntent,
    ) -> Result<StripePaymentIntent> {
        let resp = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&payment_intent_form(request))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create payment intent").await?;

        let intent: StripePaymentIntent = resp.json().await?;
        Ok(intent)
    }

    /// Full refund of a PaymentIntent. https://stripe.com/docs/api/refunds/create
    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: &str,
    ) -> Result<StripeRefund> {
        let body = [
            ("payment_intent", payment_intent_id.to_string()),
            ("reason", "requested_by_customer".to_string()),
        ];

        let resp = self
            .http
            .post(format!("{}/v1/refunds", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header("Idempotency-Key", idempotency_key)
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create refund").await?;

        let refund: StripeRefund = resp.json().await?;
        Ok(refund)
    }

    /// Verifies the `Stripe-Signature` header. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        verify_signature_at(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
        )?;
        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }

    pub fn extract_payment_intent(event: &StripeEvent) -> Option<StripePaymentIntent> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}

fn payment_intent_form(request: &CreatePaymentIntent) -> Vec<(String, String)> {
    let mut body = vec![
        ("amount".to_string(), request.amount_minor.to_string()),
        ("currency".to_string(), request.currency.to_lowercase()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    if let Some(customer) = &request.customer_id {
        body.push(("customer".to_string(), customer.clone()));
    }
    if let Some(email) = &request.receipt_email {
        body.push(("receipt_email".to_string(), email.clone()));
    }
    if let Some(description) = &request.description {
        body.push(("description".to_string(), description.clone()));
    }

    let mut metadata: Vec<_> = request.metadata.iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        body.push((format!("metadata[{key}]"), value.clone()));
    }
    body
}

fn verify_signature_at(
    webhook_secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.ok_or_else(|| anyhow!("missing timestamp in stripe-signature"))?;
    if signatures.is_empty() {
        bail!("missing v1 in stripe-signature");
    }

    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| anyhow!("invalid timestamp in stripe-signature"))?;
    if (now - signed_at).abs() > WEBHOOK_TOLERANCE_SECS {
        bail!("webhook timestamp outside tolerance");
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Stripe sends several v1 entries while a secret is being rolled.
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|provided| mac.clone().verify_slice(&provided).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        bail!("invalid webhook signature");
    }
    Ok(())
}
