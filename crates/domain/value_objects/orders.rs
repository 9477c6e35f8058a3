use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::orders::OrderEntity,
    value_objects::{enums::order_statuses::OrderStatus, packages::cents_to_price},
};

/// `package_id` may be the package UUID or its slug.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    pub package_id: String,
    pub email: String,
    pub name: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub order_id: Uuid,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderDto {
    pub id: Uuid,
    pub package_id: Uuid,
    pub package_name: String,
    pub package_slug: Option<String>,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub esim_code: String,
    pub payment_intent_id: Option<String>,
    pub reseller_order_id: Option<String>,
    pub lpa_code: Option<String>,
    pub qr_code_url: Option<String>,
    pub activation_code: Option<String>,
    pub fulfillment_error: Option<String>,
    pub refund_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<OrderEntity> for OrderDto {
    fn from(value: OrderEntity) -> Self {
        Self {
            id: value.id,
            package_id: value.package_id,
            package_name: value.package_name,
            package_slug: value.package_slug,
            customer_email: value.customer_email,
            customer_name: value.customer_name,
            amount: cents_to_price(value.amount_cents),
            currency: value.currency,
            status: value.status,
            esim_code: value.esim_code,
            payment_intent_id: value.payment_intent_id,
            reseller_order_id: value.reseller_order_id,
            lpa_code: value.lpa_code,
            qr_code_url: value.qr_code_url,
            activation_code: value.activation_code,
            fulfillment_error: value.fulfillment_error,
            refund_id: value.refund_id,
            paid_at: value.paid_at,
            refunded_at: value.refunded_at,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// What the webhook did with an event. Always acknowledged to Stripe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Fulfilled,
    FulfillmentFailed,
    AlreadyProcessed,
    PaymentFailed,
    Cancelled,
    Ignored,
}
