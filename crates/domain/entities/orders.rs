use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::orders;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = orders)]
pub struct OrderEntity {
    pub id: Uuid,
    pub package_id: Uuid,
    pub package_name: String,
    pub package_slug: Option<String>,
    pub reseller_package_id: Option<String>,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub esim_code: String,
    pub payment_intent_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub reseller_order_id: Option<String>,
    pub reseller_esim_id: Option<String>,
    pub lpa_code: Option<String>,
    pub qr_code_url: Option<String>,
    pub activation_code: Option<String>,
    pub fulfillment_error: Option<String>,
    pub fulfillment_started_at: Option<DateTime<Utc>>,
    pub refund_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = orders)]
pub struct InsertOrderEntity {
    pub package_id: Uuid,
    pub package_name: String,
    pub package_slug: Option<String>,
    pub reseller_package_id: Option<String>,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub esim_code: String,
    pub stripe_customer_id: Option<String>,
}

/// Reseller fulfillment outcome. Fields left `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = orders)]
pub struct OrderFulfillmentChangeset {
    pub reseller_order_id: Option<String>,
    pub reseller_esim_id: Option<String>,
    pub lpa_code: Option<String>,
    pub qr_code_url: Option<String>,
    pub activation_code: Option<String>,
    pub fulfillment_error: Option<String>,
}
