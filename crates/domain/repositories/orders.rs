use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::orders::{InsertOrderEntity, OrderEntity, OrderFulfillmentChangeset},
    value_objects::enums::order_statuses::OrderStatus,
};

#[automock]
#[async_trait]
pub trait OrderRepository {
    async fn insert(&self, order: InsertOrderEntity) -> Result<OrderEntity>;
    async fn esim_code_exists(&self, esim_code: String) -> Result<bool>;
    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>>;
    async fn find_by_payment_intent_id(&self, payment_intent_id: String)
    -> Result<Option<OrderEntity>>;
    async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OrderEntity>>;
    async fn attach_payment_intent(&self, order_id: Uuid, payment_intent_id: String)
    -> Result<()>;
    /// Compare-and-set on the status column. `None` means the order was not in
    /// `expected` any more (or does not exist).
    async fn update_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<OrderEntity>>;
    async fn mark_refunded(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        refund_id: String,
    ) -> Result<Option<OrderEntity>>;
    /// Marks a paid order as being fulfilled. Returns `false` when another
    /// delivery already holds the claim, so the reseller is ordered from once.
    async fn claim_fulfillment(&self, order_id: Uuid) -> Result<bool>;
    async fn record_fulfillment(
        &self,
        order_id: Uuid,
        fulfillment: OrderFulfillmentChangeset,
    ) -> Result<()>;
}
