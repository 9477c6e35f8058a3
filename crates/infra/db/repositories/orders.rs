use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, dsl::exists, insert_into, prelude::*, select, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::orders},
};
use domain::{
    entities::orders::{InsertOrderEntity, OrderEntity, OrderFulfillmentChangeset},
    repositories::orders::OrderRepository,
    value_objects::enums::order_statuses::OrderStatus,
};

pub struct OrderPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderRepository for OrderPostgres {
    async fn insert(&self, order: InsertOrderEntity) -> Result<OrderEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = insert_into(orders::table)
            .values(&order)
            .returning(OrderEntity::as_returning())
            .get_result::<OrderEntity>(&mut conn)?;

        Ok(row)
    }

    async fn esim_code_exists(&self, esim_code: String) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let taken = select(exists(
            orders::table.filter(orders::esim_code.eq(esim_code)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(taken)
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = orders::table
            .filter(orders::id.eq(order_id))
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: String,
    ) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = orders::table
            .filter(orders::payment_intent_id.eq(payment_intent_id))
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = orders::table.into_boxed();
        if let Some(status) = status {
            query = query.filter(orders::status.eq(status.as_str()));
        }

        let rows = query
            .order(orders::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(OrderEntity::as_select())
            .load::<OrderEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn attach_payment_intent(&self, order_id: Uuid, payment_intent_id: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(orders::table.filter(orders::id.eq(order_id)))
            .set((
                orders::payment_intent_id.eq(Some(payment_intent_id)),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn update_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let target = orders::table
            .filter(orders::id.eq(order_id))
            .filter(orders::status.eq(expected.as_str()));

        let row = if next == OrderStatus::Paid {
            update(target)
                .set((
                    orders::status.eq(next.as_str()),
                    orders::paid_at.eq(Some(now)),
                    orders::updated_at.eq(now),
                ))
                .returning(OrderEntity::as_returning())
                .get_result::<OrderEntity>(&mut conn)
                .optional()?
        } else {
            update(target)
                .set((orders::status.eq(next.as_str()), orders::updated_at.eq(now)))
                .returning(OrderEntity::as_returning())
                .get_result::<OrderEntity>(&mut conn)
                .optional()?
        };

        Ok(row)
    }

    async fn mark_refunded(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        refund_id: String,
    ) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let row = update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(expected.as_str())),
        )
        .set((
            orders::status.eq(OrderStatus::Refunded.as_str()),
            orders::refund_id.eq(Some(refund_id)),
            orders::refunded_at.eq(Some(now)),
            orders::updated_at.eq(now),
        ))
        .returning(OrderEntity::as_returning())
        .get_result::<OrderEntity>(&mut conn)
        .optional()?;

        Ok(row)
    }

    async fn claim_fulfillment(&self, order_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let claimed = update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(OrderStatus::Paid.as_str()))
                .filter(orders::fulfillment_started_at.is_null()),
        )
        .set((
            orders::fulfillment_started_at.eq(Some(now)),
            orders::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        Ok(claimed == 1)
    }

    async fn record_fulfillment(
        &self,
        order_id: Uuid,
        fulfillment: OrderFulfillmentChangeset,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(orders::table.filter(orders::id.eq(order_id)))
            .set((&fulfillment, orders::updated_at.eq(Utc::now())))
            .execute(&mut conn)?;

        Ok(())
    }
}
