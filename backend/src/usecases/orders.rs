use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    repositories::orders::OrderRepository,
    value_objects::{
        enums::order_statuses::OrderStatus,
        orders::{ListOrdersQuery, OrderDto},
    },
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::gateways::PaymentGateway;
use crate::axum_http::error_responses::AppError;

pub type UseCaseResult<T> = std::result::Result<T, AppError>;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

pub struct OrderUseCase<O, P>
where
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    order_repo: Arc<O>,
    payments: Arc<P>,
}

impl<O, P> OrderUseCase<O, P>
where
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(order_repo: Arc<O>, payments: Arc<P>) -> Self {
        Self {
            order_repo,
            payments,
        }
    }

    pub async fn list(&self, query: ListOrdersQuery) -> UseCaseResult<Vec<OrderDto>> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let orders = self
            .order_repo
            .list(query.status, limit, offset)
            .await
            .map_err(|err| {
                error!(status = ?query.status, db_error = ?err, "orders: failed to list orders");
                AppError::Database(err)
            })?;
        Ok(orders.into_iter().map(OrderDto::from).collect())
    }

    pub async fn get(&self, order_id: Uuid) -> UseCaseResult<OrderDto> {
        self.order_repo
            .find_by_id(order_id)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "orders: failed to load order");
                AppError::Database(err)
            })?
            .map(OrderDto::from)
            .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    /// Manual status change from the admin panel. Refunds go through [`Self::refund`].
    pub async fn update_status(&self, order_id: Uuid, next: OrderStatus) -> UseCaseResult<OrderDto> {
        if next == OrderStatus::Refunded {
            return Err(AppError::Validation(
                "Use the refund endpoint to refund an order".to_string(),
            ));
        }

        let order = self.get(order_id).await?;
        let current: OrderStatus = order.status.parse().map_err(|err| {
            AppError::Internal(anyhow::anyhow!("order {order_id} has unknown status: {err}"))
        })?;

        if !current.can_transition_to(next) {
            warn!(%order_id, %current, %next, "orders: rejected status transition");
            return Err(AppError::Conflict(format!(
                "Cannot move order from {current} to {next}"
            )));
        }

        let updated = self
            .order_repo
            .update_status(order_id, current, next)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "orders: failed to update status");
                AppError::Database(err)
            })?
            .ok_or_else(|| {
                AppError::Conflict("Order status changed concurrently, reload and retry".to_string())
            })?;

        info!(%order_id, from = %current, to = %next, "orders: status updated");
        Ok(OrderDto::from(updated))
    }

    pub async fn refund(&self, order_id: Uuid) -> UseCaseResult<OrderDto> {
        let order = self
            .order_repo
            .find_by_id(order_id)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let current: OrderStatus = order.status.parse().map_err(|err| {
            AppError::Internal(anyhow::anyhow!("order {order_id} has unknown status: {err}"))
        })?;
        if !current.is_refundable_at(order.created_at, Utc::now()) {
            return Err(AppError::Conflict(format!(
                "Order in status {current} cannot be refunded"
            )));
        }

        let payment_intent_id = order
            .payment_intent_id
            .as_deref()
            .ok_or_else(|| AppError::Conflict("Order has no payment to refund".to_string()))?;

        let refund = self
            .payments
            .create_refund(payment_intent_id, &format!("refund-{order_id}"))
            .await
            .map_err(|err| {
                error!(%order_id, payment_intent_id, error = ?err, "orders: stripe refund failed");
                AppError::Payment("Refund could not be processed".to_string())
            })?;

        let refunded = self
            .order_repo
            .mark_refunded(order_id, current, refund.id.clone())
            .await
            .map_err(|err| {
                error!(%order_id, refund_id = %refund.id, db_error = ?err, "orders: refund issued but not recorded");
                AppError::Database(err)
            })?
            .ok_or_else(|| {
                error!(%order_id, refund_id = %refund.id, "orders: order changed while refunding");
                AppError::Conflict("Order status changed during refund".to_string())
            })?;

        info!(%order_id, refund_id = %refund.id, "orders: order refunded");
        Ok(OrderDto::from(refunded))
    }
}
