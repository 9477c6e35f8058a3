use crate::{
    auth::AdminUser,
    axum_http::error_responses::AppError,
    usecases::{
        catalog_sync::CatalogSyncUseCase,
        gateways::{PaymentGateway, ResellerGateway},
        orders::OrderUseCase,
        package_maintenance::PackageMaintenanceUseCase,
        packages::PackageUseCase,
    },
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use chrono::Utc;
use crates::{
    domain::{
        repositories::{
            my_packages::MyPackageRepository, orders::OrderRepository,
            packages::CatalogPackageRepository,
        },
        value_objects::{
            orders::{ListOrdersQuery, UpdateOrderStatusRequest},
            packages::UpsertPackageRequest,
            slug_enforcement::PackageSlugEnforcer,
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            my_packages::MyPackagePostgres, orders::OrderPostgres,
            packages::CatalogPackagePostgres,
        },
    },
    observability::SystemMetrics,
    payments::stripe_client::StripeClient,
    reseller::roamify_client::RoamifyClient,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct AdminMetricsState<G>
where
    G: ResellerGateway + Send + Sync + 'static,
{
    metrics: Arc<SystemMetrics>,
    reseller: Arc<G>,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    reseller: Arc<RoamifyClient>,
    metrics: Arc<SystemMetrics>,
) -> Router {
    let catalog_repository = Arc::new(CatalogPackagePostgres::new(Arc::clone(&db_pool)));
    let my_package_repository = Arc::new(MyPackagePostgres::new(Arc::clone(&db_pool)));
    let order_repository = Arc::new(OrderPostgres::new(Arc::clone(&db_pool)));
    let slug_enforcer = PackageSlugEnforcer::default();

    let catalog_usecase = CatalogSyncUseCase::new(
        Arc::clone(&catalog_repository),
        Arc::clone(&reseller),
        slug_enforcer,
    );
    let package_usecase = PackageUseCase::new(Arc::clone(&my_package_repository), slug_enforcer);
    let maintenance_usecase =
        PackageMaintenanceUseCase::new(catalog_repository, my_package_repository, slug_enforcer);
    let order_usecase = OrderUseCase::new(order_repository, stripe_client);

    let catalog = Router::new()
        .route("/roamify-packages", get(list_reseller_packages))
        .with_state(Arc::new(catalog_usecase));

    let my_packages = Router::new()
        .route("/my-packages", get(list_my_packages).post(create_my_package))
        .route("/my-packages/:id", put(update_my_package).delete(delete_my_package))
        .with_state(Arc::new(package_usecase));

    let maintenance = Router::new()
        .route("/deduplicate-packages", post(deduplicate_packages))
        .route("/slug-validation", get(slug_validation))
        .route("/slug-enforcement", post(slug_enforcement))
        .route("/fix-data-amounts", post(fix_data_amounts))
        .with_state(Arc::new(maintenance_usecase));

    let monitoring = Router::new()
        .route("/metrics", get(system_metrics))
        .route("/metrics/reset", post(reset_metrics))
        .with_state(Arc::new(AdminMetricsState { metrics, reseller }));

    let orders = Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/orders/:id/refund", post(refund_order))
        .with_state(Arc::new(order_usecase));

    Router::new()
        .merge(catalog)
        .merge(my_packages)
        .merge(maintenance)
        .merge(monitoring)
        .merge(orders)
}

fn parse_id(raw: &str, resource: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::Validation(format!("{resource} id must be a valid UUID")))
}

pub async fn list_reseller_packages<C, G>(
    State(usecase): State<Arc<CatalogSyncUseCase<C, G>>>,
    _admin: AdminUser,
) -> impl IntoResponse
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    G: ResellerGateway + Send + Sync + 'static,
{
    match usecase.reseller_catalog().await {
        Ok(catalog) => Json(catalog).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn list_my_packages<R>(
    State(usecase): State<Arc<PackageUseCase<R>>>,
    _admin: AdminUser,
) -> impl IntoResponse
where
    R: MyPackageRepository + Send + Sync + 'static,
{
    match usecase.list_admin().await {
        Ok(packages) => Json(packages).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn create_my_package<R>(
    State(usecase): State<Arc<PackageUseCase<R>>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<UpsertPackageRequest>,
) -> impl IntoResponse
where
    R: MyPackageRepository + Send + Sync + 'static,
{
    info!(admin = ?admin.user_id, name = %request.name, "admin: create package request received");
    match usecase.create(request).await {
        Ok(package) => (StatusCode::CREATED, Json(package)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn update_my_package<R>(
    State(usecase): State<Arc<PackageUseCase<R>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<UpsertPackageRequest>,
) -> impl IntoResponse
where
    R: MyPackageRepository + Send + Sync + 'static,
{
    let package_id = match parse_id(&id, "Package") {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    info!(admin = ?admin.user_id, %package_id, "admin: update package request received");
    match usecase.update(package_id, request).await {
        Ok(package) => Json(package).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn delete_my_package<R>(
    State(usecase): State<Arc<PackageUseCase<R>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> impl IntoResponse
where
    R: MyPackageRepository + Send + Sync + 'static,
{
    let package_id = match parse_id(&id, "Package") {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    info!(admin = ?admin.user_id, %package_id, "admin: delete package request received");
    match usecase.delete(package_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn deduplicate_packages<C, M>(
    State(usecase): State<Arc<PackageMaintenanceUseCase<C, M>>>,
    AdminUser(admin): AdminUser,
) -> impl IntoResponse
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    M: MyPackageRepository + Send + Sync + 'static,
{
    info!(admin = ?admin.user_id, "admin: deduplication requested");
    match usecase.deduplicate_my_packages().await {
        Ok(plan) => Json(plan).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn slug_validation<C, M>(
    State(usecase): State<Arc<PackageMaintenanceUseCase<C, M>>>,
    _admin: AdminUser,
) -> impl IntoResponse
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    M: MyPackageRepository + Send + Sync + 'static,
{
    match usecase.validate_all_slugs().await {
        Ok(overview) => Json(overview).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn slug_enforcement<C, M>(
    State(usecase): State<Arc<PackageMaintenanceUseCase<C, M>>>,
    AdminUser(admin): AdminUser,
) -> impl IntoResponse
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    M: MyPackageRepository + Send + Sync + 'static,
{
    info!(admin = ?admin.user_id, "admin: slug scan requested");
    match usecase.scan_and_fix_slugs().await {
        Ok(report) => Json(report).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn fix_data_amounts<C, M>(
    State(usecase): State<Arc<PackageMaintenanceUseCase<C, M>>>,
    AdminUser(admin): AdminUser,
) -> impl IntoResponse
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    M: MyPackageRepository + Send + Sync + 'static,
{
    info!(admin = ?admin.user_id, "admin: data amount fix requested");
    match usecase.fix_data_amounts().await {
        Ok(report) => Json(report).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn system_metrics<G>(
    State(state): State<Arc<AdminMetricsState<G>>>,
    _admin: AdminUser,
) -> impl IntoResponse
where
    G: ResellerGateway + Send + Sync + 'static,
{
    let reseller_healthy = state.reseller.check_health().await;
    Json(json!({
        "metrics": state.metrics.snapshot(),
        "reseller_healthy": reseller_healthy,
        "checked_at": Utc::now(),
    }))
}

pub async fn reset_metrics<G>(
    State(state): State<Arc<AdminMetricsState<G>>>,
    AdminUser(admin): AdminUser,
) -> impl IntoResponse
where
    G: ResellerGateway + Send + Sync + 'static,
{
    state.metrics.reset();
    info!(admin = ?admin.user_id, "admin: metrics reset");
    StatusCode::NO_CONTENT
}

pub async fn list_orders<O, P>(
    State(usecase): State<Arc<OrderUseCase<O, P>>>,
    _admin: AdminUser,
    Query(query): Query<ListOrdersQuery>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    match usecase.list(query).await {
        Ok(orders) => Json(orders).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_order<O, P>(
    State(usecase): State<Arc<OrderUseCase<O, P>>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    let order_id = match parse_id(&id, "Order") {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match usecase.get(order_id).await {
        Ok(order) => Json(order).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn update_order_status<O, P>(
    State(usecase): State<Arc<OrderUseCase<O, P>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    let order_id = match parse_id(&id, "Order") {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    info!(admin = ?admin.user_id, %order_id, status = %request.status, "admin: order status change requested");
    match usecase.update_status(order_id, request.status).await {
        Ok(order) => Json(order).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn refund_order<O, P>(
    State(usecase): State<Arc<OrderUseCase<O, P>>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: PaymentGateway + Send + Sync + 'static,
{
    let order_id = match parse_id(&id, "Order") {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    info!(admin = ?admin.user_id, %order_id, "admin: refund requested");
    match usecase.refund(order_id).await {
        Ok(order) => Json(order).into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_ids_are_validation_errors() {
        let err = parse_id("not-a-uuid", "Order").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Order id must be a valid UUID");
        assert!(parse_id(&Uuid::new_v4().to_string(), "Order").is_ok());
    }
}
