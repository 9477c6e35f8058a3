use crate::{
    auth::AdminUser,
    usecases::{catalog_sync::CatalogSyncUseCase, gateways::ResellerGateway},
};
use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use crates::{
    domain::{
        repositories::packages::CatalogPackageRepository,
        value_objects::slug_enforcement::PackageSlugEnforcer,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::packages::CatalogPackagePostgres,
    },
    reseller::roamify_client::RoamifyClient,
};
use std::sync::Arc;
use tracing::info;

pub fn routes(db_pool: Arc<PgPoolSquad>, reseller: Arc<RoamifyClient>) -> Router {
    let catalog_repository = CatalogPackagePostgres::new(Arc::clone(&db_pool));
    let usecase = CatalogSyncUseCase::new(
        Arc::new(catalog_repository),
        reseller,
        PackageSlugEnforcer::default(),
    );

    Router::new()
        .route("/roamify-packages", post(sync_roamify_packages))
        .with_state(Arc::new(usecase))
}

pub async fn sync_roamify_packages<C, G>(
    State(usecase): State<Arc<CatalogSyncUseCase<C, G>>>,
    AdminUser(admin): AdminUser,
) -> impl IntoResponse
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    G: ResellerGateway + Send + Sync + 'static,
{
    info!(admin = ?admin.user_id, "sync: catalog sync requested");
    match usecase.sync_catalog().await {
        Ok(report) => Json(report).into_response(),
        Err(err) => err.into_response(),
    }
}
