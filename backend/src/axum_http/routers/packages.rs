use crate::usecases::packages::PackageUseCase;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use crates::{
    domain::{
        repositories::my_packages::MyPackageRepository,
        value_objects::{packages::PackageFilter, slug_enforcement::PackageSlugEnforcer},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::my_packages::MyPackagePostgres,
    },
};
use std::sync::Arc;
use tracing::info;

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let my_package_repository = MyPackagePostgres::new(Arc::clone(&db_pool));
    let usecase = PackageUseCase::new(
        Arc::new(my_package_repository),
        PackageSlugEnforcer::default(),
    );

    Router::new()
        .route("/", get(list_packages))
        .route("/:id", get(get_package))
        .with_state(Arc::new(usecase))
}

pub async fn list_packages<R>(
    State(usecase): State<Arc<PackageUseCase<R>>>,
    Query(filter): Query<PackageFilter>,
) -> impl IntoResponse
where
    R: MyPackageRepository + Send + Sync + 'static,
{
    match usecase.list_public(filter).await {
        Ok(packages) => Json(packages).into_response(),
        Err(err) => err.into_response(),
    }
}

/// `id` is either the package UUID or its slug.
pub async fn get_package<R>(
    State(usecase): State<Arc<PackageUseCase<R>>>,
    Path(id): Path<String>,
) -> impl IntoResponse
where
    R: MyPackageRepository + Send + Sync + 'static,
{
    info!(reference = %id, "packages: detail request received");
    match usecase.get_public(&id).await {
        Ok(package) => Json(package).into_response(),
        Err(err) => err.into_response(),
    }
}
