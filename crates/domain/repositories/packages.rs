use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::packages::{CatalogPackageEntity, InsertCatalogPackageEntity};

#[automock]
#[async_trait]
pub trait CatalogPackageRepository {
    /// Inserts new reseller packages and overwrites the ones already stored under the
    /// same `reseller_id`. Returns the number of rows written.
    async fn upsert_by_reseller_id(&self, packages: Vec<InsertCatalogPackageEntity>)
    -> Result<usize>;
    async fn list_all(&self) -> Result<Vec<CatalogPackageEntity>>;
    async fn update_slug(&self, package_id: Uuid, slug: String) -> Result<()>;
    /// Writes a corrected amount together with the slug derived from it.
    async fn update_data_amount(
        &self,
        package_id: Uuid,
        data_amount: f64,
        slug: Option<String>,
    ) -> Result<()>;
}
