use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::my_packages::{
    InsertMyPackageEntity, MyPackageEntity, UpdateMyPackageEntity,
};

#[automock]
#[async_trait]
pub trait MyPackageRepository {
    /// Storefront listing: `visible` and `show_on_frontend` rows only.
    async fn list_visible(
        &self,
        country: Option<String>,
        region: Option<String>,
    ) -> Result<Vec<MyPackageEntity>>;
    /// Every row, newest first.
    async fn list_all(&self) -> Result<Vec<MyPackageEntity>>;
    async fn find_by_id(&self, package_id: Uuid) -> Result<Option<MyPackageEntity>>;
    async fn find_by_slug(&self, slug: String) -> Result<Option<MyPackageEntity>>;
    async fn insert(&self, package: InsertMyPackageEntity) -> Result<MyPackageEntity>;
    async fn update(
        &self,
        package_id: Uuid,
        changes: UpdateMyPackageEntity,
    ) -> Result<Option<MyPackageEntity>>;
    async fn delete(&self, package_id: Uuid) -> Result<bool>;
    async fn delete_many(&self, package_ids: Vec<Uuid>) -> Result<usize>;
    async fn update_slug(&self, package_id: Uuid, slug: String) -> Result<()>;
    /// Writes a corrected amount together with the slug derived from it.
    async fn update_data_amount(
        &self,
        package_id: Uuid,
        data_amount: f64,
        slug: Option<String>,
    ) -> Result<()>;
}
