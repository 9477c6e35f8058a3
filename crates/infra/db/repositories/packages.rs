use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::packages},
};
use domain::{
    entities::packages::{CatalogPackageEntity, InsertCatalogPackageEntity},
    repositories::packages::CatalogPackageRepository,
};

pub struct CatalogPackagePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CatalogPackagePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CatalogPackageRepository for CatalogPackagePostgres {
    async fn upsert_by_reseller_id(
        &self,
        rows: Vec<InsertCatalogPackageEntity>,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let written = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let mut written = 0;
            for package in &rows {
                written += insert_into(packages::table)
                    .values(package)
                    .on_conflict(packages::reseller_id)
                    .do_update()
                    .set(package)
                    .execute(conn)?;
            }
            Ok(written)
        })?;

        Ok(written)
    }

    async fn list_all(&self) -> Result<Vec<CatalogPackageEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = packages::table
            .order(packages::created_at.desc())
            .select(CatalogPackageEntity::as_select())
            .load::<CatalogPackageEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn update_slug(&self, package_id: Uuid, slug: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(packages::table.filter(packages::id.eq(package_id)))
            .set((
                packages::slug.eq(Some(slug)),
                packages::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn update_data_amount(
        &self,
        package_id: Uuid,
        data_amount: f64,
        slug: Option<String>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(packages::table.filter(packages::id.eq(package_id)))
            .set((
                packages::data_amount.eq(data_amount),
                packages::slug.eq(slug),
                packages::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
