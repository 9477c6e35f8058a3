use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::my_packages},
};
use domain::{
    entities::my_packages::{InsertMyPackageEntity, MyPackageEntity, UpdateMyPackageEntity},
    repositories::my_packages::MyPackageRepository,
};

pub struct MyPackagePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl MyPackagePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl MyPackageRepository for MyPackagePostgres {
    async fn list_visible(
        &self,
        country: Option<String>,
        region: Option<String>,
    ) -> Result<Vec<MyPackageEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = my_packages::table
            .filter(my_packages::visible.eq(true))
            .filter(my_packages::show_on_frontend.eq(true))
            .into_boxed();

        if let Some(country) = country {
            let code = country.to_uppercase();
            query = query.filter(
                my_packages::country_name
                    .ilike(country)
                    .or(my_packages::country_code.eq(code)),
            );
        }
        if let Some(region) = region {
            query = query.filter(my_packages::region.ilike(region));
        }

        let rows = query
            .order((
                my_packages::country_name.asc(),
                my_packages::sale_price_cents.asc(),
            ))
            .select(MyPackageEntity::as_select())
            .load::<MyPackageEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn list_all(&self) -> Result<Vec<MyPackageEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = my_packages::table
            .order(my_packages::created_at.desc())
            .select(MyPackageEntity::as_select())
            .load::<MyPackageEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn find_by_id(&self, package_id: Uuid) -> Result<Option<MyPackageEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = my_packages::table
            .filter(my_packages::id.eq(package_id))
            .select(MyPackageEntity::as_select())
            .first::<MyPackageEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }

    async fn find_by_slug(&self, slug: String) -> Result<Option<MyPackageEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = my_packages::table
            .filter(my_packages::slug.eq(slug))
            .order(my_packages::created_at.desc())
            .select(MyPackageEntity::as_select())
            .first::<MyPackageEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }

    async fn insert(&self, package: InsertMyPackageEntity) -> Result<MyPackageEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = insert_into(my_packages::table)
            .values(&package)
            .returning(MyPackageEntity::as_returning())
            .get_result::<MyPackageEntity>(&mut conn)?;

        Ok(row)
    }

    async fn update(
        &self,
        package_id: Uuid,
        changes: UpdateMyPackageEntity,
    ) -> Result<Option<MyPackageEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = update(my_packages::table.filter(my_packages::id.eq(package_id)))
            .set(&changes)
            .returning(MyPackageEntity::as_returning())
            .get_result::<MyPackageEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }

    async fn delete(&self, package_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted =
            delete(my_packages::table.filter(my_packages::id.eq(package_id))).execute(&mut conn)?;

        Ok(deleted > 0)
    }

    async fn delete_many(&self, package_ids: Vec<Uuid>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(my_packages::table.filter(my_packages::id.eq_any(package_ids)))
            .execute(&mut conn)?;

        Ok(deleted)
    }

    async fn update_slug(&self, package_id: Uuid, slug: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(my_packages::table.filter(my_packages::id.eq(package_id)))
            .set((
                my_packages::slug.eq(Some(slug)),
                my_packages::updated_at.eq(Utc::now()),
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

        update(my_packages::table.filter(my_packages::id.eq(package_id)))
            .set((
                my_packages::data_amount.eq(data_amount),
                my_packages::slug.eq(slug),
                my_packages::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
