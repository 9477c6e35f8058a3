use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        package_slugs::{SlugFields, SlugFieldsMut},
        reseller_packages::PackageDraft,
    },
    infra::db::postgres::schema::packages,
};

/// Row of the synced reseller catalog.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = packages)]
pub struct CatalogPackageEntity {
    pub id: Uuid,
    pub name: String,
    pub country_name: String,
    pub country_code: String,
    pub data_amount: f64,
    pub days: i32,
    pub base_price_cents: i64,
    pub sale_price_cents: i64,
    pub profit_cents: i64,
    pub reseller_id: Option<String>,
    pub region: Option<String>,
    pub slug: Option<String>,
    pub visible: bool,
    pub show_on_frontend: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Also used as the changeset when an upsert hits an existing `reseller_id`.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = packages)]
pub struct InsertCatalogPackageEntity {
    pub name: String,
    pub country_name: String,
    pub country_code: String,
    pub data_amount: f64,
    pub days: i32,
    pub base_price_cents: i64,
    pub sale_price_cents: i64,
    pub profit_cents: i64,
    pub reseller_id: Option<String>,
    pub region: Option<String>,
    pub slug: Option<String>,
    pub visible: bool,
    pub show_on_frontend: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<PackageDraft> for InsertCatalogPackageEntity {
    fn from(value: PackageDraft) -> Self {
        Self {
            name: value.name,
            country_name: value.country_name,
            country_code: value.country_code,
            data_amount: value.data_amount,
            days: value.days,
            base_price_cents: value.base_price_cents,
            sale_price_cents: value.sale_price_cents,
            profit_cents: value.sale_price_cents - value.base_price_cents,
            reseller_id: value.reseller_id,
            region: value.region,
            slug: value.slug,
            visible: value.visible,
            show_on_frontend: value.show_on_frontend,
            updated_at: Utc::now(),
        }
    }
}

impl SlugFields for CatalogPackageEntity {
    fn country_name(&self) -> &str {
        &self.country_name
    }

    fn days(&self) -> i32 {
        self.days
    }

    fn data_amount(&self) -> f64 {
        self.data_amount
    }

    fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }
}

impl SlugFieldsMut for CatalogPackageEntity {
    fn set_slug(&mut self, slug: String) {
        self.slug = Some(slug);
    }
}
