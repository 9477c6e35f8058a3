use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{my_packages::MyPackageEntity, packages::CatalogPackageEntity};
use crate::domain::value_objects::{
    data_amounts::format_data_amount_for_display,
    package_duplicates::DuplicateAnalysis,
    package_slugs::SlugFields,
    reseller_packages::{PackageDraft, price_to_cents},
    slug_enforcement::BatchSlugEnforcement,
};

pub fn cents_to_price(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Storefront view of a sellable package.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PackageDto {
    pub id: Uuid,
    pub name: String,
    pub country_name: String,
    pub country_code: String,
    pub data_amount: f64,
    pub data_display: String,
    pub days: i32,
    pub price: f64,
    pub slug: Option<String>,
    pub region: Option<String>,
}

impl From<MyPackageEntity> for PackageDto {
    fn from(value: MyPackageEntity) -> Self {
        Self {
            id: value.id,
            data_display: format_data_amount_for_display(value.data_amount),
            name: value.name,
            country_name: value.country_name,
            country_code: value.country_code,
            data_amount: value.data_amount,
            days: value.days,
            price: cents_to_price(value.sale_price_cents),
            slug: value.slug,
            region: value.region,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdminPackageDto {
    pub id: Uuid,
    pub name: String,
    pub country_name: String,
    pub country_code: String,
    pub data_amount: f64,
    pub days: i32,
    pub base_price: f64,
    pub sale_price: f64,
    pub profit: f64,
    pub reseller_id: Option<String>,
    pub region: Option<String>,
    pub slug: Option<String>,
    pub visible: bool,
    pub show_on_frontend: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MyPackageEntity> for AdminPackageDto {
    fn from(value: MyPackageEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            country_name: value.country_name,
            country_code: value.country_code,
            data_amount: value.data_amount,
            days: value.days,
            base_price: cents_to_price(value.base_price_cents),
            sale_price: cents_to_price(value.sale_price_cents),
            profit: cents_to_price(value.sale_price_cents - value.base_price_cents),
            reseller_id: value.reseller_id,
            region: value.region,
            slug: value.slug,
            visible: value.visible,
            show_on_frontend: value.show_on_frontend,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Reseller package after mapping, as shown on the admin catalog page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MappedPackageDto {
    pub name: String,
    pub country_name: String,
    pub country_code: String,
    pub data_amount: f64,
    pub data_display: String,
    pub days: i32,
    pub base_price: f64,
    pub reseller_id: Option<String>,
    pub region: Option<String>,
    pub slug: Option<String>,
}

impl From<PackageDraft> for MappedPackageDto {
    fn from(value: PackageDraft) -> Self {
        Self {
            data_display: format_data_amount_for_display(value.data_amount),
            name: value.name,
            country_name: value.country_name,
            country_code: value.country_code,
            data_amount: value.data_amount,
            days: value.days,
            base_price: cents_to_price(value.base_price_cents),
            reseller_id: value.reseller_id,
            region: value.region,
            slug: value.slug,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResellerCatalogDto {
    pub packages: Vec<MappedPackageDto>,
    pub duplicates: DuplicateAnalysis,
}

/// Admin create/update payload. Prices are major units; profit is always derived.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertPackageRequest {
    pub name: String,
    pub country_name: String,
    pub country_code: String,
    pub data_amount: f64,
    pub days: i32,
    pub base_price: f64,
    pub sale_price: Option<f64>,
    pub reseller_id: Option<String>,
    pub region: Option<String>,
    pub slug: Option<String>,
    pub visible: Option<bool>,
    pub show_on_frontend: Option<bool>,
}

impl UpsertPackageRequest {
    pub fn into_draft(self) -> PackageDraft {
        let base_price_cents = price_to_cents(self.base_price);
        let sale_price_cents = self
            .sale_price
            .map(price_to_cents)
            .unwrap_or(base_price_cents);

        let mut draft = PackageDraft {
            name: self.name.trim().to_string(),
            country_name: self.country_name.trim().to_string(),
            country_code: self.country_code.trim().to_uppercase(),
            data_amount: self.data_amount,
            days: self.days,
            reseller_id: self.reseller_id.filter(|r| !r.trim().is_empty()),
            region: self.region.filter(|r| !r.trim().is_empty()),
            slug: self.slug.filter(|s| !s.trim().is_empty()),
            visible: self.visible.unwrap_or(true),
            show_on_frontend: self.show_on_frontend.unwrap_or(true),
            ..Default::default()
        };
        draft.set_prices(base_price_cents, sale_price_cents);
        draft
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageTable {
    Packages,
    MyPackages,
}

/// Slug-relevant columns of a row from either package table.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PackageSlugRow {
    pub id: Uuid,
    pub table: PackageTable,
    pub name: String,
    pub country_name: String,
    pub days: i32,
    pub data_amount: f64,
    pub slug: Option<String>,
}

impl SlugFields for PackageSlugRow {
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

impl From<&CatalogPackageEntity> for PackageSlugRow {
    fn from(value: &CatalogPackageEntity) -> Self {
        Self {
            id: value.id,
            table: PackageTable::Packages,
            name: value.name.clone(),
            country_name: value.country_name.clone(),
            days: value.days,
            data_amount: value.data_amount,
            slug: value.slug.clone(),
        }
    }
}

impl From<&MyPackageEntity> for PackageSlugRow {
    fn from(value: &MyPackageEntity) -> Self {
        Self {
            id: value.id,
            table: PackageTable::MyPackages,
            name: value.name.clone(),
            country_name: value.country_name.clone(),
            days: value.days,
            data_amount: value.data_amount,
            slug: value.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SlugScanReport {
    pub packages: BatchSlugEnforcement,
    pub my_packages: BatchSlugEnforcement,
    pub updated: usize,
    pub update_failures: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DataAmountFix {
    pub id: Uuid,
    pub table: PackageTable,
    pub name: String,
    pub old_value: f64,
    pub new_value: f64,
    pub old_slug: Option<String>,
    pub new_slug: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DataAmountFixReport {
    pub checked: usize,
    pub fixed: Vec<DataAmountFix>,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SyncReport {
    pub fetched: usize,
    pub upserted: usize,
    pub skipped: usize,
    pub skipped_reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageFilter {
    pub country: Option<String>,
    pub region: Option<String>,
}
