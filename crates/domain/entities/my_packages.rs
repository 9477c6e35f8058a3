use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        package_duplicates::DedupRow,
        package_slugs::{SlugFields, SlugFieldsMut},
        reseller_packages::PackageDraft,
    },
    infra::db::postgres::schema::my_packages,
};

/// Curated package the storefront sells.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = my_packages)]
pub struct MyPackageEntity {
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

impl MyPackageEntity {
    pub fn to_draft(&self) -> PackageDraft {
        PackageDraft {
            name: self.name.clone(),
            country_name: self.country_name.clone(),
            country_code: self.country_code.clone(),
            data_amount: self.data_amount,
            days: self.days,
            base_price_cents: self.base_price_cents,
            sale_price_cents: self.sale_price_cents,
            profit_cents: self.sale_price_cents - self.base_price_cents,
            reseller_id: self.reseller_id.clone(),
            region: self.region.clone(),
            slug: self.slug.clone(),
            visible: self.visible,
            show_on_frontend: self.show_on_frontend,
        }
    }

    /// Weighted count of filled-in fields. The reseller id and pricing weigh the most.
    pub fn completeness_score(&self) -> u32 {
        let checks = [
            (!self.name.is_empty(), 2),
            (!self.country_name.is_empty(), 2),
            (!self.country_code.is_empty(), 1),
            (self.data_amount > 0.0, 2),
            (self.days > 0, 2),
            (self.base_price_cents > 0, 1),
            (self.sale_price_cents > 0, 2),
            (self.reseller_id.as_deref().is_some_and(|r| !r.is_empty()), 2),
            (self.region.as_deref().is_some_and(|r| !r.is_empty()), 1),
            (true, 1),
            (true, 1),
        ];
        checks.iter().filter(|(ok, _)| *ok).map(|(_, w)| w).sum()
    }

    pub fn dedup_row(&self) -> DedupRow {
        let price = if self.sale_price_cents > 0 {
            self.sale_price_cents
        } else {
            self.base_price_cents
        };
        DedupRow {
            id: self.id,
            reseller_id: self.reseller_id.clone(),
            created_at: self.created_at,
            completeness: self.completeness_score(),
            combination_key: format!(
                "{}|{}|{}|{}",
                self.country_name, self.data_amount, self.days, price
            ),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = my_packages)]
pub struct InsertMyPackageEntity {
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
}

impl From<PackageDraft> for InsertMyPackageEntity {
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
        }
    }
}

/// Full-row update. `None` options are written as NULL.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = my_packages, treat_none_as_null = true)]
pub struct UpdateMyPackageEntity {
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

impl From<PackageDraft> for UpdateMyPackageEntity {
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

impl SlugFields for MyPackageEntity {
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

impl SlugFieldsMut for MyPackageEntity {
    fn set_slug(&mut self, slug: String) {
        self.slug = Some(slug);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MyPackageEntity {
        let now = Utc::now();
        MyPackageEntity {
            id: Uuid::new_v4(),
            name: "Greece 1GB".to_string(),
            country_name: "Greece".to_string(),
            country_code: "GR".to_string(),
            data_amount: 1.0,
            days: 7,
            base_price_cents: 300,
            sale_price_cents: 450,
            profit_cents: 150,
            reseller_id: Some("gr-1".to_string()),
            region: Some("Europe".to_string()),
            slug: Some("esim-greece-7days-1gb-all".to_string()),
            visible: true,
            show_on_frontend: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn complete_rows_score_highest() {
        let full = sample();
        assert_eq!(full.completeness_score(), 17);

        let sparse = MyPackageEntity {
            reseller_id: None,
            region: None,
            base_price_cents: 0,
            ..sample()
        };
        assert_eq!(sparse.completeness_score(), 13);
    }

    #[test]
    fn dedup_key_prefers_sale_price() {
        assert_eq!(sample().dedup_row().combination_key, "Greece|1|7|450");

        let unpriced = MyPackageEntity {
            sale_price_cents: 0,
            ..sample()
        };
        assert_eq!(unpriced.dedup_row().combination_key, "Greece|1|7|300");
    }

    #[test]
    fn drafts_recompute_profit() {
        let stale = MyPackageEntity {
            profit_cents: 999,
            ..sample()
        };
        assert_eq!(stale.to_draft().profit_cents, 150);
    }
}
