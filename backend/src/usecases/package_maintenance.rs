use std::sync::Arc;

use crates::domain::{
    repositories::{my_packages::MyPackageRepository, packages::CatalogPackageRepository},
    value_objects::{
        data_amounts::fix_incorrect_data_amount,
        package_duplicates::{DeduplicationPlan, plan_deduplication},
        package_slugs::{SlugValidationReport, validate_packages},
        packages::{DataAmountFix, DataAmountFixReport, PackageSlugRow, PackageTable, SlugScanReport},
        slug_enforcement::{BatchSlugEnforcement, PackageSlugEnforcer},
    },
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::axum_http::error_responses::AppError;

pub type UseCaseResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Serialize)]
pub struct SlugValidationOverview {
    pub packages: SlugValidationReport<PackageSlugRow>,
    pub my_packages: SlugValidationReport<PackageSlugRow>,
}

/// Bulk admin jobs over both package tables.
pub struct PackageMaintenanceUseCase<C, M>
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    M: MyPackageRepository + Send + Sync + 'static,
{
    catalog_repo: Arc<C>,
    my_package_repo: Arc<M>,
    slug_enforcer: PackageSlugEnforcer,
}

impl<C, M> PackageMaintenanceUseCase<C, M>
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    M: MyPackageRepository + Send + Sync + 'static,
{
    pub fn new(
        catalog_repo: Arc<C>,
        my_package_repo: Arc<M>,
        slug_enforcer: PackageSlugEnforcer,
    ) -> Self {
        Self {
            catalog_repo,
            my_package_repo,
            slug_enforcer,
        }
    }

    async fn load_rows(&self) -> UseCaseResult<(Vec<PackageSlugRow>, Vec<PackageSlugRow>)> {
        let catalog = self.catalog_repo.list_all().await.map_err(|err| {
            error!(db_error = ?err, "package_maintenance: failed to load packages");
            AppError::Database(err)
        })?;
        let mine = self.my_package_repo.list_all().await.map_err(|err| {
            error!(db_error = ?err, "package_maintenance: failed to load my_packages");
            AppError::Database(err)
        })?;

        Ok((
            catalog.iter().map(PackageSlugRow::from).collect(),
            mine.iter().map(PackageSlugRow::from).collect(),
        ))
    }

    pub async fn validate_all_slugs(&self) -> UseCaseResult<SlugValidationOverview> {
        let (catalog, mine) = self.load_rows().await?;
        let overview = SlugValidationOverview {
            packages: validate_packages(&catalog),
            my_packages: validate_packages(&mine),
        };

        info!(
            packages_invalid = overview.packages.summary.invalid,
            my_packages_invalid = overview.my_packages.summary.invalid,
            "package_maintenance: slug validation finished"
        );
        Ok(overview)
    }

    /// Scans both tables and writes back every slug the enforcer fixed.
    pub async fn scan_and_fix_slugs(&self) -> UseCaseResult<SlugScanReport> {
        let (catalog, mine) = self.load_rows().await?;
        let mut report = SlugScanReport {
            packages: self.slug_enforcer.enforce_batch(&catalog),
            my_packages: self.slug_enforcer.enforce_batch(&mine),
            ..Default::default()
        };

        for (rows, batch) in [(&catalog, &report.packages), (&mine, &report.my_packages)] {
            let (updated, failed) = self.write_fixed_slugs(rows, batch).await;
            report.updated += updated;
            report.update_failures += failed;
        }

        info!(
            updated = report.updated,
            update_failures = report.update_failures,
            "package_maintenance: slug enforcement finished"
        );
        Ok(report)
    }

    async fn write_fixed_slugs(
        &self,
        rows: &[PackageSlugRow],
        batch: &BatchSlugEnforcement,
    ) -> (usize, usize) {
        let mut updated = 0;
        let mut failed = 0;

        for (row, result) in rows.iter().zip(&batch.results) {
            let Some(slug) = result.new_slug.clone().filter(|_| result.fixed) else {
                continue;
            };
            let written = match row.table {
                PackageTable::Packages => self.catalog_repo.update_slug(row.id, slug.clone()).await,
                PackageTable::MyPackages => {
                    self.my_package_repo.update_slug(row.id, slug.clone()).await
                }
            };
            match written {
                Ok(()) => updated += 1,
                Err(err) => {
                    failed += 1;
                    warn!(
                        package_id = %row.id,
                        table = ?row.table,
                        %slug,
                        db_error = ?err,
                        "package_maintenance: failed to write fixed slug"
                    );
                }
            }
        }
        (updated, failed)
    }

    /// Rewrites data amounts that were stored in MB as GB.
    pub async fn fix_data_amounts(&self) -> UseCaseResult<DataAmountFixReport> {
        let (catalog, mine) = self.load_rows().await?;
        let mut report = DataAmountFixReport {
            checked: catalog.len() + mine.len(),
            ..Default::default()
        };

        for row in catalog.iter().chain(&mine) {
            let fixed = fix_incorrect_data_amount(row.data_amount);
            if fixed == row.data_amount {
                continue;
            }

            // The slug encodes the data amount, so it is re-derived in the same write.
            let corrected = PackageSlugRow {
                data_amount: fixed,
                ..row.clone()
            };
            let enforcement = self.slug_enforcer.enforce(&corrected);
            if !enforcement.success {
                warn!(
                    package_id = %row.id,
                    errors = ?enforcement.errors,
                    "package_maintenance: slug could not be re-derived after data amount fix"
                );
            }
            let new_slug = enforcement.new_slug.or_else(|| row.slug.clone());

            let written = match row.table {
                PackageTable::Packages => {
                    self.catalog_repo
                        .update_data_amount(row.id, fixed, new_slug.clone())
                        .await
                }
                PackageTable::MyPackages => {
                    self.my_package_repo
                        .update_data_amount(row.id, fixed, new_slug.clone())
                        .await
                }
            };
            match written {
                Ok(()) => report.fixed.push(DataAmountFix {
                    id: row.id,
                    table: row.table,
                    name: row.name.clone(),
                    old_value: row.data_amount,
                    new_value: fixed,
                    old_slug: row.slug.clone(),
                    new_slug,
                }),
                Err(err) => {
                    report.failed += 1;
                    warn!(package_id = %row.id, db_error = ?err, "package_maintenance: failed to fix data amount");
                }
            }
        }

        info!(
            checked = report.checked,
            fixed = report.fixed.len(),
            failed = report.failed,
            "package_maintenance: data amounts fixed"
        );
        Ok(report)
    }

    pub async fn deduplicate_my_packages(&self) -> UseCaseResult<DeduplicationPlan> {
        let packages = self.my_package_repo.list_all().await.map_err(|err| {
            error!(db_error = ?err, "package_maintenance: failed to load my_packages");
            AppError::Database(err)
        })?;
        let rows: Vec<_> = packages.iter().map(|p| p.dedup_row()).collect();
        let plan = plan_deduplication(&rows);

        for batch in plan.delete_batches() {
            self.my_package_repo
                .delete_many(batch.to_vec())
                .await
                .map_err(|err| {
                    error!(batch_size = batch.len(), db_error = ?err, "package_maintenance: dedup delete failed");
                    AppError::Database(err)
                })?;
        }

        info!(
            removed = plan.removed_count(),
            reseller_id_duplicates = plan.reseller_id_duplicates,
            combination_duplicates = plan.combination_duplicates,
            remaining = plan.remaining_count,
            "package_maintenance: my_packages deduplicated"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use crates::domain::{
        entities::{my_packages::MyPackageEntity, packages::CatalogPackageEntity},
        repositories::{
            my_packages::MockMyPackageRepository, packages::MockCatalogPackageRepository,
        },
    };
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn catalog_row(slug: Option<&str>, data_amount: f64) -> CatalogPackageEntity {
        let now = Utc::now();
        CatalogPackageEntity {
            id: Uuid::new_v4(),
            name: "Italy 3GB".to_string(),
            country_name: "Italy".to_string(),
            country_code: "IT".to_string(),
            data_amount,
            days: 30,
            base_price_cents: 600,
            sale_price_cents: 600,
            profit_cents: 0,
            reseller_id: Some("esim-italy-30days-3gb-all".to_string()),
            region: Some("Europe".to_string()),
            slug: slug.map(str::to_string),
            visible: true,
            show_on_frontend: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn my_row(reseller_id: Option<&str>, age_minutes: i64) -> MyPackageEntity {
        let created = Utc::now() - Duration::minutes(age_minutes);
        MyPackageEntity {
            id: Uuid::new_v4(),
            name: "Greece 1GB".to_string(),
            country_name: "Greece".to_string(),
            country_code: "GR".to_string(),
            data_amount: 1.0,
            days: 7,
            base_price_cents: 350,
            sale_price_cents: 499,
            profit_cents: 149,
            reseller_id: reseller_id.map(str::to_string),
            region: None,
            slug: Some("esim-greece-7days-1gb-all".to_string()),
            visible: true,
            show_on_frontend: true,
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn scan_writes_only_fixed_slugs() {
        let broken = catalog_row(Some("italy-3gb"), 3.0);
        let fine = catalog_row(Some("esim-italy-30days-3gb-all"), 3.0);
        let broken_id = broken.id;

        let mut catalog = MockCatalogPackageRepository::new();
        catalog
            .expect_list_all()
            .returning(move || Ok(vec![broken.clone(), fine.clone()]));
        catalog
            .expect_update_slug()
            .with(eq(broken_id), eq("esim-italy-30days-3gb-all".to_string()))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut mine = MockMyPackageRepository::new();
        mine.expect_list_all().returning(|| Ok(vec![]));
        mine.expect_update_slug().never();

        let usecase = PackageMaintenanceUseCase::new(
            Arc::new(catalog),
            Arc::new(mine),
            PackageSlugEnforcer::default(),
        );
        let report = usecase.scan_and_fix_slugs().await.unwrap();

        assert_eq!(report.packages.total, 2);
        assert_eq!(report.packages.fixed, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.update_failures, 0);
    }

    #[tokio::test]
    async fn validation_counts_missing_and_incorrect_slugs() {
        let mut catalog = MockCatalogPackageRepository::new();
        catalog.expect_list_all().returning(|| {
            Ok(vec![
                catalog_row(None, 3.0),
                catalog_row(Some("italy"), 3.0),
                catalog_row(Some("esim-italy-30days-3gb-all"), 3.0),
            ])
        });
        let mut mine = MockMyPackageRepository::new();
        mine.expect_list_all().returning(|| Ok(vec![]));

        let usecase = PackageMaintenanceUseCase::new(
            Arc::new(catalog),
            Arc::new(mine),
            PackageSlugEnforcer::default(),
        );
        let overview = usecase.validate_all_slugs().await.unwrap();

        assert_eq!(overview.packages.summary.valid, 1);
        assert_eq!(overview.packages.summary.missing_slugs, 1);
        assert_eq!(overview.packages.summary.incorrect_format, 1);
        assert_eq!(overview.my_packages.summary.total, 0);
    }

    #[tokio::test]
    async fn data_amounts_stored_in_megabytes_are_rewritten() {
        let legacy = catalog_row(Some("esim-italy-30days-3gb-all"), 3072.0);
        let legacy_id = legacy.id;

        let mut catalog = MockCatalogPackageRepository::new();
        catalog
            .expect_list_all()
            .returning(move || Ok(vec![legacy.clone(), catalog_row(None, 5.0)]));
        catalog
            .expect_update_data_amount()
            .with(
                eq(legacy_id),
                eq(3.0),
                eq(Some("esim-italy-30days-3gb-all".to_string())),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut mine = MockMyPackageRepository::new();
        mine.expect_list_all().returning(|| Ok(vec![]));

        let usecase = PackageMaintenanceUseCase::new(
            Arc::new(catalog),
            Arc::new(mine),
            PackageSlugEnforcer::default(),
        );
        let report = usecase.fix_data_amounts().await.unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(report.fixed.len(), 1);
        assert_eq!(report.fixed[0].new_value, 3.0);
    }

    #[tokio::test]
    async fn data_amount_fix_rewrites_the_slug_with_it() {
        let legacy = catalog_row(Some("esim-italy-30days-3072gb-all"), 3072.0);
        let legacy_id = legacy.id;

        let mut catalog = MockCatalogPackageRepository::new();
        catalog
            .expect_list_all()
            .returning(move || Ok(vec![legacy.clone()]));
        catalog
            .expect_update_data_amount()
            .with(
                eq(legacy_id),
                eq(3.0),
                eq(Some("esim-italy-30days-3gb-all".to_string())),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut mine = MockMyPackageRepository::new();
        mine.expect_list_all().returning(|| Ok(vec![]));

        let usecase = PackageMaintenanceUseCase::new(
            Arc::new(catalog),
            Arc::new(mine),
            PackageSlugEnforcer::default(),
        );
        let report = usecase.fix_data_amounts().await.unwrap();

        let fix = &report.fixed[0];
        assert_eq!(fix.old_slug.as_deref(), Some("esim-italy-30days-3072gb-all"));
        assert_eq!(fix.new_slug.as_deref(), Some("esim-italy-30days-3gb-all"));
    }

    #[tokio::test]
    async fn dedup_deletes_the_less_complete_copy() {
        let newest = my_row(Some("r1"), 0);
        let mut sparse = my_row(Some("r1"), 5);
        sparse.region = None;
        sparse.base_price_cents = 0;
        let mut complete = newest.clone();
        complete.id = Uuid::new_v4();
        complete.region = Some("Europe".to_string());
        complete.created_at = newest.created_at - Duration::minutes(1);
        let newest_id = newest.id;
        let sparse_id = sparse.id;

        let mut mine = MockMyPackageRepository::new();
        mine.expect_list_all()
            .returning(move || Ok(vec![newest.clone(), complete.clone(), sparse.clone()]));
        mine.expect_delete_many()
            .withf(move |ids| ids.len() == 2 && ids.contains(&newest_id) && ids.contains(&sparse_id))
            .times(1)
            .returning(|ids| Ok(ids.len()));

        let usecase = PackageMaintenanceUseCase::new(
            Arc::new(MockCatalogPackageRepository::new()),
            Arc::new(mine),
            PackageSlugEnforcer::default(),
        );
        let plan = usecase.deduplicate_my_packages().await.unwrap();

        assert_eq!(plan.removed_count(), 2);
        assert_eq!(plan.reseller_id_duplicates, 2);
        assert_eq!(plan.remaining_count, 1);
    }
}
