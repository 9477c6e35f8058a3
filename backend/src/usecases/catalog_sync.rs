use std::sync::Arc;

use crates::domain::{
    entities::packages::InsertCatalogPackageEntity,
    repositories::packages::CatalogPackageRepository,
    value_objects::{
        package_duplicates::analyze_duplicates,
        packages::{MappedPackageDto, ResellerCatalogDto, SyncReport},
        reseller_packages::{
            PackageDraft, ResellerPackage, flatten_catalog, map_reseller_package,
            validate_package_fields,
        },
        slug_enforcement::PackageSlugEnforcer,
    },
};
use tracing::{error, info, warn};

use super::gateways::ResellerGateway;
use crate::axum_http::error_responses::AppError;

pub type UseCaseResult<T> = std::result::Result<T, AppError>;

pub struct CatalogSyncUseCase<C, G>
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    G: ResellerGateway + Send + Sync + 'static,
{
    catalog_repo: Arc<C>,
    reseller: Arc<G>,
    slug_enforcer: PackageSlugEnforcer,
}

impl<C, G> CatalogSyncUseCase<C, G>
where
    C: CatalogPackageRepository + Send + Sync + 'static,
    G: ResellerGateway + Send + Sync + 'static,
{
    pub fn new(catalog_repo: Arc<C>, reseller: Arc<G>, slug_enforcer: PackageSlugEnforcer) -> Self {
        Self {
            catalog_repo,
            reseller,
            slug_enforcer,
        }
    }

    async fn fetch_reseller_packages(&self) -> UseCaseResult<Vec<ResellerPackage>> {
        let catalog = self.reseller.list_packages().await.map_err(|err| {
            error!(error = %err, "catalog_sync: failed to fetch reseller catalog");
            AppError::external("Roamify", "failed to fetch package catalog")
        })?;
        let packages = flatten_catalog(&catalog);
        info!(
            countries = catalog.data.countries.len(),
            packages = packages.len(),
            "catalog_sync: reseller catalog fetched"
        );
        Ok(packages)
    }

    /// Mapped reseller packages plus the duplicate report, without writing anything.
    pub async fn reseller_catalog(&self) -> UseCaseResult<ResellerCatalogDto> {
        let packages = self.fetch_reseller_packages().await?;
        let duplicates = analyze_duplicates(&packages);
        if duplicates.has_duplicates {
            warn!(
                duplicate_ids = duplicates.duplicate_ids.len(),
                duplicate_combinations = duplicates.duplicate_combinations.len(),
                "catalog_sync: reseller catalog contains duplicates"
            );
        }

        let packages = packages
            .iter()
            .map(|package| {
                let mut draft = map_reseller_package(package, None);
                // Best effort for display; rows that cannot get a slug keep none.
                let _ = self.slug_enforcer.enforce_on_insert(&mut draft);
                MappedPackageDto::from(draft)
            })
            .collect();

        Ok(ResellerCatalogDto {
            packages,
            duplicates,
        })
    }

    /// Upserts the reseller catalog into `packages`, keyed by reseller id.
    pub async fn sync_catalog(&self) -> UseCaseResult<SyncReport> {
        let packages = self.fetch_reseller_packages().await?;
        let (rows, mut report) = self.prepare_rows(&packages);

        if rows.is_empty() {
            warn!(fetched = report.fetched, skipped = report.skipped, "catalog_sync: nothing to upsert");
            return Ok(report);
        }

        report.upserted = self
            .catalog_repo
            .upsert_by_reseller_id(rows)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "catalog_sync: upsert failed");
                AppError::Database(err)
            })?;

        info!(
            fetched = report.fetched,
            upserted = report.upserted,
            skipped = report.skipped,
            "catalog_sync: reseller catalog synced"
        );
        Ok(report)
    }

    fn prepare_rows(&self, packages: &[ResellerPackage]) -> (Vec<InsertCatalogPackageEntity>, SyncReport) {
        let mut report = SyncReport {
            fetched: packages.len(),
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(packages.len());

        for package in packages {
            let mut draft: PackageDraft = map_reseller_package(package, None);
            let label = draft.reseller_id.clone().unwrap_or_else(|| draft.name.clone());

            if draft.reseller_id.is_none() {
                report.skipped_reasons.push(format!("{label}: missing reseller id"));
                continue;
            }

            let errors = validate_package_fields(&draft);
            if !errors.is_empty() {
                report
                    .skipped_reasons
                    .push(format!("{label}: {}", errors.join(", ")));
                continue;
            }

            if let Err(errors) = self.slug_enforcer.enforce_on_insert(&mut draft) {
                report
                    .skipped_reasons
                    .push(format!("{label}: {}", errors.join(", ")));
                continue;
            }

            rows.push(InsertCatalogPackageEntity::from(draft));
        }

        report.skipped = report.skipped_reasons.len();
        (rows, report)
    }
}
