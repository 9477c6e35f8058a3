use std::sync::Arc;

use crates::domain::{
    entities::my_packages::{InsertMyPackageEntity, MyPackageEntity, UpdateMyPackageEntity},
    repositories::my_packages::MyPackageRepository,
    value_objects::{
        packages::{AdminPackageDto, PackageDto, PackageFilter, UpsertPackageRequest},
        reseller_packages::{PackageDraft, validate_package_fields},
        slug_enforcement::PackageSlugEnforcer,
    },
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

pub type UseCaseResult<T> = std::result::Result<T, AppError>;

/// Looks a package up by UUID first and falls back to its slug.
pub async fn find_package_by_reference<R>(
    repo: &R,
    reference: &str,
) -> anyhow::Result<Option<MyPackageEntity>>
where
    R: MyPackageRepository + Send + Sync + ?Sized,
{
    if let Ok(package_id) = Uuid::parse_str(reference) {
        if let Some(package) = repo.find_by_id(package_id).await? {
            return Ok(Some(package));
        }
    }
    repo.find_by_slug(reference.to_string()).await
}

pub struct PackageUseCase<R>
where
    R: MyPackageRepository + Send + Sync + 'static,
{
    package_repo: Arc<R>,
    slug_enforcer: PackageSlugEnforcer,
}

impl<R> PackageUseCase<R>
where
    R: MyPackageRepository + Send + Sync + 'static,
{
    pub fn new(package_repo: Arc<R>, slug_enforcer: PackageSlugEnforcer) -> Self {
        Self {
            package_repo,
            slug_enforcer,
        }
    }

    pub async fn list_public(&self, filter: PackageFilter) -> UseCaseResult<Vec<PackageDto>> {
        let country = filter.country.filter(|c| !c.trim().is_empty());
        let region = filter.region.filter(|r| !r.trim().is_empty());

        let packages = self
            .package_repo
            .list_visible(country.clone(), region.clone())
            .await
            .map_err(|err| {
                error!(?country, ?region, db_error = ?err, "packages: failed to list visible packages");
                AppError::Database(err)
            })?;

        info!(?country, ?region, count = packages.len(), "packages: storefront listing loaded");
        Ok(packages.into_iter().map(PackageDto::from).collect())
    }

    pub async fn get_public(&self, reference: &str) -> UseCaseResult<PackageDto> {
        let package = find_package_by_reference(self.package_repo.as_ref(), reference)
            .await
            .map_err(|err| {
                error!(reference, db_error = ?err, "packages: failed to load package");
                AppError::Database(err)
            })?
            .filter(|p| p.visible && p.show_on_frontend)
            .ok_or_else(|| AppError::NotFound("Package".to_string()))?;

        Ok(PackageDto::from(package))
    }

    pub async fn list_admin(&self) -> UseCaseResult<Vec<AdminPackageDto>> {
        let packages = self.package_repo.list_all().await.map_err(|err| {
            error!(db_error = ?err, "packages: failed to list packages for admin");
            AppError::Database(err)
        })?;
        Ok(packages.into_iter().map(AdminPackageDto::from).collect())
    }

    fn prepare(&self, request: UpsertPackageRequest, is_update: bool) -> UseCaseResult<PackageDraft> {
        let mut draft = request.into_draft();

        let errors = validate_package_fields(&draft);
        if !errors.is_empty() {
            warn!(?errors, name = %draft.name, "packages: rejected invalid package");
            return Err(AppError::Validation(errors.join(", ")));
        }

        let enforced = if is_update {
            self.slug_enforcer.enforce_on_update(&mut draft)
        } else {
            self.slug_enforcer.enforce_on_insert(&mut draft)
        };
        enforced.map_err(|errors| AppError::Validation(errors.join(", ")))?;

        Ok(draft)
    }

    pub async fn create(&self, request: UpsertPackageRequest) -> UseCaseResult<AdminPackageDto> {
        let draft = self.prepare(request, false)?;

        let package = self
            .package_repo
            .insert(InsertMyPackageEntity::from(draft))
            .await
            .map_err(|err| {
                error!(db_error = ?err, "packages: failed to insert package");
                AppError::Database(err)
            })?;

        info!(package_id = %package.id, slug = ?package.slug, "packages: package created");
        Ok(AdminPackageDto::from(package))
    }

    pub async fn update(
        &self,
        package_id: Uuid,
        request: UpsertPackageRequest,
    ) -> UseCaseResult<AdminPackageDto> {
        let draft = self.prepare(request, true)?;

        let package = self
            .package_repo
            .update(package_id, UpdateMyPackageEntity::from(draft))
            .await
            .map_err(|err| {
                error!(%package_id, db_error = ?err, "packages: failed to update package");
                AppError::Database(err)
            })?
            .ok_or_else(|| AppError::NotFound("Package".to_string()))?;

        info!(%package_id, slug = ?package.slug, "packages: package updated");
        Ok(AdminPackageDto::from(package))
    }

    pub async fn delete(&self, package_id: Uuid) -> UseCaseResult<()> {
        let deleted = self.package_repo.delete(package_id).await.map_err(|err| {
            error!(%package_id, db_error = ?err, "packages: failed to delete package");
            AppError::Database(err)
        })?;

        if !deleted {
            return Err(AppError::NotFound("Package".to_string()));
        }
        info!(%package_id, "packages: package deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crates::domain::repositories::my_packages::MockMyPackageRepository;
    use mockall::predicate::eq;

    pub(crate) fn sample_package(slug: &str) -> MyPackageEntity {
        let now = Utc::now();
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
            reseller_id: Some("esim-greece-7days-1gb-all".to_string()),
            region: Some("Europe".to_string()),
            slug: Some(slug.to_string()),
            visible: true,
            show_on_frontend: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn request() -> UpsertPackageRequest {
        UpsertPackageRequest {
            name: "Greece 1GB".to_string(),
            country_name: "Greece".to_string(),
            country_code: "gr".to_string(),
            data_amount: 1.0,
            days: 7,
            base_price: 3.5,
            sale_price: Some(4.99),
            reseller_id: None,
            region: None,
            slug: Some("greece-1gb".to_string()),
            visible: None,
            show_on_frontend: None,
        }
    }

    #[tokio::test]
    async fn public_lookup_falls_back_to_slug() {
        let package = sample_package("esim-greece-7days-1gb-all");
        let mut repo = MockMyPackageRepository::new();
        repo.expect_find_by_slug()
            .with(eq("esim-greece-7days-1gb-all".to_string()))
            .returning(move |_| Ok(Some(package.clone())));
        repo.expect_find_by_id().never();

        let usecase = PackageUseCase::new(Arc::new(repo), PackageSlugEnforcer::default());
        let dto = usecase.get_public("esim-greece-7days-1gb-all").await.unwrap();
        assert_eq!(dto.price, 4.99);
        assert_eq!(dto.data_display, "1 GB");
    }

    #[tokio::test]
    async fn hidden_packages_are_not_public() {
        let mut package = sample_package("esim-greece-7days-1gb-all");
        package.show_on_frontend = false;
        let package_id = package.id;

        let mut repo = MockMyPackageRepository::new();
        repo.expect_find_by_id()
            .with(eq(package_id))
            .returning(move |_| Ok(Some(package.clone())));

        let usecase = PackageUseCase::new(Arc::new(repo), PackageSlugEnforcer::default());
        let err = usecase.get_public(&package_id.to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_fixes_slug_and_derives_profit() {
        let mut repo = MockMyPackageRepository::new();
        repo.expect_insert()
            .withf(|row| {
                row.slug.as_deref() == Some("esim-greece-7days-1gb-all")
                    && row.profit_cents == 149
                    && row.country_code == "GR"
            })
            .returning(|row| {
                let mut package = sample_package("");
                package.slug = row.slug;
                Ok(package)
            });

        let usecase = PackageUseCase::new(Arc::new(repo), PackageSlugEnforcer::default());
        let dto = usecase.create(request()).await.unwrap();
        assert_eq!(dto.slug.as_deref(), Some("esim-greece-7days-1gb-all"));
    }

    #[tokio::test]
    async fn create_rejects_invalid_fields() {
        let mut repo = MockMyPackageRepository::new();
        repo.expect_insert().never();

        let mut req = request();
        req.country_name = " ".to_string();
        req.base_price = -1.0;

        let usecase = PackageUseCase::new(Arc::new(repo), PackageSlugEnforcer::default());
        let err = usecase.create(req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn update_of_missing_package_is_not_found() {
        let mut repo = MockMyPackageRepository::new();
        repo.expect_update().returning(|_, _| Ok(None));

        let usecase = PackageUseCase::new(Arc::new(repo), PackageSlugEnforcer::default());
        let err = usecase.update(Uuid::new_v4(), request()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let mut repo = MockMyPackageRepository::new();
        repo.expect_delete().returning(|_| Ok(false));

        let usecase = PackageUseCase::new(Arc::new(repo), PackageSlugEnforcer::default());
        assert!(matches!(
            usecase.delete(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
