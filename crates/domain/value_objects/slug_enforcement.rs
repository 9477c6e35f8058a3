use serde::Serialize;
use tracing::{info, warn};

use super::package_slugs::{
    SlugFields, SlugFieldsMut, generate_standard_slug, validate_package_slug,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugEnforcerConfig {
    pub auto_fix: bool,
    pub validate_on_create: bool,
    pub validate_on_update: bool,
    pub log_violations: bool,
}

impl Default for SlugEnforcerConfig {
    fn default() -> Self {
        Self {
            auto_fix: true,
            validate_on_create: true,
            validate_on_update: true,
            log_violations: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlugEnforcement {
    pub success: bool,
    pub original_slug: Option<String>,
    pub new_slug: Option<String>,
    pub fixed: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSlugEnforcement {
    pub total: usize,
    pub fixed: usize,
    pub errors: usize,
    pub results: Vec<SlugEnforcement>,
}

/// Keeps package slugs in the standard reseller format on every write path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageSlugEnforcer {
    config: SlugEnforcerConfig,
}

impl PackageSlugEnforcer {
    pub fn new(config: SlugEnforcerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> SlugEnforcerConfig {
        self.config
    }

    /// Checks a package and proposes the standard slug. Nothing is mutated here.
    pub fn enforce<T: SlugFields + ?Sized>(&self, package: &T) -> SlugEnforcement {
        let original_slug = package.slug().map(str::to_string);
        let validation = validate_package_slug(package);

        if validation.is_valid {
            return SlugEnforcement {
                success: true,
                new_slug: original_slug.clone(),
                original_slug,
                ..Default::default()
            };
        }

        if self.config.log_violations {
            warn!(
                slug = ?original_slug,
                country = package.country_name(),
                errors = ?validation.errors,
                "slug_enforcer: slug violation"
            );
        }

        if !self.config.auto_fix {
            return SlugEnforcement {
                success: false,
                new_slug: original_slug.clone(),
                original_slug,
                fixed: false,
                errors: validation.errors,
            };
        }

        match generate_standard_slug(package) {
            Some(standard) => SlugEnforcement {
                success: true,
                fixed: original_slug.as_deref() != Some(standard.as_str()),
                original_slug,
                new_slug: Some(standard),
                errors: Vec::new(),
            },
            None => SlugEnforcement {
                success: false,
                new_slug: original_slug.clone(),
                original_slug,
                fixed: false,
                errors: vec!["Could not generate standard slug".to_string()],
            },
        }
    }

    pub fn enforce_batch<T: SlugFields>(&self, packages: &[T]) -> BatchSlugEnforcement {
        let results: Vec<SlugEnforcement> = packages.iter().map(|p| self.enforce(p)).collect();
        let batch = BatchSlugEnforcement {
            total: results.len(),
            fixed: results.iter().filter(|r| r.fixed).count(),
            errors: results.iter().filter(|r| !r.success).count(),
            results,
        };

        info!(
            total = batch.total,
            fixed = batch.fixed,
            errors = batch.errors,
            "slug_enforcer: batch enforcement finished"
        );
        batch
    }

    /// Fixes the slug in place before an insert. An error means the row should be rejected.
    pub fn enforce_on_insert<T: SlugFieldsMut>(&self, package: &mut T) -> Result<(), Vec<String>> {
        if !self.config.validate_on_create {
            return Ok(());
        }
        self.apply(package)
    }

    pub fn enforce_on_update<T: SlugFieldsMut>(&self, package: &mut T) -> Result<(), Vec<String>> {
        if !self.config.validate_on_update {
            return Ok(());
        }
        self.apply(package)
    }

    fn apply<T: SlugFieldsMut>(&self, package: &mut T) -> Result<(), Vec<String>> {
        let result = self.enforce(&*package);
        if !result.success {
            return Err(result.errors);
        }
        if result.fixed {
            if let Some(slug) = result.new_slug {
                package.set_slug(slug);
            }
        }
        Ok(())
    }
}
