use serde::Serialize;

pub const SLUG_PREFIX: &str = "esim-";
pub const SLUG_SUFFIX: &str = "gb-all";
/// Packages without a validity period are sold as 30-day packages by the reseller.
pub const DEFAULT_SLUG_DAYS: i32 = 30;

/// Fields a package slug is derived from.
pub trait SlugFields {
    fn country_name(&self) -> &str;
    fn days(&self) -> i32;
    fn data_amount(&self) -> f64;
    fn slug(&self) -> Option<&str>;
}

pub trait SlugFieldsMut: SlugFields {
    fn set_slug(&mut self, slug: String);
}

/// Builds `esim-{country}-{days}days-{data}gb-all`. Returns `None` when the package is
/// missing the data required to build a slug.
pub fn generate_standard_slug<T: SlugFields + ?Sized>(package: &T) -> Option<String> {
    standard_slug(package.country_name(), package.days(), package.data_amount())
}

pub fn standard_slug(country_name: &str, days: i32, data_amount: f64) -> Option<String> {
    let country = country_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    if country.is_empty() {
        return None;
    }

    let days = if days == 0 { DEFAULT_SLUG_DAYS } else { days };
    if days < 0 {
        return None;
    }

    if !data_amount.is_finite() || data_amount < 0.0 {
        return None;
    }

    Some(format!(
        "{SLUG_PREFIX}{country}-{days}days-{data_amount}{SLUG_SUFFIX}"
    ))
}

/// The components embedded in a standard slug.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedSlug {
    pub country: String,
    pub days: i32,
    pub data_amount: f64,
}

impl ParsedSlug {
    pub fn parse(slug: &str) -> Option<Self> {
        let body = slug.strip_prefix(SLUG_PREFIX)?.strip_suffix(SLUG_SUFFIX)?;
        let days_at = body.rfind("days-")?;
        let (head, data) = (&body[..days_at], &body[days_at + "days-".len()..]);
        let (country, days) = head.rsplit_once('-')?;

        let days = days.parse::<i32>().ok().filter(|d| *d > 0)?;
        let data_amount = data.parse::<f64>().ok().filter(|d| d.is_finite() && *d >= 0.0)?;
        if country.is_empty() {
            return None;
        }

        Some(Self {
            country: country.to_string(),
            days,
            data_amount,
        })
    }
}

impl SlugFields for ParsedSlug {
    fn country_name(&self) -> &str {
        &self.country
    }

    fn days(&self) -> i32 {
        self.days
    }

    fn data_amount(&self) -> f64 {
        self.data_amount
    }

    fn slug(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlugValidation {
    pub is_valid: bool,
    pub current_slug: Option<String>,
    pub suggested_slug: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn validate_package_slug<T: SlugFields + ?Sized>(package: &T) -> SlugValidation {
    let mut result = SlugValidation::default();

    let Some(slug) = package.slug().filter(|s| !s.is_empty()) else {
        result.errors.push("Package slug is missing".to_string());
        result.suggested_slug = generate_standard_slug(package);
        return result;
    };
    result.current_slug = Some(slug.to_string());

    let Some(standard) = generate_standard_slug(package) else {
        result
            .errors
            .push("Could not generate standard slug (missing required data)".to_string());
        return result;
    };

    if slug != standard {
        result
            .errors
            .push(format!("Slug format is incorrect. Expected: {standard}"));
        result.warnings.push(
            "Slug should follow the standard format for reseller API compatibility".to_string(),
        );
    }
    result.suggested_slug = Some(standard);

    if !slug.starts_with(SLUG_PREFIX) {
        result
            .errors
            .push(format!("Slug must start with \"{SLUG_PREFIX}\""));
    }
    if !slug.contains("days-") {
        result
            .errors
            .push("Slug must include a \"<n>days-\" segment".to_string());
    }
    if !slug.ends_with(SLUG_SUFFIX) {
        result
            .errors
            .push(format!("Slug must end with \"{SLUG_SUFFIX}\""));
    }
    if slug.chars().any(char::is_whitespace) {
        result
            .errors
            .push("Slug contains spaces (should use hyphens)".to_string());
    }
    if slug != slug.to_lowercase() {
        result.warnings.push("Slug should be lowercase".to_string());
    }

    result.is_valid = result.errors.is_empty();
    result
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidPackageSlug<T> {
    pub package: T,
    pub validation: SlugValidation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlugValidationSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub missing_slugs: usize,
    pub incorrect_format: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlugValidationReport<T> {
    pub valid: Vec<T>,
    pub invalid: Vec<InvalidPackageSlug<T>>,
    pub summary: SlugValidationSummary,
}

pub fn validate_packages<T: SlugFields + Clone>(packages: &[T]) -> SlugValidationReport<T> {
    let mut report = SlugValidationReport {
        valid: Vec::new(),
        invalid: Vec::new(),
        summary: SlugValidationSummary {
            total: packages.len(),
            ..Default::default()
        },
    };

    for package in packages {
        let validation = validate_package_slug(package);
        if validation.is_valid {
            report.valid.push(package.clone());
            continue;
        }

        if package.slug().is_none_or(str::is_empty) {
            report.summary.missing_slugs += 1;
        } else {
            report.summary.incorrect_format += 1;
        }
        report.invalid.push(InvalidPackageSlug {
            package: package.clone(),
            validation,
        });
    }

    report.summary.valid = report.valid.len();
    report.summary.invalid = report.invalid.len();
    report
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlugUpdate {
    pub current_slug: Option<String>,
    pub new_slug: Option<String>,
    pub needs_update: bool,
}

/// One entry per input package, in input order.
pub fn generate_standard_slugs<T: SlugFields>(packages: &[T]) -> Vec<SlugUpdate> {
    packages
        .iter()
        .map(|package| {
            let current_slug = package.slug().map(str::to_string);
            let new_slug = generate_standard_slug(package);
            let needs_update = current_slug.is_none() || current_slug != new_slug;
            SlugUpdate {
                current_slug,
                new_slug,
                needs_update,
            }
        })
        .collect()
}

/// Cheap structural check, no reseller API round trip.
pub fn is_likely_reseller_compatible(slug: &str) -> bool {
    !slug.is_empty()
        && slug.starts_with(SLUG_PREFIX)
        && slug.contains("days-")
        && slug.ends_with(SLUG_SUFFIX)
        && slug == slug.to_lowercase()
        && !slug.chars().any(char::is_whitespace)
}

pub fn slug_examples() -> &'static [(&'static str, &'static str)] {
    &[
        ("Greece", "esim-greece-30days-1gb-all"),
        ("Albania", "esim-albania-30days-3gb-all"),
        ("Germany", "esim-germany-15days-5gb-all"),
        ("Italy", "esim-italy-7days-2gb-all"),
        ("France", "esim-france-30days-10gb-all"),
        ("Spain", "esim-spain-15days-3gb-all"),
        ("United States", "esim-united-states-30days-20gb-all"),
        ("United Kingdom", "esim-united-kingdom-30days-15gb-all"),
    ]
}
