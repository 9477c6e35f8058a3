use serde::{Deserialize, Serialize};

use super::data_amounts::{RawDataAmount, parse_data_amount_to_gb};
use super::package_slugs::{SlugFields, SlugFieldsMut};

pub const UNKNOWN_PACKAGE_NAME: &str = "Unknown Package";
pub const UNKNOWN_COUNTRY_CODE: &str = "XX";

// Catalog response of `GET /api/esim/packages`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoamifyCatalogResponse {
    pub data: RoamifyCatalogData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RoamifyCatalogData {
    #[serde(default)]
    pub countries: Vec<RoamifyCatalogCountry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoamifyCatalogCountry {
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub packages: Vec<RoamifyCatalogPackage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoamifyCatalogPackage {
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub day: Option<i32>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub data_amount: Option<f64>,
    #[serde(default)]
    pub data_unit: Option<String>,
    #[serde(default)]
    pub is_unlimited: Option<bool>,
}

/// Validity as sent by the reseller: `30`, `"30 days"`, `"7 day"` or `"30"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValidity {
    Days(i64),
    Text(String),
}

/// A reseller package in whichever field naming the source used. Catalog entries,
/// admin imports and cached payloads do not agree on names, so every alias is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResellerPackage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "packageId")]
    pub package_id: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "packageName")]
    pub package_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub package: Option<String>,

    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default, rename = "countryName")]
    pub country_name_camel: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default, rename = "countryCode")]
    pub country_code_camel: Option<String>,
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub data: Option<RawDataAmount>,
    #[serde(default, rename = "dataAmount")]
    pub data_amount_camel: Option<RawDataAmount>,
    #[serde(default)]
    pub data_amount: Option<RawDataAmount>,

    #[serde(default)]
    pub days: Option<i32>,
    #[serde(default)]
    pub day: Option<i32>,
    #[serde(default)]
    pub validity: Option<RawValidity>,

    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub base_price: Option<f64>,
}

fn first_non_empty<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

impl ResellerPackage {
    /// Grouping key for duplicate reports: `id`, then `packageId`.
    pub fn duplicate_id(&self) -> Option<&str> {
        first_non_empty(&[&self.id, &self.package_id])
    }

    /// Key the reseller expects when ordering: `packageId`, then `id`.
    pub fn package_key(&self) -> Option<&str> {
        first_non_empty(&[&self.package_id, &self.id])
    }

    pub fn display_name(&self) -> &str {
        first_non_empty(&[
            &self.description,
            &self.package_name,
            &self.name,
            &self.package,
        ])
        .unwrap_or(UNKNOWN_PACKAGE_NAME)
    }

    pub fn country(&self) -> Option<&str> {
        first_non_empty(&[&self.country, &self.country_name, &self.country_name_camel])
    }

    pub fn country_code(&self) -> Option<&str> {
        first_non_empty(&[&self.country_code, &self.country_code_camel])
    }

    pub fn raw_data_amount(&self) -> Option<&RawDataAmount> {
        self.data
            .as_ref()
            .or(self.data_amount_camel.as_ref())
            .or(self.data_amount.as_ref())
    }

    pub fn data_amount_gb(&self) -> f64 {
        self.raw_data_amount()
            .map(parse_data_amount_to_gb)
            .unwrap_or(0.0)
    }

    /// `days`, `day`, then the parsed `validity`. `None` when nothing usable is present.
    pub fn validity_days(&self) -> Option<i32> {
        self.days
            .filter(|d| *d > 0)
            .or(self.day.filter(|d| *d > 0))
            .or_else(|| self.validity.as_ref().and_then(parse_validity_to_days))
    }

    pub fn base_price(&self) -> Option<f64> {
        self.price.or(self.base_price)
    }
}

/// `"30 days"`, `"7 day"`, `"30"` and `30` become days; anything else is `None`.
pub fn parse_validity_to_days(validity: &RawValidity) -> Option<i32> {
    match validity {
        RawValidity::Days(days) => (*days > 0).then(|| i32::try_from(*days).ok()).flatten(),
        RawValidity::Text(text) => parse_validity_text(text),
    }
}

fn parse_validity_text(text: &str) -> Option<i32> {
    let trimmed = text.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse().ok();
    }

    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if text
            .get(j..j + 3)
            .is_some_and(|unit| unit.eq_ignore_ascii_case("day"))
        {
            return text[start..i].parse().ok();
        }
    }
    None
}

/// Package ready to be written to `packages` or `my_packages`. Prices are minor units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageDraft {
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

impl PackageDraft {
    pub fn set_prices(&mut self, base_price_cents: i64, sale_price_cents: i64) {
        self.base_price_cents = base_price_cents;
        self.sale_price_cents = sale_price_cents;
        self.profit_cents = sale_price_cents - base_price_cents;
    }
}

impl SlugFields for PackageDraft {
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

impl SlugFieldsMut for PackageDraft {
    fn set_slug(&mut self, slug: String) {
        self.slug = Some(slug);
    }
}

pub fn price_to_cents(price: f64) -> i64 {
    if !price.is_finite() {
        return 0;
    }
    (price * 100.0).round() as i64
}

/// Maps a reseller package onto our columns. `sale_price_cents` defaults to the base price.
pub fn map_reseller_package(package: &ResellerPackage, sale_price_cents: Option<i64>) -> PackageDraft {
    let base_price_cents = package.base_price().map(price_to_cents).unwrap_or(0);
    let sale_price_cents = sale_price_cents.unwrap_or(base_price_cents);

    let mut draft = PackageDraft {
        name: package.display_name().to_string(),
        country_name: package.country().unwrap_or_default().to_string(),
        country_code: package.country_code().unwrap_or_default().to_uppercase(),
        data_amount: package.data_amount_gb(),
        days: package.validity_days().unwrap_or(0),
        reseller_id: package.package_key().map(str::to_string),
        region: package
            .region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        slug: None,
        visible: true,
        show_on_frontend: true,
        ..Default::default()
    };
    draft.set_prices(base_price_cents, sale_price_cents);
    draft
}

/// Returns one message per invalid field. Empty means the draft can be written.
pub fn validate_package_fields(draft: &PackageDraft) -> Vec<String> {
    let mut errors = Vec::new();

    if draft.name.trim().is_empty() {
        errors.push("name is required".to_string());
    }
    if draft.country_name.trim().is_empty() {
        errors.push("country_name is required".to_string());
    }
    if draft.country_code.trim().is_empty() {
        errors.push("country_code is required".to_string());
    }
    if !draft.data_amount.is_finite() || draft.data_amount < 0.0 {
        errors.push("data_amount must be 0 or greater (0 = unlimited)".to_string());
    }
    if draft.days < 0 {
        errors.push("days must be 0 or greater (0 = unlimited duration)".to_string());
    }
    if draft.base_price_cents < 0 {
        errors.push("base_price must be 0 or greater".to_string());
    }
    if draft.sale_price_cents < 0 {
        errors.push("sale_price must be 0 or greater".to_string());
    }

    errors
}

const COUNTRY_CODES: &[(&str, &str)] = &[
    ("Albania", "AL"),
    ("Andorra", "AD"),
    ("Austria", "AT"),
    ("Belarus", "BY"),
    ("Belgium", "BE"),
    ("Bosnia and Herzegovina", "BA"),
    ("Bulgaria", "BG"),
    ("Croatia", "HR"),
    ("Cyprus", "CY"),
    ("Czech Republic", "CZ"),
    ("Denmark", "DK"),
    ("Estonia", "EE"),
    ("Finland", "FI"),
    ("France", "FR"),
    ("Georgia", "GE"),
    ("Germany", "DE"),
    ("Greece", "GR"),
    ("Hungary", "HU"),
    ("Iceland", "IS"),
    ("Ireland", "IE"),
    ("Italy", "IT"),
    ("Kosovo", "XK"),
    ("Latvia", "LV"),
    ("Liechtenstein", "LI"),
    ("Lithuania", "LT"),
    ("Luxembourg", "LU"),
    ("Malta", "MT"),
    ("Moldova", "MD"),
    ("Monaco", "MC"),
    ("Montenegro", "ME"),
    ("Netherlands", "NL"),
    ("North Macedonia", "MK"),
    ("Norway", "NO"),
    ("Poland", "PL"),
    ("Portugal", "PT"),
    ("Romania", "RO"),
    ("Russia", "RU"),
    ("San Marino", "SM"),
    ("Serbia", "RS"),
    ("Slovakia", "SK"),
    ("Slovenia", "SI"),
    ("Spain", "ES"),
    ("Sweden", "SE"),
    ("Switzerland", "CH"),
    ("Turkey", "TR"),
    ("Ukraine", "UA"),
    ("United Kingdom", "GB"),
    ("Vatican City", "VA"),
    ("United States", "US"),
    ("Canada", "CA"),
    ("Mexico", "MX"),
    ("Japan", "JP"),
    ("South Korea", "KR"),
    ("China", "CN"),
    ("India", "IN"),
    ("Thailand", "TH"),
    ("Singapore", "SG"),
    ("Australia", "AU"),
    ("New Zealand", "NZ"),
    ("South Africa", "ZA"),
    ("Egypt", "EG"),
    ("United Arab Emirates", "AE"),
    ("Saudi Arabia", "SA"),
    ("Israel", "IL"),
];

pub fn country_code_for_name(country_name: &str) -> Option<&'static str> {
    let name = country_name.trim();
    COUNTRY_CODES
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

/// Flattens the per-country catalog into one entry per package. Packages without an id
/// or a positive price are dropped.
pub fn flatten_catalog(catalog: &RoamifyCatalogResponse) -> Vec<ResellerPackage> {
    let mut flattened = Vec::new();

    for country in &catalog.data.countries {
        let country_name = country.country_name.clone().unwrap_or_default();
        let country_code = country
            .country_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
            .or_else(|| country_code_for_name(&country_name).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_COUNTRY_CODE.to_string());

        for package in &country.packages {
            let Some(package_id) = package.package_id.as_deref().filter(|id| !id.is_empty())
            else {
                continue;
            };
            let Some(price) = package.price.filter(|p| *p > 0.0) else {
                continue;
            };

            let data = if package.is_unlimited == Some(true) {
                Some(RawDataAmount::Text("Unlimited".to_string()))
            } else {
                match (package.data_amount, package.data_unit.as_deref()) {
                    (Some(amount), Some(unit)) => {
                        Some(RawDataAmount::Text(format!("{amount} {unit}")))
                    }
                    (Some(amount), None) => Some(RawDataAmount::Number(amount)),
                    _ => None,
                }
            };

            flattened.push(ResellerPackage {
                id: Some(package_id.to_string()),
                description: package.package.clone(),
                country: Some(country_name.clone()),
                country_code: Some(country_code.clone()),
                region: country.region.clone(),
                data,
                days: package.day,
                validity: package.day.map(|d| RawValidity::Text(format!("{d} days"))),
                price: Some(price),
                ..Default::default()
            });
        }
    }

    flattened
}
