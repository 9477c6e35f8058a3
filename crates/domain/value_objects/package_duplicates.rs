use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::data_amounts::RawDataAmount;
use super::reseller_packages::{RawValidity, ResellerPackage};

pub const DEDUP_DELETE_BATCH_SIZE: usize = 100;
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateAnalysis {
    pub total_packages: usize,
    pub duplicate_ids: BTreeMap<String, Vec<ResellerPackage>>,
    pub duplicate_combinations: BTreeMap<String, Vec<ResellerPackage>>,
    pub has_duplicates: bool,
}

/// `country|data|days|price` exactly as the reseller sent them.
pub fn combination_key(package: &ResellerPackage) -> String {
    let country = package.country().unwrap_or(UNKNOWN).to_string();
    let data = match package.raw_data_amount() {
        Some(RawDataAmount::Number(n)) => n.to_string(),
        Some(RawDataAmount::Text(t)) if !t.trim().is_empty() => t.trim().to_string(),
        _ => UNKNOWN.to_string(),
    };
    let days = match (&package.validity, package.days.or(package.day)) {
        (Some(RawValidity::Text(t)), _) if !t.trim().is_empty() => t.trim().to_string(),
        (Some(RawValidity::Days(d)), _) => d.to_string(),
        (_, Some(d)) => d.to_string(),
        _ => UNKNOWN.to_string(),
    };
    let price = package
        .base_price()
        .map(|p| p.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    format!("{country}|{data}|{days}|{price}")
}

/// Single pass tally by reseller id and by combination key.
pub fn analyze_duplicates(packages: &[ResellerPackage]) -> DuplicateAnalysis {
    let mut by_id: BTreeMap<String, Vec<ResellerPackage>> = BTreeMap::new();
    let mut by_combination: BTreeMap<String, Vec<ResellerPackage>> = BTreeMap::new();

    for package in packages {
        let id = package.duplicate_id().unwrap_or(UNKNOWN).to_string();
        by_id.entry(id).or_default().push(package.clone());
        by_combination
            .entry(combination_key(package))
            .or_default()
            .push(package.clone());
    }

    by_id.retain(|_, group| group.len() > 1);
    by_combination.retain(|_, group| group.len() > 1);

    DuplicateAnalysis {
        total_packages: packages.len(),
        has_duplicates: !by_id.is_empty() || !by_combination.is_empty(),
        duplicate_ids: by_id,
        duplicate_combinations: by_combination,
    }
}

/// What the deduplication pass needs to know about a `my_packages` row.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupRow {
    pub id: Uuid,
    pub reseller_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completeness: u32,
    pub combination_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeduplicationPlan {
    pub delete_ids: Vec<Uuid>,
    pub reseller_id_duplicates: usize,
    pub combination_duplicates: usize,
    pub remaining_count: usize,
}

impl DeduplicationPlan {
    pub fn removed_count(&self) -> usize {
        self.delete_ids.len()
    }

    pub fn delete_batches(&self) -> impl Iterator<Item = &[Uuid]> {
        self.delete_ids.chunks(DEDUP_DELETE_BATCH_SIZE)
    }
}

/// `rows` must be ordered newest first. One row survives per reseller id (highest
/// completeness, newer on ties), then later rows repeating a combination are dropped.
pub fn plan_deduplication(rows: &[DedupRow]) -> DeduplicationPlan {
    let mut plan = DeduplicationPlan::default();

    let mut keep: Vec<&DedupRow> = Vec::new();
    let mut by_reseller: Vec<&DedupRow> = Vec::new();
    let mut reseller_index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let Some(reseller_id) = row.reseller_id.as_deref().filter(|r| !r.is_empty()) else {
            keep.push(row);
            continue;
        };

        match reseller_index.get(reseller_id) {
            None => {
                reseller_index.insert(reseller_id, by_reseller.len());
                by_reseller.push(row);
            }
            Some(&index) => {
                let existing = by_reseller[index];
                let replaces = row.completeness > existing.completeness
                    || (row.completeness == existing.completeness
                        && row.created_at > existing.created_at);
                if replaces {
                    plan.delete_ids.push(existing.id);
                    by_reseller[index] = row;
                } else {
                    plan.delete_ids.push(row.id);
                }
                plan.reseller_id_duplicates += 1;
            }
        }
    }
    keep.extend(by_reseller);

    let mut seen: HashMap<&str, Uuid> = HashMap::new();
    for row in keep {
        if seen.contains_key(row.combination_key.as_str()) {
            plan.delete_ids.push(row.id);
            plan.combination_duplicates += 1;
        } else {
            seen.insert(&row.combination_key, row.id);
        }
    }
    plan.remaining_count = seen.len();

    plan
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn reseller(id: &str, country: &str, data: &str, days: i32, price: f64) -> ResellerPackage {
        ResellerPackage {
            id: Some(id.to_string()),
            country: Some(country.to_string()),
            data: Some(RawDataAmount::Text(data.to_string())),
            days: Some(days),
            price: Some(price),
            ..Default::default()
        }
    }

    #[test]
    fn shared_combination_is_reported() {
        let packages = vec![
            reseller("a", "Greece", "1GB", 7, 3.5),
            reseller("b", "Greece", "1GB", 7, 3.5),
            reseller("c", "Italy", "1GB", 7, 3.5),
        ];
        let analysis = analyze_duplicates(&packages);

        assert!(analysis.has_duplicates);
        assert!(analysis.duplicate_ids.is_empty());
        let group = &analysis.duplicate_combinations["Greece|1GB|7|3.5"];
        let ids: Vec<_> = group.iter().filter_map(|p| p.duplicate_id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn repeated_ids_are_reported() {
        let packages = vec![
            reseller("a", "Greece", "1GB", 7, 3.5),
            reseller("a", "Greece", "3GB", 30, 9.0),
        ];
        let analysis = analyze_duplicates(&packages);
        assert_eq!(analysis.duplicate_ids["a"].len(), 2);
        assert!(analysis.duplicate_combinations.is_empty());
    }

    #[test]
    fn distinct_packages_yield_empty_maps() {
        let packages = vec![
            reseller("a", "Greece", "1GB", 7, 3.5),
            reseller("b", "Greece", "1GB", 30, 3.5),
            reseller("c", "Greece", "3GB", 7, 3.5),
        ];
        let analysis = analyze_duplicates(&packages);
        assert_eq!(analysis.total_packages, 3);
        assert!(!analysis.has_duplicates);
        assert!(analysis.duplicate_ids.is_empty());
        assert!(analysis.duplicate_combinations.is_empty());
    }

    #[test]
    fn missing_fields_fall_back_to_unknown() {
        assert_eq!(
            combination_key(&ResellerPackage::default()),
            "unknown|unknown|unknown|unknown"
        );
    }

    fn row(reseller_id: Option<&str>, age_minutes: i64, completeness: u32, key: &str) -> DedupRow {
        DedupRow {
            id: Uuid::new_v4(),
            reseller_id: reseller_id.map(str::to_string),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            completeness,
            combination_key: key.to_string(),
        }
    }

    #[test]
    fn keeps_most_complete_row_per_reseller_id() {
        let newest = row(Some("r1"), 0, 10, "k1");
        let complete = row(Some("r1"), 5, 15, "k1");
        let oldest = row(Some("r1"), 10, 15, "k1");

        let plan = plan_deduplication(&[newest.clone(), complete.clone(), oldest.clone()]);

        assert_eq!(plan.reseller_id_duplicates, 2);
        assert_eq!(plan.combination_duplicates, 0);
        assert_eq!(plan.remaining_count, 1);
        assert!(plan.delete_ids.contains(&newest.id));
        assert!(plan.delete_ids.contains(&oldest.id));
        assert!(!plan.delete_ids.contains(&complete.id));
    }

    #[test]
    fn drops_later_rows_sharing_a_combination() {
        let manual = row(None, 0, 12, "Greece|1|7|450");
        let synced = row(Some("r1"), 5, 17, "Greece|1|7|450");
        let other = row(Some("r2"), 6, 17, "Italy|1|7|450");

        let plan = plan_deduplication(&[manual.clone(), synced.clone(), other.clone()]);

        // Rows without a reseller id are considered first in the second pass.
        assert_eq!(plan.delete_ids, vec![synced.id]);
        assert_eq!(plan.combination_duplicates, 1);
        assert_eq!(plan.remaining_count, 2);
    }

    #[test]
    fn deletes_run_in_batches_of_one_hundred() {
        let rows: Vec<_> = (0..250).map(|i| row(Some("same"), i, 1, "k")).collect();
        let plan = plan_deduplication(&rows);
        assert_eq!(plan.removed_count(), 249);
        let sizes: Vec<_> = plan.delete_batches().map(<[Uuid]>::len).collect();
        assert_eq!(sizes, vec![100, 100, 49]);
    }
}
