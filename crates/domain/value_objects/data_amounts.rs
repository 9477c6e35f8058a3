use serde::{Deserialize, Serialize};

/// Largest value (in GB) we still accept as a plausible package size when undoing the
/// legacy MB-stored-as-GB mistake.
pub const MAX_REASONABLE_GB: f64 = 100.0;

const MB_PER_GB: f64 = 1024.0;

/// Data amount as the reseller API (or an admin form) hands it to us: either a bare
/// number or a free-form string such as `"3GB"`, `"500 MB"` or `"Unlimited"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDataAmount {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataUnit {
    Gb,
    Mb,
    Kb,
}

impl DataUnit {
    fn to_gb(self, value: f64) -> f64 {
        match self {
            DataUnit::Gb => value,
            DataUnit::Mb => value / MB_PER_GB,
            DataUnit::Kb => value / MB_PER_GB / MB_PER_GB,
        }
    }
}

/// Normalizes any raw data amount into GB. `0` means unlimited.
pub fn parse_data_amount_to_gb(input: &RawDataAmount) -> f64 {
    match input {
        RawDataAmount::Number(value) => normalize_numeric_data_amount(*value),
        RawDataAmount::Text(text) => parse_data_amount_text(text),
    }
}

/// `"3GB"` -> 3, `"500MB"` -> 500/1024, `"2.5 gb"` -> 2.5, `"10"` -> 10, `"Unlimited"` -> 0.
pub fn parse_data_amount_text(input: &str) -> f64 {
    if is_unlimited(input) {
        return 0.0;
    }

    match quantities(input, false).into_iter().next() {
        Some((value, unit)) => unit.unwrap_or(DataUnit::Gb).to_gb(value),
        None => 0.0,
    }
}

/// Bare numbers are GB unless they look like a whole number of GB accidentally
/// stored in MB (e.g. `3072`).
pub fn normalize_numeric_data_amount(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    legacy_mb_to_gb(value).unwrap_or(value)
}

/// Repairs data amounts persisted in MB by older sync runs (1024, 3072, ... 51200).
/// Already sane values are returned unchanged.
pub fn fix_incorrect_data_amount(current_value: f64) -> f64 {
    legacy_mb_to_gb(current_value).unwrap_or(current_value)
}

fn legacy_mb_to_gb(value: f64) -> Option<f64> {
    if value > MAX_REASONABLE_GB && value % MB_PER_GB == 0.0 {
        let gb = value / MB_PER_GB;
        if gb <= MAX_REASONABLE_GB {
            return Some(gb);
        }
    }
    None
}

pub fn format_data_amount_for_display(value_in_gb: f64) -> String {
    if value_in_gb == 0.0 {
        return "Unlimited".to_string();
    }
    if value_in_gb >= 1.0 {
        if value_in_gb.fract() == 0.0 {
            return format!("{} GB", value_in_gb);
        }
        return format!("{:.1} GB", value_in_gb);
    }
    format!("{} MB", (value_in_gb * MB_PER_GB).round())
}

/// Pulls the data allowance out of a marketing name like `"Albania 15GB"`.
pub fn extract_data_amount_from_name(name: &str) -> f64 {
    if name.trim().is_empty() || is_unlimited(name) {
        return 0.0;
    }

    let quantities = quantities(name, true);
    if let Some((value, _)) = quantities.iter().find(|(_, unit)| *unit == Some(DataUnit::Gb)) {
        return *value;
    }
    if let Some((value, _)) = quantities.iter().find(|(_, unit)| *unit == Some(DataUnit::Mb)) {
        return DataUnit::Mb.to_gb(*value);
    }
    0.0
}

fn is_unlimited(input: &str) -> bool {
    input.to_ascii_lowercase().contains("unlimited")
}

/// Scans `input` for `<number>[ws]<unit>` groups. The number may carry a decimal part.
/// With `with_unit_only` set, bare numbers are skipped.
fn quantities(input: &str, with_unit_only: bool) -> Vec<(f64, Option<DataUnit>)> {
    let bytes = input.as_bytes();
    let mut found = Vec::new();
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
        if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        let number = &input[start..i];

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let unit = unit_at(bytes, j);

        if let Ok(value) = number.parse::<f64>() {
            if unit.is_some() || !with_unit_only {
                found.push((value, unit));
            }
        }
        if unit.is_some() {
            i = j + 2;
        }
    }

    found
}

fn unit_at(bytes: &[u8], at: usize) -> Option<DataUnit> {
    if at + 1 >= bytes.len() {
        return None;
    }
    match (
        bytes[at].to_ascii_uppercase(),
        bytes[at + 1].to_ascii_uppercase(),
    ) {
        (b'G', b'B') => Some(DataUnit::Gb),
        (b'M', b'B') => Some(DataUnit::Mb),
        (b'K', b'B') => Some(DataUnit::Kb),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> RawDataAmount {
        RawDataAmount::Text(value.to_string())
    }

    #[test]
    fn gb_strings_parse_to_their_prefix() {
        for (raw, expected) in [("3GB", 3.0), ("1gb", 1.0), ("2.5 GB", 2.5), ("50 Gb", 50.0)] {
            assert_eq!(parse_data_amount_to_gb(&text(raw)), expected, "input: {raw}");
        }
    }

    #[test]
    fn mb_and_kb_strings_are_converted() {
        assert_eq!(parse_data_amount_text("500MB"), 500.0 / 1024.0);
        assert_eq!(parse_data_amount_text("1024MB"), 1.0);
        assert_eq!(parse_data_amount_text("512 mb"), 0.5);
        assert_eq!(parse_data_amount_text("1048576KB"), 1.0);
    }

    #[test]
    fn unlimited_is_zero_in_any_case() {
        for raw in ["Unlimited", "UNLIMITED", "unlimited data", "Global Unlimited 30 days"] {
            assert_eq!(parse_data_amount_text(raw), 0.0, "input: {raw}");
        }
    }

    #[test]
    fn strings_without_numbers_are_zero() {
        assert_eq!(parse_data_amount_text(""), 0.0);
        assert_eq!(parse_data_amount_text("lots of data"), 0.0);
    }

    #[test]
    fn missing_unit_defaults_to_gb() {
        assert_eq!(parse_data_amount_text("10"), 10.0);
        assert_eq!(parse_data_amount_text("10 days"), 10.0);
    }

    #[test]
    fn numbers_that_look_like_legacy_mb_are_converted() {
        assert_eq!(parse_data_amount_to_gb(&RawDataAmount::Number(3072.0)), 3.0);
        assert_eq!(parse_data_amount_to_gb(&RawDataAmount::Number(102400.0)), 100.0);
    }

    #[test]
    fn plain_numbers_stay_in_gb() {
        assert_eq!(parse_data_amount_to_gb(&RawDataAmount::Number(20.0)), 20.0);
        assert_eq!(parse_data_amount_to_gb(&RawDataAmount::Number(0.5)), 0.5);
        // 1024 * 200 GB is not a plausible package, keep it as-is.
        assert_eq!(
            parse_data_amount_to_gb(&RawDataAmount::Number(204800.0)),
            204800.0
        );
        assert_eq!(parse_data_amount_to_gb(&RawDataAmount::Number(f64::NAN)), 0.0);
    }

    #[test]
    fn incorrect_data_amounts_are_fixed() {
        assert_eq!(fix_incorrect_data_amount(15360.0), 15.0);
        assert_eq!(fix_incorrect_data_amount(51200.0), 50.0);
        assert_eq!(fix_incorrect_data_amount(2048.0), 2.0);
        assert_eq!(fix_incorrect_data_amount(15.0), 15.0);
        assert_eq!(fix_incorrect_data_amount(150.0), 150.0);
    }

    #[test]
    fn display_formatting() {
        assert_eq!(format_data_amount_for_display(0.0), "Unlimited");
        assert_eq!(format_data_amount_for_display(3.0), "3 GB");
        assert_eq!(format_data_amount_for_display(1.5), "1.5 GB");
        assert_eq!(format_data_amount_for_display(0.5), "512 MB");
    }

    #[test]
    fn amounts_are_extracted_from_names() {
        assert_eq!(extract_data_amount_from_name("Albania 15GB"), 15.0);
        assert_eq!(extract_data_amount_from_name("Europe 30 days 3 GB"), 3.0);
        assert_eq!(extract_data_amount_from_name("Starter 512MB"), 0.5);
        assert_eq!(extract_data_amount_from_name("Global Unlimited"), 0.0);
        assert_eq!(extract_data_amount_from_name("Mystery pack"), 0.0);
    }

    #[test]
    fn raw_amounts_deserialize_from_numbers_and_strings() {
        let number: RawDataAmount = serde_json::from_str("3").unwrap();
        assert_eq!(number, RawDataAmount::Number(3.0));

        let text: RawDataAmount = serde_json::from_str("\"3 GB\"").unwrap();
        assert_eq!(text, RawDataAmount::Text("3 GB".to_string()));
    }
}
