use std::collections::HashMap;

use csv::StringRecord;
use once_cell::sync::Lazy;
use regex::Regex;

use super::RowError;

static SIGNED_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").expect("valid decimal pattern"));

/// Magnitudes above this on the battery power field are taken to be watts.
pub const BATTERY_POWER_WATTS_THRESHOLD: f64 = 100.0;

pub const TIMESTAMP: &[&str] = &[
    "timestamp",
    "time",
    "datetime",
    "date_time",
    "update time",
    "updatetime",
    "date",
];

/// Case-insensitive lookup from header names to column positions
#[derive(Debug, Clone)]
pub struct ColumnMap {
    index: HashMap<String, usize>,
    width: usize,
}

impl ColumnMap {
    pub fn from_header(header: &StringRecord) -> Self {
        let mut index = HashMap::new();
        for (i, name) in header.iter().enumerate() {
            // first occurrence wins on duplicate headers
            index.entry(normalize(name)).or_insert(i);
        }
        Self {
            index,
            width: header.len(),
        }
    }

    /// Position of the first alias present in the header.
    pub fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.index.get(&normalize(alias)).copied())
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

fn normalize(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_lowercase()
}

/// Check that a record is as wide as the header.
pub fn check_width(record: &StringRecord, columns: &ColumnMap) -> Result<(), RowError> {
    if record.len() < columns.width() {
        return Err(RowError::TooFewColumns {
            expected: columns.width(),
            found: record.len(),
        });
    }
    Ok(())
}

/// Plain numeric cell. Absent column or empty cell reads as 0.
pub fn number(
    record: &StringRecord,
    column: Option<usize>,
    name: &str,
) -> Result<f64, RowError> {
    let Some(raw) = column.and_then(|i| record.get(i)) else {
        return Ok(0.0);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(0.0);
    }
    value.parse::<f64>().map_err(|_| RowError::BadNumber {
        column: name.to_string(),
        value: value.to_string(),
    })
}

/// Optional numeric cell: `None` for an absent column or empty cell.
pub fn optional_number(
    record: &StringRecord,
    column: Option<usize>,
    name: &str,
) -> Result<Option<f64>, RowError> {
    match column.and_then(|i| record.get(i)) {
        Some(raw) if !raw.trim().is_empty() => number(record, column, name).map(Some),
        _ => Ok(None),
    }
}

/// Sum of up to three per-phase columns; missing phases count as 0.
pub fn phase_sum(
    record: &StringRecord,
    phases: &[Option<usize>],
    name: &str,
) -> Result<f64, RowError> {
    phases
        .iter()
        .try_fold(0.0, |acc, column| Ok(acc + number(record, *column, name)?))
}

/// First signed decimal found in free text such as `"123,4 W"`; 0 when there is none.
pub fn extract_power(raw: &str) -> f64 {
    let normalized = raw.replace(',', ".");
    SIGNED_DECIMAL
        .find(&normalized)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Battery power in kW. Exports mix units, so magnitudes above 100 are read as watts.
pub fn battery_power_kw(value: f64) -> f64 {
    if value.abs() > BATTERY_POWER_WATTS_THRESHOLD {
        value / 1000.0
    } else {
        value
    }
}
