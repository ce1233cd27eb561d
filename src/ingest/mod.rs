//! Tabular ingestion of operational and weather exports
//!
//! Both readers share the same rules: headers are matched case-insensitively
//! against a set of aliases per field, absent columns read as 0, and a row
//! that cannot be parsed is skipped and counted instead of failing the file.

use std::io::Read;

use csv::StringRecord;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::Timestamped;
use self::columns::ColumnMap;

pub mod columns;
pub mod operational;
pub mod timestamp;
pub mod weather;

pub use operational::{parse_operational, read_operational_csv};
pub use timestamp::parse_timestamp;
pub use weather::{parse_weather, read_weather_csv};

/// Whole-input failures; single bad rows never end up here
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unreadable header row: {0}")]
    Header(#[source] csv::Error),
    #[error("no timestamp column (looked for {0})")]
    MissingTimestampColumn(String),
}

/// Why a single row was skipped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("unparseable timestamp '{0}'")]
    BadTimestamp(String),
    #[error("expected {expected} columns, found {found}")]
    TooFewColumns { expected: usize, found: usize },
    #[error("column '{column}' is not a number: '{value}'")]
    BadNumber { column: String, value: String },
    #[error("unreadable record: {0}")]
    Unreadable(String),
}

/// Row accounting for one ingested input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub rows_total: usize,
    pub rows_skipped: usize,
    pub bad_timestamp: usize,
    pub too_few_columns: usize,
    pub bad_number: usize,
    pub unreadable: usize,
}

impl IngestReport {
    pub fn record_skip(&mut self, err: &RowError) {
        self.rows_skipped += 1;
        match err {
            RowError::BadTimestamp(_) => self.bad_timestamp += 1,
            RowError::TooFewColumns { .. } => self.too_few_columns += 1,
            RowError::BadNumber { .. } => self.bad_number += 1,
            RowError::Unreadable(_) => self.unreadable += 1,
        }
    }

    pub fn rows_parsed(&self) -> usize {
        self.rows_total - self.rows_skipped
    }
}

/// Parsed samples, sorted by timestamp, plus the skip accounting
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub samples: Vec<T>,
    pub report: IngestReport,
}

impl<T> Ingested<T> {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Shared row loop: resolve the header once, parse every record, skip and count failures.
pub(crate) fn read_records<R, L, T, F>(
    reader: R,
    resolve: impl FnOnce(&ColumnMap) -> Result<L, IngestError>,
    parse: F,
) -> Result<Ingested<T>, IngestError>
where
    R: Read,
    T: Timestamped,
    F: Fn(&L, &StringRecord) -> Result<T, RowError>,
{
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = ColumnMap::from_header(reader.headers().map_err(IngestError::Header)?);
    let layout = resolve(&columns)?;

    let mut samples = Vec::new();
    let mut report = IngestReport::default();

    for (line, result) in reader.records().enumerate() {
        report.rows_total += 1;
        let parsed = result
            .map_err(|e| RowError::Unreadable(e.to_string()))
            .and_then(|record| {
                columns::check_width(&record, &columns)?;
                parse(&layout, &record)
            });
        match parsed {
            Ok(sample) => samples.push(sample),
            Err(err) => {
                debug!(line = line + 2, %err, "skipping row");
                report.record_skip(&err);
            }
        }
    }

    samples.sort_by_key(|s| s.timestamp());

    if report.rows_skipped > 0 {
        warn!(
            rows_total = report.rows_total,
            rows_skipped = report.rows_skipped,
            "some rows could not be parsed"
        );
    }

    Ok(Ingested { samples, report })
}
