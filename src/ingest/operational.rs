use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use super::columns::{self, ColumnMap, TIMESTAMP};
use super::{read_records, IngestError, Ingested, RowError};
use crate::domain::OperationalSample;
use crate::error::PipelineError;

const BATTERY_SOC: &[&str] = &[
    "battery_soc",
    "soc",
    "total battery soc",
    "battery soc",
    "soc_percent",
];
const BATTERY_TEMPERATURE: &[&str] = &[
    "battery_temperature",
    "battery_temp",
    "battery temperature",
    "mbmu battery temperature",
];
const BATTERY_POWER: &[&str] = &[
    "battery_power",
    "total battery power",
    "battery power",
    "bat_power",
];
const PV_POWER: &[&str] = &["pv_power", "total pv power", "pv power", "solar_power", "power"];
const GRID_PHASES: [&[&str]; 3] = [
    &["grid_power_l1", "grid power l1", "grid_l1", "grid_power", "grid power"],
    &["grid_power_l2", "grid power l2", "grid_l2"],
    &["grid_power_l3", "grid power l3", "grid_l3"],
];
const LOAD_PHASES: [&[&str]; 3] = [
    &["load_power_l1", "load power l1", "load_l1", "load_power", "load power"],
    &["load_power_l2", "load power l2", "load_l2"],
    &["load_power_l3", "load power l3", "load_l3"],
];

/// Column positions of one operational export
struct Layout {
    timestamp: usize,
    soc: Option<usize>,
    battery_temperature: Option<usize>,
    battery_power: Option<usize>,
    pv_power: Option<usize>,
    grid: [Option<usize>; 3],
    load: [Option<usize>; 3],
}

impl Layout {
    fn resolve(columns: &ColumnMap) -> Result<Self, IngestError> {
        let timestamp = columns
            .find(TIMESTAMP)
            .ok_or_else(|| IngestError::MissingTimestampColumn(TIMESTAMP.join(", ")))?;
        Ok(Self {
            timestamp,
            soc: columns.find(BATTERY_SOC),
            battery_temperature: columns.find(BATTERY_TEMPERATURE),
            battery_power: columns.find(BATTERY_POWER),
            pv_power: columns.find(PV_POWER),
            grid: GRID_PHASES.map(|aliases| columns.find(aliases)),
            load: LOAD_PHASES.map(|aliases| columns.find(aliases)),
        })
    }

    fn parse(&self, record: &StringRecord) -> Result<OperationalSample, RowError> {
        let raw_timestamp = record.get(self.timestamp).unwrap_or_default();
        let timestamp = super::parse_timestamp(raw_timestamp)
            .ok_or_else(|| RowError::BadTimestamp(raw_timestamp.to_string()))?;

        // free-text field, never fails
        let battery_power = self
            .battery_power
            .and_then(|i| record.get(i))
            .map(columns::extract_power)
            .unwrap_or(0.0);

        Ok(OperationalSample {
            timestamp,
            battery_soc_raw: columns::number(record, self.soc, "battery_soc")?,
            battery_temperature_c: columns::number(
                record,
                self.battery_temperature,
                "battery_temperature",
            )?,
            battery_power_kw: columns::battery_power_kw(battery_power),
            pv_power_kw: columns::number(record, self.pv_power, "pv_power")?,
            grid_power_kw: columns::phase_sum(record, &self.grid, "grid_power")?,
            load_power_kw: columns::phase_sum(record, &self.load, "load_power")?,
        })
    }
}

/// Parse an operational export from any reader.
pub fn parse_operational<R: Read>(reader: R) -> Result<Ingested<OperationalSample>, IngestError> {
    read_records(reader, Layout::resolve, |layout, record| layout.parse(record))
}

/// Read the operational CSV at `path`.
pub fn read_operational_csv(path: &Path) -> Result<Ingested<OperationalSample>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingOperationalData(format!(
            "file {} does not exist",
            path.display()
        )));
    }
    let file = std::fs::File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_operational(file).map_err(|source| PipelineError::Ingest {
        path: path.to_path_buf(),
        source,
    })
}
