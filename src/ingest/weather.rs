use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use super::columns::{self, ColumnMap, TIMESTAMP};
use super::{read_records, IngestError, Ingested, RowError};
use crate::domain::WeatherSample;
use crate::error::PipelineError;

const TEMPERATURE: &[&str] = &[
    "temperature",
    "temp",
    "temperature_2m",
    "air_temperature",
    "temperature_c",
];
const CLOUD_COVER: &[&str] = &[
    "cloud_cover",
    "cloudcover",
    "clouds",
    "cloud_cover_percent",
    "cloud",
];
const IRRADIANCE: &[&str] = &[
    "irradiance",
    "shortwave_radiation",
    "ghi",
    "solar_radiation",
    "radiation",
    "irradiance_w_m2",
];
const WIND_SPEED: &[&str] = &["wind_speed", "windspeed", "wind_speed_10m", "wind"];

struct Layout {
    timestamp: usize,
    temperature: Option<usize>,
    cloud_cover: Option<usize>,
    irradiance: Option<usize>,
    wind_speed: Option<usize>,
}

impl Layout {
    fn resolve(columns: &ColumnMap) -> Result<Self, IngestError> {
        let timestamp = columns
            .find(TIMESTAMP)
            .ok_or_else(|| IngestError::MissingTimestampColumn(TIMESTAMP.join(", ")))?;
        Ok(Self {
            timestamp,
            temperature: columns.find(TEMPERATURE),
            cloud_cover: columns.find(CLOUD_COVER),
            irradiance: columns.find(IRRADIANCE),
            wind_speed: columns.find(WIND_SPEED),
        })
    }

    fn parse(&self, record: &StringRecord) -> Result<WeatherSample, RowError> {
        let raw_timestamp = record.get(self.timestamp).unwrap_or_default();
        let timestamp = super::parse_timestamp(raw_timestamp)
            .ok_or_else(|| RowError::BadTimestamp(raw_timestamp.to_string()))?;

        Ok(WeatherSample {
            timestamp,
            temperature_c: columns::number(record, self.temperature, "temperature")?,
            cloud_cover_percent: columns::number(record, self.cloud_cover, "cloud_cover")?,
            irradiance_w_m2: columns::number(record, self.irradiance, "irradiance")?,
            wind_speed_ms: columns::optional_number(record, self.wind_speed, "wind_speed")?,
        })
    }
}

/// Parse a weather table from any reader.
pub fn parse_weather<R: Read>(reader: R) -> Result<Ingested<WeatherSample>, IngestError> {
    read_records(reader, Layout::resolve, |layout, record| layout.parse(record))
}

/// Read the weather CSV at `path`.
pub fn read_weather_csv(path: &Path) -> Result<Ingested<WeatherSample>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingWeatherData(format!(
            "file {} does not exist",
            path.display()
        )));
    }
    let file = std::fs::File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_weather(file).map_err(|source| PipelineError::Ingest {
        path: path.to_path_buf(),
        source,
    })
}
