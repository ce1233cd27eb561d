//! Weather input for the forecast run
//!
//! Weather comes from a local CSV export when one exists, otherwise from the
//! Open-Meteo hourly forecast API. Both produce the same [`WeatherSample`] rows.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::domain::{Station, WeatherSample};
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::{parse_timestamp, read_weather_csv};

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
const HOURLY_FIELDS: &str = "temperature_2m,cloud_cover,shortwave_radiation,wind_speed_10m";

/// Anything that can supply weather rows for a station
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, station: &Station) -> PipelineResult<Vec<WeatherSample>>;
}

/// Weather observations or forecasts exported to CSV
pub struct CsvWeatherSource {
    path: PathBuf,
}

impl CsvWeatherSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl WeatherSource for CsvWeatherSource {
    async fn fetch(&self, _station: &Station) -> PipelineResult<Vec<WeatherSample>> {
        let path = self.path.clone();
        let ingested = tokio::task::spawn_blocking(move || read_weather_csv(&path))
            .await
            .map_err(|e| {
                PipelineError::MissingWeatherData(format!("weather reader task failed: {e}"))
            })??;

        if ingested.is_empty() {
            return Err(PipelineError::MissingWeatherData(format!(
                "{} contains no readable rows",
                self.path.display()
            )));
        }
        Ok(ingested.samples)
    }
}

/// Open-Meteo hourly forecast client
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    forecast_days: u32,
    past_days: u32,
}

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, forecast_days: u32) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            forecast_days,
            past_days: 0,
        }
    }

    /// Also request this many days of past weather, for overlap with station history.
    pub fn with_past_days(mut self, past_days: u32) -> Self {
        self.past_days = past_days;
        self
    }

    fn parse_hourly(hourly: HourlyBlock) -> Vec<WeatherSample> {
        let mut skipped = 0usize;
        let samples: Vec<WeatherSample> = hourly
            .time
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let sample = parse_timestamp(raw).and_then(|timestamp| {
                    Some(WeatherSample {
                        timestamp,
                        temperature_c: value_at(&hourly.temperature_2m, i)?,
                        cloud_cover_percent: value_at(&hourly.cloud_cover, i)?,
                        irradiance_w_m2: value_at(&hourly.shortwave_radiation, i)?,
                        wind_speed_ms: value_at(&hourly.wind_speed_10m, i),
                    })
                });
                if sample.is_none() {
                    skipped += 1;
                }
                sample
            })
            .collect();

        if skipped > 0 {
            debug!(skipped, "hourly rows with missing values dropped");
        }
        samples
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch(&self, station: &Station) -> PipelineResult<Vec<WeatherSample>> {
        debug!(
            url = %self.base_url,
            latitude = station.latitude,
            longitude = station.longitude,
            "Fetching hourly weather from Open-Meteo"
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", station.latitude.to_string()),
                ("longitude", station.longitude.to_string()),
                ("hourly", HOURLY_FIELDS.to_string()),
                ("wind_speed_unit", "ms".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", self.forecast_days.to_string()),
                ("past_days", self.past_days.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                PipelineError::MissingWeatherData(format!("Open-Meteo request failed: {e}"))
            })?;

        if !response.status().is_success() {
            error!(status = %response.status(), "Open-Meteo returned an error status");
            return Err(PipelineError::MissingWeatherData(format!(
                "Open-Meteo returned HTTP {}",
                response.status()
            )));
        }

        let body: OpenMeteoResponse = response.json().await.map_err(|e| {
            PipelineError::MissingWeatherData(format!("Open-Meteo response unreadable: {e}"))
        })?;

        let samples = Self::parse_hourly(body.hourly);
        if samples.is_empty() {
            return Err(PipelineError::MissingWeatherData(
                "Open-Meteo returned no usable hourly rows".to_string(),
            ));
        }

        info!(rows = samples.len(), "Fetched hourly weather from Open-Meteo");
        Ok(samples)
    }
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    hourly: HourlyBlock,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    shortwave_radiation: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STATION: Station = Station {
        latitude: 59.33,
        longitude: 18.07,
    };

    fn body() -> serde_json::Value {
        serde_json::json!({
            "latitude": 59.33,
            "longitude": 18.07,
            "hourly": {
                "time": ["2024-06-01T00:00", "2024-06-01T01:00", "2024-06-01T02:00"],
                "temperature_2m": [12.5, 12.0, null],
                "cloud_cover": [80.0, 75.0, 70.0],
                "shortwave_radiation": [0.0, 0.0, 5.0],
                "wind_speed_10m": [3.2, null, 2.9]
            }
        })
    }

    #[tokio::test]
    async fn test_open_meteo_hourly_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("wind_speed_unit", "ms"))
            .and(query_param("forecast_days", "7"))
            .and(query_param("past_days", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body()))
            .mount(&server)
            .await;

        let client =
            OpenMeteoClient::new(server.uri(), Duration::from_secs(5), 7).with_past_days(2);
        let samples = client.fetch(&STATION).await.unwrap();

        // third row lacks a temperature
        assert_eq!(samples.len(), 2);
        assert_eq!(
            samples[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(samples[0].cloud_cover_percent, 80.0);
        assert_eq!(samples[0].wind_speed_ms, Some(3.2));
        assert_eq!(samples[1].wind_speed_ms, None);
    }

    #[tokio::test]
    async fn test_open_meteo_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(server.uri(), Duration::from_secs(5), 7);
        let err = client.fetch(&STATION).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingWeatherData(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_csv_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,temperature,cloud_cover,irradiance").unwrap();
        writeln!(file, "2024-06-01 12:00,21.0,10,640").unwrap();
        writeln!(file, "2024-06-01 13:00,22.0,20,610").unwrap();

        let samples = CsvWeatherSource::new(file.path())
            .fetch(&STATION)
            .await
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].irradiance_w_m2, 610.0);
    }

    #[tokio::test]
    async fn test_csv_source_missing_file() {
        let err = CsvWeatherSource::new("/nonexistent/weather.csv")
            .fetch(&STATION)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingWeatherData(_)));
    }
}
