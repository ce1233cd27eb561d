use std::path::PathBuf;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::domain::Station;
use crate::error::PipelineError;
use crate::forecast::postprocess::DEFAULT_PERFORMANCE_RATIO;
use crate::forecast::weather::OPEN_METEO_URL;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub plant: PlantConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlantConfig {
    #[serde(default)]
    pub inverter_capacity_kw: f64,
    #[serde(default)]
    pub panel_power_w: f64,
    #[serde(default)]
    pub panel_count: u32,
    #[serde(default = "default_performance_ratio")]
    pub performance_ratio: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            inverter_capacity_kw: 0.0,
            panel_power_w: 0.0,
            panel_count: 0,
            performance_ratio: DEFAULT_PERFORMANCE_RATIO,
        }
    }
}

impl PlantConfig {
    /// Clipping limit (kW): the smaller of inverter and array capacity, 0 when neither is set.
    pub fn capacity_kw(&self) -> f64 {
        let array_kw = self.panel_power_w * self.panel_count as f64 / 1000.0;
        [self.inverter_capacity_kw, array_kw]
            .into_iter()
            .filter(|kw| *kw > 0.0)
            .fold(None, |min: Option<f64>, kw| Some(min.map_or(kw, |m| m.min(kw))))
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub operational_csv: PathBuf,
    pub weather_csv: PathBuf,
    pub forecast_model: PathBuf,
    pub battery_model: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            operational_csv: PathBuf::from("data/operational.csv"),
            weather_csv: PathBuf::from("data/weather.csv"),
            forecast_model: PathBuf::from("models/forecast.json"),
            battery_model: PathBuf::from("models/battery.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub forecast_days: u32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: OPEN_METEO_URL.to_string(),
            timeout_seconds: 30,
            forecast_days: 7,
        }
    }
}

fn default_performance_ratio() -> f64 {
    DEFAULT_PERFORMANCE_RATIO
}

impl Config {
    pub fn load() -> Result<Self> {
        // a missing .env is fine
        dotenvy::dotenv().ok();
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("EI__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(lat) = self.station.latitude {
            anyhow::ensure!(
                (-90.0..=90.0).contains(&lat),
                "station.latitude {lat} is outside [-90, 90]"
            );
        }
        if let Some(lon) = self.station.longitude {
            anyhow::ensure!(
                (-180.0..=180.0).contains(&lon),
                "station.longitude {lon} is outside [-180, 180]"
            );
        }
        anyhow::ensure!(
            self.plant.inverter_capacity_kw >= 0.0 && self.plant.panel_power_w >= 0.0,
            "plant capacities must not be negative"
        );
        let ratio = self.plant.performance_ratio;
        anyhow::ensure!(
            ratio > 0.0 && ratio <= 1.5,
            "plant.performance_ratio {ratio} is outside (0, 1.5]"
        );
        Ok(())
    }

    /// Station location, required by every run.
    pub fn station(&self) -> Result<Station, PipelineError> {
        match (self.station.latitude, self.station.longitude) {
            (Some(latitude), Some(longitude)) => Ok(Station {
                latitude,
                longitude,
            }),
            _ => Err(PipelineError::MissingStationConfig),
        }
    }
}
