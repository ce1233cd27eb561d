use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Anything that sits on the shared timeline.
pub trait Timestamped {
    fn timestamp(&self) -> NaiveDateTime;

    fn date(&self) -> NaiveDate {
        self.timestamp().date()
    }
}

/// Geographic location of the installation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Latitude in degrees (positive = north)
    pub latitude: f64,
    /// Longitude in degrees (positive = east)
    pub longitude: f64,
}

/// One row of the on-site operational export
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperationalSample {
    pub timestamp: NaiveDateTime,
    /// Battery state of charge as reported (%), 0 when missing
    pub battery_soc_raw: f64,
    pub battery_temperature_c: f64,
    /// Signed battery power (kW)
    pub battery_power_kw: f64,
    pub pv_power_kw: f64,
    /// Sum of up to three grid phases (kW)
    pub grid_power_kw: f64,
    /// Sum of up to three load phases (kW)
    pub load_power_kw: f64,
}

impl Timestamped for OperationalSample {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// One weather observation or forecast row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub timestamp: NaiveDateTime,
    pub temperature_c: f64,
    /// Cloud cover (0-100%)
    pub cloud_cover_percent: f64,
    /// Global horizontal irradiance (W/m²)
    pub irradiance_w_m2: f64,
    pub wind_speed_ms: Option<f64>,
}

impl Timestamped for WeatherSample {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Operational fields as consumed by feature engineering.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationalReadings {
    pub battery_soc: f64,
    pub battery_temperature_c: f64,
    pub battery_power_kw: f64,
    pub grid_power_kw: f64,
    pub load_power_kw: f64,
    pub pv_power_kw: f64,
}

impl OperationalReadings {
    /// Readings straight from a sample, with the state of charge clamped to [0, 100].
    pub fn from_sample(sample: &OperationalSample) -> Self {
        Self {
            battery_soc: sample.battery_soc_raw.clamp(0.0, 100.0),
            battery_temperature_c: sample.battery_temperature_c,
            battery_power_kw: sample.battery_power_kw,
            grid_power_kw: sample.grid_power_kw,
            load_power_kw: sample.load_power_kw,
            pv_power_kw: sample.pv_power_kw,
        }
    }
}

/// An operational sample paired with the weather sample nearest to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedSample {
    pub operational: OperationalSample,
    pub weather: WeatherSample,
    /// Solar elevation clamped to [-5, 90] degrees
    pub solar_elevation_deg: f64,
    /// max(0, elevation) / 90
    pub solar_elevation_norm: f64,
    /// State of charge clamped to [0, 100], later gap-filled
    pub soc_clean: f64,
}

impl AlignedSample {
    pub fn readings(&self) -> OperationalReadings {
        OperationalReadings {
            battery_soc: self.soc_clean,
            ..OperationalReadings::from_sample(&self.operational)
        }
    }
}

impl Timestamped for AlignedSample {
    fn timestamp(&self) -> NaiveDateTime {
        self.operational.timestamp
    }
}

/// Flattened historical overlap row used for calibration.
///
/// Carries no wind speed; elevation in degrees is recovered from the normalized value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRow {
    pub timestamp: NaiveDateTime,
    pub temperature_c: f64,
    pub cloud_cover_percent: f64,
    pub irradiance_w_m2: f64,
    pub solar_elevation_norm: f64,
    pub readings: OperationalReadings,
}

impl HistoricalRow {
    pub fn solar_elevation_deg(&self) -> f64 {
        self.solar_elevation_norm * 90.0
    }

    /// Measured PV output (kW), the calibration target
    pub fn true_power_kw(&self) -> f64 {
        self.readings.pv_power_kw
    }
}

impl From<&AlignedSample> for HistoricalRow {
    fn from(sample: &AlignedSample) -> Self {
        Self {
            timestamp: sample.operational.timestamp,
            temperature_c: sample.weather.temperature_c,
            cloud_cover_percent: sample.weather.cloud_cover_percent,
            irradiance_w_m2: sample.weather.irradiance_w_m2,
            solar_elevation_norm: sample.solar_elevation_norm,
            readings: sample.readings(),
        }
    }
}

impl Timestamped for HistoricalRow {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// A weather row to forecast for, with the closest operational context if one was in reach
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub weather: WeatherSample,
    pub solar_elevation_deg: f64,
    pub solar_elevation_norm: f64,
    pub context: Option<OperationalReadings>,
}

impl Timestamped for ForecastRow {
    fn timestamp(&self) -> NaiveDateTime {
        self.weather.timestamp
    }
}
