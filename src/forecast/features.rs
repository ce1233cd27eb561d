//! Feature engineering for forecasting models
//!
//! Turns one aligned sample (or historical / forecast row) into the numeric
//! vector a model expects. The order comes entirely from the model's feature
//! name list; anything that is unknown by name, or cannot be computed for the
//! row at hand, is filled with that position's stored mean.

use std::f64::consts::PI;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use strum::EnumString;
use tracing::debug;

use crate::domain::{AlignedSample, ForecastRow, HistoricalRow, OperationalReadings};
use crate::ml::ModelMetadata;

/// Features the engineer knows how to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Feature {
    Hour,
    HourSin,
    HourCos,
    DaySin,
    DayCos,
    #[strum(serialize = "temperature", serialize = "temp")]
    Temperature,
    #[strum(serialize = "cloud_cover", serialize = "cloud")]
    CloudCover,
    Irradiance,
    WindSpeed,
    SolarElev,
    SolarElevNorm,
    EffectiveIrradiance,
    IrradianceSq,
    TempSq,
    HourSinIrr,
    #[strum(serialize = "battery_soc", serialize = "soc")]
    BatterySoc,
    #[strum(serialize = "battery_temperature", serialize = "battery_temp")]
    BatteryTemperature,
    BatteryPower,
    GridPower,
    LoadPower,
    #[strum(serialize = "power", serialize = "pv_power")]
    Power,
    #[strum(serialize = "battery_soc_lag1", serialize = "soc_lag1")]
    BatterySocLag1,
    #[strum(serialize = "battery_power_lag1")]
    BatteryPowerLag1,
    #[strum(serialize = "grid_power_lag1")]
    GridPowerLag1,
    #[strum(serialize = "load_power_lag1")]
    LoadPowerLag1,
    #[strum(serialize = "power_lag1", serialize = "pv_power_lag1")]
    PowerLag1,
}

/// Operational values of the chronologically preceding row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Previous {
    /// First row of the series: lags read 0
    None,
    Known(OperationalReadings),
    /// A predecessor exists but carries no operational values: lags are imputed
    Unknown,
}

/// Everything feature engineering may read for one row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureInput {
    pub timestamp: NaiveDateTime,
    pub temperature_c: f64,
    pub cloud_cover_percent: f64,
    pub irradiance_w_m2: f64,
    pub wind_speed_ms: Option<f64>,
    pub solar_elevation_deg: f64,
    pub solar_elevation_norm: f64,
    pub current: Option<OperationalReadings>,
    pub previous: Previous,
}

/// A row type that can feed feature engineering
pub trait FeatureSource {
    fn feature_input(&self, previous: Option<&Self>) -> FeatureInput;
}

impl FeatureSource for AlignedSample {
    fn feature_input(&self, previous: Option<&Self>) -> FeatureInput {
        FeatureInput {
            timestamp: self.operational.timestamp,
            temperature_c: self.weather.temperature_c,
            cloud_cover_percent: self.weather.cloud_cover_percent,
            irradiance_w_m2: self.weather.irradiance_w_m2,
            wind_speed_ms: self.weather.wind_speed_ms,
            solar_elevation_deg: self.solar_elevation_deg,
            solar_elevation_norm: self.solar_elevation_norm,
            current: Some(self.readings()),
            previous: previous.map_or(Previous::None, |p| Previous::Known(p.readings())),
        }
    }
}

impl FeatureSource for HistoricalRow {
    fn feature_input(&self, previous: Option<&Self>) -> FeatureInput {
        FeatureInput {
            timestamp: self.timestamp,
            temperature_c: self.temperature_c,
            cloud_cover_percent: self.cloud_cover_percent,
            irradiance_w_m2: self.irradiance_w_m2,
            wind_speed_ms: None,
            solar_elevation_deg: self.solar_elevation_deg(),
            solar_elevation_norm: self.solar_elevation_norm,
            current: Some(self.readings),
            previous: previous.map_or(Previous::None, |p| Previous::Known(p.readings)),
        }
    }
}

impl FeatureSource for ForecastRow {
    fn feature_input(&self, previous: Option<&Self>) -> FeatureInput {
        FeatureInput {
            timestamp: self.weather.timestamp,
            temperature_c: self.weather.temperature_c,
            cloud_cover_percent: self.weather.cloud_cover_percent,
            irradiance_w_m2: self.weather.irradiance_w_m2,
            wind_speed_ms: self.weather.wind_speed_ms,
            solar_elevation_deg: self.solar_elevation_deg,
            solar_elevation_norm: self.solar_elevation_norm,
            current: self.context,
            previous: match previous {
                None => Previous::None,
                Some(p) => p.context.map_or(Previous::Unknown, Previous::Known),
            },
        }
    }
}

fn cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

impl Feature {
    /// Compute this feature, or `None` when the row lacks what it needs.
    pub fn compute(&self, input: &FeatureInput) -> Option<f64> {
        let hour = input.timestamp.hour() as f64;
        let (hour_sin, hour_cos) = cyclical(hour, 24.0);
        let (day_sin, day_cos) = cyclical(input.timestamp.ordinal() as f64, 365.0);
        let current = input.current.as_ref();
        let lag = |f: fn(&OperationalReadings) -> f64| match &input.previous {
            Previous::None => Some(0.0),
            Previous::Known(r) => Some(f(r)),
            Previous::Unknown => None,
        };

        match self {
            Feature::Hour => Some(hour),
            Feature::HourSin => Some(hour_sin),
            Feature::HourCos => Some(hour_cos),
            Feature::DaySin => Some(day_sin),
            Feature::DayCos => Some(day_cos),
            Feature::Temperature => Some(input.temperature_c),
            Feature::CloudCover => Some(input.cloud_cover_percent),
            Feature::Irradiance => Some(input.irradiance_w_m2),
            Feature::WindSpeed => input.wind_speed_ms,
            Feature::SolarElev => Some(input.solar_elevation_deg),
            Feature::SolarElevNorm => Some(input.solar_elevation_norm),
            Feature::EffectiveIrradiance => {
                Some(input.irradiance_w_m2 * (1.0 - input.cloud_cover_percent / 100.0))
            }
            Feature::IrradianceSq => Some(input.irradiance_w_m2.powi(2)),
            Feature::TempSq => Some(input.temperature_c.powi(2)),
            Feature::HourSinIrr => Some(hour_sin * input.irradiance_w_m2),
            Feature::BatterySoc => current.map(|r| r.battery_soc),
            Feature::BatteryTemperature => current.map(|r| r.battery_temperature_c),
            Feature::BatteryPower => current.map(|r| r.battery_power_kw),
            Feature::GridPower => current.map(|r| r.grid_power_kw),
            Feature::LoadPower => current.map(|r| r.load_power_kw),
            Feature::Power => current.map(|r| r.pv_power_kw),
            Feature::BatterySocLag1 => lag(|r| r.battery_soc),
            Feature::BatteryPowerLag1 => lag(|r| r.battery_power_kw),
            Feature::GridPowerLag1 => lag(|r| r.grid_power_kw),
            Feature::LoadPowerLag1 => lag(|r| r.load_power_kw),
            Feature::PowerLag1 => lag(|r| r.pv_power_kw),
        }
    }
}

/// Builds feature vectors in a model's feature order
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    features: Vec<Option<Feature>>,
    means: Vec<f64>,
}

impl FeatureEngineer {
    pub fn new(metadata: &ModelMetadata) -> Self {
        let features: Vec<Option<Feature>> = metadata
            .feature_names
            .iter()
            .map(|name| Feature::from_str(name.trim()).ok())
            .collect();

        let unknown: Vec<&str> = metadata
            .feature_names
            .iter()
            .zip(&features)
            .filter(|(_, f)| f.is_none())
            .map(|(name, _)| name.as_str())
            .collect();
        if !unknown.is_empty() {
            debug!(?unknown, "features will be filled with their stored means");
        }

        let means = (0..features.len()).map(|i| metadata.mean_at(i)).collect();
        Self { features, means }
    }

    pub fn width(&self) -> usize {
        self.features.len()
    }

    /// Feature vector for one row.
    pub fn vector(&self, input: &FeatureInput) -> Vec<f64> {
        self.features
            .iter()
            .zip(&self.means)
            .map(|(feature, mean)| {
                feature
                    .and_then(|f| f.compute(input))
                    .unwrap_or(*mean)
            })
            .collect()
    }

    /// Feature vectors for a chronological series; lags read the preceding row.
    pub fn series<S: FeatureSource>(&self, rows: &[S]) -> Vec<Vec<f64>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let previous = i.checked_sub(1).map(|p| &rows[p]);
                self.vector(&row.feature_input(previous))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OperationalSample, WeatherSample};
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn metadata(names: &[&str]) -> ModelMetadata {
        ModelMetadata {
            model_id: "test".to_string(),
            version: String::new(),
            feature_names: names.iter().map(|n| n.to_string()).collect(),
            mean: (0..names.len()).map(|i| 100.0 + i as f64).collect(),
            scale: vec![1.0; names.len()],
            max_timesteps: None,
        }
    }

    fn aligned(h: u32, soc: f64, pv: f64) -> AlignedSample {
        AlignedSample {
            operational: OperationalSample {
                timestamp: at(h),
                battery_soc_raw: soc,
                battery_temperature_c: 25.0,
                battery_power_kw: 0.5,
                pv_power_kw: pv,
                grid_power_kw: -0.2,
                load_power_kw: 0.8,
            },
            weather: WeatherSample {
                timestamp: at(h),
                temperature_c: 20.0,
                cloud_cover_percent: 50.0,
                irradiance_w_m2: 600.0,
                wind_speed_ms: Some(4.0),
            },
            solar_elevation_deg: 45.0,
            solar_elevation_norm: 0.5,
            soc_clean: soc,
        }
    }

    #[test]
    fn test_parse_feature_names() {
        assert_eq!(Feature::from_str("hour_sin").unwrap(), Feature::HourSin);
        assert_eq!(Feature::from_str("Solar_Elev_Norm").unwrap(), Feature::SolarElevNorm);
        assert_eq!(Feature::from_str("temp").unwrap(), Feature::Temperature);
        assert_eq!(Feature::from_str("power_lag1").unwrap(), Feature::PowerLag1);
        assert!(Feature::from_str("humidity").is_err());
    }

    #[test]
    fn test_derived_features() {
        let meta = metadata(&[
            "hour",
            "hour_sin",
            "hour_cos",
            "effective_irradiance",
            "irradiance_sq",
            "temp_sq",
            "hour_sin_irr",
            "wind_speed",
        ]);
        let engineer = FeatureEngineer::new(&meta);
        let sample = aligned(6, 50.0, 1.0);
        let v = engineer.vector(&sample.feature_input(None));

        assert_eq!(v[0], 6.0);
        assert!((v[1] - 1.0).abs() < 1e-12);
        assert!(v[2].abs() < 1e-12);
        assert_eq!(v[3], 300.0);
        assert_eq!(v[4], 360_000.0);
        assert_eq!(v[5], 400.0);
        assert!((v[6] - 600.0).abs() < 1e-9);
        assert_eq!(v[7], 4.0);
    }

    #[test]
    fn test_day_encoding_period() {
        let meta = metadata(&["day_sin", "day_cos"]);
        let engineer = FeatureEngineer::new(&meta);
        let mut sample = aligned(12, 50.0, 1.0);
        sample.operational.timestamp = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let v = engineer.vector(&sample.feature_input(None));
        // ordinal 365 of 365
        assert!(v[0].abs() < 1e-9);
        assert!((v[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_feature_uses_mean_by_position() {
        let meta = metadata(&["irradiance", "humidity", "temperature"]);
        let engineer = FeatureEngineer::new(&meta);
        let v = engineer.vector(&aligned(12, 50.0, 1.0).feature_input(None));
        assert_eq!(v, vec![600.0, 101.0, 20.0]);
    }

    #[test]
    fn test_lag_features() {
        let meta = metadata(&["power", "power_lag1", "battery_soc_lag1"]);
        let engineer = FeatureEngineer::new(&meta);
        let series = vec![aligned(10, 40.0, 1.0), aligned(11, 45.0, 2.0), aligned(12, 50.0, 3.0)];

        let vectors = engineer.series(&series);
        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![2.0, 1.0, 40.0]);
        assert_eq!(vectors[2], vec![3.0, 2.0, 45.0]);
    }

    #[test]
    fn test_historical_row_imputes_wind_and_recovers_elevation() {
        let meta = metadata(&["wind_speed", "solar_elev"]);
        let engineer = FeatureEngineer::new(&meta);
        let row = HistoricalRow::from(&aligned(12, 50.0, 1.0));
        let v = engineer.vector(&row.feature_input(None));
        assert_eq!(v, vec![100.0, 45.0]);
    }

    #[test]
    fn test_forecast_row_without_context_imputes_operational() {
        let meta = metadata(&["battery_soc", "irradiance", "power_lag1"]);
        let engineer = FeatureEngineer::new(&meta);
        let sample = aligned(12, 50.0, 1.0);
        let with_context = ForecastRow {
            weather: sample.weather,
            solar_elevation_deg: 45.0,
            solar_elevation_norm: 0.5,
            context: Some(sample.readings()),
        };
        let without_context = ForecastRow {
            context: None,
            ..with_context
        };

        let rows = vec![without_context, with_context, without_context];
        let vectors = engineer.series(&rows);
        // first row: no context, lag of the first row is 0
        assert_eq!(vectors[0], vec![100.0, 600.0, 0.0]);
        // predecessor lacked context: lag imputed
        assert_eq!(vectors[1], vec![50.0, 600.0, 102.0]);
        // predecessor known
        assert_eq!(vectors[2], vec![100.0, 600.0, 1.0]);
    }
}
