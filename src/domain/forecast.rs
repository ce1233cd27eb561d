use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Linear bias correction `true ≈ slope · predicted + intercept` on daily energy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub slope: f64,
    pub intercept: f64,
}

impl Calibration {
    pub const IDENTITY: Calibration = Calibration {
        slope: 1.0,
        intercept: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Apply the full correction to a daily energy value.
    pub fn apply(&self, predicted: f64) -> f64 {
        self.slope * predicted + self.intercept
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Final forecast value for one weather row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPrediction {
    pub timestamp: NaiveDateTime,
    /// Predicted PV power (W), never negative
    pub power_w: f64,
    pub temperature_c: f64,
    pub cloud_cover_percent: f64,
    pub irradiance_w_m2: f64,
}

/// Forecast aggregated per calendar day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub energy_kwh: f64,
    pub peak_power_w: f64,
    pub samples: usize,
}
