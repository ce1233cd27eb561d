//! Daily-energy calibration of the forecast model
//!
//! The model's post-processed output over the historical overlap is summed
//! into daily energy and regressed against the measured daily energy. Too
//! little data, or predictions that barely vary, fall back to identity.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::features::FeatureEngineer;
use super::metrics::{ForecastMetrics, ForecastQuality};
use super::postprocess::{fade_factor, PostProcessingChain};
use crate::domain::{Calibration, HistoricalRow, Timestamped};
use crate::ml::{ForecastModel, ModelError};

/// Rows at or below this irradiance (W/m²) are night and ignored
pub const DAYLIGHT_IRRADIANCE_W_M2: f64 = 50.0;
/// Sampling interval assumed for historical rows
pub const SAMPLE_INTERVAL_MINUTES: f64 = 5.0;
pub const MIN_VALID_DAYS: usize = 3;
pub const MIN_PREDICTION_VARIANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationOutcome {
    Fitted,
    /// Fewer than [`MIN_VALID_DAYS`] days with measured energy
    TooFewDays,
    /// Predicted daily energy is near-constant
    FlatPredictions,
}

/// Predicted and measured energy (kWh) for one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyEnergy {
    pub date: NaiveDate,
    pub predicted_kwh: f64,
    pub true_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub calibration: Calibration,
    pub outcome: CalibrationOutcome,
    /// Days used for the fit, in date order
    pub days: Vec<DailyEnergy>,
    /// Calibrated daily energy against measured, when a fit was made
    pub metrics: Option<ForecastMetrics>,
    pub quality: Option<ForecastQuality>,
}

impl CalibrationReport {
    pub fn valid_days(&self) -> usize {
        self.days.len()
    }
}

/// Sum daylight rows into daily energy and keep days that measured any.
///
/// `predicted_kw` runs parallel to `rows`.
pub fn daily_energy(rows: &[HistoricalRow], predicted_kw: &[f64]) -> Vec<DailyEnergy> {
    let hours_per_sample = SAMPLE_INTERVAL_MINUTES / 60.0;
    let mut by_date: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for (row, predicted) in rows.iter().zip(predicted_kw) {
        if row.irradiance_w_m2 <= DAYLIGHT_IRRADIANCE_W_M2 {
            continue;
        }
        let day = by_date.entry(row.date()).or_default();
        day.0 += predicted * hours_per_sample;
        day.1 += row.true_power_kw() * hours_per_sample;
    }

    by_date
        .into_iter()
        .filter(|(_, (_, true_kwh))| *true_kwh > 0.0)
        .map(|(date, (predicted_kwh, true_kwh))| DailyEnergy {
            date,
            predicted_kwh,
            true_kwh,
        })
        .collect()
}

/// Least-squares `true = slope · predicted + intercept` over daily pairs.
pub fn fit_daily_energy(days: &[DailyEnergy]) -> (Calibration, CalibrationOutcome) {
    if days.len() < MIN_VALID_DAYS {
        return (Calibration::IDENTITY, CalibrationOutcome::TooFewDays);
    }

    let n = days.len() as f64;
    let mean_x = days.iter().map(|d| d.predicted_kwh).sum::<f64>() / n;
    let mean_y = days.iter().map(|d| d.true_kwh).sum::<f64>() / n;

    let variance = days
        .iter()
        .map(|d| (d.predicted_kwh - mean_x).powi(2))
        .sum::<f64>()
        / n;
    if variance < MIN_PREDICTION_VARIANCE {
        return (Calibration::IDENTITY, CalibrationOutcome::FlatPredictions);
    }

    let covariance = days
        .iter()
        .map(|d| (d.predicted_kwh - mean_x) * (d.true_kwh - mean_y))
        .sum::<f64>()
        / n;

    let slope = covariance / variance;
    let calibration = Calibration {
        slope,
        intercept: mean_y - slope * mean_x,
    };
    (calibration, CalibrationOutcome::Fitted)
}

/// Fits a [`Calibration`] for one forecast model over historical rows
pub struct CalibrationEngine<'a> {
    model: &'a dyn ForecastModel,
    engineer: FeatureEngineer,
    chain: PostProcessingChain,
}

impl<'a> CalibrationEngine<'a> {
    pub fn new(model: &'a dyn ForecastModel, performance_ratio: f64, capacity_kw: f64) -> Self {
        Self {
            model,
            engineer: FeatureEngineer::new(model.metadata()),
            chain: PostProcessingChain::new(performance_ratio, capacity_kw),
        }
    }

    /// Pre-calibration prediction (kW) for every row, in the given order.
    pub fn predict(&self, rows: &[HistoricalRow]) -> Result<Vec<f64>, ModelError> {
        self.engineer
            .series(rows)
            .iter()
            .zip(rows)
            .map(|(features, row)| {
                let raw = self.model.raw_predict(features)?;
                let fade = fade_factor(
                    row.irradiance_w_m2,
                    row.cloud_cover_percent,
                    row.solar_elevation_norm,
                );
                Ok(self.chain.pre_calibration_kw(raw, fade))
            })
            .collect()
    }

    pub fn calibrate(&self, rows: &[HistoricalRow]) -> Result<CalibrationReport, ModelError> {
        let mut sorted = rows.to_vec();
        sorted.sort_by_key(|r| r.timestamp);

        let predicted = self.predict(&sorted)?;
        let days = daily_energy(&sorted, &predicted);
        let (calibration, outcome) = fit_daily_energy(&days);

        let metrics = match outcome {
            CalibrationOutcome::Fitted => {
                let actual: Vec<f64> = days.iter().map(|d| d.true_kwh).collect();
                let fitted: Vec<f64> = days
                    .iter()
                    .map(|d| calibration.apply(d.predicted_kwh))
                    .collect();
                ForecastMetrics::calculate(&actual, &fitted).ok()
            }
            _ => None,
        };

        let quality = metrics.as_ref().map(ForecastMetrics::quality);

        debug!(rows = sorted.len(), days = days.len(), "daily energy aggregated");
        if calibration.is_identity() {
            warn!(
                ?outcome,
                valid_days = days.len(),
                "forecast calibration fell back to identity"
            );
        } else {
            info!(
                ?outcome,
                ?quality,
                slope = calibration.slope,
                intercept = calibration.intercept,
                valid_days = days.len(),
                "forecast calibration computed"
            );
        }

        Ok(CalibrationReport {
            calibration,
            outcome,
            days,
            metrics,
            quality,
        })
    }
}
