//! Inference Engine Seam
//!
//! The pipeline talks to pretrained models only through the traits in this module:
//! - [`ForecastModel`] scores one feature vector and returns raw PV power (kW)
//! - [`BatteryModel`] scores a batch of per-day sequences in one call
//!
//! Each model carries immutable [`ModelMetadata`] (ordered feature names and the
//! per-feature mean/scale arrays) that feature engineering and sequence building
//! read by reference. Model handles are owned by the caller and passed into each run.

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod models;

pub use models::{LinearForecastModel, SoftmaxDayModel};

/// Inference failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{what}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("battery model metadata does not declare max_timesteps")]
    MissingMaxTimesteps,
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Static description of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    #[serde(default)]
    pub version: String,
    /// Input order expected by the model
    pub feature_names: Vec<String>,
    /// Per-feature means, by position in `feature_names`
    pub mean: Vec<f64>,
    /// Per-feature scales, by position in `feature_names`
    pub scale: Vec<f64>,
    /// Sequence length of the per-day battery model
    #[serde(default)]
    pub max_timesteps: Option<usize>,
}

impl ModelMetadata {
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Check that the statistics line up with the feature list.
    pub fn validate(&self) -> Result<(), ModelError> {
        let expected = self.feature_count();
        if self.mean.len() != expected {
            return Err(ModelError::ShapeMismatch {
                what: "feature means",
                expected,
                actual: self.mean.len(),
            });
        }
        if self.scale.len() != expected {
            return Err(ModelError::ShapeMismatch {
                what: "feature scales",
                expected,
                actual: self.scale.len(),
            });
        }
        Ok(())
    }

    /// Stored mean of the feature at `index`, 0 if the statistics are short.
    pub fn mean_at(&self, index: usize) -> f64 {
        self.mean.get(index).copied().unwrap_or(0.0)
    }
}

/// Standardize values with z-score normalization; a zero scale yields 0.
pub fn standardize(values: &[f64], means: &[f64], scales: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(means.iter().zip(scales.iter()))
        .map(|(v, (mean, scale))| standardize_one(*v, *mean, *scale))
        .collect()
}

pub fn standardize_one(value: f64, mean: f64, scale: f64) -> f64 {
    if scale == 0.0 {
        0.0
    } else {
        (value - mean) / scale
    }
}

/// Regression model behind the PV forecast
pub trait ForecastModel: Send + Sync {
    fn metadata(&self) -> &ModelMetadata;

    /// Raw PV power (kW) for one feature vector in `metadata().feature_names` order.
    fn raw_predict(&self, features: &[f64]) -> Result<f64, ModelError>;
}

/// Output of one battery batch call, one entry per day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryBatchOutput {
    pub class_probs: Vec<[f64; 3]>,
    pub stress: Vec<f64>,
    pub utilization: Vec<f64>,
}

impl BatteryBatchOutput {
    /// Check that every head produced exactly `days` entries.
    pub fn check_days(&self, days: usize) -> Result<(), ModelError> {
        for (what, actual) in [
            ("class probabilities", self.class_probs.len()),
            ("stress scores", self.stress.len()),
            ("utilization scores", self.utilization.len()),
        ] {
            if actual != days {
                return Err(ModelError::ShapeMismatch {
                    what,
                    expected: days,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Per-day sequence classifier behind the battery analysis
pub trait BatteryModel: Send + Sync {
    fn metadata(&self) -> &ModelMetadata;

    fn max_timesteps(&self) -> Result<usize, ModelError> {
        self.metadata()
            .max_timesteps
            .filter(|&t| t > 0)
            .ok_or(ModelError::MissingMaxTimesteps)
    }

    /// Score `[day][timestep][feature + validity]` sequences in one call.
    fn predict_batch(&self, sequences: &Array3<f64>) -> Result<BatteryBatchOutput, ModelError>;
}
