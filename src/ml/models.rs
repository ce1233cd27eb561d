//! Reference model implementations
//!
//! Both models are plain JSON documents (metadata plus weights) so the binary
//! can run end to end without a native inference runtime.

use std::path::Path;

use ndarray::{s, Array3, Axis};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    standardize, BatteryBatchOutput, BatteryModel, ForecastModel, ModelError, ModelMetadata,
};
use crate::domain::BatteryDayClass;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), ModelError> {
    if expected != actual {
        return Err(ModelError::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn dot(weights: &[f64], values: &[f64]) -> f64 {
    weights.iter().zip(values).map(|(w, v)| w * v).sum()
}

/// Linear regression on standardized features, floored at zero
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearForecastModel {
    pub metadata: ModelMetadata,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearForecastModel {
    pub fn new(
        metadata: ModelMetadata,
        coefficients: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, ModelError> {
        let model = Self {
            metadata,
            coefficients,
            intercept,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let model: Self = load_json(path)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        self.metadata.validate()?;
        check_len(
            "forecast coefficients",
            self.metadata.feature_count(),
            self.coefficients.len(),
        )
    }
}

impl ForecastModel for LinearForecastModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn raw_predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_len("forecast features", self.coefficients.len(), features.len())?;
        let scaled = standardize(features, &self.metadata.mean, &self.metadata.scale);
        let prediction = dot(&self.coefficients, &scaled) + self.intercept;
        Ok(prediction.max(0.0))
    }
}

/// Day classifier: mean-pools the valid timesteps, then a softmax head for the
/// three classes and sigmoid heads for stress and utilization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxDayModel {
    pub metadata: ModelMetadata,
    /// One weight row per class
    pub class_weights: Vec<Vec<f64>>,
    pub class_bias: Vec<f64>,
    pub stress_weights: Vec<f64>,
    pub stress_bias: f64,
    pub utilization_weights: Vec<f64>,
    pub utilization_bias: f64,
}

impl SoftmaxDayModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let model: Self = load_json(path)?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.metadata.validate()?;
        if self.metadata.max_timesteps.unwrap_or(0) == 0 {
            return Err(ModelError::MissingMaxTimesteps);
        }
        let features = self.metadata.feature_count();
        check_len("class weight rows", BatteryDayClass::COUNT, self.class_weights.len())?;
        check_len("class biases", BatteryDayClass::COUNT, self.class_bias.len())?;
        for row in &self.class_weights {
            check_len("class weights", features, row.len())?;
        }
        check_len("stress weights", features, self.stress_weights.len())?;
        check_len("utilization weights", features, self.utilization_weights.len())
    }

    fn pool(sequences: &Array3<f64>, day: usize, features: usize) -> Vec<f64> {
        let day_view = sequences.index_axis(Axis(0), day);
        let mut pooled = vec![0.0; features];
        let mut valid = 0usize;
        for step in day_view.outer_iter() {
            if step[features] < 0.5 {
                continue;
            }
            valid += 1;
            for (acc, value) in pooled.iter_mut().zip(step.slice(s![..features])) {
                *acc += value;
            }
        }
        if valid > 0 {
            pooled.iter_mut().for_each(|v| *v /= valid as f64);
        }
        pooled
    }
}

fn softmax(logits: &[f64]) -> [f64; 3] {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    [exps[0] / sum, exps[1] / sum, exps[2] / sum]
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl BatteryModel for SoftmaxDayModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn predict_batch(&self, sequences: &Array3<f64>) -> Result<BatteryBatchOutput, ModelError> {
        let (days, _, channels) = sequences.dim();
        let features = self.metadata.feature_count();
        check_len("sequence channels", features + 1, channels)?;

        let mut output = BatteryBatchOutput {
            class_probs: Vec::with_capacity(days),
            stress: Vec::with_capacity(days),
            utilization: Vec::with_capacity(days),
        };

        for day in 0..days {
            let pooled = Self::pool(sequences, day, features);
            let logits: Vec<f64> = self
                .class_weights
                .iter()
                .zip(&self.class_bias)
                .map(|(w, b)| dot(w, &pooled) + b)
                .collect();
            output.class_probs.push(softmax(&logits));
            output
                .stress
                .push(sigmoid(dot(&self.stress_weights, &pooled) + self.stress_bias));
            output.utilization.push(sigmoid(
                dot(&self.utilization_weights, &pooled) + self.utilization_bias,
            ));
        }

        Ok(output)
    }
}
