//! Fixed-length per-day sequences for the battery classifier
//!
//! Every calendar day between the first and last sample gets a
//! `max_timesteps × (features + 1)` matrix. The trailing channel marks real
//! timesteps with 1 and padding with 0; padding is 0 in every channel.

use chrono::NaiveDate;
use itertools::Itertools;
use ndarray::{s, Array2, Array3, Axis};
use serde::Serialize;

use super::features::FeatureEngineer;
use crate::domain::{AlignedSample, Timestamped};
use crate::ml::{standardize_one, ModelError, ModelMetadata};

/// One day's sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySequence {
    pub date: NaiveDate,
    /// `max_timesteps × (features + 1)`, validity in the last column
    pub steps: Array2<f64>,
}

impl DailySequence {
    pub fn valid_steps(&self) -> usize {
        let validity = self.steps.ncols() - 1;
        self.steps
            .column(validity)
            .iter()
            .filter(|v| **v > 0.5)
            .count()
    }
}

/// All days, in date order, ready for one batch call
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceBatch {
    pub dates: Vec<NaiveDate>,
    /// `days × max_timesteps × (features + 1)`
    pub tensor: Array3<f64>,
}

impl SequenceBatch {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn day(&self, index: usize) -> Option<DailySequence> {
        let date = *self.dates.get(index)?;
        Some(DailySequence {
            date,
            steps: self.tensor.index_axis(Axis(0), index).to_owned(),
        })
    }

    /// Real (unpadded) timesteps of each day, in date order
    pub fn valid_steps(&self) -> Vec<usize> {
        (0..self.len())
            .filter_map(|i| self.day(i))
            .map(|day| day.valid_steps())
            .collect()
    }
}

/// Build the per-day batch from aligned samples.
///
/// Within a day only the first `max_timesteps` samples (chronologically) are kept.
pub fn build_daily_sequences(
    samples: &[AlignedSample],
    metadata: &ModelMetadata,
    max_timesteps: usize,
) -> Result<SequenceBatch, ModelError> {
    metadata.validate()?;
    let engineer = FeatureEngineer::new(metadata);
    let features = engineer.width();

    let mut sorted: Vec<AlignedSample> = samples.to_vec();
    sorted.sort_by_key(|s| s.timestamp());

    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Ok(SequenceBatch {
            dates: Vec::new(),
            tensor: Array3::zeros((0, max_timesteps, features + 1)),
        });
    };

    // complete date range first, so empty days keep their slot
    let dates: Vec<NaiveDate> = first
        .date()
        .iter_days()
        .take_while(|d| *d <= last.date())
        .collect();

    // lags run across the whole series, not per day
    let vectors = engineer.series(&sorted);

    let mut tensor = Array3::<f64>::zeros((dates.len(), max_timesteps, features + 1));
    let by_date = sorted
        .iter()
        .zip(vectors)
        .chunk_by(|(sample, _)| sample.date());

    for (date, day_samples) in &by_date {
        let day_index = (date - first.date()).num_days() as usize;
        for (step, (_, vector)) in day_samples.take(max_timesteps).enumerate() {
            let mut row = tensor.slice_mut(s![day_index, step, ..]);
            for (j, value) in vector.into_iter().enumerate() {
                row[j] = value;
            }
            row[features] = 1.0;
        }
    }

    normalize(&mut tensor, metadata, features);

    Ok(SequenceBatch { dates, tensor })
}

/// Standardize the feature channels of valid timesteps in place.
fn normalize(tensor: &mut Array3<f64>, metadata: &ModelMetadata, features: usize) {
    for mut day in tensor.outer_iter_mut() {
        for mut step in day.outer_iter_mut() {
            if step[features] < 0.5 {
                continue;
            }
            for j in 0..features {
                step[j] = standardize_one(step[j], metadata.mean[j], metadata.scale[j]);
            }
        }
    }
}
