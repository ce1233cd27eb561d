//! Per-day battery sizing analysis
//!
//! Station readings are aligned with weather, cut into one fixed-length
//! sequence per calendar day and scored by the battery model in a single
//! batch call.

pub mod classifier;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{BatteryDayResult, OperationalSample, Station, WeatherSample};
use crate::error::{check_cancelled, PipelineError, PipelineResult};
use crate::forecast::alignment::{align_station_weather, STATION_WEATHER_TOLERANCE_MINUTES};
use crate::forecast::sequence::build_daily_sequences;
use crate::ml::BatteryModel;

pub use classifier::{argmax, classify_days};

pub struct BatteryAnalyzer<'a> {
    model: &'a dyn BatteryModel,
    station: Station,
}

impl<'a> BatteryAnalyzer<'a> {
    pub fn new(model: &'a dyn BatteryModel, station: Station) -> Self {
        Self { model, station }
    }

    /// One result per calendar day from the first to the last aligned sample.
    ///
    /// Cancellation is checked between stages only.
    pub fn run(
        &self,
        operational: &[OperationalSample],
        weather: &[WeatherSample],
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<BatteryDayResult>> {
        if operational.is_empty() {
            return Err(PipelineError::MissingOperationalData(
                "the operational export contains no readable rows".to_string(),
            ));
        }
        if weather.is_empty() {
            return Err(PipelineError::MissingWeatherData(
                "no weather rows were supplied".to_string(),
            ));
        }
        let max_timesteps = self.model.max_timesteps()?;

        check_cancelled(cancel, "alignment")?;
        let aligned = align_station_weather(operational, weather, &self.station);
        if aligned.is_empty() {
            return Err(PipelineError::NoAlignedSamples {
                tolerance_minutes: STATION_WEATHER_TOLERANCE_MINUTES,
            });
        }

        check_cancelled(cancel, "sequences")?;
        let batch = build_daily_sequences(&aligned, self.model.metadata(), max_timesteps)?;
        let valid_steps = batch.valid_steps();
        for (date, steps) in batch.dates.iter().zip(&valid_steps) {
            debug!(%date, steps, max_timesteps, "day sequence built");
        }
        let padding_only = valid_steps.iter().filter(|n| **n == 0).count();
        if padding_only > 0 {
            warn!(days = padding_only, "days without aligned samples are scored from padding");
        }

        check_cancelled(cancel, "classification")?;
        let output = self.model.predict_batch(&batch.tensor)?;
        let results = classify_days(&batch.dates, &output)?;

        info!(
            samples = aligned.len(),
            days = results.len(),
            "battery days classified"
        );
        Ok(results)
    }
}
