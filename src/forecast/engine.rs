use chrono::{Duration, NaiveDateTime};
use itertools::Itertools;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::alignment::{align_station_weather, forecast_rows, STATION_WEATHER_TOLERANCE_MINUTES};
use super::calibration::{CalibrationEngine, CalibrationReport};
use super::features::FeatureEngineer;
use super::postprocess::{fade_factor, PostProcessingChain};
use crate::domain::{
    DailyForecast, ForecastPrediction, HistoricalRow, OperationalSample, Station, Timestamped,
    WeatherSample,
};
use crate::error::{check_cancelled, PipelineError, PipelineResult};
use crate::ml::ForecastModel;

/// Everything one forecast run reads
#[derive(Debug, Clone)]
pub struct ForecastInputs {
    pub operational: Vec<OperationalSample>,
    /// Observed and forecast weather; rows before `forecast_start` only serve calibration
    pub weather: Vec<WeatherSample>,
    pub forecast_start: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastRun {
    pub predictions: Vec<ForecastPrediction>,
    pub daily: Vec<DailyForecast>,
    pub calibration: CalibrationReport,
}

/// PV forecast for one station and one model
pub struct ForecastEngine<'a> {
    model: &'a dyn ForecastModel,
    station: Station,
    chain: PostProcessingChain,
}

impl<'a> ForecastEngine<'a> {
    pub fn new(
        model: &'a dyn ForecastModel,
        station: Station,
        performance_ratio: f64,
        capacity_kw: f64,
    ) -> Self {
        Self {
            model,
            station,
            chain: PostProcessingChain::new(performance_ratio, capacity_kw),
        }
    }

    /// Calibrate against history, then forecast every weather row from `forecast_start` on.
    ///
    /// Cancellation is checked between stages only.
    pub fn run(
        &self,
        inputs: &ForecastInputs,
        cancel: &CancellationToken,
    ) -> PipelineResult<ForecastRun> {
        if inputs.operational.is_empty() {
            return Err(PipelineError::MissingOperationalData(
                "the operational export contains no readable rows".to_string(),
            ));
        }
        if inputs.weather.is_empty() {
            return Err(PipelineError::MissingWeatherData(
                "no weather rows were supplied".to_string(),
            ));
        }

        check_cancelled(cancel, "alignment")?;
        let history: Vec<HistoricalRow> =
            align_station_weather(&inputs.operational, &inputs.weather, &self.station)
                .iter()
                .map(HistoricalRow::from)
                .collect();
        if history.is_empty() {
            return Err(PipelineError::NoHistoricalOverlap {
                tolerance_minutes: STATION_WEATHER_TOLERANCE_MINUTES,
            });
        }

        check_cancelled(cancel, "calibration")?;
        let calibration = CalibrationEngine::new(
            self.model,
            self.chain.performance_ratio,
            self.chain.capacity_kw,
        )
        .calibrate(&history)?;

        check_cancelled(cancel, "forecast")?;
        let upcoming: Vec<WeatherSample> = inputs
            .weather
            .iter()
            .filter(|w| w.timestamp >= inputs.forecast_start)
            .copied()
            .collect();
        if upcoming.is_empty() {
            return Err(PipelineError::MissingWeatherData(format!(
                "no weather rows at or after {}",
                inputs.forecast_start
            )));
        }

        let rows = forecast_rows(&upcoming, &inputs.operational, &self.station);
        let without_context = rows.iter().filter(|r| r.context.is_none()).count();
        if without_context > 0 {
            debug!(
                rows = rows.len(),
                without_context, "forecast rows without operational context are mean-imputed"
            );
        }

        let chain = self.chain.with_calibration(calibration.calibration);
        let engineer = FeatureEngineer::new(self.model.metadata());
        let predictions = engineer
            .series(&rows)
            .iter()
            .zip(&rows)
            .map(|(features, row)| {
                let raw = self.model.raw_predict(features)?;
                let fade = fade_factor(
                    row.weather.irradiance_w_m2,
                    row.weather.cloud_cover_percent,
                    row.solar_elevation_norm,
                );
                Ok(ForecastPrediction {
                    timestamp: row.timestamp(),
                    power_w: chain.final_watts(raw, fade),
                    temperature_c: row.weather.temperature_c,
                    cloud_cover_percent: row.weather.cloud_cover_percent,
                    irradiance_w_m2: row.weather.irradiance_w_m2,
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let daily = summarize_daily(&predictions);
        info!(
            predictions = predictions.len(),
            days = daily.len(),
            slope = calibration.calibration.slope,
            "forecast complete"
        );

        Ok(ForecastRun {
            predictions,
            daily,
            calibration,
        })
    }
}

/// Typical spacing of a sorted series: the smallest positive step, 1 hour if none.
fn row_spacing(predictions: &[ForecastPrediction]) -> Duration {
    predictions
        .iter()
        .tuple_windows()
        .map(|(a, b)| b.timestamp - a.timestamp)
        .filter(|step| *step > Duration::zero())
        .min()
        .unwrap_or_else(|| Duration::hours(1))
}

/// Per-day energy and peak power of chronologically sorted predictions.
pub fn summarize_daily(predictions: &[ForecastPrediction]) -> Vec<DailyForecast> {
    let hours = row_spacing(predictions).num_seconds() as f64 / 3600.0;

    predictions
        .iter()
        .chunk_by(|p| p.timestamp.date())
        .into_iter()
        .map(|(date, day)| {
            let day: Vec<&ForecastPrediction> = day.collect();
            DailyForecast {
                date,
                energy_kwh: day.iter().map(|p| p.power_w).sum::<f64>() / 1000.0 * hours,
                peak_power_w: day.iter().map(|p| p.power_w).fold(0.0, f64::max),
                samples: day.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::calibration::CalibrationOutcome;
    use crate::ml::{LinearForecastModel, ModelMetadata};
    use chrono::NaiveDate;

    const STATION: Station = Station {
        latitude: 59.33,
        longitude: 18.07,
    };

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn op(ts: NaiveDateTime, pv_kw: f64) -> OperationalSample {
        OperationalSample {
            timestamp: ts,
            battery_soc_raw: 60.0,
            battery_temperature_c: 22.0,
            battery_power_kw: 0.0,
            pv_power_kw: pv_kw,
            grid_power_kw: 0.0,
            load_power_kw: 0.5,
        }
    }

    fn wx(ts: NaiveDateTime, irradiance: f64) -> WeatherSample {
        WeatherSample {
            timestamp: ts,
            temperature_c: 18.0,
            cloud_cover_percent: 0.0,
            irradiance_w_m2: irradiance,
            wind_speed_ms: None,
        }
    }

    /// Predicts `irradiance / 100` kW
    fn model() -> LinearForecastModel {
        let metadata = ModelMetadata {
            model_id: "pv".to_string(),
            version: String::new(),
            feature_names: vec!["irradiance".to_string(), "battery_soc".to_string()],
            mean: vec![0.0, 50.0],
            scale: vec![100.0, 10.0],
            max_timesteps: None,
        };
        LinearForecastModel::new(metadata, vec![1.0, 0.0], 0.0).unwrap()
    }

    fn inputs() -> ForecastInputs {
        let mut operational = Vec::new();
        let mut weather = Vec::new();
        for day in 1..=2 {
            for hour in 10..14 {
                operational.push(op(at(day, hour, 0), 8.0));
                weather.push(wx(at(day, hour, 0), 800.0));
            }
        }
        for hour in 10..13 {
            weather.push(wx(at(3, hour, 0), 1000.0));
        }
        ForecastInputs {
            operational,
            weather,
            forecast_start: at(3, 0, 0),
        }
    }

    #[test]
    fn test_forecast_run() {
        let model = model();
        let engine = ForecastEngine::new(&model, STATION, 1.0, 9.0);
        let run = engine.run(&inputs(), &CancellationToken::new()).unwrap();

        // two historical days: identity calibration
        assert_eq!(run.calibration.outcome, CalibrationOutcome::TooFewDays);
        assert_eq!(run.predictions.len(), 3);
        // 10 kW raw, clipped to the 9 kW capacity
        assert!(run.predictions.iter().all(|p| p.power_w == 9000.0));

        assert_eq!(run.daily.len(), 1);
        assert_eq!(run.daily[0].samples, 3);
        assert_eq!(run.daily[0].peak_power_w, 9000.0);
        assert!((run.daily[0].energy_kwh - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_inputs() {
        let model = model();
        let engine = ForecastEngine::new(&model, STATION, 0.8, 0.0);
        let cancel = CancellationToken::new();

        let mut no_operational = inputs();
        no_operational.operational.clear();
        assert!(matches!(
            engine.run(&no_operational, &cancel),
            Err(PipelineError::MissingOperationalData(_))
        ));

        let mut no_overlap = inputs();
        for sample in &mut no_overlap.operational {
            sample.timestamp -= Duration::days(30);
        }
        assert!(matches!(
            engine.run(&no_overlap, &cancel),
            Err(PipelineError::NoHistoricalOverlap {
                tolerance_minutes: 60
            })
        ));

        let mut nothing_ahead = inputs();
        nothing_ahead.forecast_start = at(4, 0, 0);
        assert!(matches!(
            engine.run(&nothing_ahead, &cancel),
            Err(PipelineError::MissingWeatherData(_))
        ));
    }

    #[test]
    fn test_cancelled_run_stops_before_first_stage() {
        let model = model();
        let engine = ForecastEngine::new(&model, STATION, 0.8, 0.0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            engine.run(&inputs(), &cancel),
            Err(PipelineError::Cancelled("alignment"))
        ));
    }

    #[test]
    fn test_daily_summary_uses_row_spacing() {
        let predictions: Vec<ForecastPrediction> = [(1, 12, 0), (1, 12, 30), (2, 12, 0)]
            .into_iter()
            .map(|(d, h, m)| ForecastPrediction {
                timestamp: at(d, h, m),
                power_w: 2000.0,
                temperature_c: 15.0,
                cloud_cover_percent: 0.0,
                irradiance_w_m2: 500.0,
            })
            .collect();

        let daily = summarize_daily(&predictions);
        assert_eq!(daily.len(), 2);
        assert!((daily[0].energy_kwh - 2.0).abs() < 1e-12);
        assert!((daily[1].energy_kwh - 1.0).abs() < 1e-12);
    }
}
