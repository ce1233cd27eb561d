pub mod alignment;
pub mod calibration;
pub mod engine;
pub mod features;
pub mod gap_fill;
pub mod metrics;
pub mod postprocess;
pub mod sequence;
pub mod solar;
pub mod weather;

pub use alignment::{align_nearest, align_station_weather, fill_soc_gaps, forecast_rows};
pub use calibration::{CalibrationEngine, CalibrationOutcome, CalibrationReport};
pub use engine::{ForecastEngine, ForecastInputs, ForecastRun};
pub use features::{Feature, FeatureEngineer};
pub use gap_fill::fill_gaps;
pub use metrics::ForecastMetrics;
pub use postprocess::{fade_factor, PostProcessingChain};
pub use sequence::{build_daily_sequences, SequenceBatch};
pub use solar::SolarPosition;
pub use weather::{CsvWeatherSource, OpenMeteoClient, WeatherSource};
