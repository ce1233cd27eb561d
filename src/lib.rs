//! Energy Insight
//!
//! PV power forecasting and battery sizing analysis from station exports,
//! weather data and pre-trained models.

pub mod battery;
pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod ml;
pub mod telemetry;

pub use error::{PipelineError, PipelineResult};
