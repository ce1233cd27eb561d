use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::ingest::IngestError;
use crate::ml::ModelError;

/// Failures that halt a forecast or battery analysis run.
///
/// Messages are meant to be shown to the user as-is.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No operational data: {0}")]
    MissingOperationalData(String),

    #[error("No weather data: {0}")]
    MissingWeatherData(String),

    #[error("Station location is not configured: set station.latitude and station.longitude")]
    MissingStationConfig,

    #[error("No operational readings overlap the weather data within {tolerance_minutes} minutes; cannot calibrate the forecast")]
    NoHistoricalOverlap { tolerance_minutes: i64 },

    #[error("No operational readings lie within {tolerance_minutes} minutes of a weather observation; nothing to analyse")]
    NoAlignedSamples { tolerance_minutes: i64 },

    #[error("Inference engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Inference engine returned malformed output: {0}")]
    MalformedEngineOutput(String),

    #[error("Run cancelled before stage '{0}'")]
    Cancelled(&'static str),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Ingest {
        path: PathBuf,
        #[source]
        source: IngestError,
    },
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ShapeMismatch { .. } | ModelError::Inference(_) => {
                PipelineError::MalformedEngineOutput(err.to_string())
            }
            _ => PipelineError::EngineUnavailable(err.to_string()),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Stop before `stage` if the run was cancelled.
pub fn check_cancelled(cancel: &CancellationToken, stage: &'static str) -> PipelineResult<()> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled(stage));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_actionable() {
        let err = PipelineError::NoHistoricalOverlap {
            tolerance_minutes: 60,
        };
        assert!(err.to_string().contains("60 minutes"));

        let err = PipelineError::MissingStationConfig;
        assert!(err.to_string().contains("station.latitude"));
    }

    #[test]
    fn test_model_error_mapping() {
        let err: PipelineError = ModelError::ShapeMismatch {
            what: "class probabilities",
            expected: 3,
            actual: 2,
        }
        .into();
        assert!(matches!(err, PipelineError::MalformedEngineOutput(_)));

        let err: PipelineError = ModelError::MissingMaxTimesteps.into();
        assert!(matches!(err, PipelineError::EngineUnavailable(_)));
    }

    #[test]
    fn test_check_cancelled() {
        let cancel = CancellationToken::new();
        assert!(check_cancelled(&cancel, "alignment").is_ok());

        cancel.cancel();
        let err = check_cancelled(&cancel, "alignment").unwrap_err();
        assert_eq!(err.to_string(), "Run cancelled before stage 'alignment'");
    }
}
