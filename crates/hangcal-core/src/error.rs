//! Calibration errors

use thiserror::Error;

/// Errors raised before or instead of an optimization run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("insufficient data: {measurements} measurements, at least {required} required; collect more samples")]
    InsufficientData { measurements: usize, required: usize },
    #[error("{count} motor sample values is not a multiple of 4")]
    SampleShape { count: usize },
    #[error("{count} fixed position values is not a multiple of 3")]
    FixedPositionShape { count: usize },
    #[error("more fixed positions than samples: {fixed} positions, {samples} samples")]
    TooManyFixedPositions { fixed: usize, samples: usize },
    #[error("no motor samples given")]
    NoSamples,
    #[error("strategy {0:?} is not supported")]
    UnsupportedStrategy(String),
}
