//! Error types for filter design, response evaluation and calibration.

use thiserror::Error;

use crate::profile::FilterFamily;

/// Result type used throughout the engine.
pub type Result<T> = core::result::Result<T, EngineError>;

/// Errors reported by the design, evaluation and calibration engine.
///
/// All variants are plain data so callers can match on them, log them, or
/// carry them across threads.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A filter spec is malformed or contradictory.
    #[error("invalid filter spec: {0}")]
    InvalidFilterSpec(String),

    /// An evaluation frequency is not strictly inside (0, Nyquist).
    #[error("frequency {frequency} Hz is outside the open band (0, {nyquist}) Hz")]
    OutOfBandFrequency {
        /// Offending frequency in Hz.
        frequency: f64,
        /// Nyquist frequency for the sample rate in use.
        nyquist: f64,
    },

    /// A grid point lies outside the range covered by measured data.
    #[error("grid frequency {frequency} Hz lies outside the measured range [{min}, {max}] Hz")]
    GridOutOfRange {
        /// Offending grid frequency in Hz.
        frequency: f64,
        /// Lowest measured frequency.
        min: f64,
        /// Highest measured frequency.
        max: f64,
    },

    /// Responses that must share one frequency grid do not.
    #[error("frequency grids differ: {0}")]
    GridMismatch(String),

    /// Measured samples violate the ordering or finiteness contract.
    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// A calibration sweep has too few samples for the free parameters.
    #[error("calibration sweep has {samples} samples, at least {required} are required")]
    InsufficientSweepData {
        /// Number of samples supplied.
        samples: usize,
        /// Minimum number of samples needed.
        required: usize,
    },

    /// The calibration residual stayed above tolerance.
    #[error(
        "calibration of '{family}' did not converge: residual {residual:.6} above tolerance {tolerance} after {iterations} iterations"
    )]
    CalibrationDivergence {
        /// Family being fitted.
        family: FilterFamily,
        /// Final RMS residual.
        residual: f64,
        /// Configured tolerance.
        tolerance: f64,
        /// Iterations spent.
        iterations: usize,
        /// RMS residual after each accepted step, starting with the initial guess.
        trace: Vec<f64>,
    },
}

impl EngineError {
    /// Create an invalid filter spec error.
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        EngineError::InvalidFilterSpec(reason.into())
    }

    /// Create an invalid measurement error.
    pub fn invalid_measurement(reason: impl Into<String>) -> Self {
        EngineError::InvalidMeasurement(reason.into())
    }

    /// Create a grid mismatch error.
    pub fn grid_mismatch(reason: impl Into<String>) -> Self {
        EngineError::GridMismatch(reason.into())
    }
}
