//! xover Analysis - measured sweeps, way composition and calibration
//!
//! Builds on `xover-core` to work with measured driver responses: resampling
//! them onto a shared log grid, composing each way's filter chain with its
//! measurement, summing ways, and fitting manufacturer corrections from
//! calibration sweeps.
//!
//! # Core Abstractions
//!
//! - [`Measurement`] - Validated frequency / magnitude / phase columns
//! - [`Way`] - One driver: measurement, level trim and filter chain
//! - [`compose`] / [`sum`] - Per-way responses and their acoustic sum
//! - [`CalibrationSolver`] - Bounded least-squares fit of a [`FamilyCorrection`]
//!
//! # Example
//!
//! ```rust
//! use xover_analysis::{Measurement, Way, log_grid, sum_ways};
//! use xover_core::{FilterSpec, PassBand};
//!
//! let grid = log_grid(20.0, 20_000.0, 256).unwrap();
//! let flat = Measurement::from_columns(grid.clone(), vec![0.0; 256], vec![0.0; 256]).unwrap();
//!
//! let ways = [
//!     Way::new("woofer", flat.clone())
//!         .with_filter(FilterSpec::linkwitz_riley(4, PassBand::Lowpass(2000.0)).unwrap()),
//!     Way::new("tweeter", flat)
//!         .with_filter(FilterSpec::linkwitz_riley(4, PassBand::Highpass(2000.0)).unwrap()),
//! ];
//! let total = sum_ways(&ways, &grid, 48_000.0, None).unwrap();
//! assert!(total.magnitude_db().iter().all(|m| m.abs() < 0.01));
//! ```
//!
//! # Features
//!
//! - `tracing` - Emit `tracing::debug!` events from calibration
//!
//! [`FamilyCorrection`]: xover_core::FamilyCorrection

pub mod calibration;
pub mod compositor;
pub mod least_squares;
pub mod measurement;

pub use calibration::{
    CalibrationResult, CalibrationSettings, CalibrationSolver, CalibrationSweep, FreeParameter,
    ReferenceSettings, ResidualWeights, free_parameters,
};
pub use compositor::{Way, WayResponse, compose, compose_all, sum, sum_ways};
pub use least_squares::{Fit, SolverSettings, Termination, levenberg_marquardt};
pub use measurement::{DEFAULT_GRID_POINTS, Measurement, common_grid, log_grid};
