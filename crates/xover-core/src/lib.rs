//! xover Core - crossover filter synthesis and response evaluation
//!
//! This crate turns physical filter parameters into second-order sections
//! under a pluggable manufacturer correction model, and evaluates cascades of
//! those sections as complex frequency responses.
//!
//! # Core Abstractions
//!
//! ## Filter Specs
//!
//! - [`FilterSpec`] - One validated filter block (type, parameters, enabled flag)
//! - [`FilterKind`] - Closed set of block types: Butterworth, Linkwitz-Riley,
//!   PEQ, shelf, all-pass, gain, delay
//!
//! ## Manufacturer Profiles
//!
//! - [`ManufacturerProfile`] - Named bundle of per-family corrections
//! - [`FamilyCorrection`] - Scales, offsets and clamps for one family
//!
//! ## Design and Evaluation
//!
//! - [`design`] - Spec + sample rate + profile into a [`DesignedFilter`]
//! - [`evaluate`] - Complex response of a cascade on a frequency grid
//! - [`Section`] - One normalized biquad with RBJ cookbook constructors
//!
//! # Example
//!
//! ```rust
//! use xover_core::{FilterSpec, PassBand, evaluate_specs, magnitude_db};
//!
//! let lowpass = [FilterSpec::linkwitz_riley(4, PassBand::Lowpass(350.0)).unwrap()];
//! let highpass = [FilterSpec::linkwitz_riley(4, PassBand::Highpass(350.0)).unwrap()];
//! let grid = [350.0];
//!
//! let lp = evaluate_specs(&lowpass, &grid, 48_000.0, None).unwrap();
//! let hp = evaluate_specs(&highpass, &grid, 48_000.0, None).unwrap();
//! let sum = magnitude_db(&[lp[0] + hp[0]]);
//! assert!(sum[0].abs() < 0.5);
//! ```
//!
//! # Features
//!
//! - `tracing` - Emit `tracing::debug!` events from the designer

pub mod biquad;
pub mod butterworth;
pub mod design;
pub mod error;
pub mod math;
pub mod profile;
pub mod response;
pub mod spec;

pub use num_complex::Complex64;

// Re-export main types at crate root
pub use biquad::Section;
pub use butterworth::{butterworth_sections, linkwitz_riley_sections};
pub use design::{DesignedFilter, apply_correction, design, design_corrected};
pub use error::{EngineError, Result};
pub use math::{db_to_linear, linear_to_db, unwrap_degrees, unwrap_radians, wrap_degrees, wrap_radians};
pub use profile::{
    CorrectionParam, FamilyCorrection, FamilyCorrections, FilterFamily, GENERIC_PROFILE_NAME,
    ManufacturerProfile,
};
pub use response::{
    check_grid, evaluate, evaluate_specs, evaluate_stages, magnitude_db, phase_deg,
    unwrapped_phase_deg,
};
pub use spec::{FilterKind, FilterSpec, PassBand, ShelfMode, ShelfWidth};
