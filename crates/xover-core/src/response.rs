//! Complex frequency response of filter cascades.
//!
//! Every section is evaluated on the unit circle at `z = exp(j·2πf/fs)` and
//! the cascade is a running complex product in block order. Frequencies must
//! lie strictly inside `(0, Nyquist)`; the evaluator never extrapolates.

use num_complex::Complex64;

use crate::design::{DesignedFilter, design};
use crate::error::{EngineError, Result};
use crate::math::{linear_to_db, unwrap_degrees};
use crate::profile::ManufacturerProfile;
use crate::spec::FilterSpec;

/// Fails with [`EngineError::OutOfBandFrequency`] on the first grid point
/// outside `(0, sample_rate / 2)`.
pub fn check_grid(frequencies: &[f64], sample_rate: f64) -> Result<()> {
    let nyquist = sample_rate / 2.0;
    match frequencies
        .iter()
        .find(|&&f| !(f > 0.0 && f < nyquist && f.is_finite()))
    {
        Some(&frequency) => Err(EngineError::OutOfBandFrequency { frequency, nyquist }),
        None => Ok(()),
    }
}

/// Response of the cascade `blocks` at every grid frequency.
///
/// An empty cascade evaluates to unity.
pub fn evaluate(
    blocks: &[DesignedFilter],
    frequencies: &[f64],
    sample_rate: f64,
) -> Result<Vec<Complex64>> {
    check_grid(frequencies, sample_rate)?;
    Ok(frequencies
        .iter()
        .map(|&f| {
            blocks
                .iter()
                .fold(Complex64::new(1.0, 0.0), |acc, block| {
                    acc * block.response_at(f, sample_rate)
                })
        })
        .collect())
}

/// Running product after each block, for diagnostics.
///
/// Entry `i` holds the response of `blocks[..=i]`.
pub fn evaluate_stages(
    blocks: &[DesignedFilter],
    frequencies: &[f64],
    sample_rate: f64,
) -> Result<Vec<Vec<Complex64>>> {
    check_grid(frequencies, sample_rate)?;
    let mut running = vec![Complex64::new(1.0, 0.0); frequencies.len()];
    let mut stages = Vec::with_capacity(blocks.len());
    for block in blocks {
        for (h, &f) in running.iter_mut().zip(frequencies) {
            *h *= block.response_at(f, sample_rate);
        }
        stages.push(running.clone());
    }
    Ok(stages)
}

/// Designs `specs` under `profile` and evaluates the cascade.
pub fn evaluate_specs(
    specs: &[FilterSpec],
    frequencies: &[f64],
    sample_rate: f64,
    profile: Option<&ManufacturerProfile>,
) -> Result<Vec<Complex64>> {
    let blocks = specs
        .iter()
        .map(|spec| design(spec, sample_rate, profile))
        .collect::<Result<Vec<_>>>()?;
    evaluate(&blocks, frequencies, sample_rate)
}

/// Magnitude of each point in dB.
pub fn magnitude_db(response: &[Complex64]) -> Vec<f64> {
    response.iter().map(|h| linear_to_db(h.norm())).collect()
}

/// Phase of each point in degrees, wrapped to `(-180, 180]`.
pub fn phase_deg(response: &[Complex64]) -> Vec<f64> {
    response.iter().map(|h| h.arg().to_degrees()).collect()
}

/// Phase in degrees with period jumps removed.
pub fn unwrapped_phase_deg(response: &[Complex64]) -> Vec<f64> {
    unwrap_degrees(&phase_deg(response))
}
