//! Level and phase conversions shared by the designer and the evaluators.
//!
//! # Level Conversions
//!
//! - [`db_to_linear`] / [`linear_to_db`] - Convert between dB and linear gain
//!
//! # Phase Handling
//!
//! - [`wrap_degrees`] / [`wrap_radians`] - Fold a phase into one period
//! - [`unwrap_degrees`] / [`unwrap_radians`] - Remove period jumps from a phase trace

use core::f64::consts::PI;

/// Floor applied before taking the logarithm of a magnitude.
pub const MAGNITUDE_FLOOR: f64 = 1e-12;

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use xover_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 1e-12);
/// assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-4);
/// ```
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Convert linear gain to decibels.
///
/// Magnitudes below [`MAGNITUDE_FLOOR`] are floored so that nulls map to a
/// large negative value instead of `-inf`.
///
/// # Example
/// ```rust
/// use xover_core::linear_to_db;
///
/// assert!(linear_to_db(1.0).abs() < 1e-12);
/// assert!((linear_to_db(2.0) - 6.0206).abs() < 1e-4);
/// ```
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    20.0 * linear.max(MAGNITUDE_FLOOR).log10()
}

/// Wrap a phase in degrees into `[-180, 180)`.
#[inline]
pub fn wrap_degrees(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

/// Wrap a phase in radians into `[-π, π)`.
#[inline]
pub fn wrap_radians(radians: f64) -> f64 {
    (radians + PI).rem_euclid(2.0 * PI) - PI
}

/// Unwrap a phase trace in radians.
///
/// Each step between neighbours is folded into `[-π, π)` and accumulated,
/// so jumps of any multiple of 2π are removed.
pub fn unwrap_radians(phase: &[f64]) -> Vec<f64> {
    unwrap_with_period(phase, 2.0 * PI)
}

/// Unwrap a phase trace in degrees.
pub fn unwrap_degrees(phase: &[f64]) -> Vec<f64> {
    unwrap_with_period(phase, 360.0)
}

fn unwrap_with_period(phase: &[f64], period: f64) -> Vec<f64> {
    let Some((&first, rest)) = phase.split_first() else {
        return Vec::new();
    };

    let half = period / 2.0;
    let mut unwrapped = Vec::with_capacity(phase.len());
    unwrapped.push(first);

    let mut previous_raw = first;
    let mut current = first;
    for &value in rest {
        let step = (value - previous_raw + half).rem_euclid(period) - half;
        current += step;
        unwrapped.push(current);
        previous_raw = value;
    }

    unwrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_roundtrip() {
        for db in [-40.0, -6.0, 0.0, 3.0, 12.0] {
            assert!((linear_to_db(db_to_linear(db)) - db).abs() < 1e-9);
        }
    }

    #[test]
    fn test_linear_to_db_floors_zero() {
        assert!((linear_to_db(0.0) - (-240.0)).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_degrees_range() {
        assert!((wrap_degrees(190.0) - (-170.0)).abs() < 1e-9);
        assert!((wrap_degrees(-190.0) - 170.0).abs() < 1e-9);
        assert!((wrap_degrees(720.0)).abs() < 1e-9);
        assert!((wrap_degrees(-180.0) - (-180.0)).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_radians_range() {
        let wrapped = wrap_radians(3.0 * PI / 2.0);
        assert!((wrapped - (-PI / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_unwrap_degrees_removes_jumps() {
        let wrapped = [170.0, -170.0, -150.0, 170.0];
        let unwrapped = unwrap_degrees(&wrapped);
        assert_eq!(unwrapped.len(), 4);
        assert!((unwrapped[1] - 190.0).abs() < 1e-9);
        assert!((unwrapped[2] - 210.0).abs() < 1e-9);
        assert!((unwrapped[3] - 170.0).abs() < 1e-9);
    }

    #[test]
    fn test_unwrap_radians_linear_ramp() {
        let ramp: Vec<f64> = (0..50).map(|i| -0.5 * i as f64).collect();
        let wrapped: Vec<f64> = ramp.iter().map(|&p| wrap_radians(p)).collect();
        let unwrapped = unwrap_radians(&wrapped);
        for (a, b) in ramp.iter().zip(&unwrapped) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn test_unwrap_empty() {
        assert!(unwrap_degrees(&[]).is_empty());
    }
}
