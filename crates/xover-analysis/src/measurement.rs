//! Measured frequency responses.
//!
//! A [`Measurement`] holds `(frequency, magnitude_db, phase_deg)` samples in
//! columnar form. Construction enforces strictly ascending, positive
//! frequencies and finite values, so every later operation can rely on a
//! sorted grid.
//!
//! Resampling is linear in `log10(f)` for both magnitude (dB) and unwrapped
//! phase (degrees). Grid points outside the measured range are rejected
//! rather than extrapolated.

use std::f64::consts::PI;

use num_complex::Complex64;
use rustfft::FftPlanner;
use xover_core::{EngineError, Result, db_to_linear, linear_to_db, unwrap_degrees};

/// Default number of points in a common analysis grid.
pub const DEFAULT_GRID_POINTS: usize = 2000;

/// Measured response of one driver or one calibration sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    frequencies: Vec<f64>,
    magnitude_db: Vec<f64>,
    phase_deg: Vec<f64>,
}

impl Measurement {
    /// Builds a measurement from `(frequency_hz, magnitude_db, phase_deg)`
    /// samples, which must already be in ascending frequency order.
    pub fn from_samples(samples: impl IntoIterator<Item = (f64, f64, f64)>) -> Result<Self> {
        let mut frequencies = Vec::new();
        let mut magnitude_db = Vec::new();
        let mut phase_deg = Vec::new();
        for (f, m, p) in samples {
            frequencies.push(f);
            magnitude_db.push(m);
            phase_deg.push(p);
        }
        Self::from_columns(frequencies, magnitude_db, phase_deg)
    }

    /// Builds a measurement from parallel columns.
    pub fn from_columns(
        frequencies: Vec<f64>,
        magnitude_db: Vec<f64>,
        phase_deg: Vec<f64>,
    ) -> Result<Self> {
        if frequencies.is_empty() {
            return Err(EngineError::invalid_measurement("no samples"));
        }
        if magnitude_db.len() != frequencies.len() || phase_deg.len() != frequencies.len() {
            return Err(EngineError::invalid_measurement(format!(
                "column lengths differ: {} frequencies, {} magnitudes, {} phases",
                frequencies.len(),
                magnitude_db.len(),
                phase_deg.len()
            )));
        }
        for (i, &f) in frequencies.iter().enumerate() {
            if !(f > 0.0 && f.is_finite()) {
                return Err(EngineError::invalid_measurement(format!(
                    "sample {i}: frequency {f} is not positive and finite"
                )));
            }
            if i > 0 && f <= frequencies[i - 1] {
                return Err(EngineError::invalid_measurement(format!(
                    "sample {i}: frequency {f} does not ascend from {}",
                    frequencies[i - 1]
                )));
            }
        }
        if let Some(i) = magnitude_db.iter().position(|m| !m.is_finite()) {
            return Err(EngineError::invalid_measurement(format!(
                "sample {i}: magnitude is not finite"
            )));
        }
        if let Some(i) = phase_deg.iter().position(|p| !p.is_finite()) {
            return Err(EngineError::invalid_measurement(format!(
                "sample {i}: phase is not finite"
            )));
        }
        Ok(Self {
            frequencies,
            magnitude_db,
            phase_deg,
        })
    }

    /// Builds a measurement from a complex response on `frequencies`.
    pub fn from_response(frequencies: &[f64], response: &[Complex64]) -> Result<Self> {
        Self::from_columns(
            frequencies.to_vec(),
            response.iter().map(|h| linear_to_db(h.norm())).collect(),
            response.iter().map(|h| h.arg().to_degrees()).collect(),
        )
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Always false; measurements hold at least one sample.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Sample frequencies in Hz, ascending.
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Magnitudes in dB.
    pub fn magnitude_db(&self) -> &[f64] {
        &self.magnitude_db
    }

    /// Phases in degrees, as measured.
    pub fn phase_deg(&self) -> &[f64] {
        &self.phase_deg
    }

    /// Phases in degrees with period jumps removed.
    pub fn unwrapped_phase_deg(&self) -> Vec<f64> {
        unwrap_degrees(&self.phase_deg)
    }

    /// Lowest and highest measured frequency.
    pub fn range(&self) -> (f64, f64) {
        (
            self.frequencies[0],
            self.frequencies[self.frequencies.len() - 1],
        )
    }

    /// Iterates over `(frequency, magnitude_db, phase_deg)` samples.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.frequencies
            .iter()
            .zip(&self.magnitude_db)
            .zip(&self.phase_deg)
            .map(|((&f, &m), &p)| (f, m, p))
    }

    /// Complex response at the measured frequencies.
    pub fn to_complex(&self) -> Vec<Complex64> {
        self.magnitude_db
            .iter()
            .zip(&self.phase_deg)
            .map(|(&m, &p)| Complex64::from_polar(db_to_linear(m), p.to_radians()))
            .collect()
    }

    /// Interpolates magnitude (dB) and unwrapped phase (degrees) onto `grid`.
    ///
    /// # Errors
    ///
    /// [`EngineError::GridOutOfRange`] for any grid point outside the
    /// measured range.
    pub fn interpolate(&self, grid: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
        let (min, max) = self.range();
        let phase = self.unwrapped_phase_deg();
        let log_f: Vec<f64> = self.frequencies.iter().map(|f| f.log10()).collect();

        let mut magnitude_out = Vec::with_capacity(grid.len());
        let mut phase_out = Vec::with_capacity(grid.len());
        for &frequency in grid {
            if !(frequency >= min && frequency <= max) {
                return Err(EngineError::GridOutOfRange {
                    frequency,
                    min,
                    max,
                });
            }
            // First sample at or above the grid point.
            let upper = self.frequencies.partition_point(|&f| f < frequency);
            if self.frequencies[upper] == frequency {
                magnitude_out.push(self.magnitude_db[upper]);
                phase_out.push(phase[upper]);
                continue;
            }
            let lower = upper - 1;
            let t = (frequency.log10() - log_f[lower]) / (log_f[upper] - log_f[lower]);
            magnitude_out.push(lerp(self.magnitude_db[lower], self.magnitude_db[upper], t));
            phase_out.push(lerp(phase[lower], phase[upper], t));
        }
        Ok((magnitude_out, phase_out))
    }

    /// Resamples onto `grid`; phase in the result is unwrapped.
    pub fn resample(&self, grid: &[f64]) -> Result<Self> {
        let (magnitude_db, phase_deg) = self.interpolate(grid)?;
        Self::from_columns(grid.to_vec(), magnitude_db, phase_deg)
    }

    /// Interpolated complex response on `grid`.
    pub fn complex_on(&self, grid: &[f64]) -> Result<Vec<Complex64>> {
        let (magnitude_db, phase_deg) = self.interpolate(grid)?;
        Ok(magnitude_db
            .iter()
            .zip(&phase_deg)
            .map(|(&m, &p)| Complex64::from_polar(db_to_linear(m), p.to_radians()))
            .collect())
    }

    /// Estimates the minimum-phase counterpart of this measurement.
    ///
    /// The phase is minus the Hilbert transform of the natural-log magnitude
    /// sequence. With `remove_delay`, the best-fit linear phase (constant
    /// group delay) is subtracted; otherwise the phase is referenced to the
    /// last sample. Magnitudes are kept unchanged.
    pub fn minimum_phase(&self, remove_delay: bool) -> Self {
        let log_magnitude: Vec<f64> = self
            .magnitude_db
            .iter()
            .map(|&m| db_to_linear(m).max(xover_core::math::MAGNITUDE_FLOOR).ln())
            .collect();
        let mut phase: Vec<f64> = hilbert_imag(&log_magnitude).iter().map(|h| -h).collect();

        if remove_delay {
            let (slope, intercept) = linear_fit(&self.frequencies, &phase);
            for (p, &f) in phase.iter_mut().zip(&self.frequencies) {
                *p -= slope * f + intercept;
            }
        } else if let Some(&last) = phase.last() {
            for p in &mut phase {
                *p -= last;
            }
        }

        Self {
            frequencies: self.frequencies.clone(),
            magnitude_db: self.magnitude_db.clone(),
            phase_deg: phase.iter().map(|p| p * 180.0 / PI).collect(),
        }
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Imaginary part of the analytic signal of `x`.
///
/// FFT method: keep DC (and Nyquist for even lengths), double the positive
/// bins, zero the negative bins, inverse FFT.
fn hilbert_imag(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    forward.process(&mut buffer);

    let positive_end = n.div_ceil(2);
    for (k, bin) in buffer.iter_mut().enumerate() {
        let weight = if k == 0 || (n % 2 == 0 && k == n / 2) {
            1.0
        } else if k < positive_end {
            2.0
        } else {
            0.0
        };
        *bin *= weight;
    }

    inverse.process(&mut buffer);
    // rustfft does not normalize the inverse transform.
    let scale = 1.0 / n as f64;
    buffer.iter().map(|c| c.im * scale).collect()
}

/// Least-squares line through `(x, y)`; returns `(slope, intercept)`.
fn linear_fit(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    if x.len() < 2 {
        return (0.0, y.first().copied().unwrap_or(0.0));
    }
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        sxy += (xi - mean_x) * (yi - mean_y);
        sxx += (xi - mean_x) * (xi - mean_x);
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (slope, mean_y - slope * mean_x)
}

/// Log-spaced grid from `low` to `high` inclusive.
///
/// Endpoints are exact; interior points are `10^(log10(low) + i·step)`.
pub fn log_grid(low: f64, high: f64, points: usize) -> Result<Vec<f64>> {
    if !(low > 0.0 && high > low && high.is_finite()) {
        return Err(EngineError::invalid_measurement(format!(
            "grid range [{low}, {high}] must satisfy 0 < low < high"
        )));
    }
    if points < 2 {
        return Err(EngineError::invalid_measurement(format!(
            "grid needs at least 2 points, got {points}"
        )));
    }
    let (log_low, log_high) = (low.log10(), high.log10());
    let step = (log_high - log_low) / (points - 1) as f64;
    let mut grid: Vec<f64> = (0..points)
        .map(|i| 10f64.powf(log_low + step * i as f64))
        .collect();
    grid[0] = low;
    grid[points - 1] = high;
    Ok(grid)
}

/// Log-spaced grid over the frequency range every measurement covers.
pub fn common_grid(measurements: &[&Measurement], points: usize) -> Result<Vec<f64>> {
    let low = measurements
        .iter()
        .map(|m| m.range().0)
        .fold(f64::NEG_INFINITY, f64::max);
    let high = measurements
        .iter()
        .map(|m| m.range().1)
        .fold(f64::INFINITY, f64::min);
    if measurements.is_empty() || high <= low {
        return Err(EngineError::invalid_measurement(
            "measurements do not share an overlapping frequency range",
        ));
    }
    log_grid(low, high, points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Measurement {
        Measurement::from_samples([
            (100.0, 0.0, 0.0),
            (1000.0, -10.0, -90.0),
            (10000.0, -20.0, -180.0),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_unsorted_and_duplicates() {
        let err = Measurement::from_samples([(100.0, 0.0, 0.0), (50.0, 0.0, 0.0)]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidMeasurement(_)));
        assert!(Measurement::from_samples([(100.0, 0.0, 0.0), (100.0, 1.0, 0.0)]).is_err());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Measurement::from_samples([(0.0, 0.0, 0.0)]).is_err());
        assert!(Measurement::from_samples([(10.0, f64::NAN, 0.0)]).is_err());
        assert!(Measurement::from_samples([(10.0, 0.0, f64::INFINITY)]).is_err());
        assert!(Measurement::from_samples(std::iter::empty::<(f64, f64, f64)>()).is_err());
        assert!(Measurement::from_columns(vec![1.0, 2.0], vec![0.0], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn interpolation_is_linear_in_log_frequency() {
        let m = ramp();
        let geometric_mid = (100.0f64 * 1000.0).sqrt();
        let (mag, phase) = m.interpolate(&[geometric_mid, 1000.0]).unwrap();
        assert!((mag[0] + 5.0).abs() < 1e-9);
        assert!((phase[0] + 45.0).abs() < 1e-9);
        assert_eq!(mag[1], -10.0);
    }

    #[test]
    fn interpolation_uses_unwrapped_phase() {
        let m = Measurement::from_samples([(100.0, 0.0, 170.0), (200.0, 0.0, -170.0)]).unwrap();
        let (_, phase) = m.interpolate(&[(100.0f64 * 200.0).sqrt()]).unwrap();
        assert!((phase[0] - 180.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_grid_rejected() {
        let m = ramp();
        let err = m.interpolate(&[50.0]).unwrap_err();
        assert_eq!(
            err,
            EngineError::GridOutOfRange {
                frequency: 50.0,
                min: 100.0,
                max: 10000.0
            }
        );
        assert!(m.interpolate(&[100.0, 10000.0]).is_ok());
        assert!(m.interpolate(&[10000.1]).is_err());
    }

    #[test]
    fn log_grid_endpoints_exact() {
        let grid = log_grid(20.0, 20000.0, 2000).unwrap();
        assert_eq!(grid.len(), 2000);
        assert_eq!(grid[0], 20.0);
        assert_eq!(grid[1999], 20000.0);
        assert!(grid.windows(2).all(|w| w[1] > w[0]));
        assert!(log_grid(20.0, 10.0, 10).is_err());
        assert!(log_grid(20.0, 200.0, 1).is_err());
    }

    #[test]
    fn common_grid_uses_overlap() {
        let a = ramp();
        let b = Measurement::from_samples([(300.0, 0.0, 0.0), (20000.0, 0.0, 0.0)]).unwrap();
        let grid = common_grid(&[&a, &b], 10).unwrap();
        assert_eq!(grid[0], 300.0);
        assert_eq!(grid[9], 10000.0);

        let c = Measurement::from_samples([(20000.0, 0.0, 0.0), (30000.0, 0.0, 0.0)]).unwrap();
        assert!(common_grid(&[&a, &c], 10).is_err());
        assert!(common_grid(&[], 10).is_err());
    }

    #[test]
    fn complex_roundtrip() {
        let m = ramp();
        let back = Measurement::from_response(m.frequencies(), &m.to_complex()).unwrap();
        for (a, b) in m.magnitude_db().iter().zip(back.magnitude_db()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!((back.phase_deg()[2].abs() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn minimum_phase_of_flat_magnitude_is_zero() {
        let grid = log_grid(20.0, 20000.0, 256).unwrap();
        let m = Measurement::from_columns(grid.clone(), vec![-3.0; 256], vec![45.0; 256]).unwrap();
        let min_phase = m.minimum_phase(true);
        assert_eq!(min_phase.magnitude_db(), m.magnitude_db());
        assert!(min_phase.phase_deg().iter().all(|p| p.abs() < 1e-9));
    }

    #[test]
    fn hilbert_of_cosine_is_sine() {
        let n = 64;
        let x: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * 4.0 * i as f64 / n as f64).cos())
            .collect();
        let h = hilbert_imag(&x);
        for (i, v) in h.iter().enumerate() {
            let expected = (2.0 * PI * 4.0 * i as f64 / n as f64).sin();
            assert!((v - expected).abs() < 1e-9);
        }
    }
}
