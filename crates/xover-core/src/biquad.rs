//! Second-order sections and their coefficient formulas.
//!
//! A [`Section`] is the atomic unit of every filter cascade: two poles, two
//! zeros, normalized so that `a0 = 1`. Sections are immutable once built and
//! are evaluated on the unit circle rather than run sample-by-sample.
//!
//! Coefficient calculation uses the RBJ Audio EQ Cookbook formulas. Every
//! function returns the raw `(b0, b1, b2, a0, a1, a2)` tuple; feed it to
//! [`Section::from_coefficients`] to normalize.

use core::f64::consts::PI;

use num_complex::Complex64;

/// Raw biquad coefficients `(b0, b1, b2, a0, a1, a2)` before normalization.
pub type Coefficients = (f64, f64, f64, f64, f64, f64);

/// One second-order section with `a0` normalized to 1.
///
/// Transfer function:
/// ```text
///         b0 + b1*z^-1 + b2*z^-2
/// H(z) = ------------------------
///          1 + a1*z^-1 + a2*z^-2
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Section {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Section {
    /// Creates a section from raw coefficients, normalizing by `a0`.
    pub fn new(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let a0_inv = 1.0 / a0;
        Self {
            b0: b0 * a0_inv,
            b1: b1 * a0_inv,
            b2: b2 * a0_inv,
            a1: a1 * a0_inv,
            a2: a2 * a0_inv,
        }
    }

    /// Creates a section from a cookbook coefficient tuple.
    pub fn from_coefficients(coefficients: Coefficients) -> Self {
        let (b0, b1, b2, a0, a1, a2) = coefficients;
        Self::new(b0, b1, b2, a0, a1, a2)
    }

    /// Passthrough section: `H(z) = 1`.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Normalized coefficients `[b0, b1, b2, a0, a1, a2]` with `a0 = 1`.
    pub fn coefficients(&self) -> [f64; 6] {
        [self.b0, self.b1, self.b2, 1.0, self.a1, self.a2]
    }

    /// Feedforward coefficients `[b0, b1, b2]`.
    pub fn numerator(&self) -> [f64; 3] {
        [self.b0, self.b1, self.b2]
    }

    /// Feedback coefficients `[1, a1, a2]`.
    pub fn denominator(&self) -> [f64; 3] {
        [1.0, self.a1, self.a2]
    }

    /// True when the section reduces to first order (`b2 = a2 = 0`).
    pub fn is_first_order(&self) -> bool {
        self.b2 == 0.0 && self.a2 == 0.0
    }

    /// Returns a copy with the numerator multiplied by `gain`.
    pub fn scaled(&self, gain: f64) -> Self {
        Self {
            b0: self.b0 * gain,
            b1: self.b1 * gain,
            b2: self.b2 * gain,
            ..*self
        }
    }

    /// Complex response at normalized angular frequency `omega` (radians/sample).
    #[inline]
    pub fn response_at(&self, omega: f64) -> Complex64 {
        let z_inv = Complex64::from_polar(1.0, -omega);
        let z_inv2 = z_inv * z_inv;
        let num = z_inv2 * self.b2 + z_inv * self.b1 + self.b0;
        let den = z_inv2 * self.a2 + z_inv * self.a1 + 1.0;
        num / den
    }

    /// Complex response at `frequency` Hz for the given sample rate.
    #[inline]
    pub fn response_at_hz(&self, frequency: f64, sample_rate: f64) -> Complex64 {
        self.response_at(2.0 * PI * frequency / sample_rate)
    }

    /// True when both poles lie strictly inside the unit circle.
    pub fn is_stable(&self) -> bool {
        // Jury conditions for a second-order denominator.
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::identity()
    }
}

/// Calculates low-pass filter coefficients using the RBJ cookbook formula.
///
/// # Arguments
///
/// * `frequency` - Cutoff frequency in Hz
/// * `q` - Q factor (0.7071 for a Butterworth response)
/// * `sample_rate` - Sample rate in Hz
pub fn lowpass_coefficients(frequency: f64, q: f64, sample_rate: f64) -> Coefficients {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);

    let b0 = (1.0 - cos_omega) / 2.0;
    let b1 = 1.0 - cos_omega;
    let b2 = (1.0 - cos_omega) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_omega;
    let a2 = 1.0 - alpha;

    (b0, b1, b2, a0, a1, a2)
}

/// Calculates high-pass filter coefficients using the RBJ cookbook formula.
///
/// # Arguments
///
/// * `frequency` - Cutoff frequency in Hz
/// * `q` - Q factor (0.7071 for a Butterworth response)
/// * `sample_rate` - Sample rate in Hz
pub fn highpass_coefficients(frequency: f64, q: f64, sample_rate: f64) -> Coefficients {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);

    let b0 = (1.0 + cos_omega) / 2.0;
    let b1 = -(1.0 + cos_omega);
    let b2 = (1.0 + cos_omega) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_omega;
    let a2 = 1.0 - alpha;

    (b0, b1, b2, a0, a1, a2)
}

/// First-order low-pass (bilinear transform, prewarped at the cutoff) in
/// biquad form with `b2 = a2 = 0`.
pub fn first_order_lowpass_coefficients(frequency: f64, sample_rate: f64) -> Coefficients {
    let k = (PI * frequency / sample_rate).tan();
    (k, k, 0.0, k + 1.0, k - 1.0, 0.0)
}

/// First-order high-pass (bilinear transform, prewarped at the cutoff) in
/// biquad form with `b2 = a2 = 0`.
pub fn first_order_highpass_coefficients(frequency: f64, sample_rate: f64) -> Coefficients {
    let k = (PI * frequency / sample_rate).tan();
    (1.0, -1.0, 0.0, k + 1.0, k - 1.0, 0.0)
}

/// Calculates peaking EQ filter coefficients using the RBJ cookbook formula.
///
/// The response at `frequency` is exactly `gain_db` with zero phase.
///
/// # Arguments
///
/// * `frequency` - Center frequency in Hz
/// * `q` - Q factor (bandwidth = frequency / Q)
/// * `gain_db` - Gain in decibels (positive = boost, negative = cut)
/// * `sample_rate` - Sample rate in Hz
pub fn peaking_eq_coefficients(
    frequency: f64,
    q: f64,
    gain_db: f64,
    sample_rate: f64,
) -> Coefficients {
    let a = 10f64.powf(gain_db / 40.0); // sqrt(10^(dB/20))
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);

    let b0 = 1.0 + alpha * a;
    let b1 = -2.0 * cos_omega;
    let b2 = 1.0 - alpha * a;
    let a0 = 1.0 + alpha / a;
    let a1 = -2.0 * cos_omega;
    let a2 = 1.0 - alpha / a;

    (b0, b1, b2, a0, a1, a2)
}

/// Calculates low-shelf coefficients using the RBJ cookbook formula.
///
/// `q` sets the transition steepness; use [`shelf_q_from_slope`] to derive it
/// from a cookbook shelf slope `S`.
pub fn low_shelf_coefficients(
    frequency: f64,
    gain_db: f64,
    q: f64,
    sample_rate: f64,
) -> Coefficients {
    let a = 10f64.powf(gain_db / 40.0);
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);
    let beta = 2.0 * a.sqrt() * alpha;

    let b0 = a * ((a + 1.0) - (a - 1.0) * cos_omega + beta);
    let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega);
    let b2 = a * ((a + 1.0) - (a - 1.0) * cos_omega - beta);
    let a0 = (a + 1.0) + (a - 1.0) * cos_omega + beta;
    let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega);
    let a2 = (a + 1.0) + (a - 1.0) * cos_omega - beta;

    (b0, b1, b2, a0, a1, a2)
}

/// Calculates high-shelf coefficients using the RBJ cookbook formula.
pub fn high_shelf_coefficients(
    frequency: f64,
    gain_db: f64,
    q: f64,
    sample_rate: f64,
) -> Coefficients {
    let a = 10f64.powf(gain_db / 40.0);
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);
    let beta = 2.0 * a.sqrt() * alpha;

    let b0 = a * ((a + 1.0) + (a - 1.0) * cos_omega + beta);
    let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega);
    let b2 = a * ((a + 1.0) + (a - 1.0) * cos_omega - beta);
    let a0 = (a + 1.0) - (a - 1.0) * cos_omega + beta;
    let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_omega);
    let a2 = (a + 1.0) - (a - 1.0) * cos_omega - beta;

    (b0, b1, b2, a0, a1, a2)
}

/// Calculates second-order all-pass coefficients using the RBJ cookbook formula.
///
/// Unity magnitude everywhere; the phase passes through -180° at `frequency`.
pub fn allpass_coefficients(frequency: f64, q: f64, sample_rate: f64) -> Coefficients {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);

    let b0 = 1.0 - alpha;
    let b1 = -2.0 * cos_omega;
    let b2 = 1.0 + alpha;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_omega;
    let a2 = 1.0 - alpha;

    (b0, b1, b2, a0, a1, a2)
}

/// Converts a cookbook shelf slope `S` into the equivalent Q.
///
/// Returns `None` when the slope is not positive or is too steep for the
/// requested gain (the cookbook square root would turn negative).
pub fn shelf_q_from_slope(gain_db: f64, slope: f64) -> Option<f64> {
    if !(slope > 0.0 && slope.is_finite()) {
        return None;
    }
    let a = 10f64.powf(gain_db / 40.0);
    let inner = (a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0;
    if inner <= 0.0 {
        return None;
    }
    Some(1.0 / inner.sqrt())
}
