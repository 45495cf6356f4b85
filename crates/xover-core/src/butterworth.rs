//! Butterworth and Linkwitz-Riley crossover sections.
//!
//! # Lowpass / Highpass
//!
//! An order-N Butterworth splits into `ceil(N/2)` sections. Pole pair `k`
//! sits at angle `φ_k = π(2k+1)/(2N)` from the imaginary axis and maps onto
//! a cookbook section with `Q_k = 1/(2 sin φ_k)`. Odd orders add one
//! first-order section stored in biquad form. All sections are prewarped at
//! the cutoff, so the cascade is exactly -3 dB there.
//!
//! # Bandpass / Bandstop
//!
//! Band modes apply the analog lowpass-to-band transform to the order-N
//! prototype in prewarped units (`W = tan(πf/fs)`, `W0 = sqrt(W1·W2)`,
//! `BW = W2 - W1`) and map every pole with the bilinear transform. The
//! result has `2N` poles grouped into N sections, each normalized to unity
//! gain at the band center (bandpass) or DC (bandstop).
//!
//! # Linkwitz-Riley
//!
//! An order-N Linkwitz-Riley filter is two identical order-N/2 Butterworth
//! cascades in series (-6 dB at the cutoff).

use core::f64::consts::PI;

use num_complex::Complex64;

use crate::biquad::{
    Section, first_order_highpass_coefficients, first_order_lowpass_coefficients,
    highpass_coefficients, lowpass_coefficients,
};
use crate::error::Result;
use crate::spec::{FilterKind, PassBand};

/// Q of pole pair `k` of an order-`order` Butterworth prototype.
pub fn butterworth_q(order: usize, k: usize) -> f64 {
    let phi = PI * (2 * k + 1) as f64 / (2 * order) as f64;
    1.0 / (2.0 * phi.sin())
}

/// Sections of an order-`order` Butterworth filter.
pub fn butterworth_sections(order: usize, band: &PassBand, sample_rate: f64) -> Result<Vec<Section>> {
    let kind = FilterKind::Butterworth {
        order,
        band: *band,
    };
    kind.validate()?;
    kind.check_nyquist(sample_rate)?;

    let sections = match *band {
        PassBand::Lowpass(cutoff) => single_edge_sections(order, cutoff, sample_rate, false),
        PassBand::Highpass(cutoff) => single_edge_sections(order, cutoff, sample_rate, true),
        PassBand::Bandpass { low, high } => band_sections(order, low, high, sample_rate, false),
        PassBand::Bandstop { low, high } => band_sections(order, low, high, sample_rate, true),
    };
    Ok(sections)
}

/// Sections of an order-`order` Linkwitz-Riley filter (lowpass or highpass).
pub fn linkwitz_riley_sections(
    order: usize,
    band: &PassBand,
    sample_rate: f64,
) -> Result<Vec<Section>> {
    let kind = FilterKind::LinkwitzRiley {
        order,
        band: *band,
    };
    kind.validate()?;
    kind.check_nyquist(sample_rate)?;

    let half = butterworth_sections(order / 2, band, sample_rate)?;
    let mut sections = Vec::with_capacity(half.len() * 2);
    sections.extend_from_slice(&half);
    sections.extend_from_slice(&half);
    Ok(sections)
}

fn single_edge_sections(order: usize, cutoff: f64, sample_rate: f64, highpass: bool) -> Vec<Section> {
    let mut sections = Vec::with_capacity(order.div_ceil(2));
    for k in 0..order / 2 {
        let q = butterworth_q(order, k);
        let coefficients = if highpass {
            highpass_coefficients(cutoff, q, sample_rate)
        } else {
            lowpass_coefficients(cutoff, q, sample_rate)
        };
        sections.push(Section::from_coefficients(coefficients));
    }
    if order % 2 == 1 {
        let coefficients = if highpass {
            first_order_highpass_coefficients(cutoff, sample_rate)
        } else {
            first_order_lowpass_coefficients(cutoff, sample_rate)
        };
        sections.push(Section::from_coefficients(coefficients));
    }
    sections
}

fn band_sections(order: usize, low: f64, high: f64, sample_rate: f64, bandstop: bool) -> Vec<Section> {
    let w1 = (PI * low / sample_rate).tan();
    let w2 = (PI * high / sample_rate).tan();
    let w0_sq = w1 * w2;
    let bw = w2 - w1;

    // Zeros: z = ±1 for bandpass, the conjugate pair at the center for bandstop.
    let numerator = if bandstop {
        let w0 = w0_sq.sqrt();
        let z0 = bilinear(Complex64::new(0.0, w0));
        [1.0, -2.0 * z0.re, 1.0]
    } else {
        [1.0, 0.0, -1.0]
    };
    let reference = if bandstop {
        0.0
    } else {
        2.0 * w0_sq.sqrt().atan()
    };

    let mut sections = Vec::with_capacity(order);
    let mut push = |p1: Complex64, p2: Complex64| {
        let z1 = bilinear(p1);
        let z2 = bilinear(p2);
        let section = Section::new(
            numerator[0],
            numerator[1],
            numerator[2],
            1.0,
            -(z1 + z2).re,
            (z1 * z2).re,
        );
        let gain = section.response_at(reference).norm();
        sections.push(section.scaled(1.0 / gain));
    };

    for k in 0..order.div_ceil(2) {
        let theta = PI / 2.0 + PI * (2 * k + 1) as f64 / (2 * order) as f64;
        let prototype = Complex64::from_polar(1.0, theta);
        let (r1, r2) = band_roots(prototype, w0_sq, bw, bandstop);
        if 2 * k + 1 == order {
            // Real prototype pole: its two roots form one real section.
            push(r1, r2);
        } else {
            push(r1, r1.conj());
            push(r2, r2.conj());
        }
    }
    sections
}

// Roots of s² - c·s + W0² for one prototype pole p, where c = p·BW for
// bandpass and c = BW/p for bandstop.
fn band_roots(p: Complex64, w0_sq: f64, bw: f64, bandstop: bool) -> (Complex64, Complex64) {
    let c = if bandstop { bw / p } else { p * bw };
    let disc = (c * c - 4.0 * w0_sq).sqrt();
    ((c + disc) / 2.0, (c - disc) / 2.0)
}

fn bilinear(s: Complex64) -> Complex64 {
    (1.0 + s) / (1.0 - s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::linear_to_db;

    const FS: f64 = 48000.0;

    fn cascade_db(sections: &[Section], frequency: f64) -> f64 {
        let h = sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response_at_hz(frequency, FS));
        linear_to_db(h.norm())
    }

    #[test]
    fn butterworth_q_values() {
        assert!((butterworth_q(2, 0) - core::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        assert!((butterworth_q(3, 0) - 1.0).abs() < 1e-12);
        assert!((butterworth_q(4, 0) - 1.306_562_964_876_376_6).abs() < 1e-9);
        assert!((butterworth_q(4, 1) - 0.541_196_100_146_197).abs() < 1e-9);
    }

    #[test]
    fn section_counts() {
        for order in 1..=8 {
            let sections = butterworth_sections(order, &PassBand::Lowpass(1000.0), FS).unwrap();
            assert_eq!(sections.len(), order.div_ceil(2), "order {order}");
            let band = PassBand::Bandpass {
                low: 300.0,
                high: 3000.0,
            };
            let sections = butterworth_sections(order, &band, FS).unwrap();
            assert_eq!(sections.len(), order, "band order {order}");
        }
    }

    #[test]
    fn lowpass_half_power_at_cutoff() {
        for order in 1..=7 {
            let sections = butterworth_sections(order, &PassBand::Lowpass(2000.0), FS).unwrap();
            assert!((cascade_db(&sections, 2000.0) + 3.0103).abs() < 1e-3, "order {order}");
            assert!(cascade_db(&sections, 10.0).abs() < 1e-3);
            assert!(sections.iter().all(Section::is_stable));
        }
    }

    #[test]
    fn highpass_rolloff_matches_order() {
        let sections = butterworth_sections(4, &PassBand::Highpass(1000.0), FS).unwrap();
        assert!((cascade_db(&sections, 1000.0) + 3.0103).abs() < 1e-3);
        // Roughly 24 dB per octave well below the cutoff.
        let drop = cascade_db(&sections, 200.0) - cascade_db(&sections, 100.0);
        assert!((drop - 24.0).abs() < 0.5, "drop {drop}");
        assert!(cascade_db(&sections, 20000.0).abs() < 0.01);
    }

    #[test]
    fn bandpass_edges_and_center() {
        for order in [1, 2, 3, 4] {
            let band = PassBand::Bandpass {
                low: 500.0,
                high: 2000.0,
            };
            let sections = butterworth_sections(order, &band, FS).unwrap();
            assert!((cascade_db(&sections, 500.0) + 3.0103).abs() < 1e-3, "order {order}");
            assert!((cascade_db(&sections, 2000.0) + 3.0103).abs() < 1e-3, "order {order}");
            assert!(cascade_db(&sections, 20.0) < -20.0);
            assert!(sections.iter().all(Section::is_stable));
        }
    }

    #[test]
    fn bandstop_rejects_center_and_passes_dc() {
        let band = PassBand::Bandstop {
            low: 50.0,
            high: 70.0,
        };
        let sections = butterworth_sections(2, &band, FS).unwrap();
        assert!(cascade_db(&sections, 10.0).abs() < 0.05);
        assert!(cascade_db(&sections, 5000.0).abs() < 0.05);
        assert!((cascade_db(&sections, 50.0) + 3.0103).abs() < 1e-3);
        let center = ((PI * 50.0 / FS).tan() * (PI * 70.0 / FS).tan()).sqrt().atan() * FS / PI;
        assert!(cascade_db(&sections, center) < -80.0);
    }

    #[test]
    fn linkwitz_riley_is_squared_butterworth() {
        let lr = linkwitz_riley_sections(4, &PassBand::Lowpass(350.0), FS).unwrap();
        let bw = butterworth_sections(2, &PassBand::Lowpass(350.0), FS).unwrap();
        assert_eq!(lr.len(), 2);
        assert_eq!(lr[0], bw[0]);
        assert_eq!(lr[1], bw[0]);
        assert!((cascade_db(&lr, 350.0) + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn linkwitz_riley_rejects_odd_order() {
        assert!(linkwitz_riley_sections(3, &PassBand::Lowpass(350.0), FS).is_err());
    }

    #[test]
    fn nyquist_rejected() {
        assert!(butterworth_sections(2, &PassBand::Lowpass(24000.0), FS).is_err());
        let band = PassBand::Bandpass {
            low: 1000.0,
            high: 30000.0,
        };
        assert!(butterworth_sections(2, &band, FS).is_err());
    }
}
