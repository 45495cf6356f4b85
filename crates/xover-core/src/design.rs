//! Filter design: one [`FilterSpec`] plus a manufacturer profile in, a
//! [`DesignedFilter`] out.
//!
//! Corrections from the profile are merged over the block parameters before
//! any coefficients are computed (see [`crate::profile`] for precedence).
//! Gain blocks are never corrected; delay blocks take the profile's `delay`
//! entry. A disabled spec, or a spec whose family the profile disables,
//! designs to the identity.

use core::f64::consts::PI;

use num_complex::Complex64;

use crate::biquad::{
    Section, allpass_coefficients, high_shelf_coefficients, low_shelf_coefficients,
    peaking_eq_coefficients, shelf_q_from_slope,
};
use crate::butterworth::{butterworth_sections, linkwitz_riley_sections};
use crate::error::{EngineError, Result};
use crate::math::db_to_linear;
use crate::profile::{FamilyCorrection, ManufacturerProfile};
use crate::spec::{FilterKind, FilterSpec, ShelfMode, ShelfWidth};

/// Output of the designer for one filter block.
///
/// Biquad blocks carry sections, `gain` blocks a scalar and `delay` blocks a
/// pure delay. Combining them keeps the evaluator uniform.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignedFilter {
    /// Cascaded second-order sections, in order.
    pub sections: Vec<Section>,
    /// Linear scalar gain.
    pub gain: f64,
    /// Pure delay in seconds.
    pub delay_s: f64,
}

impl DesignedFilter {
    /// Unity response: no sections, unity gain, no delay.
    pub fn identity() -> Self {
        Self {
            sections: Vec::new(),
            gain: 1.0,
            delay_s: 0.0,
        }
    }

    /// A block made of sections only.
    pub fn cascade(sections: Vec<Section>) -> Self {
        Self {
            sections,
            ..Self::identity()
        }
    }

    /// A flat gain in dB.
    pub fn gain_db(gain_db: f64) -> Self {
        Self {
            gain: db_to_linear(gain_db),
            ..Self::identity()
        }
    }

    /// A pure delay in microseconds.
    pub fn delay_us(delay_us: f64) -> Self {
        Self {
            delay_s: delay_us * 1e-6,
            ..Self::identity()
        }
    }

    /// True when the block has no effect on the response.
    pub fn is_identity(&self) -> bool {
        self.sections.is_empty() && self.gain == 1.0 && self.delay_s == 0.0
    }

    /// Complex response at `frequency` Hz.
    ///
    /// No band check is made here; see [`crate::response::evaluate`].
    #[inline]
    pub fn response_at(&self, frequency: f64, sample_rate: f64) -> Complex64 {
        let omega = 2.0 * PI * frequency / sample_rate;
        let mut h = Complex64::new(self.gain, 0.0);
        for section in &self.sections {
            h *= section.response_at(omega);
        }
        if self.delay_s != 0.0 {
            h *= Complex64::from_polar(1.0, -2.0 * PI * frequency * self.delay_s);
        }
        h
    }
}

impl Default for DesignedFilter {
    fn default() -> Self {
        Self::identity()
    }
}

/// Designs one block under `profile`.
///
/// `None` behaves like the built-in `generic` profile.
///
/// # Errors
///
/// [`EngineError::InvalidFilterSpec`] when a corrected frequency leaves
/// `(0, Nyquist)` or a corrected shelf slope is too steep for its gain.
///
/// # Example
///
/// ```rust
/// use xover_core::{FilterSpec, design, linear_to_db};
///
/// let spec = FilterSpec::peq(1000.0, 0.707, 3.0).unwrap();
/// let filter = design(&spec, 192_000.0, None).unwrap();
/// let h = filter.response_at(1000.0, 192_000.0);
/// assert!((linear_to_db(h.norm()) - 3.0).abs() < 1e-9);
/// ```
pub fn design(
    spec: &FilterSpec,
    sample_rate: f64,
    profile: Option<&ManufacturerProfile>,
) -> Result<DesignedFilter> {
    let correction = match (profile, spec.family()) {
        (Some(profile), Some(family)) => profile.correction_for(family),
        (Some(profile), None) if matches!(spec.kind(), FilterKind::Delay { .. }) => {
            profile.delay_correction()
        }
        _ => None,
    };
    design_corrected(spec, sample_rate, correction)
}

/// Designs one block with an explicit family correction.
///
/// The calibration solver drives this directly with trial corrections.
pub fn design_corrected(
    spec: &FilterSpec,
    sample_rate: f64,
    correction: Option<&FamilyCorrection>,
) -> Result<DesignedFilter> {
    if !spec.is_enabled() || correction.is_some_and(|c| !c.is_enabled()) {
        return Ok(DesignedFilter::identity());
    }

    let kind = match correction {
        Some(correction) => apply_correction(spec.kind(), correction),
        None => *spec.kind(),
    };
    kind.validate()?;
    kind.check_nyquist(sample_rate)?;

    let designed = match kind {
        FilterKind::Butterworth { order, band } => {
            DesignedFilter::cascade(butterworth_sections(order, &band, sample_rate)?)
        }
        FilterKind::LinkwitzRiley { order, band } => {
            DesignedFilter::cascade(linkwitz_riley_sections(order, &band, sample_rate)?)
        }
        FilterKind::Peq { f0, q, gain_db } => DesignedFilter::cascade(vec![
            Section::from_coefficients(peaking_eq_coefficients(f0, q, gain_db, sample_rate)),
        ]),
        FilterKind::Shelf {
            mode,
            f0,
            gain_db,
            width,
        } => {
            let q = match width {
                ShelfWidth::Q(q) => q,
                ShelfWidth::Slope(slope) => shelf_q_from_slope(gain_db, slope).ok_or_else(|| {
                    EngineError::invalid_spec(format!(
                        "shelf slope {slope} is too steep for {gain_db} dB"
                    ))
                })?,
            };
            let coefficients = match mode {
                ShelfMode::Low => low_shelf_coefficients(f0, gain_db, q, sample_rate),
                ShelfMode::High => high_shelf_coefficients(f0, gain_db, q, sample_rate),
            };
            DesignedFilter::cascade(vec![Section::from_coefficients(coefficients)])
        }
        FilterKind::Phase { f0, q } => DesignedFilter::cascade(vec![Section::from_coefficients(
            allpass_coefficients(f0, q, sample_rate),
        )]),
        FilterKind::Gain { gain_db } => DesignedFilter::gain_db(gain_db),
        FilterKind::Delay { delay_us } => DesignedFilter::delay_us(delay_us),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "design: {} -> {} sections",
        kind.type_name(),
        designed.sections.len()
    );

    Ok(designed)
}

/// Merges `correction` over the parameters of `kind`.
///
/// Crossover families only take the frequency terms and delay blocks only
/// `delay_offset_us`; gain blocks are returned unchanged. The result is not
/// validated.
pub fn apply_correction(kind: &FilterKind, correction: &FamilyCorrection) -> FilterKind {
    match *kind {
        FilterKind::Butterworth { order, band } => FilterKind::Butterworth {
            order,
            band: band.map_frequencies(|f| correction.correct_frequency(f)),
        },
        FilterKind::LinkwitzRiley { order, band } => FilterKind::LinkwitzRiley {
            order,
            band: band.map_frequencies(|f| correction.correct_frequency(f)),
        },
        FilterKind::Peq { f0, q, gain_db } => FilterKind::Peq {
            f0: correction.correct_frequency(f0),
            q: correction.correct_q(q),
            gain_db: correction.correct_gain(gain_db),
        },
        FilterKind::Shelf {
            mode,
            f0,
            gain_db,
            width,
        } => FilterKind::Shelf {
            mode,
            f0: correction.correct_frequency(f0),
            gain_db: correction.correct_gain(gain_db),
            width: match width {
                ShelfWidth::Slope(s) => ShelfWidth::Slope(correction.correct_slope(s)),
                ShelfWidth::Q(q) => ShelfWidth::Q(correction.correct_q(q)),
            },
        },
        FilterKind::Phase { f0, q } => FilterKind::Phase {
            f0: correction.correct_frequency(f0),
            q: correction.correct_q(q),
        },
        FilterKind::Delay { delay_us } => FilterKind::Delay {
            delay_us: correction.correct_delay(delay_us),
        },
        FilterKind::Gain { .. } => *kind,
    }
}
