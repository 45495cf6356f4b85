//! Manufacturer calibration from measured sweeps.
//!
//! A calibration sweep is the measured response of a hardware DSP running a
//! known canonical filter (by default a 3 dB, Q 0.707 section at 1 kHz).
//! [`CalibrationSolver::fit`] searches the correction scales that make the
//! cookbook design reproduce the sweep, and the result is merged into a
//! [`ManufacturerProfile`].
//!
//! # Residual
//!
//! For each sweep sample the residual holds the weighted magnitude error in
//! dB and the weighted phase error in radians, wrapped to `[-π, π)`. All-pass
//! sweeps weight phase (magnitude 0.05, phase 1.0); every other family
//! weights magnitude (magnitude 1.0, phase 0.05). The tolerance applies to
//! the RMS of this combined vector.
//!
//! # Example
//!
//! ```rust
//! use xover_analysis::{CalibrationSolver, Measurement, ReferenceSettings, log_grid};
//! use xover_core::{FilterFamily, ManufacturerProfile, evaluate_specs};
//!
//! let fs = 48_000.0;
//! let reference = ReferenceSettings::default();
//! let expected = reference.spec_for(FilterFamily::Peq).unwrap();
//!
//! // A perfect cookbook device.
//! let grid = log_grid(20.0, 20_000.0, 200).unwrap();
//! let response = evaluate_specs(&[expected], &grid, fs, None).unwrap();
//! let sweep = Measurement::from_response(&grid, &response).unwrap();
//!
//! let result = CalibrationSolver::default()
//!     .fit(FilterFamily::Peq, &sweep, &expected, fs)
//!     .unwrap();
//! assert!(result.residual < 1e-6);
//!
//! let mut profile = ManufacturerProfile::new("bench");
//! result.apply_to(&mut profile);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use xover_core::{
    CorrectionParam, EngineError, FamilyCorrection, FilterFamily, FilterKind, FilterSpec,
    ManufacturerProfile, PassBand, Result, ShelfWidth, check_grid, design_corrected,
    linear_to_db, wrap_radians,
};

use crate::least_squares::{SolverSettings, Termination, levenberg_marquardt, rms};
use crate::measurement::Measurement;

/// Canonical filters the sweeps were measured with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSettings {
    /// Center / corner / cutoff frequency in Hz.
    pub frequency_hz: f64,
    /// Gain of the PEQ and shelf references in dB.
    pub gain_db: f64,
    /// Q of the PEQ and all-pass references.
    pub q: f64,
    /// Slope of the low-shelf reference.
    pub shelf_slope: f64,
    /// Order of the Butterworth lowpass reference.
    pub butterworth_order: usize,
    /// Order of the Linkwitz-Riley lowpass reference.
    pub linkwitz_riley_order: usize,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            gain_db: 3.0,
            q: 0.707,
            shelf_slope: 0.707,
            butterworth_order: 2,
            linkwitz_riley_order: 4,
        }
    }
}

impl ReferenceSettings {
    /// The canonical spec measured for `family`.
    pub fn spec_for(&self, family: FilterFamily) -> Result<FilterSpec> {
        match family {
            FilterFamily::Peq => FilterSpec::peq(self.frequency_hz, self.q, self.gain_db),
            FilterFamily::Shelf => {
                FilterSpec::low_shelf(self.frequency_hz, self.gain_db, self.shelf_slope)
            }
            FilterFamily::Allpass => FilterSpec::allpass(self.frequency_hz, self.q),
            FilterFamily::Butterworth => FilterSpec::butterworth(
                self.butterworth_order,
                PassBand::Lowpass(self.frequency_hz),
            ),
            FilterFamily::LinkwitzRiley => FilterSpec::linkwitz_riley(
                self.linkwitz_riley_order,
                PassBand::Lowpass(self.frequency_hz),
            ),
        }
    }
}

/// Solver knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Largest acceptable RMS residual.
    pub tolerance: f64,
    /// Iteration budget of the least-squares loop.
    pub max_iterations: usize,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.25,
            max_iterations: 200,
        }
    }
}

/// Magnitude and phase weights of the residual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualWeights {
    /// Weight on dB magnitude error.
    pub magnitude: f64,
    /// Weight on radian phase error.
    pub phase: f64,
}

impl ResidualWeights {
    /// Weights used for `family`.
    pub fn for_family(family: FilterFamily) -> Self {
        match family {
            FilterFamily::Allpass => Self {
                magnitude: 0.05,
                phase: 1.0,
            },
            _ => Self {
                magnitude: 1.0,
                phase: 0.05,
            },
        }
    }
}

/// One free parameter of a fit with its box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeParameter {
    /// Correction field being fitted.
    pub param: CorrectionParam,
    /// Lower bound on the scale.
    pub lower: f64,
    /// Upper bound on the scale.
    pub upper: f64,
}

impl FreeParameter {
    // Every box admits at least 0.5x..2x so the 1.0 start is interior.
    fn new(param: CorrectionParam, lower: f64, upper: f64) -> Self {
        Self {
            param,
            lower: lower.min(0.5),
            upper: upper.max(2.0),
        }
    }
}

/// Free parameters for fitting `expected`, all starting at 1.0.
///
/// Bounds are scales derived from absolute limits on the reference values:
/// frequency within 0.25x..4x, gain within 0.25x..4x (6x for shelves,
/// never below 0.1 dB), Q within 0.1..12 and slope within 0.1..4. Each box
/// is widened to contain 0.5..2 so that extreme references still start
/// inside it. A reference with 0 dB gain leaves `gain_scale` out.
pub fn free_parameters(expected: &FilterKind) -> Vec<FreeParameter> {
    let freq = FreeParameter::new(CorrectionParam::FreqScale, 0.25, 4.0);
    let gain = |gain_db: f64, upper: f64| {
        let g = gain_db.abs();
        (g > 0.0).then(|| {
            FreeParameter::new(CorrectionParam::GainScale, (0.25 * g).max(0.1) / g, upper)
        })
    };
    let q = |q: f64| FreeParameter::new(CorrectionParam::QScale, 0.1 / q, 12.0 / q);

    match *expected {
        FilterKind::Peq { q: q_ref, gain_db, .. } => {
            let mut params = vec![freq];
            params.extend(gain(gain_db, 4.0));
            params.push(q(q_ref));
            params
        }
        FilterKind::Shelf { gain_db, width, .. } => {
            let mut params = vec![freq];
            params.extend(gain(gain_db, 6.0));
            params.push(match width {
                ShelfWidth::Slope(s) => {
                    FreeParameter::new(CorrectionParam::SlopeScale, 0.1 / s, 4.0 / s)
                }
                ShelfWidth::Q(q_ref) => q(q_ref),
            });
            params
        }
        FilterKind::Phase { q: q_ref, .. } => vec![freq, q(q_ref)],
        FilterKind::Butterworth { .. } | FilterKind::LinkwitzRiley { .. } => vec![freq],
        FilterKind::Gain { .. } | FilterKind::Delay { .. } => Vec::new(),
    }
}

/// Outcome of a successful fit.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    /// Family that was fitted.
    pub family: FilterFamily,
    /// Fitted correction values, rounded to six decimals.
    pub fitted: BTreeMap<CorrectionParam, f64>,
    /// Final RMS residual.
    pub residual: f64,
    /// Iterations spent.
    pub iterations: usize,
    /// RMS residual at the start and after every accepted step.
    pub trace: Vec<f64>,
    /// Why the solver stopped.
    pub termination: Termination,
}

impl CalibrationResult {
    /// Fitted value of one parameter.
    pub fn parameter(&self, param: CorrectionParam) -> Option<f64> {
        self.fitted.get(&param).copied()
    }

    /// Merges the fitted values into `profile`, overwriting by name.
    pub fn apply_to(&self, profile: &mut ManufacturerProfile) {
        profile.merge_fitted(self.family, self.fitted.iter().map(|(&p, &v)| (p, v)));
    }

    /// The fitted values as a standalone correction.
    pub fn to_correction(&self) -> FamilyCorrection {
        self.fitted
            .iter()
            .fold(FamilyCorrection::new(), |c, (&p, &v)| c.with(p, v))
    }
}

/// One measured sweep together with the filter it was measured with.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSweep {
    /// Family to fit.
    pub family: FilterFamily,
    /// Measured response.
    pub measurement: Measurement,
    /// Canonical spec the device was running.
    pub expected: FilterSpec,
}

impl CalibrationSweep {
    /// Pairs a measurement with an explicit expected spec.
    pub fn new(family: FilterFamily, measurement: Measurement, expected: FilterSpec) -> Self {
        Self {
            family,
            measurement,
            expected,
        }
    }

    /// Pairs a measurement with the reference spec for `family`.
    pub fn with_reference(
        family: FilterFamily,
        measurement: Measurement,
        reference: &ReferenceSettings,
    ) -> Result<Self> {
        Ok(Self::new(family, measurement, reference.spec_for(family)?))
    }
}

/// Fits manufacturer corrections with bounded Levenberg-Marquardt.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationSolver {
    settings: CalibrationSettings,
}

impl CalibrationSolver {
    /// Creates a solver with the given settings.
    pub fn new(settings: CalibrationSettings) -> Self {
        Self { settings }
    }

    /// Active settings.
    pub fn settings(&self) -> &CalibrationSettings {
        &self.settings
    }

    /// Fits the corrections of `family` so that `expected` reproduces `sweep`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidFilterSpec`] when `expected` is disabled or
    ///   belongs to another family
    /// - [`EngineError::InsufficientSweepData`] when the sweep has fewer
    ///   samples than free parameters + 1
    /// - [`EngineError::OutOfBandFrequency`] when a sweep frequency reaches
    ///   Nyquist
    /// - [`EngineError::CalibrationDivergence`] when the final RMS residual
    ///   exceeds the tolerance
    pub fn fit(
        &self,
        family: FilterFamily,
        sweep: &Measurement,
        expected: &FilterSpec,
        sample_rate: f64,
    ) -> Result<CalibrationResult> {
        self.fit_with_base(family, sweep, expected, sample_rate, None)
    }

    /// Like [`CalibrationSolver::fit`], with every trial built on top of
    /// `base`.
    ///
    /// Offsets and clamps in `base` stay fixed while the scales are fitted,
    /// so merging the result back into the profile that owns `base`
    /// reproduces the fitted response. `base.enabled` is ignored.
    pub fn fit_with_base(
        &self,
        family: FilterFamily,
        sweep: &Measurement,
        expected: &FilterSpec,
        sample_rate: f64,
        base: Option<&FamilyCorrection>,
    ) -> Result<CalibrationResult> {
        validate_expected(family, expected)?;
        let free = free_parameters(expected.kind());
        let required = free.len() + 1;
        if sweep.len() < required {
            return Err(EngineError::InsufficientSweepData {
                samples: sweep.len(),
                required,
            });
        }
        check_grid(sweep.frequencies(), sample_rate)?;

        let target = Target::new(family, sweep, expected, sample_rate);
        let seed = FamilyCorrection {
            enabled: None,
            ..base.cloned().unwrap_or_default()
        };
        let residuals = |scales: &[f64]| -> Result<Vec<f64>> {
            let correction = free
                .iter()
                .zip(scales)
                .fold(seed.clone(), |c, (fp, &v)| c.with(fp.param, v));
            target.residuals(&correction)
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "calibrate: fitting {family} with {} free parameters on {} samples",
            free.len(),
            sweep.len()
        );

        let initial = vec![1.0; free.len()];
        let bounds: Vec<(f64, f64)> = free.iter().map(|fp| (fp.lower, fp.upper)).collect();
        let solver_settings = SolverSettings {
            max_iterations: self.settings.max_iterations,
            ..SolverSettings::default()
        };
        let fit = levenberg_marquardt(residuals, &initial, &bounds, &solver_settings)?;

        if !(fit.rms <= self.settings.tolerance) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "calibrate: {family} diverged, rms {:.6} after {} iterations ({:?})",
                fit.rms,
                fit.iterations,
                fit.termination
            );
            return Err(EngineError::CalibrationDivergence {
                family,
                residual: fit.rms,
                tolerance: self.settings.tolerance,
                iterations: fit.iterations,
                trace: fit.trace,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "calibrate: {family} converged, rms {:.6} after {} iterations",
            fit.rms,
            fit.iterations
        );

        let fitted = free
            .iter()
            .zip(&fit.params)
            .map(|(fp, &v)| (fp.param, round6(v)))
            .collect();
        Ok(CalibrationResult {
            family,
            fitted,
            residual: fit.rms,
            iterations: fit.iterations,
            trace: fit.trace,
            termination: fit.termination,
        })
    }

    /// Fits one prepared sweep.
    pub fn fit_sweep(&self, sweep: &CalibrationSweep, sample_rate: f64) -> Result<CalibrationResult> {
        self.fit(sweep.family, &sweep.measurement, &sweep.expected, sample_rate)
    }

    /// RMS of the weighted residual between `sweep` and `expected` designed
    /// under `correction`.
    ///
    /// This is the quantity [`CalibrationSolver::fit`] minimizes and checks
    /// against the tolerance.
    pub fn residual_rms(
        &self,
        family: FilterFamily,
        sweep: &Measurement,
        expected: &FilterSpec,
        sample_rate: f64,
        correction: Option<&FamilyCorrection>,
    ) -> Result<f64> {
        validate_expected(family, expected)?;
        check_grid(sweep.frequencies(), sample_rate)?;
        let target = Target::new(family, sweep, expected, sample_rate);
        let identity = FamilyCorrection::new();
        Ok(rms(&target.residuals(correction.unwrap_or(&identity))?))
    }

    /// Fits every sweep independently and merges each success into `profile`.
    ///
    /// Each fit starts from the profile's existing correction for the family,
    /// so offsets and clamps already in the profile are fitted around rather
    /// than ignored. A failed family leaves its existing corrections
    /// untouched and does not affect the others. Results are returned in
    /// sweep order.
    pub fn calibrate(
        &self,
        profile: &mut ManufacturerProfile,
        sweeps: &[CalibrationSweep],
        sample_rate: f64,
    ) -> Vec<(FilterFamily, Result<CalibrationResult>)> {
        sweeps
            .iter()
            .map(|sweep| {
                let result = self.fit_with_base(
                    sweep.family,
                    &sweep.measurement,
                    &sweep.expected,
                    sample_rate,
                    profile.correction_for(sweep.family),
                );
                if let Ok(fitted) = &result {
                    fitted.apply_to(profile);
                }
                (sweep.family, result)
            })
            .collect()
    }
}

fn validate_expected(family: FilterFamily, expected: &FilterSpec) -> Result<()> {
    if expected.family() != Some(family) {
        return Err(EngineError::invalid_spec(format!(
            "expected design '{expected}' does not belong to family '{family}'"
        )));
    }
    if !expected.is_enabled() {
        return Err(EngineError::invalid_spec(
            "expected design for calibration is disabled",
        ));
    }
    Ok(())
}

/// A sweep prepared for residual evaluation.
struct Target<'a> {
    sweep: &'a Measurement,
    expected: &'a FilterSpec,
    sample_rate: f64,
    weights: ResidualWeights,
    measured_phase: Vec<f64>,
}

impl<'a> Target<'a> {
    fn new(
        family: FilterFamily,
        sweep: &'a Measurement,
        expected: &'a FilterSpec,
        sample_rate: f64,
    ) -> Self {
        Self {
            sweep,
            expected,
            sample_rate,
            weights: ResidualWeights::for_family(family),
            measured_phase: sweep.phase_deg().iter().map(|p| p.to_radians()).collect(),
        }
    }

    /// Weighted dB errors followed by weighted wrapped phase errors.
    fn residuals(&self, correction: &FamilyCorrection) -> Result<Vec<f64>> {
        let designed = design_corrected(self.expected, self.sample_rate, Some(correction))?;
        let predicted: Vec<_> = self
            .sweep
            .frequencies()
            .iter()
            .map(|&f| designed.response_at(f, self.sample_rate))
            .collect();

        let mut r = Vec::with_capacity(2 * predicted.len());
        r.extend(
            predicted
                .iter()
                .zip(self.sweep.magnitude_db())
                .map(|(h, &m)| (linear_to_db(h.norm()) - m) * self.weights.magnitude),
        );
        r.extend(
            predicted
                .iter()
                .zip(&self.measured_phase)
                .map(|(h, &p)| wrap_radians(h.arg() - p) * self.weights.phase),
        );
        Ok(r)
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::log_grid;
    use xover_core::evaluate_specs;

    const FS: f64 = 48000.0;

    fn sweep_of(spec: &FilterSpec, profile: Option<&ManufacturerProfile>) -> Measurement {
        let grid = log_grid(20.0, 20000.0, 120).unwrap();
        let response = evaluate_specs(&[*spec], &grid, FS, profile).unwrap();
        Measurement::from_response(&grid, &response).unwrap()
    }

    #[test]
    fn free_parameters_per_family() {
        let reference = ReferenceSettings::default();
        let names = |family| -> Vec<CorrectionParam> {
            free_parameters(reference.spec_for(family).unwrap().kind())
                .iter()
                .map(|fp| fp.param)
                .collect()
        };
        use CorrectionParam::*;
        assert_eq!(names(FilterFamily::Peq), vec![FreqScale, GainScale, QScale]);
        assert_eq!(names(FilterFamily::Shelf), vec![FreqScale, GainScale, SlopeScale]);
        assert_eq!(names(FilterFamily::Allpass), vec![FreqScale, QScale]);
        assert_eq!(names(FilterFamily::Butterworth), vec![FreqScale]);
        assert_eq!(names(FilterFamily::LinkwitzRiley), vec![FreqScale]);
    }

    #[test]
    fn zero_gain_reference_skips_gain_scale() {
        let spec = FilterSpec::peq(1000.0, 1.0, 0.0).unwrap();
        let params: Vec<_> = free_parameters(spec.kind()).iter().map(|fp| fp.param).collect();
        assert_eq!(params, vec![CorrectionParam::FreqScale, CorrectionParam::QScale]);
    }

    #[test]
    fn exact_sweep_is_a_fixed_point() {
        let reference = ReferenceSettings::default();
        for family in FilterFamily::ALL {
            let expected = reference.spec_for(family).unwrap();
            let sweep = sweep_of(&expected, None);
            let result = CalibrationSolver::default()
                .fit(family, &sweep, &expected, FS)
                .unwrap();
            assert!(result.residual < 1e-6, "{family}: {}", result.residual);
            for (&param, &value) in &result.fitted {
                assert_eq!(value, 1.0, "{family} {param}");
            }
        }
    }

    #[test]
    fn recovers_peq_corrections() {
        let expected = ReferenceSettings::default().spec_for(FilterFamily::Peq).unwrap();
        let device = ManufacturerProfile::new("device").with_correction(
            FilterFamily::Peq,
            FamilyCorrection {
                freq_scale: Some(1.04),
                gain_scale: Some(1.2),
                q_scale: Some(0.9),
                ..FamilyCorrection::default()
            },
        );
        let sweep = sweep_of(&expected, Some(&device));
        let result = CalibrationSolver::default()
            .fit(FilterFamily::Peq, &sweep, &expected, FS)
            .unwrap();

        let get = |p| result.parameter(p).unwrap();
        assert!((get(CorrectionParam::FreqScale) - 1.04).abs() < 1e-4);
        assert!((get(CorrectionParam::GainScale) - 1.2).abs() < 1e-4);
        assert!((get(CorrectionParam::QScale) - 0.9).abs() < 1e-4);
        assert!(result.residual < 1e-4);
    }

    #[test]
    fn mismatched_family_rejected() {
        let expected = FilterSpec::allpass(1000.0, 0.707).unwrap();
        let sweep = sweep_of(&expected, None);
        let err = CalibrationSolver::default()
            .fit(FilterFamily::Peq, &sweep, &expected, FS)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilterSpec(_)));
    }

    #[test]
    fn too_few_samples() {
        let expected = ReferenceSettings::default().spec_for(FilterFamily::Peq).unwrap();
        let sweep = Measurement::from_samples([
            (500.0, 1.0, 5.0),
            (1000.0, 3.0, 0.0),
            (2000.0, 1.0, -5.0),
        ])
        .unwrap();
        let err = CalibrationSolver::default()
            .fit(FilterFamily::Peq, &sweep, &expected, FS)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientSweepData {
                samples: 3,
                required: 4
            }
        );
    }

    #[test]
    fn unrelated_sweep_diverges() {
        let expected = ReferenceSettings::default().spec_for(FilterFamily::Peq).unwrap();
        let lowpass = FilterSpec::linkwitz_riley(4, PassBand::Lowpass(300.0)).unwrap();
        let sweep = sweep_of(&lowpass, None);
        let err = CalibrationSolver::default()
            .fit(FilterFamily::Peq, &sweep, &expected, FS)
            .unwrap_err();
        match err {
            EngineError::CalibrationDivergence {
                family,
                residual,
                tolerance,
                trace,
                ..
            } => {
                assert_eq!(family, FilterFamily::Peq);
                assert!(residual > tolerance);
                assert!(!trace.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn calibrate_keeps_failed_families_untouched() {
        let reference = ReferenceSettings::default();
        let peq = reference.spec_for(FilterFamily::Peq).unwrap();
        let allpass = reference.spec_for(FilterFamily::Allpass).unwrap();
        let previous = FamilyCorrection {
            q_scale: Some(0.5),
            enabled: Some(true),
            ..FamilyCorrection::default()
        };
        let mut profile = ManufacturerProfile::new("device")
            .with_correction(FilterFamily::Allpass, previous.clone());

        let lowpass = FilterSpec::linkwitz_riley(4, PassBand::Lowpass(300.0)).unwrap();
        let sweeps = [
            CalibrationSweep::new(FilterFamily::Peq, sweep_of(&peq, None), peq),
            // Allpass sweep that no all-pass can reproduce.
            CalibrationSweep::new(FilterFamily::Allpass, sweep_of(&lowpass, None), allpass),
        ];
        let results = CalibrationSolver::default().calibrate(&mut profile, &sweeps, FS);

        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert_eq!(profile.correction_for(FilterFamily::Allpass), Some(&previous));
        let peq_correction = profile.correction_for(FilterFamily::Peq).unwrap();
        assert_eq!(peq_correction.q_scale, Some(1.0));
    }

    #[test]
    fn boxes_always_contain_the_start() {
        let kinds = [
            FilterKind::Peq {
                f0: 1000.0,
                q: 16.0,
                gain_db: 3.0,
            },
            FilterKind::Peq {
                f0: 1000.0,
                q: 0.05,
                gain_db: 0.05,
            },
            FilterKind::Shelf {
                mode: xover_core::ShelfMode::Low,
                f0: 200.0,
                gain_db: -0.05,
                width: ShelfWidth::Slope(5.0),
            },
            FilterKind::Phase {
                f0: 1000.0,
                q: 20.0,
            },
        ];
        for kind in &kinds {
            for fp in free_parameters(kind) {
                assert!(
                    fp.lower < 1.0 && 1.0 < fp.upper,
                    "{kind:?} {}: [{}, {}]",
                    fp.param,
                    fp.lower,
                    fp.upper
                );
            }
        }
    }

    #[test]
    fn high_q_reference_is_a_fixed_point() {
        let expected = FilterSpec::peq(1000.0, 16.0, 3.0).unwrap();
        let sweep = sweep_of(&expected, None);
        let result = CalibrationSolver::default()
            .fit(FilterFamily::Peq, &sweep, &expected, FS)
            .unwrap();
        assert_eq!(result.termination, Termination::ExactFit);
        for (&param, &value) in &result.fitted {
            assert_eq!(value, 1.0, "{param}");
        }
    }

    #[test]
    fn calibrate_fits_around_existing_offsets_and_clamps() {
        let expected = ReferenceSettings::default().spec_for(FilterFamily::Peq).unwrap();
        let existing = FamilyCorrection {
            freq_offset_hz: Some(80.0),
            q_min: Some(0.7),
            ..FamilyCorrection::default()
        };
        let device = ManufacturerProfile::new("device").with_correction(
            FilterFamily::Peq,
            FamilyCorrection {
                freq_scale: Some(0.96),
                gain_scale: Some(1.1),
                q_scale: Some(1.2),
                ..existing.clone()
            },
        );
        let sweep = sweep_of(&expected, Some(&device));
        let mut profile =
            ManufacturerProfile::new("device").with_correction(FilterFamily::Peq, existing);

        let solver = CalibrationSolver::default();
        let sweeps = [CalibrationSweep::new(FilterFamily::Peq, sweep.clone(), expected)];
        let results = solver.calibrate(&mut profile, &sweeps, FS);
        let result = results[0].1.as_ref().unwrap();

        let get = |p| result.parameter(p).unwrap();
        assert!((get(CorrectionParam::FreqScale) - 0.96).abs() < 1e-4);
        assert!((get(CorrectionParam::GainScale) - 1.1).abs() < 1e-4);
        assert!((get(CorrectionParam::QScale) - 1.2).abs() < 1e-4);

        let merged = profile.correction_for(FilterFamily::Peq).unwrap();
        assert_eq!(merged.freq_offset_hz, Some(80.0));
        assert_eq!(merged.q_min, Some(0.7));
        let rms = solver
            .residual_rms(FilterFamily::Peq, &sweep, &expected, FS, Some(merged))
            .unwrap();
        assert!(rms < 1e-3, "{rms}");
    }

    #[test]
    fn merged_profile_matches_reported_residual() {
        // The profile clamps Q above what the device runs, so the fit
        // cannot be exact; the merged profile must still score what the
        // fit reported.
        let expected = ReferenceSettings::default().spec_for(FilterFamily::Peq).unwrap();
        let device = ManufacturerProfile::new("device").with_correction(
            FilterFamily::Peq,
            FamilyCorrection {
                freq_scale: Some(1.04),
                q_scale: Some(0.9),
                ..FamilyCorrection::default()
            },
        );
        let sweep = sweep_of(&expected, Some(&device));
        let mut profile = ManufacturerProfile::new("device").with_correction(
            FilterFamily::Peq,
            FamilyCorrection {
                freq_offset_hz: Some(80.0),
                q_min: Some(0.7),
                ..FamilyCorrection::default()
            },
        );

        let solver = CalibrationSolver::new(CalibrationSettings {
            tolerance: 1.0,
            ..CalibrationSettings::default()
        });
        let sweeps = [CalibrationSweep::new(FilterFamily::Peq, sweep.clone(), expected)];
        let results = solver.calibrate(&mut profile, &sweeps, FS);
        let result = results[0].1.as_ref().unwrap();

        let merged = profile.correction_for(FilterFamily::Peq);
        let rms = solver
            .residual_rms(FilterFamily::Peq, &sweep, &expected, FS, merged)
            .unwrap();
        assert!(
            (rms - result.residual).abs() < 1e-4,
            "merged {rms}, fitted {}",
            result.residual
        );
    }

    #[test]
    fn residual_rms_scores_corrections() {
        let expected = ReferenceSettings::default().spec_for(FilterFamily::Shelf).unwrap();
        let sweep = sweep_of(&expected, None);
        let solver = CalibrationSolver::default();
        let exact = solver
            .residual_rms(FilterFamily::Shelf, &sweep, &expected, FS, None)
            .unwrap();
        assert!(exact < 1e-9);
        let off = FamilyCorrection::new().with(CorrectionParam::GainScale, 2.0);
        let rms = solver
            .residual_rms(FilterFamily::Shelf, &sweep, &expected, FS, Some(&off))
            .unwrap();
        assert!(rms > 0.5, "{rms}");
        assert!(
            solver
                .residual_rms(FilterFamily::Peq, &sweep, &expected, FS, None)
                .is_err()
        );
    }

    #[test]
    fn settings_from_toml_fill_defaults() {
        let settings: CalibrationSettings = toml::from_str("tolerance = 0.1").unwrap();
        assert_eq!(settings.tolerance, 0.1);
        assert_eq!(settings.max_iterations, 200);
        let reference: ReferenceSettings = toml::from_str("frequency_hz = 500.0").unwrap();
        assert_eq!(reference.frequency_hz, 500.0);
        assert_eq!(reference.q, 0.707);
    }
}
