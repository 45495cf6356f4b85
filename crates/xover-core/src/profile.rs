//! Manufacturer profiles: per-family corrections applied before design.
//!
//! Hardware DSPs rarely implement the cookbook formulas verbatim. A
//! [`ManufacturerProfile`] captures how one vendor deviates, as a set of
//! named optional fields per filter family ([`FamilyCorrection`]).
//!
//! # Merge precedence
//!
//! Corrections are applied to the block's own parameters in a fixed order:
//!
//! 1. Scale factors multiply (`freq_scale`, `gain_scale`, `q_scale`, `slope_scale`)
//! 2. Offsets add (`freq_offset_hz`, `gain_offset_db`)
//! 3. Clamps override (`gain_limit_db`, `q_min`/`q_max`, `slope_min`/`slope_max`)
//!
//! A family with `enabled = false` suppresses every block of that family;
//! the designer emits an identity response for it.
//!
//! Delay blocks have no family. They read `delay_offset_us` from the
//! profile's `delay` entry, which is added to the block's delay.
//!
//! # TOML Format
//!
//! ```toml
//! name = "minidsp"
//! description = "Fitted from bench sweeps"
//!
//! [filters.peq]
//! q_scale = 1.08
//! gain_limit_db = 12.0
//!
//! [filters.allpass]
//! enabled = false
//!
//! [filters.delay]
//! delay_offset_us = 12.5
//! ```
//!
//! Unknown family keys and unknown correction keys are ignored.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Name of the built-in profile that applies no corrections.
pub const GENERIC_PROFILE_NAME: &str = "generic";

/// Filter families a profile can correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterFamily {
    /// Parametric peaking EQ.
    Peq,
    /// Low and high shelves.
    Shelf,
    /// Second-order all-pass (`phase` blocks).
    Allpass,
    /// Butterworth crossover sections.
    Butterworth,
    /// Linkwitz-Riley crossover sections.
    LinkwitzRiley,
}

impl FilterFamily {
    /// All families, in canonical order.
    pub const ALL: [FilterFamily; 5] = [
        FilterFamily::Peq,
        FilterFamily::Shelf,
        FilterFamily::Allpass,
        FilterFamily::Butterworth,
        FilterFamily::LinkwitzRiley,
    ];

    /// Canonical lowercase key used in profile files.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterFamily::Peq => "peq",
            FilterFamily::Shelf => "shelf",
            FilterFamily::Allpass => "allpass",
            FilterFamily::Butterworth => "butterworth",
            FilterFamily::LinkwitzRiley => "linkwitz_riley",
        }
    }

    /// Parse a family key, accepting the aliases used by filter types.
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "peq" | "peaking" => Some(FilterFamily::Peq),
            "shelf" | "shelving" => Some(FilterFamily::Shelf),
            "allpass" | "phase" => Some(FilterFamily::Allpass),
            "butterworth" => Some(FilterFamily::Butterworth),
            "linkwitz_riley" | "linkwitz-riley" | "lr" => Some(FilterFamily::LinkwitzRiley),
            _ => None,
        }
    }

    /// True for the crossover families (Butterworth, Linkwitz-Riley).
    pub fn is_crossover(&self) -> bool {
        matches!(self, FilterFamily::Butterworth | FilterFamily::LinkwitzRiley)
    }
}

impl fmt::Display for FilterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correction parameters a calibration run can fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionParam {
    /// Multiplier on center/cutoff frequencies.
    FreqScale,
    /// Multiplier on gain in dB.
    GainScale,
    /// Multiplier on Q.
    QScale,
    /// Multiplier on shelf slope.
    SlopeScale,
}

impl CorrectionParam {
    /// Field name in profile files.
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionParam::FreqScale => "freq_scale",
            CorrectionParam::GainScale => "gain_scale",
            CorrectionParam::QScale => "q_scale",
            CorrectionParam::SlopeScale => "slope_scale",
        }
    }
}

impl fmt::Display for CorrectionParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corrections for one filter family. Every field is optional; a missing
/// field leaves the block's value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyCorrection {
    /// `Some(false)` suppresses the family entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Symmetric clamp on the final gain in dB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_limit_db: Option<f64>,
    /// Lower clamp on the final Q.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_min: Option<f64>,
    /// Upper clamp on the final Q.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_max: Option<f64>,
    /// Lower clamp on the final shelf slope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope_min: Option<f64>,
    /// Upper clamp on the final shelf slope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope_max: Option<f64>,
    /// Multiplier on Q.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_scale: Option<f64>,
    /// Multiplier on shelf slope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope_scale: Option<f64>,
    /// Multiplier on frequencies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq_scale: Option<f64>,
    /// Offset added to frequencies after scaling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq_offset_hz: Option<f64>,
    /// Multiplier on gain in dB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_scale: Option<f64>,
    /// Offset added to gain after scaling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_offset_db: Option<f64>,
    /// Offset added to delay blocks, in microseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_offset_us: Option<f64>,
}

impl FamilyCorrection {
    /// Creates an empty correction (no changes).
    pub fn new() -> Self {
        Self::default()
    }

    /// A correction that disables the family.
    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
            ..Self::default()
        }
    }

    /// Whether blocks of this family are designed at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies `freq_scale` then `freq_offset_hz`.
    pub fn correct_frequency(&self, frequency: f64) -> f64 {
        frequency * self.freq_scale.unwrap_or(1.0) + self.freq_offset_hz.unwrap_or(0.0)
    }

    /// Applies `gain_scale`, `gain_offset_db`, then the `gain_limit_db` clamp.
    pub fn correct_gain(&self, gain_db: f64) -> f64 {
        let gain = gain_db * self.gain_scale.unwrap_or(1.0) + self.gain_offset_db.unwrap_or(0.0);
        match self.gain_limit_db {
            Some(limit) => {
                let limit = limit.abs();
                clamp_optional(gain, Some(-limit), Some(limit))
            }
            None => gain,
        }
    }

    /// Applies `q_scale` then the `q_min`/`q_max` clamps.
    pub fn correct_q(&self, q: f64) -> f64 {
        clamp_optional(q * self.q_scale.unwrap_or(1.0), self.q_min, self.q_max)
    }

    /// Applies `slope_scale` then the `slope_min`/`slope_max` clamps.
    pub fn correct_slope(&self, slope: f64) -> f64 {
        clamp_optional(
            slope * self.slope_scale.unwrap_or(1.0),
            self.slope_min,
            self.slope_max,
        )
    }

    /// Applies `delay_offset_us`.
    pub fn correct_delay(&self, delay_us: f64) -> f64 {
        delay_us + self.delay_offset_us.unwrap_or(0.0)
    }

    /// Reads a fittable parameter.
    pub fn get(&self, param: CorrectionParam) -> Option<f64> {
        match param {
            CorrectionParam::FreqScale => self.freq_scale,
            CorrectionParam::GainScale => self.gain_scale,
            CorrectionParam::QScale => self.q_scale,
            CorrectionParam::SlopeScale => self.slope_scale,
        }
    }

    /// Overwrites a fittable parameter.
    pub fn set(&mut self, param: CorrectionParam, value: f64) {
        let slot = match param {
            CorrectionParam::FreqScale => &mut self.freq_scale,
            CorrectionParam::GainScale => &mut self.gain_scale,
            CorrectionParam::QScale => &mut self.q_scale,
            CorrectionParam::SlopeScale => &mut self.slope_scale,
        };
        *slot = Some(value);
    }

    /// Builder form of [`FamilyCorrection::set`].
    pub fn with(mut self, param: CorrectionParam, value: f64) -> Self {
        self.set(param, value);
        self
    }
}

// Lower bound first, so an inverted range resolves to the upper bound.
fn clamp_optional(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let mut value = value;
    if let Some(min) = min {
        value = value.max(min);
    }
    if let Some(max) = max {
        value = value.min(max);
    }
    value
}

/// Per-family correction table of a profile.
///
/// One named optional slot per known family; unknown keys in a profile file
/// are skipped by serde.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyCorrections {
    /// Parametric EQ corrections.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "peaking")]
    pub peq: Option<FamilyCorrection>,
    /// Shelf corrections.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "shelving")]
    pub shelf: Option<FamilyCorrection>,
    /// All-pass corrections.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "phase")]
    pub allpass: Option<FamilyCorrection>,
    /// Butterworth corrections (frequency terms and `enabled` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub butterworth: Option<FamilyCorrection>,
    /// Linkwitz-Riley corrections (frequency terms and `enabled` only).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "linkwitz-riley",
        alias = "lr"
    )]
    pub linkwitz_riley: Option<FamilyCorrection>,
    /// Delay block corrections (`delay_offset_us` and `enabled` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<FamilyCorrection>,
}

impl FamilyCorrections {
    fn slot(&self, family: FilterFamily) -> &Option<FamilyCorrection> {
        match family {
            FilterFamily::Peq => &self.peq,
            FilterFamily::Shelf => &self.shelf,
            FilterFamily::Allpass => &self.allpass,
            FilterFamily::Butterworth => &self.butterworth,
            FilterFamily::LinkwitzRiley => &self.linkwitz_riley,
        }
    }

    fn slot_mut(&mut self, family: FilterFamily) -> &mut Option<FamilyCorrection> {
        match family {
            FilterFamily::Peq => &mut self.peq,
            FilterFamily::Shelf => &mut self.shelf,
            FilterFamily::Allpass => &mut self.allpass,
            FilterFamily::Butterworth => &mut self.butterworth,
            FilterFamily::LinkwitzRiley => &mut self.linkwitz_riley,
        }
    }

    /// Correction for `family`, if any.
    pub fn get(&self, family: FilterFamily) -> Option<&FamilyCorrection> {
        self.slot(family).as_ref()
    }

    /// Replaces the correction for `family`.
    pub fn set(&mut self, family: FilterFamily, correction: FamilyCorrection) {
        *self.slot_mut(family) = Some(correction);
    }

    /// Removes and returns the correction for `family`.
    pub fn remove(&mut self, family: FilterFamily) -> Option<FamilyCorrection> {
        self.slot_mut(family).take()
    }

    /// Iterates over the families that carry a correction.
    pub fn iter(&self) -> impl Iterator<Item = (FilterFamily, &FamilyCorrection)> {
        FilterFamily::ALL
            .into_iter()
            .filter_map(|family| self.get(family).map(|c| (family, c)))
    }
}

/// A named bundle of per-family corrections.
///
/// Profiles are passed explicitly into every design call; there is no
/// global registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturerProfile {
    /// Profile name.
    pub name: String,

    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Corrections keyed by family.
    #[serde(default)]
    pub filters: FamilyCorrections,
}

impl ManufacturerProfile {
    /// Creates a profile without corrections.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            filters: FamilyCorrections::default(),
        }
    }

    /// The built-in profile: plain cookbook formulas.
    pub fn generic() -> Self {
        Self::new(GENERIC_PROFILE_NAME).with_description("Default RBJ cookbook biquad formulas")
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the correction for one family.
    pub fn with_correction(mut self, family: FilterFamily, correction: FamilyCorrection) -> Self {
        self.filters.set(family, correction);
        self
    }

    /// Correction for `family`, if the profile defines one.
    pub fn correction_for(&self, family: FilterFamily) -> Option<&FamilyCorrection> {
        self.filters.get(family)
    }

    /// Correction applied to delay blocks, if the profile defines one.
    pub fn delay_correction(&self) -> Option<&FamilyCorrection> {
        self.filters.delay.as_ref()
    }

    /// False only when the profile explicitly disables `family`.
    pub fn is_family_enabled(&self, family: FilterFamily) -> bool {
        self.correction_for(family)
            .is_none_or(FamilyCorrection::is_enabled)
    }

    /// Writes fitted parameter values into `family`, overwriting by name.
    ///
    /// Fields not named in `fitted` keep their previous values. The updated
    /// correction is built aside and swapped in as one assignment.
    pub fn merge_fitted(
        &mut self,
        family: FilterFamily,
        fitted: impl IntoIterator<Item = (CorrectionParam, f64)>,
    ) {
        let mut updated = self.correction_for(family).cloned().unwrap_or_default();
        for (param, value) in fitted {
            updated.set(param, value);
        }
        self.filters.set(family, updated);
    }
}

impl Default for ManufacturerProfile {
    fn default() -> Self {
        Self::generic()
    }
}
