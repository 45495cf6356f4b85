//! Filter block specifications.
//!
//! A [`FilterSpec`] is one block of a way's filter chain: a closed
//! [`FilterKind`] carrying only the parameters that kind needs, plus an
//! `enabled` flag. Specs are validated when they are built, whether through
//! the constructors or through serde, so a `FilterSpec` value is always
//! well-formed. The Nyquist limit depends on the sample rate and is checked
//! separately by [`FilterKind::check_nyquist`] at design time.
//!
//! # Serialized Form
//!
//! ```toml
//! [[filters]]
//! type = "linkwitz_riley"   # or "lr", "linkwitz-riley"
//! mode = "highpass"
//! order = 4
//! freq = 350.0
//!
//! [[filters]]
//! type = "peq"              # or "peaking"
//! f0 = 1000.0
//! q = 0.707
//! gain_db = 3.0
//!
//! [[filters]]
//! type = "delay"
//! delay_us = 120.0
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::profile::FilterFamily;

/// Default Butterworth order when none is given.
pub const DEFAULT_BUTTERWORTH_ORDER: usize = 2;
/// Default Linkwitz-Riley order when none is given.
pub const DEFAULT_LINKWITZ_RILEY_ORDER: usize = 4;
/// Highest crossover order accepted.
pub const MAX_CROSSOVER_ORDER: usize = 48;
/// Default PEQ Q.
pub const DEFAULT_PEQ_Q: f64 = 1.0;
/// Default all-pass Q.
pub const DEFAULT_ALLPASS_Q: f64 = 0.707;
/// Default cookbook shelf slope.
pub const DEFAULT_SHELF_SLOPE: f64 = 1.0;

/// Response shape of a crossover section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassBand {
    /// Passes below the cutoff.
    Lowpass(f64),
    /// Passes above the cutoff.
    Highpass(f64),
    /// Passes between the two edges.
    Bandpass {
        /// Lower edge in Hz.
        low: f64,
        /// Upper edge in Hz.
        high: f64,
    },
    /// Rejects between the two edges.
    Bandstop {
        /// Lower edge in Hz.
        low: f64,
        /// Upper edge in Hz.
        high: f64,
    },
}

impl PassBand {
    /// Mode name as used in the serialized form.
    pub fn mode_name(&self) -> &'static str {
        match self {
            PassBand::Lowpass(_) => "lowpass",
            PassBand::Highpass(_) => "highpass",
            PassBand::Bandpass { .. } => "bandpass",
            PassBand::Bandstop { .. } => "bandstop",
        }
    }

    /// True for lowpass and highpass.
    pub fn is_single_edge(&self) -> bool {
        matches!(self, PassBand::Lowpass(_) | PassBand::Highpass(_))
    }

    /// Highest edge frequency.
    pub fn max_frequency(&self) -> f64 {
        match *self {
            PassBand::Lowpass(f) | PassBand::Highpass(f) => f,
            PassBand::Bandpass { high, .. } | PassBand::Bandstop { high, .. } => high,
        }
    }

    /// Applies `f` to every edge frequency.
    pub fn map_frequencies(self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            PassBand::Lowpass(cutoff) => PassBand::Lowpass(f(cutoff)),
            PassBand::Highpass(cutoff) => PassBand::Highpass(f(cutoff)),
            PassBand::Bandpass { low, high } => PassBand::Bandpass {
                low: f(low),
                high: f(high),
            },
            PassBand::Bandstop { low, high } => PassBand::Bandstop {
                low: f(low),
                high: f(high),
            },
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            PassBand::Lowpass(f) | PassBand::Highpass(f) => require_positive("freq", f),
            PassBand::Bandpass { low, high } | PassBand::Bandstop { low, high } => {
                require_positive("band low edge", low)?;
                require_positive("band high edge", high)?;
                if low >= high {
                    return Err(EngineError::invalid_spec(format!(
                        "band edges must satisfy low < high, got [{low}, {high}]"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Low or high shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShelfMode {
    /// Gain applies below the corner.
    #[default]
    Low,
    /// Gain applies above the corner.
    High,
}

impl ShelfMode {
    /// Mode name as used in the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShelfMode::Low => "low",
            ShelfMode::High => "high",
        }
    }
}

/// How a shelf's transition width is specified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShelfWidth {
    /// Cookbook shelf slope `S` (1.0 = steepest monotonic).
    Slope(f64),
    /// Explicit Q.
    Q(f64),
}

/// Filter type and its physical parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    /// Butterworth crossover of order `order`.
    Butterworth {
        /// Prototype order (1..=48).
        order: usize,
        /// Response shape and edge frequencies.
        band: PassBand,
    },
    /// Linkwitz-Riley crossover: two cascaded Butterworth halves.
    LinkwitzRiley {
        /// Total order; even.
        order: usize,
        /// Lowpass or highpass cutoff.
        band: PassBand,
    },
    /// Parametric peaking EQ.
    Peq {
        /// Center frequency in Hz.
        f0: f64,
        /// Quality factor.
        q: f64,
        /// Gain at the center in dB.
        gain_db: f64,
    },
    /// Low or high shelf.
    Shelf {
        /// Low or high.
        mode: ShelfMode,
        /// Corner frequency in Hz.
        f0: f64,
        /// Plateau gain in dB.
        gain_db: f64,
        /// Slope or Q.
        width: ShelfWidth,
    },
    /// Second-order all-pass.
    Phase {
        /// Frequency of the -180 degree crossing in Hz.
        f0: f64,
        /// Quality factor.
        q: f64,
    },
    /// Flat gain.
    Gain {
        /// Gain in dB.
        gain_db: f64,
    },
    /// Pure delay.
    Delay {
        /// Delay in microseconds.
        delay_us: f64,
    },
}

impl FilterKind {
    /// Type name as used in the serialized form.
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterKind::Butterworth { .. } => "butterworth",
            FilterKind::LinkwitzRiley { .. } => "linkwitz_riley",
            FilterKind::Peq { .. } => "peq",
            FilterKind::Shelf { .. } => "shelf",
            FilterKind::Phase { .. } => "phase",
            FilterKind::Gain { .. } => "gain",
            FilterKind::Delay { .. } => "delay",
        }
    }

    /// Correction family, or `None` for gain and delay blocks.
    pub fn family(&self) -> Option<FilterFamily> {
        match self {
            FilterKind::Butterworth { .. } => Some(FilterFamily::Butterworth),
            FilterKind::LinkwitzRiley { .. } => Some(FilterFamily::LinkwitzRiley),
            FilterKind::Peq { .. } => Some(FilterFamily::Peq),
            FilterKind::Shelf { .. } => Some(FilterFamily::Shelf),
            FilterKind::Phase { .. } => Some(FilterFamily::Allpass),
            FilterKind::Gain { .. } | FilterKind::Delay { .. } => None,
        }
    }

    /// Checks every parameter that does not depend on the sample rate.
    pub fn validate(&self) -> Result<()> {
        match *self {
            FilterKind::Butterworth { order, band } => {
                if order == 0 || order > MAX_CROSSOVER_ORDER {
                    return Err(EngineError::invalid_spec(format!(
                        "butterworth order must be in 1..={MAX_CROSSOVER_ORDER}, got {order}"
                    )));
                }
                band.validate()
            }
            FilterKind::LinkwitzRiley { order, band } => {
                if order < 2 || order % 2 != 0 || order > MAX_CROSSOVER_ORDER {
                    return Err(EngineError::invalid_spec(format!(
                        "linkwitz_riley order must be even and in 2..={MAX_CROSSOVER_ORDER}, got {order}"
                    )));
                }
                if !band.is_single_edge() {
                    return Err(EngineError::invalid_spec(format!(
                        "linkwitz_riley supports lowpass and highpass only, got {}",
                        band.mode_name()
                    )));
                }
                band.validate()
            }
            FilterKind::Peq { f0, q, gain_db } => {
                require_positive("f0", f0)?;
                require_positive("q", q)?;
                require_finite("gain_db", gain_db)
            }
            FilterKind::Shelf {
                f0, gain_db, width, ..
            } => {
                require_positive("f0", f0)?;
                require_finite("gain_db", gain_db)?;
                match width {
                    ShelfWidth::Slope(s) => require_positive("slope", s),
                    ShelfWidth::Q(q) => require_positive("q", q),
                }
            }
            FilterKind::Phase { f0, q } => {
                require_positive("f0", f0)?;
                require_positive("q", q)
            }
            FilterKind::Gain { gain_db } => require_finite("gain_db", gain_db),
            FilterKind::Delay { delay_us } => {
                require_finite("delay_us", delay_us)?;
                if delay_us < 0.0 {
                    return Err(EngineError::invalid_spec(format!(
                        "delay_us must be non-negative, got {delay_us}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Fails when any frequency of the block reaches the Nyquist limit.
    pub fn check_nyquist(&self, sample_rate: f64) -> Result<()> {
        require_positive("sample_rate", sample_rate)?;
        let nyquist = sample_rate / 2.0;
        let highest = match *self {
            FilterKind::Butterworth { band, .. } | FilterKind::LinkwitzRiley { band, .. } => {
                band.max_frequency()
            }
            FilterKind::Peq { f0, .. }
            | FilterKind::Shelf { f0, .. }
            | FilterKind::Phase { f0, .. } => f0,
            FilterKind::Gain { .. } | FilterKind::Delay { .. } => return Ok(()),
        };
        if highest >= nyquist {
            return Err(EngineError::invalid_spec(format!(
                "{} frequency {highest} Hz must be below Nyquist ({nyquist} Hz)",
                self.type_name()
            )));
        }
        Ok(())
    }
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid_spec(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

fn require_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid_spec(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

/// One filter block of a way's chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilterSpec", into = "RawFilterSpec")]
pub struct FilterSpec {
    kind: FilterKind,
    enabled: bool,
}

impl FilterSpec {
    /// Builds an enabled spec after validating `kind`.
    pub fn new(kind: FilterKind) -> Result<Self> {
        kind.validate()?;
        Ok(Self {
            kind,
            enabled: true,
        })
    }

    /// Butterworth crossover.
    pub fn butterworth(order: usize, band: PassBand) -> Result<Self> {
        Self::new(FilterKind::Butterworth { order, band })
    }

    /// Linkwitz-Riley crossover.
    pub fn linkwitz_riley(order: usize, band: PassBand) -> Result<Self> {
        Self::new(FilterKind::LinkwitzRiley { order, band })
    }

    /// Peaking EQ.
    pub fn peq(f0: f64, q: f64, gain_db: f64) -> Result<Self> {
        Self::new(FilterKind::Peq { f0, q, gain_db })
    }

    /// Low shelf with a cookbook slope.
    pub fn low_shelf(f0: f64, gain_db: f64, slope: f64) -> Result<Self> {
        Self::shelf(ShelfMode::Low, f0, gain_db, ShelfWidth::Slope(slope))
    }

    /// High shelf with a cookbook slope.
    pub fn high_shelf(f0: f64, gain_db: f64, slope: f64) -> Result<Self> {
        Self::shelf(ShelfMode::High, f0, gain_db, ShelfWidth::Slope(slope))
    }

    /// Shelf with an explicit width.
    pub fn shelf(mode: ShelfMode, f0: f64, gain_db: f64, width: ShelfWidth) -> Result<Self> {
        Self::new(FilterKind::Shelf {
            mode,
            f0,
            gain_db,
            width,
        })
    }

    /// Second-order all-pass.
    pub fn allpass(f0: f64, q: f64) -> Result<Self> {
        Self::new(FilterKind::Phase { f0, q })
    }

    /// Flat gain.
    pub fn gain(gain_db: f64) -> Result<Self> {
        Self::new(FilterKind::Gain { gain_db })
    }

    /// Pure delay in microseconds.
    pub fn delay(delay_us: f64) -> Result<Self> {
        Self::new(FilterKind::Delay { delay_us })
    }

    /// Returns a copy with the enabled flag set.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns a disabled copy.
    pub fn disabled(self) -> Self {
        self.with_enabled(false)
    }

    /// Filter type and parameters.
    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    /// Whether the block contributes to the response.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Correction family of the block, if any.
    pub fn family(&self) -> Option<FilterFamily> {
        self.kind.family()
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FilterKind::Butterworth { order, band } | FilterKind::LinkwitzRiley { order, band } => {
                write!(f, "{} {} order {order}", self.kind.type_name(), band.mode_name())?;
                match band {
                    PassBand::Lowpass(fc) | PassBand::Highpass(fc) => write!(f, " @ {fc} Hz")?,
                    PassBand::Bandpass { low, high } | PassBand::Bandstop { low, high } => {
                        write!(f, " @ [{low}, {high}] Hz")?;
                    }
                }
            }
            FilterKind::Peq { f0, q, gain_db } => {
                write!(f, "peq {gain_db:+} dB @ {f0} Hz, q {q}")?;
            }
            FilterKind::Shelf {
                mode, f0, gain_db, ..
            } => write!(f, "{} shelf {gain_db:+} dB @ {f0} Hz", mode.as_str())?,
            FilterKind::Phase { f0, q } => write!(f, "phase @ {f0} Hz, q {q}")?,
            FilterKind::Gain { gain_db } => write!(f, "gain {gain_db:+} dB")?,
            FilterKind::Delay { delay_us } => write!(f, "delay {delay_us} us")?,
        }
        if !self.enabled {
            f.write_str(" (disabled)")?;
        }
        Ok(())
    }
}

/// Flat record used for (de)serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawFilterSpec {
    #[serde(rename = "type")]
    filter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<usize>,
    #[serde(default, alias = "fc", skip_serializing_if = "Option::is_none")]
    freq: Option<f64>,
    #[serde(default, alias = "band", skip_serializing_if = "Option::is_none")]
    freqs: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    f0: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gain_db: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    q: Option<f64>,
    #[serde(default, alias = "s", skip_serializing_if = "Option::is_none")]
    slope: Option<f64>,
    #[serde(
        default,
        alias = "us",
        alias = "microseconds",
        skip_serializing_if = "Option::is_none"
    )]
    delay_us: Option<f64>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RawFilterSpec {
    fn center_frequency(&self) -> Result<f64> {
        self.f0.or(self.freq).ok_or_else(|| {
            EngineError::invalid_spec(format!("{} requires 'f0'", self.filter_type))
        })
    }

    fn pass_band(&self) -> Result<PassBand> {
        let mode = self
            .mode
            .as_deref()
            .unwrap_or("lowpass")
            .trim()
            .to_ascii_lowercase();
        match mode.as_str() {
            "lowpass" | "highpass" => {
                let cutoff = self.freq.or(self.f0).ok_or_else(|| {
                    EngineError::invalid_spec(format!("{} requires 'freq'", self.filter_type))
                })?;
                Ok(if mode == "lowpass" {
                    PassBand::Lowpass(cutoff)
                } else {
                    PassBand::Highpass(cutoff)
                })
            }
            "bandpass" | "bandstop" => {
                let (low, high) = match self.freqs.as_deref() {
                    Some(&[low, high]) => (low, high),
                    _ => {
                        return Err(EngineError::invalid_spec(
                            "band filters require 'freqs' = [low, high]",
                        ));
                    }
                };
                Ok(if mode == "bandpass" {
                    PassBand::Bandpass { low, high }
                } else {
                    PassBand::Bandstop { low, high }
                })
            }
            other => Err(EngineError::invalid_spec(format!(
                "unsupported crossover mode '{other}'"
            ))),
        }
    }

    fn shelf_mode(&self) -> Result<ShelfMode> {
        match self.mode.as_deref().map(|m| m.trim().to_ascii_lowercase()) {
            None => Ok(ShelfMode::Low),
            Some(mode) => match mode.as_str() {
                "low" | "lowshelf" | "low_shelf" => Ok(ShelfMode::Low),
                "high" | "highshelf" | "high_shelf" => Ok(ShelfMode::High),
                other => Err(EngineError::invalid_spec(format!(
                    "unsupported shelf mode '{other}'"
                ))),
            },
        }
    }
}

impl TryFrom<RawFilterSpec> for FilterSpec {
    type Error = EngineError;

    fn try_from(raw: RawFilterSpec) -> Result<Self> {
        let kind = match raw.filter_type.trim().to_ascii_lowercase().as_str() {
            "butterworth" => FilterKind::Butterworth {
                order: raw.order.unwrap_or(DEFAULT_BUTTERWORTH_ORDER),
                band: raw.pass_band()?,
            },
            "linkwitz_riley" | "linkwitz-riley" | "lr" => FilterKind::LinkwitzRiley {
                order: raw.order.unwrap_or(DEFAULT_LINKWITZ_RILEY_ORDER),
                band: raw.pass_band()?,
            },
            "peq" | "peaking" => FilterKind::Peq {
                f0: raw.center_frequency()?,
                q: raw.q.unwrap_or(DEFAULT_PEQ_Q),
                gain_db: raw.gain_db.unwrap_or(0.0),
            },
            "shelf" => {
                // An explicit slope wins; a bare q selects a Q-specified shelf.
                let width = match (raw.slope, raw.q) {
                    (Some(slope), _) => ShelfWidth::Slope(slope),
                    (None, Some(q)) => ShelfWidth::Q(q),
                    (None, None) => ShelfWidth::Slope(DEFAULT_SHELF_SLOPE),
                };
                FilterKind::Shelf {
                    mode: raw.shelf_mode()?,
                    f0: raw.center_frequency()?,
                    gain_db: raw.gain_db.unwrap_or(0.0),
                    width,
                }
            }
            "phase" | "allpass" => FilterKind::Phase {
                f0: raw.center_frequency()?,
                q: raw.q.unwrap_or(DEFAULT_ALLPASS_Q),
            },
            "gain" => FilterKind::Gain {
                gain_db: raw
                    .gain_db
                    .ok_or_else(|| EngineError::invalid_spec("gain requires 'gain_db'"))?,
            },
            "delay" => FilterKind::Delay {
                delay_us: raw
                    .delay_us
                    .ok_or_else(|| EngineError::invalid_spec("delay requires 'delay_us'"))?,
            },
            other => {
                return Err(EngineError::invalid_spec(format!(
                    "unknown filter type '{other}'"
                )));
            }
        };
        Ok(FilterSpec::new(kind)?.with_enabled(raw.enabled))
    }
}

impl From<FilterSpec> for RawFilterSpec {
    fn from(spec: FilterSpec) -> Self {
        let mut raw = RawFilterSpec {
            filter_type: spec.kind.type_name().to_string(),
            enabled: spec.enabled,
            ..RawFilterSpec::default()
        };
        match spec.kind {
            FilterKind::Butterworth { order, band } | FilterKind::LinkwitzRiley { order, band } => {
                raw.order = Some(order);
                raw.mode = Some(band.mode_name().to_string());
                match band {
                    PassBand::Lowpass(fc) | PassBand::Highpass(fc) => raw.freq = Some(fc),
                    PassBand::Bandpass { low, high } | PassBand::Bandstop { low, high } => {
                        raw.freqs = Some(vec![low, high]);
                    }
                }
            }
            FilterKind::Peq { f0, q, gain_db } => {
                raw.f0 = Some(f0);
                raw.q = Some(q);
                raw.gain_db = Some(gain_db);
            }
            FilterKind::Shelf {
                mode,
                f0,
                gain_db,
                width,
            } => {
                raw.mode = Some(mode.as_str().to_string());
                raw.f0 = Some(f0);
                raw.gain_db = Some(gain_db);
                match width {
                    ShelfWidth::Slope(s) => raw.slope = Some(s),
                    ShelfWidth::Q(q) => raw.q = Some(q),
                }
            }
            FilterKind::Phase { f0, q } => {
                raw.f0 = Some(f0);
                raw.q = Some(q);
            }
            FilterKind::Gain { gain_db } => raw.gain_db = Some(gain_db),
            FilterKind::Delay { delay_us } => raw.delay_us = Some(delay_us),
        }
        raw
    }
}
