//! Way composition and summation.
//!
//! A [`Way`] is one driver of a multi-way speaker: its measured response,
//! a level trim and its filter chain. [`compose`] resamples the measurement
//! onto a shared grid and multiplies in the designed filters; [`sum`] adds
//! way responses into the acoustic sum.

use num_complex::Complex64;
use xover_core::{
    EngineError, FilterSpec, ManufacturerProfile, Result, db_to_linear, evaluate_specs,
    magnitude_db, phase_deg, unwrapped_phase_deg,
};

use crate::measurement::Measurement;

/// One driver with its filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    /// Display name.
    pub name: String,
    /// Raw measured response of the driver.
    pub measurement: Measurement,
    /// Plot color, carried opaquely.
    pub color: Option<String>,
    /// Level trim in dB.
    pub gain_db: f64,
    /// Filter chain, applied in order.
    pub filters: Vec<FilterSpec>,
}

impl Way {
    /// Creates a way with no filters and no trim.
    pub fn new(name: impl Into<String>, measurement: Measurement) -> Self {
        Self {
            name: name.into(),
            measurement,
            color: None,
            gain_db: 0.0,
            filters: Vec::new(),
        }
    }

    /// Sets the level trim.
    pub fn with_gain_db(mut self, gain_db: f64) -> Self {
        self.gain_db = gain_db;
        self
    }

    /// Sets the plot color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Appends one filter block.
    pub fn with_filter(mut self, spec: FilterSpec) -> Self {
        self.filters.push(spec);
        self
    }

    /// Appends several filter blocks.
    pub fn with_filters(mut self, specs: impl IntoIterator<Item = FilterSpec>) -> Self {
        self.filters.extend(specs);
        self
    }
}

/// Complex response on a frequency grid.
#[derive(Debug, Clone, PartialEq)]
pub struct WayResponse {
    name: String,
    frequencies: Vec<f64>,
    response: Vec<Complex64>,
}

impl WayResponse {
    /// Pairs a grid with its response values.
    pub fn new(
        name: impl Into<String>,
        frequencies: Vec<f64>,
        response: Vec<Complex64>,
    ) -> Result<Self> {
        if frequencies.len() != response.len() {
            return Err(EngineError::grid_mismatch(format!(
                "{} frequencies but {} response values",
                frequencies.len(),
                response.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            frequencies,
            response,
        })
    }

    /// Name of the way, or `"sum"` for summed responses.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grid frequencies in Hz.
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Complex response values.
    pub fn response(&self) -> &[Complex64] {
        &self.response
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// True for an empty grid.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Magnitude in dB.
    pub fn magnitude_db(&self) -> Vec<f64> {
        magnitude_db(&self.response)
    }

    /// Wrapped phase in degrees.
    pub fn phase_deg(&self) -> Vec<f64> {
        phase_deg(&self.response)
    }

    /// Unwrapped phase in degrees.
    pub fn unwrapped_phase_deg(&self) -> Vec<f64> {
        unwrapped_phase_deg(&self.response)
    }

    /// Converts to a measurement, e.g. to feed a summed response back in.
    pub fn to_measurement(&self) -> Result<Measurement> {
        Measurement::from_response(&self.frequencies, &self.response)
    }
}

/// Response of one way on `frequencies`.
///
/// # Errors
///
/// - [`EngineError::GridOutOfRange`] if the grid leaves the measured range
/// - [`EngineError::InvalidFilterSpec`] if a filter cannot be designed
/// - [`EngineError::OutOfBandFrequency`] if the grid reaches Nyquist
pub fn compose(
    way: &Way,
    frequencies: &[f64],
    sample_rate: f64,
    profile: Option<&ManufacturerProfile>,
) -> Result<WayResponse> {
    let measured = way.measurement.complex_on(frequencies)?;
    let filters = evaluate_specs(&way.filters, frequencies, sample_rate, profile)?;
    let trim = db_to_linear(way.gain_db);
    let response = measured
        .iter()
        .zip(&filters)
        .map(|(m, h)| m * h * trim)
        .collect();
    WayResponse::new(way.name.clone(), frequencies.to_vec(), response)
}

/// Composes every way independently; one failure does not affect the rest.
pub fn compose_all(
    ways: &[Way],
    frequencies: &[f64],
    sample_rate: f64,
    profile: Option<&ManufacturerProfile>,
) -> Vec<Result<WayResponse>> {
    ways.iter()
        .map(|way| compose(way, frequencies, sample_rate, profile))
        .collect()
}

/// Elementwise sum of responses that share one grid.
///
/// # Errors
///
/// [`EngineError::GridMismatch`] for an empty input or when any grid
/// differs from the first in length or values.
pub fn sum(responses: &[WayResponse]) -> Result<WayResponse> {
    let Some((first, rest)) = responses.split_first() else {
        return Err(EngineError::grid_mismatch("nothing to sum"));
    };
    let mut total = first.response.clone();
    for other in rest {
        if other.frequencies != first.frequencies {
            return Err(EngineError::grid_mismatch(format!(
                "'{}' does not share the grid of '{}'",
                other.name, first.name
            )));
        }
        for (t, h) in total.iter_mut().zip(&other.response) {
            *t += h;
        }
    }
    WayResponse::new("sum", first.frequencies.clone(), total)
}

/// Composes and sums all ways; the first failing way aborts the sum.
pub fn sum_ways(
    ways: &[Way],
    frequencies: &[f64],
    sample_rate: f64,
    profile: Option<&ManufacturerProfile>,
) -> Result<WayResponse> {
    let responses = compose_all(ways, frequencies, sample_rate, profile)
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    sum(&responses)
}
