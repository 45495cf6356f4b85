//! Engine configuration file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use xover_analysis::{CalibrationSettings, CalibrationSolver, ReferenceSettings, log_grid};
use xover_core::ManufacturerProfile;

use crate::error::ConfigError;
use crate::paths::ensure_parent;
use crate::profiles::ProfileLibrary;

/// Calibration section of the engine config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Solver tolerance and iteration budget.
    #[serde(flatten)]
    pub solver: CalibrationSettings,
    /// Canonical filters the sweeps are measured with.
    pub reference: ReferenceSettings,
}

/// Engine-wide settings.
///
/// # TOML Format
///
/// ```toml
/// sample_rate = 192000.0
/// grid_points = 2000
/// grid_min_hz = 20.0
/// grid_max_hz = 20000.0
/// manufacturer = "minidsp"
///
/// [calibration]
/// tolerance = 0.25
/// max_iterations = 200
///
/// [calibration.reference]
/// frequency_hz = 1000.0
/// gain_db = 3.0
/// q = 0.707
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Design and evaluation sample rate in Hz.
    pub sample_rate: f64,
    /// Number of points on the shared log grid.
    pub grid_points: usize,
    /// Lowest grid frequency in Hz.
    pub grid_min_hz: f64,
    /// Highest grid frequency in Hz.
    pub grid_max_hz: f64,
    /// Name of the manufacturer profile to design with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    /// Calibration solver settings.
    pub calibration: CalibrationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 192_000.0,
            grid_points: xover_analysis::DEFAULT_GRID_POINTS,
            grid_min_hz: 20.0,
            grid_max_hz: 20_000.0,
            manufacturer: None,
            calibration: CalibrationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::invalid(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.grid_points < 2 {
            return Err(ConfigError::invalid(format!(
                "grid_points must be at least 2, got {}",
                self.grid_points
            )));
        }
        if !(self.grid_min_hz > 0.0 && self.grid_max_hz > self.grid_min_hz) {
            return Err(ConfigError::invalid(format!(
                "grid range [{}, {}] must satisfy 0 < min < max",
                self.grid_min_hz, self.grid_max_hz
            )));
        }
        if self.grid_max_hz >= self.sample_rate / 2.0 {
            return Err(ConfigError::invalid(format!(
                "grid_max_hz {} must be below Nyquist ({})",
                self.grid_max_hz,
                self.sample_rate / 2.0
            )));
        }
        if !(self.calibration.solver.tolerance > 0.0) {
            return Err(ConfigError::invalid("calibration tolerance must be positive"));
        }
        Ok(())
    }

    /// The shared evaluation grid.
    pub fn grid(&self) -> Result<Vec<f64>, ConfigError> {
        Ok(log_grid(self.grid_min_hz, self.grid_max_hz, self.grid_points)?)
    }

    /// The configured profile, or `generic` if it is not in `library`.
    pub fn profile(&self, library: &ProfileLibrary) -> ManufacturerProfile {
        library.resolve(self.manufacturer.as_deref())
    }

    /// A calibration solver with the configured settings.
    pub fn solver(&self) -> CalibrationSolver {
        CalibrationSolver::new(self.calibration.solver)
    }

    /// Load and validate a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Loads `path`, or returns defaults if the file is missing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate a config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
