//! Configuration and profile management for xover.
//!
//! # Features
//!
//! - **Profile Library**: Manufacturer profiles stored as a TOML
//!   `[[manufacturers]]` list, looked up by name with a `generic` fallback
//! - **Engine Config**: Sample rate, evaluation grid, selected manufacturer
//!   and calibration settings
//! - **Paths**: Platform-specific config directory and file locations
//!
//! # Example
//!
//! ```rust,no_run
//! use xover_config::{EngineConfig, ProfileLibrary, paths};
//!
//! let config = EngineConfig::load_or_default(paths::user_engine_config_path()).unwrap();
//! let library = ProfileLibrary::load_or_default(paths::user_profiles_path()).unwrap();
//!
//! // Missing names resolve to the generic profile.
//! let profile = config.profile(&library);
//! println!("designing with '{}' at {} Hz", profile.name, config.sample_rate);
//! ```

mod engine_config;
mod error;
mod profiles;

/// Platform-specific paths for profiles and configuration.
pub mod paths;

pub use engine_config::{CalibrationConfig, EngineConfig};
pub use error::ConfigError;
pub use paths::{ensure_user_config_dir, user_config_dir, user_engine_config_path, user_profiles_path};
pub use profiles::ProfileLibrary;
