//! Platform-specific paths for profiles and engine configuration.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/xover/` (Linux), `~/Library/Application Support/xover/` (macOS), `%APPDATA%\xover\` (Windows)
//! - **Profile library**: `<user config>/manufacturers.toml`
//! - **Engine config**: `<user config>/engine.toml`
//!
//! # Example
//!
//! ```rust,no_run
//! use xover_config::{ProfileLibrary, paths};
//!
//! let library = ProfileLibrary::load_or_default(paths::user_profiles_path()).unwrap();
//! println!("{} profiles", library.len());
//! ```

use std::path::PathBuf;

use crate::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "xover";

/// File name of the profile library.
pub const PROFILES_FILE: &str = "manufacturers.toml";

/// File name of the engine configuration.
pub const ENGINE_CONFIG_FILE: &str = "engine.toml";

/// Returns the user-specific configuration directory.
///
/// # Platform Paths
///
/// - Linux: `~/.config/xover/`
/// - macOS: `~/Library/Application Support/xover/`
/// - Windows: `%APPDATA%\xover\`
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the user's profile library.
pub fn user_profiles_path() -> PathBuf {
    user_config_dir().join(PROFILES_FILE)
}

/// Path of the user's engine configuration.
pub fn user_engine_config_path() -> PathBuf {
    user_config_dir().join(ENGINE_CONFIG_FILE)
}

/// Ensure the user config directory exists.
///
/// Creates the directory and any parent directories if they don't exist.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}

/// Creates the parent directory of `path` if it is missing.
pub(crate) fn ensure_parent(path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
    }
    Ok(())
}
