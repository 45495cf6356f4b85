//! Manufacturer profile library.

use std::path::Path;

use serde::{Deserialize, Serialize};
use xover_core::{GENERIC_PROFILE_NAME, ManufacturerProfile};

use crate::error::ConfigError;
use crate::paths::ensure_parent;

/// An ordered set of manufacturer profiles keyed by name.
///
/// Names are trimmed on insert and compared case-insensitively. The library
/// is never empty: removing the last profile restores the built-in
/// `generic` one.
///
/// # TOML Format
///
/// ```toml
/// [[manufacturers]]
/// name = "generic"
/// description = "Default RBJ cookbook biquad formulas"
///
/// [[manufacturers]]
/// name = "minidsp"
///
/// [manufacturers.filters.peq]
/// q_scale = 1.08
///
/// [manufacturers.filters.allpass]
/// enabled = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileLibrary {
    #[serde(default)]
    manufacturers: Vec<ManufacturerProfile>,
}

impl Default for ProfileLibrary {
    fn default() -> Self {
        Self {
            manufacturers: vec![ManufacturerProfile::generic()],
        }
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl ProfileLibrary {
    /// A library holding only the `generic` profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a library from profiles; later duplicates replace earlier ones.
    pub fn from_profiles(
        profiles: impl IntoIterator<Item = ManufacturerProfile>,
    ) -> Result<Self, ConfigError> {
        let mut library = Self {
            manufacturers: Vec::new(),
        };
        for profile in profiles {
            library.upsert(profile)?;
        }
        if library.manufacturers.is_empty() {
            library.manufacturers.push(ManufacturerProfile::generic());
        }
        Ok(library)
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.manufacturers.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.manufacturers.is_empty()
    }

    /// Profile names in library order.
    pub fn names(&self) -> Vec<&str> {
        self.manufacturers.iter().map(|p| p.name.as_str()).collect()
    }

    /// Iterates over the profiles.
    pub fn iter(&self) -> impl Iterator<Item = &ManufacturerProfile> {
        self.manufacturers.iter()
    }

    /// True if a profile with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Looks up a profile by name.
    pub fn get(&self, name: &str) -> Option<&ManufacturerProfile> {
        self.manufacturers.iter().find(|p| same_name(&p.name, name))
    }

    /// Looks up a profile for editing.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ManufacturerProfile> {
        self.manufacturers
            .iter_mut()
            .find(|p| same_name(&p.name, name))
    }

    /// The profile to design with: `name` if present, otherwise `generic`.
    ///
    /// A missing name is never an error.
    pub fn resolve(&self, name: Option<&str>) -> ManufacturerProfile {
        name.and_then(|n| self.get(n))
            .or_else(|| self.get(GENERIC_PROFILE_NAME))
            .cloned()
            .unwrap_or_else(ManufacturerProfile::generic)
    }

    /// Adds a new empty profile.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidConfig`] for a blank name,
    /// [`ConfigError::ProfileExists`] when the name is taken.
    pub fn create(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<&ManufacturerProfile, ConfigError> {
        let name = name.trim();
        if self.contains(name) {
            return Err(ConfigError::ProfileExists(name.to_string()));
        }
        let mut profile = ManufacturerProfile::new(name);
        profile.description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self.upsert(profile)
    }

    /// Inserts `profile`, replacing any profile with the same name in place.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidConfig`] for a blank name.
    pub fn upsert(
        &mut self,
        mut profile: ManufacturerProfile,
    ) -> Result<&ManufacturerProfile, ConfigError> {
        let trimmed = profile.name.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::invalid("manufacturer name must not be empty"));
        }
        profile.name = trimmed.to_string();

        let index = match self
            .manufacturers
            .iter()
            .position(|p| same_name(&p.name, &profile.name))
        {
            Some(index) => {
                self.manufacturers[index] = profile;
                index
            }
            None => {
                self.manufacturers.push(profile);
                self.manufacturers.len() - 1
            }
        };
        Ok(&self.manufacturers[index])
    }

    /// Removes a profile and returns it.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ProfileNotFound`] when no profile has that name.
    pub fn remove(&mut self, name: &str) -> Result<ManufacturerProfile, ConfigError> {
        let index = self
            .manufacturers
            .iter()
            .position(|p| same_name(&p.name, name))
            .ok_or_else(|| ConfigError::ProfileNotFound(name.trim().to_string()))?;
        let removed = self.manufacturers.remove(index);
        if self.manufacturers.is_empty() {
            self.manufacturers.push(ManufacturerProfile::generic());
        }
        Ok(removed)
    }

    /// Upserts every profile of `other`; returns the imported names.
    pub fn merge(&mut self, other: ProfileLibrary) -> Result<Vec<String>, ConfigError> {
        other
            .manufacturers
            .into_iter()
            .map(|profile| self.upsert(profile).map(|p| p.name.clone()))
            .collect()
    }

    /// Merges the profiles stored in another library file.
    pub fn import(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>, ConfigError> {
        let other = Self::load(path)?;
        self.merge(other)
    }

    /// Writes one profile as a single-entry library file.
    pub fn export(&self, name: &str, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let profile = self
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.trim().to_string()))?;
        let single = Self {
            manufacturers: vec![profile.clone()],
        };
        single.save(path)
    }

    /// Load a library from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Loads `path`, or returns the default library if the file is missing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load a library from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: Self = toml::from_str(toml_str)?;
        Self::from_profiles(raw.manufacturers)
    }

    /// Save the library to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the library to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xover_core::{CorrectionParam, FamilyCorrection, FilterFamily};

    fn minidsp() -> ManufacturerProfile {
        ManufacturerProfile::new("minidsp").with_correction(
            FilterFamily::Peq,
            FamilyCorrection::new().with(CorrectionParam::QScale, 1.08),
        )
    }

    #[test]
    fn default_holds_generic() {
        let library = ProfileLibrary::new();
        assert_eq!(library.names(), vec!["generic"]);
        assert!(!library.is_empty());
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let mut library = ProfileLibrary::new();
        library.upsert(minidsp()).unwrap();
        assert!(library.get("  MiniDSP ").is_some());
        assert!(library.contains("MINIDSP"));
    }

    #[test]
    fn resolve_falls_back_to_generic() {
        let library = ProfileLibrary::new();
        assert_eq!(library.resolve(Some("unknown")).name, "generic");
        assert_eq!(library.resolve(None).name, "generic");

        let empty = ProfileLibrary::from_toml("").unwrap();
        assert_eq!(empty.resolve(Some("x")), ManufacturerProfile::generic());
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut library = ProfileLibrary::new();
        library.upsert(minidsp()).unwrap();
        let mut updated = ManufacturerProfile::new(" MINIDSP ").with_description("refit");
        updated.filters.set(FilterFamily::Shelf, FamilyCorrection::disabled());
        library.upsert(updated).unwrap();

        assert_eq!(library.len(), 2);
        let stored = library.get("minidsp").unwrap();
        assert_eq!(stored.name, "MINIDSP");
        assert_eq!(stored.description.as_deref(), Some("refit"));
        assert!(stored.correction_for(FilterFamily::Peq).is_none());
    }

    #[test]
    fn blank_names_rejected() {
        let mut library = ProfileLibrary::new();
        assert!(matches!(
            library.upsert(ManufacturerProfile::new("   ")),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(library.create("", None), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn create_refuses_duplicates() {
        let mut library = ProfileLibrary::new();
        library.create("dsp-a", Some("  bench unit ")).unwrap();
        assert_eq!(
            library.get("dsp-a").unwrap().description.as_deref(),
            Some("bench unit")
        );
        assert!(matches!(
            library.create("DSP-A", None),
            Err(ConfigError::ProfileExists(_))
        ));
    }

    #[test]
    fn removing_last_profile_restores_generic() {
        let mut library = ProfileLibrary::new();
        library.upsert(minidsp()).unwrap();
        library.remove("generic").unwrap();
        assert_eq!(library.names(), vec!["minidsp"]);
        library.remove("minidsp").unwrap();
        assert_eq!(library.names(), vec!["generic"]);
        assert!(matches!(
            library.remove("minidsp"),
            Err(ConfigError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn toml_roundtrip() {
        let mut library = ProfileLibrary::new();
        library.upsert(minidsp()).unwrap();
        let text = library.to_toml().unwrap();
        assert!(text.contains("[[manufacturers]]"));
        assert!(text.contains("q_scale = 1.08"));
        assert_eq!(ProfileLibrary::from_toml(&text).unwrap(), library);
    }

    #[test]
    fn duplicate_entries_collapse_on_load() {
        let text = r#"
[[manufacturers]]
name = "dsp"

[[manufacturers]]
name = "DSP"
description = "second wins"

[manufacturers.filters.unknown_family]
q_scale = 3.0
"#;
        let library = ProfileLibrary::from_toml(text).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(
            library.get("dsp").unwrap().description.as_deref(),
            Some("second wins")
        );
    }
}
