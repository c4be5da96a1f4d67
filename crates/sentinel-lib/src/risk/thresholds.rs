//! Per-species water-quality thresholds
//!
//! Built-in profiles cover the species farmed by our users. Unknown species
//! resolve to the most sensitive profile (whiteleg/tiger shrimp) rather than
//! failing.

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Species used when a request names an unknown one
pub const DEFAULT_SPECIES: &str = "tom";

/// Threshold configuration for one species
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeciesThresholdConfig {
    pub do_danger: f64,
    pub do_warning: f64,
    pub ph_min: f64,
    pub ph_max: f64,
    pub ammonia_danger: f64,
    pub ammonia_warning: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_shock_delta: f64,
}

impl SpeciesThresholdConfig {
    /// Check internal consistency of the profile
    pub fn validate(&self) -> Result<(), String> {
        let values = [
            self.do_danger,
            self.do_warning,
            self.ph_min,
            self.ph_max,
            self.ammonia_danger,
            self.ammonia_warning,
            self.temp_min,
            self.temp_max,
            self.temp_shock_delta,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("all thresholds must be finite".to_string());
        }
        if self.do_danger > self.do_warning {
            return Err(format!(
                "do_danger {} is above do_warning {}",
                self.do_danger, self.do_warning
            ));
        }
        if self.ph_min >= self.ph_max {
            return Err(format!("ph_min {} is not below ph_max {}", self.ph_min, self.ph_max));
        }
        if self.ammonia_warning > self.ammonia_danger {
            return Err(format!(
                "ammonia_warning {} is above ammonia_danger {}",
                self.ammonia_warning, self.ammonia_danger
            ));
        }
        if self.temp_min >= self.temp_max {
            return Err(format!(
                "temp_min {} is not below temp_max {}",
                self.temp_min, self.temp_max
            ));
        }
        if self.temp_shock_delta <= 0.0 {
            return Err("temp_shock_delta must be positive".to_string());
        }
        Ok(())
    }
}

/// Shape of a threshold override file
#[derive(Debug, Clone, Deserialize)]
struct ThresholdFile {
    #[serde(default)]
    species: BTreeMap<String, SpeciesThresholdConfig>,
}

fn builtin_profiles() -> BTreeMap<String, SpeciesThresholdConfig> {
    let mut profiles = BTreeMap::new();
    // Shrimp, the most sensitive species
    profiles.insert(
        "tom".to_string(),
        SpeciesThresholdConfig {
            do_danger: 3.5,
            do_warning: 5.0,
            ph_min: 7.5,
            ph_max: 8.5,
            ammonia_danger: 0.5,
            ammonia_warning: 0.1,
            temp_min: 26.0,
            temp_max: 32.0,
            temp_shock_delta: 2.0,
        },
    );
    // Striped catfish (pangasius), very hardy
    profiles.insert(
        "ca_tra".to_string(),
        SpeciesThresholdConfig {
            do_danger: 2.0,
            do_warning: 3.0,
            ph_min: 6.5,
            ph_max: 8.5,
            ammonia_danger: 1.0,
            ammonia_warning: 0.5,
            temp_min: 25.0,
            temp_max: 34.0,
            temp_shock_delta: 3.0,
        },
    );
    // Basa catfish
    profiles.insert(
        "ca_basa".to_string(),
        SpeciesThresholdConfig {
            do_danger: 2.5,
            do_warning: 3.5,
            ph_min: 6.5,
            ph_max: 8.5,
            ammonia_danger: 0.8,
            ammonia_warning: 0.4,
            temp_min: 25.0,
            temp_max: 34.0,
            temp_shock_delta: 3.0,
        },
    );
    // Tilapia
    profiles.insert(
        "ca_ro_phi".to_string(),
        SpeciesThresholdConfig {
            do_danger: 2.0,
            do_warning: 3.0,
            ph_min: 6.0,
            ph_max: 9.0,
            ammonia_danger: 1.0,
            ammonia_warning: 0.5,
            temp_min: 25.0,
            temp_max: 34.0,
            temp_shock_delta: 3.0,
        },
    );
    // Snakehead
    profiles.insert(
        "ca_loc".to_string(),
        SpeciesThresholdConfig {
            do_danger: 2.5,
            do_warning: 3.5,
            ph_min: 6.0,
            ph_max: 8.0,
            ammonia_danger: 0.5,
            ammonia_warning: 0.2,
            temp_min: 25.0,
            temp_max: 34.0,
            temp_shock_delta: 3.0,
        },
    );
    // Swamp eel, pH sensitive
    profiles.insert(
        "luon".to_string(),
        SpeciesThresholdConfig {
            do_danger: 3.0,
            do_warning: 4.0,
            ph_min: 6.5,
            ph_max: 8.0,
            ammonia_danger: 0.2,
            ammonia_warning: 0.1,
            temp_min: 25.0,
            temp_max: 34.0,
            temp_shock_delta: 3.0,
        },
    );
    profiles
}

/// Immutable species-id to threshold mapping
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRegistry {
    profiles: BTreeMap<String, SpeciesThresholdConfig>,
    default_species: String,
}

impl Default for ThresholdRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThresholdRegistry {
    /// Registry with the built-in species profiles
    pub fn builtin() -> Self {
        Self {
            profiles: builtin_profiles(),
            default_species: DEFAULT_SPECIES.to_string(),
        }
    }

    /// Build from explicit profiles; every profile is validated
    pub fn from_profiles(
        profiles: BTreeMap<String, SpeciesThresholdConfig>,
        default_species: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let default_species = normalize(&default_species.into());
        let mut normalized = BTreeMap::new();
        for (species, config) in profiles {
            config.validate().map_err(|reason| RegistryError::InvalidProfile {
                species: species.clone(),
                reason,
            })?;
            normalized.insert(normalize(&species), config);
        }
        if !normalized.contains_key(&default_species) {
            return Err(RegistryError::MissingDefault(default_species));
        }
        Ok(Self {
            profiles: normalized,
            default_species,
        })
    }

    /// Built-in profiles overlaid with those from a TOML or JSON file
    pub fn with_overrides(path: &Path) -> Result<Self, RegistryError> {
        let file: ThresholdFile = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;

        let mut profiles = builtin_profiles();
        profiles.extend(file.species);
        Self::from_profiles(profiles, DEFAULT_SPECIES)
    }

    /// Resolve a species to its profile, falling back to the default.
    ///
    /// Returns the id of the profile actually used.
    pub fn resolve(&self, species: &str) -> (&str, &SpeciesThresholdConfig) {
        let key = normalize(species);
        if let Some((id, config)) = self.profiles.get_key_value(&key) {
            return (id.as_str(), config);
        }
        (self.default_species.as_str(), self.default_profile())
    }

    pub fn thresholds(&self, species: &str) -> &SpeciesThresholdConfig {
        self.resolve(species).1
    }

    pub fn is_known(&self, species: &str) -> bool {
        self.profiles.contains_key(&normalize(species))
    }

    pub fn default_species(&self) -> &str {
        &self.default_species
    }

    fn default_profile(&self) -> &SpeciesThresholdConfig {
        // Presence of the default is checked at construction
        &self.profiles[&self.default_species]
    }

    /// All profiles, ordered by species id
    pub fn profiles(&self) -> impl Iterator<Item = (&str, &SpeciesThresholdConfig)> {
        self.profiles.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn normalize(species: &str) -> String {
    species.trim().to_ascii_lowercase()
}
