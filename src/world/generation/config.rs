//! Generator tuning
//!
//! Knobs that scripts don't pass explicitly. Loaded from an optional RON
//! file; missing fields take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a generator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Longest hallway (in carved cells) the router may dig
    pub max_hallway_length: usize,
    /// Ports closer than this through existing rooms are not hallway targets
    pub hallway_min_port_distance: u32,
    /// How many times a port may fail geometric placement before it is dropped
    pub growth_retry_limit: u32,
    /// `connectAdjacentPorts` cap when the script gives none
    pub default_max_cycles: usize,
    /// Chance that a grown prefab is set back one cell from its counterpart
    pub setback_chance: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_hallway_length: 25,
            hallway_min_port_distance: 20,
            growth_retry_limit: 3,
            default_max_cycles: 10,
            setback_chance: 0.5,
        }
    }
}

impl GeneratorConfig {
    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: GeneratorConfig = ron::from_str(&content)?;
        Ok(config.sanitized())
    }

    /// Load from a RON file, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("Failed to load {}: {}. Using defaults.", path.display(), e);
            Self::default()
        })
    }

    pub(crate) fn sanitized(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.setback_chance) {
            log::warn!("setback_chance {} out of range, clamping", self.setback_chance);
            self.setback_chance = if self.setback_chance.is_nan() {
                0.5
            } else {
                self.setback_chance.clamp(0.0, 1.0)
            };
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: GeneratorConfig = ron::from_str("(max_hallway_length: 10)").unwrap();
        assert_eq!(config.max_hallway_length, 10);
        assert_eq!(config.growth_retry_limit, 3);
        assert_eq!(config.setback_chance, 0.5);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = GeneratorConfig::load_or_default(Path::new("does/not/exist.ron"));
        assert_eq!(config, GeneratorConfig::default());
    }

    #[test]
    fn test_setback_is_clamped() {
        let config = GeneratorConfig {
            setback_chance: 3.0,
            ..GeneratorConfig::default()
        }
        .sanitized();
        assert_eq!(config.setback_chance, 1.0);
    }
}
