use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::profile::ProfileSpec;

/// Generator settings. Loadable from TOML; every field has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Edge length of the synchronous preview raster.
    pub preview_resolution: u32,
    /// Largest accepted resolution; anything above is a caller bug.
    pub max_resolution: u32,
    /// Rows composed between yields in an upgrade job.
    pub default_chunk_rows: usize,
    /// Extra planet types, added to (or replacing) the built-in ones.
    pub profiles: Vec<ProfileSpec>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            preview_resolution: 128,
            max_resolution: 8192,
            default_chunk_rows: 16,
            profiles: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, SurfaceError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, SurfaceError> {
        let text = std::fs::read_to_string(path).map_err(|e| SurfaceError::Config {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), SurfaceError> {
        if !self.preview_resolution.is_power_of_two() {
            return Err(SurfaceError::Config {
                reason: format!("preview_resolution {} is not a power of two", self.preview_resolution),
            });
        }
        if self.preview_resolution > self.max_resolution {
            return Err(SurfaceError::Config {
                reason: "preview_resolution exceeds max_resolution".into(),
            });
        }
        if self.default_chunk_rows == 0 {
            return Err(SurfaceError::Config {
                reason: "default_chunk_rows must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::PlanetKind;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = GeneratorConfig::from_toml_str("").unwrap();
        assert_eq!(config.preview_resolution, 128);
        assert_eq!(config.default_chunk_rows, 16);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn parses_custom_profile() {
        let text = r#"
preview_resolution = 64

[[profiles]]
name = "jungle"
water_level = -0.1
polar_cap_size = 0.02
excluded_urban_biomes = ["canopy"]

[profiles.relief]
continent_frequency = 2.0

[[profiles.bands]]
name = "swamp"
elevation = [-1.0, 0.1]
color = [40, 70, 50]
tint = 0.2

[[profiles.bands]]
name = "canopy"
elevation = [0.05, 1.0]
latitude = [0.0, 0.6]
color = [20, 90, 30]
"#;
        let config = GeneratorConfig::from_toml_str(text).unwrap();
        assert_eq!(config.preview_resolution, 64);
        let jungle = &config.profiles[0];
        assert_eq!(jungle.kind, PlanetKind::Solid);
        assert_eq!(jungle.relief.continent_frequency, 2.0);
        assert_eq!(jungle.relief.mountain_octaves, 4);
        assert_eq!(jungle.bands[0].latitude, [0.0, 1.0]);
        assert_eq!(jungle.bands[1].latitude, [0.0, 0.6]);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(GeneratorConfig::from_toml_str("preview_resolution = 100").is_err());
        assert!(GeneratorConfig::from_toml_str("default_chunk_rows = 0").is_err());
        assert!(matches!(
            GeneratorConfig::from_toml_str("preview_resolution = \"big\""),
            Err(SurfaceError::Config { .. })
        ));
    }
}
