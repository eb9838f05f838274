use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::biome::{BiomeBand, BiomeTable};
use crate::error::SurfaceError;
use crate::relief::ReliefParams;

/// Type used when a request names a type the registry doesn't know.
pub const DEFAULT_TYPE: &str = "rocky";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanetKind {
    #[default]
    Solid,
    /// Colored by latitude band only: no relief, caps or cities.
    GasGiant,
}

/// Serialized form of a planet type, as written in TOML config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub name: String,
    #[serde(default)]
    pub kind: PlanetKind,
    #[serde(default)]
    pub water_level: f32,
    #[serde(default)]
    pub polar_cap_size: f32,
    #[serde(default)]
    pub relief: ReliefParams,
    pub bands: Vec<BiomeBand>,
    #[serde(default)]
    pub excluded_urban_biomes: Vec<String>,
}

#[derive(Debug)]
pub struct PlanetProfile {
    pub name: String,
    pub kind: PlanetKind,
    pub water_level: f32,
    /// Fraction of the pole-to-pole span, in [0, 0.5].
    pub polar_cap_size: f32,
    pub relief: ReliefParams,
    pub biomes: BiomeTable,
    pub excluded_urban_biomes: HashSet<String>,
    urban_allowed: Vec<bool>,
}

impl PlanetProfile {
    pub fn from_spec(spec: ProfileSpec) -> Result<Self, SurfaceError> {
        let biomes = BiomeTable::new(spec.bands)?;
        let excluded: HashSet<String> = spec.excluded_urban_biomes.into_iter().collect();
        let urban_allowed = biomes
            .bands()
            .iter()
            .map(|b| !excluded.contains(&b.name))
            .collect();
        Ok(Self {
            name: spec.name,
            kind: spec.kind,
            water_level: spec.water_level,
            polar_cap_size: spec.polar_cap_size.clamp(0.0, 0.5),
            relief: spec.relief,
            biomes,
            excluded_urban_biomes: excluded,
            urban_allowed,
        })
    }

    #[inline]
    pub fn is_gas_giant(&self) -> bool {
        self.kind == PlanetKind::GasGiant
    }

    /// Whether cities may appear where `band` dominates.
    #[inline]
    pub fn allows_urban(&self, band: usize) -> bool {
        self.urban_allowed.get(band).copied().unwrap_or(false)
    }
}

/// Planet types by name. Lookups never fail: unknown names resolve to
/// [`DEFAULT_TYPE`].
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<PlanetProfile>>,
}

impl ProfileRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self {
            profiles: HashMap::new(),
        };
        for spec in builtin_specs() {
            let profile =
                PlanetProfile::from_spec(spec).expect("built-in planet profiles are well formed");
            registry.insert(profile);
        }
        registry
    }

    /// Adds or replaces a type. The default type can be replaced but never removed.
    pub fn insert(&mut self, profile: PlanetProfile) {
        self.profiles.insert(profile.name.clone(), Arc::new(profile));
    }

    pub fn extend(&mut self, specs: Vec<ProfileSpec>) -> Result<(), SurfaceError> {
        for spec in specs {
            self.insert(PlanetProfile::from_spec(spec)?);
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Arc<PlanetProfile> {
        if let Some(profile) = self.profiles.get(name) {
            return profile.clone();
        }
        debug!(planet_type = name, "unknown planet type, using {}", DEFAULT_TYPE);
        self.profiles[DEFAULT_TYPE].clone()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn band(name: &str, elevation: [f32; 2], color: [u8; 3], tint: f32) -> BiomeBand {
    BiomeBand::new(name, elevation, color, tint)
}

fn spec(name: &str, water_level: f32, polar_cap_size: f32, bands: Vec<BiomeBand>) -> ProfileSpec {
    ProfileSpec {
        name: name.to_string(),
        kind: PlanetKind::Solid,
        water_level,
        polar_cap_size,
        relief: ReliefParams::default(),
        bands,
        excluded_urban_biomes: Vec::new(),
    }
}

fn rocky_spec() -> ProfileSpec {
    let mut s = spec(
        "rocky",
        -0.55,
        0.05,
        vec![
            band("basin", [-1.5, 0.0], [92, 84, 78], 0.2),
            band("regolith", [0.0, 0.35], [150, 138, 124], 0.25),
            band("scarp", [0.25, 0.7], [118, 106, 96], 0.3),
            band("highland", [0.6, 1.6], [176, 168, 158], 0.2),
        ],
    );
    s.relief.continent_frequency = 1.9;
    s.relief.mountain_frequency = 4.0;
    s.excluded_urban_biomes = vec!["highland".into()];
    s
}

fn builtin_specs() -> Vec<ProfileSpec> {
    let mut terran = spec(
        "terran",
        0.0,
        0.08,
        vec![
            band("deep_ocean", [-2.0, -0.35], [16, 40, 92], 0.12),
            band("ocean", [-0.35, 0.0], [34, 82, 146], 0.1),
            band("beach", [0.0, 0.04], [210, 198, 152], 0.15),
            band("grassland", [0.02, 0.25], [88, 142, 62], 0.25).with_latitude(0.0, 0.7),
            band("forest", [0.1, 0.4], [46, 98, 48], 0.3).with_latitude(0.0, 0.75),
            band("desert", [0.02, 0.3], [202, 172, 112], 0.2).with_latitude(0.0, 0.35),
            band("tundra", [0.02, 0.4], [148, 150, 130], 0.2).with_latitude(0.65, 1.0),
            band("mountain", [0.35, 0.8], [122, 106, 92], 0.3),
            band("snowcap", [0.7, 2.0], [236, 236, 242], 0.08),
        ],
    );
    terran.excluded_urban_biomes = vec!["mountain".into(), "snowcap".into(), "tundra".into()];

    let mut desert = spec(
        "desert",
        -0.45,
        0.04,
        vec![
            band("salt_flat", [-1.5, 0.0], [214, 206, 188], 0.1),
            band("dunes", [0.0, 0.3], [218, 170, 104], 0.3),
            band("oasis", [0.0, 0.08], [110, 140, 70], 0.2).with_latitude(0.0, 0.5),
            band("mesa", [0.25, 0.6], [176, 104, 64], 0.3),
            band("badlands", [0.5, 1.5], [132, 82, 56], 0.25),
        ],
    );
    desert.excluded_urban_biomes = vec!["badlands".into()];

    let mut ice = spec(
        "ice",
        -0.2,
        0.45,
        vec![
            band("frozen_sea", [-1.5, 0.0], [168, 196, 214], 0.1),
            band("snowfield", [0.0, 0.3], [228, 234, 240], 0.08),
            band("blue_ice", [0.2, 0.6], [176, 206, 228], 0.12),
            band("exposed_rock", [0.5, 1.5], [112, 114, 122], 0.25),
        ],
    );
    ice.excluded_urban_biomes = vec!["blue_ice".into()];

    let mut lava = spec(
        "lava",
        -0.1,
        0.0,
        vec![
            band("lava_sea", [-1.5, 0.0], [214, 72, 18], 0.35),
            band("cooling_crust", [0.0, 0.2], [62, 40, 34], 0.3),
            band("basalt", [0.15, 0.5], [38, 34, 34], 0.2),
            band("ash_peak", [0.45, 1.5], [84, 80, 78], 0.15),
        ],
    );
    lava.relief.mountain_frequency = 4.5;
    lava.excluded_urban_biomes = vec!["cooling_crust".into(), "ash_peak".into()];

    let mut ocean = spec(
        "ocean",
        0.35,
        0.1,
        vec![
            band("abyss", [-2.0, -0.5], [10, 28, 74], 0.1),
            band("open_water", [-0.5, 0.0], [26, 70, 136], 0.1),
            band("atoll", [0.0, 0.1], [196, 206, 170], 0.15),
            band("island_jungle", [0.05, 0.5], [40, 110, 56], 0.3),
            band("island_peak", [0.4, 1.5], [104, 98, 90], 0.25),
        ],
    );
    ocean.excluded_urban_biomes = vec!["island_peak".into()];

    let gas = ProfileSpec {
        name: "gas".into(),
        kind: PlanetKind::GasGiant,
        water_level: 0.0,
        polar_cap_size: 0.0,
        relief: ReliefParams::default(),
        bands: vec![
            band("equatorial_zone", [-1.0, 1.0], [234, 220, 188], 0.2).with_latitude(0.0, 0.12),
            band("equatorial_belt", [-1.0, 1.0], [184, 132, 92], 0.25).with_latitude(0.12, 0.3),
            band("tropical_zone", [-1.0, 1.0], [226, 204, 166], 0.2).with_latitude(0.3, 0.45),
            band("temperate_belt", [-1.0, 1.0], [164, 120, 90], 0.25).with_latitude(0.45, 0.62),
            band("temperate_zone", [-1.0, 1.0], [206, 190, 162], 0.2).with_latitude(0.62, 0.8),
            band("polar_region", [-1.0, 1.0], [138, 130, 128], 0.15).with_latitude(0.8, 1.0),
        ],
        excluded_urban_biomes: Vec::new(),
    };

    vec![rocky_spec(), terran, desert, ice, lava, ocean, gas]
}
