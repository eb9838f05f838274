use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;

/// Band indices are stored per pixel in a byte; 255 is reserved.
pub const MAX_BANDS: usize = 254;

fn full_latitude() -> [f32; 2] {
    [0.0, 1.0]
}

/// A named color rule over a relative-elevation range and a latitude range.
/// Latitude is absolute and normalized: 0 at the equator, 1 at the poles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomeBand {
    pub name: String,
    pub elevation: [f32; 2],
    #[serde(default = "full_latitude")]
    pub latitude: [f32; 2],
    pub color: [u8; 3],
    #[serde(default)]
    pub tint: f32,
}

impl BiomeBand {
    pub fn new(name: &str, elevation: [f32; 2], color: [u8; 3], tint: f32) -> Self {
        Self {
            name: name.to_string(),
            elevation,
            latitude: full_latitude(),
            color,
            tint: tint.clamp(0.0, 1.0),
        }
    }

    pub fn with_latitude(mut self, min: f32, max: f32) -> Self {
        self.latitude = [min, max];
        self
    }

    #[inline]
    pub fn midpoint(&self) -> f32 {
        (self.elevation[0] + self.elevation[1]) * 0.5
    }

    #[inline]
    fn contains(&self, elevation: f32, latitude: f32) -> bool {
        (self.elevation[0]..=self.elevation[1]).contains(&elevation)
            && (self.latitude[0]..=self.latitude[1]).contains(&latitude)
    }
}

/// Result of classifying one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blend {
    /// Band whose midpoint is nearest; the pixel's dominant biome.
    pub primary: usize,
    pub secondary: usize,
    /// Weight of `primary` in the mix, in [0.5, 1].
    pub weight: f32,
    pub rgb: [u8; 3],
}

/// Ordered, non-empty biome table of one planet type.
#[derive(Clone, Debug, PartialEq)]
pub struct BiomeTable {
    bands: Vec<BiomeBand>,
}

impl BiomeTable {
    pub fn new(bands: Vec<BiomeBand>) -> Result<Self, SurfaceError> {
        if bands.is_empty() {
            return Err(SurfaceError::Config {
                reason: "biome table has no bands".into(),
            });
        }
        if bands.len() > MAX_BANDS {
            return Err(SurfaceError::Config {
                reason: format!("biome table has {} bands, limit is {}", bands.len(), MAX_BANDS),
            });
        }
        for band in &bands {
            if band.elevation[0] > band.elevation[1] || band.latitude[0] > band.latitude[1] {
                return Err(SurfaceError::Config {
                    reason: format!("biome band '{}' has an inverted range", band.name),
                });
            }
        }
        let bands = bands
            .into_iter()
            .map(|b| BiomeBand {
                tint: b.tint.clamp(0.0, 1.0),
                ..b
            })
            .collect();
        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[BiomeBand] {
        &self.bands
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.bands.iter().position(|b| b.name == name)
    }

    /// Blend the two bands nearest by elevation midpoint among those whose
    /// ranges contain the point, or among all bands if none do.
    pub fn classify(&self, elevation: f32, latitude: f32, noise: f32) -> Blend {
        let nearest = self
            .nearest_two(elevation, |b| b.contains(elevation, latitude))
            .or_else(|| self.nearest_two(elevation, |_| true));
        // The table is non-empty, so the unfiltered scan always yields a band.
        let ((i1, d1), second) = nearest.unwrap_or(((0, 0.0), None));

        let first = &self.bands[i1];
        let (i2, weight, rgb, avg_tint) = match second {
            None => (i1, 1.0, to_f32(first.color), first.tint),
            Some((i2, d2)) => {
                let other = &self.bands[i2];
                let t = if d1 + d2 == 0.0 { 0.5 } else { d2 / (d1 + d2) };
                let a = to_f32(first.color);
                let b = to_f32(other.color);
                let rgb = [
                    a[0] * t + b[0] * (1.0 - t),
                    a[1] * t + b[1] * (1.0 - t),
                    a[2] * t + b[2] * (1.0 - t),
                ];
                (i2, t, rgb, (first.tint + other.tint) * 0.5)
            }
        };

        Blend {
            primary: i1,
            secondary: i2,
            weight,
            rgb: apply_grain(rgb, noise, avg_tint),
        }
    }

    pub fn color_at(&self, elevation: f32, latitude: f32, noise: f32) -> [u8; 3] {
        self.classify(elevation, latitude, noise).rgb
    }

    /// First band whose latitude range holds `latitude`, else the last band.
    /// Used for banded gas giants where elevation plays no part.
    pub fn band_at_latitude(&self, latitude: f32) -> usize {
        self.bands
            .iter()
            .position(|b| (b.latitude[0]..=b.latitude[1]).contains(&latitude))
            .unwrap_or(self.bands.len() - 1)
    }

    pub fn tinted(&self, index: usize, noise: f32) -> [u8; 3] {
        let band = &self.bands[index];
        apply_grain(to_f32(band.color), noise, band.tint)
    }

    fn nearest_two(
        &self,
        elevation: f32,
        accept: impl Fn(&BiomeBand) -> bool,
    ) -> Option<((usize, f32), Option<(usize, f32)>)> {
        let mut best: Option<(usize, f32)> = None;
        let mut runner_up: Option<(usize, f32)> = None;
        for (i, band) in self.bands.iter().enumerate() {
            if !accept(band) {
                continue;
            }
            let d = (band.midpoint() - elevation).abs();
            match best {
                Some((_, bd)) if d >= bd => {
                    if runner_up.is_none_or(|(_, rd)| d < rd) {
                        runner_up = Some((i, d));
                    }
                }
                _ => {
                    runner_up = best;
                    best = Some((i, d));
                }
            }
        }
        best.map(|b| (b, runner_up))
    }
}

#[inline]
fn to_f32(c: [u8; 3]) -> [f32; 3] {
    [c[0] as f32, c[1] as f32, c[2] as f32]
}

#[inline]
fn apply_grain(rgb: [f32; 3], noise: f32, tint: f32) -> [u8; 3] {
    let grain = 1.0 + (noise - 0.5) * tint;
    [
        (rgb[0] * grain).round().clamp(0.0, 255.0) as u8,
        (rgb[1] * grain).round().clamp(0.0, 255.0) as u8,
        (rgb[2] * grain).round().clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BiomeTable {
        BiomeTable::new(vec![
            BiomeBand::new("ocean", [-1.0, 0.0], [0, 0, 200], 0.0),
            BiomeBand::new("plains", [0.0, 0.4], [0, 200, 0], 0.0),
            BiomeBand::new("peaks", [0.4, 1.0], [200, 200, 200], 0.0),
            BiomeBand::new("tundra", [0.0, 0.4], [150, 150, 120], 0.0).with_latitude(0.7, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted_tables() {
        assert!(BiomeTable::new(vec![]).is_err());
        let inverted = BiomeBand::new("bad", [0.5, -0.5], [0, 0, 0], 0.0);
        assert!(BiomeTable::new(vec![inverted]).is_err());
    }

    #[test]
    fn picks_two_nearest_midpoints() {
        let t = table();
        // Only plains contains 0.2 at low latitude.
        let blend = t.classify(0.2, 0.1, 0.5);
        assert_eq!(blend.primary, 1);
        assert_eq!(blend.weight, 1.0);
        assert_eq!(blend.rgb, [0, 200, 0]);
    }

    #[test]
    fn weight_follows_midpoint_distances() {
        let t = table();
        // At 0.4 the candidates are plains (mid 0.2) and peaks (mid 0.7).
        let blend = t.classify(0.4, 0.1, 0.5);
        assert_eq!(blend.primary, 1);
        assert_eq!(blend.secondary, 2);
        let expected = 0.3 / (0.2 + 0.3);
        assert!((blend.weight - expected).abs() < 1e-6);
    }

    #[test]
    fn equal_midpoints_blend_evenly() {
        let t = BiomeTable::new(vec![
            BiomeBand::new("a", [0.0, 1.0], [0, 0, 0], 0.0),
            BiomeBand::new("b", [0.0, 1.0], [200, 100, 50], 0.0),
        ])
        .unwrap();
        let blend = t.classify(0.5, 0.0, 0.5);
        assert_eq!(blend.weight, 0.5);
        assert_eq!(blend.rgb, [100, 50, 25]);
    }

    #[test]
    fn latitude_gates_candidates() {
        let t = table();
        let polar = t.classify(0.2, 0.9, 0.5);
        let tropic = t.classify(0.2, 0.1, 0.5);
        assert!(polar.primary == 3 || polar.secondary == 3);
        assert!(tropic.primary != 3 && tropic.secondary != 3);
    }

    #[test]
    fn falls_back_to_all_bands_out_of_range() {
        let t = table();
        let blend = t.classify(1.8, 0.5, 0.5);
        assert_eq!(blend.primary, 2);
    }

    #[test]
    fn noise_tint_scales_brightness() {
        let t = BiomeTable::new(vec![BiomeBand::new("rock", [0.0, 1.0], [100, 100, 100], 0.5)])
            .unwrap();
        assert_eq!(t.color_at(0.5, 0.5, 0.5), [100, 100, 100]);
        assert_eq!(t.color_at(0.5, 0.5, 1.0), [125, 125, 125]);
        assert_eq!(t.color_at(0.5, 0.5, 0.0), [75, 75, 75]);
    }

    #[test]
    fn blend_stays_within_palette_envelope() {
        let t = table();
        for ei in 0..=80 {
            let e = -2.0 + ei as f32 * 0.05;
            for li in 0..=20 {
                let lat = li as f32 * 0.05;
                let rgb = t.color_at(e, lat, 0.5);
                // Untinted bands: every channel lies between palette extremes.
                assert!(rgb[0] <= 200 && rgb[1] <= 200 && rgb[2] <= 200);
            }
        }
    }

    #[test]
    fn latitude_band_lookup() {
        let t = BiomeTable::new(vec![
            BiomeBand::new("belt", [-1.0, 1.0], [200, 150, 90], 0.0).with_latitude(0.0, 0.3),
            BiomeBand::new("zone", [-1.0, 1.0], [230, 210, 170], 0.0).with_latitude(0.3, 0.8),
        ])
        .unwrap();
        assert_eq!(t.band_at_latitude(0.1), 0);
        assert_eq!(t.band_at_latitude(0.5), 1);
        assert_eq!(t.band_at_latitude(0.95), 1);
    }
}
