use std::f64::consts::{PI, TAU};
use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::grid::RowBand;
use crate::noise::{fractal_sum, ridge, sphere_point, CoherentNoiseField};
use crate::rng::{salted, SeededRandom};

const SALT_RELIEF: u32 = 0x0E1E_7A11;
const SALT_VARIATION: u32 = 0x0B0D_7A21;

/// Mountains add at most this fraction of the underlying continent height.
const MOUNTAIN_AMPLIFY: f64 = 0.9;
/// Extra height at the equator, fading to zero at the poles.
const EQUATOR_BULGE: f64 = 0.05;

/// Elevations for a band of raster rows, in [-1, 1].
pub type ElevationField = RowBand<f32>;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliefParams {
    pub continent_frequency: f64,
    pub continent_gain: f64,
    pub continent_octaves: u32,
    pub mountain_frequency: f64,
    pub mountain_gain: f64,
    pub mountain_octaves: u32,
}

impl Default for ReliefParams {
    fn default() -> Self {
        Self {
            continent_frequency: 1.4,
            continent_gain: 0.5,
            continent_octaves: 5,
            mountain_frequency: 3.2,
            mountain_gain: 0.5,
            mountain_octaves: 4,
        }
    }
}

/// Colatitude of row `y`'s centre: 0 at the north pole, pi at the south.
#[inline]
pub fn row_latitude(y: usize, height: usize) -> f64 {
    (y as f64 + 0.5) / height as f64 * PI
}

/// Longitude of column `x`. Column 0 sits on 0 so column width-1 wraps onto it.
#[inline]
pub fn column_longitude(x: usize, width: usize) -> f64 {
    x as f64 / width as f64 * TAU
}

pub struct ReliefSynthesizer {
    field: CoherentNoiseField,
    params: ReliefParams,
    continent_frequency: f64,
}

impl ReliefSynthesizer {
    pub fn new(seed: u32, params: ReliefParams) -> Self {
        // Per-body variation so sibling bodies of one type don't share a scale.
        let mut rng = SeededRandom::new(salted(seed, SALT_VARIATION));
        let continent_frequency = params.continent_frequency * rng.range_f64(0.85, 1.15);
        Self {
            field: CoherentNoiseField::new(salted(seed, SALT_RELIEF)),
            params,
            continent_frequency,
        }
    }

    /// Elevation in [-1, 1] at colatitude `lat` and longitude `lon`.
    pub fn elevation_at(&self, lat: f64, lon: f64) -> f32 {
        let p = sphere_point(lat, lon);
        let continents = fractal_sum(
            &self.field,
            p,
            self.continent_frequency,
            self.params.continent_octaves,
            self.params.continent_gain,
        )
        .clamp(-1.0, 1.0);
        let mountains = fractal_sum(
            &self.field,
            p,
            self.params.mountain_frequency,
            self.params.mountain_octaves,
            self.params.mountain_gain,
        );
        // Ridges only lift ground that is already land: no underwater ranges.
        let mut height = continents + ridge(mountains) * MOUNTAIN_AMPLIFY * continents.max(0.0);
        height += EQUATOR_BULGE * lat.sin();
        height.clamp(-1.0, 1.0) as f32
    }

    /// Fill the elevation field for `rows` of a `width` x `height` raster.
    pub fn sample_band(&self, width: usize, height: usize, rows: Range<usize>) -> ElevationField {
        let mut band = ElevationField::new(width, rows.clone());
        band.data
            .par_chunks_mut(width)
            .zip(rows)
            .for_each(|(row, y)| {
                let lat = row_latitude(y, height);
                for (x, out) in row.iter_mut().enumerate() {
                    *out = self.elevation_at(lat, column_longitude(x, width));
                }
            });
        band
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::fractal_sum;

    #[test]
    fn elevation_is_clamped_and_deterministic() {
        let a = ReliefSynthesizer::new(5, ReliefParams::default());
        let b = ReliefSynthesizer::new(5, ReliefParams::default());
        for y in 0..32 {
            for x in 0..64 {
                let lat = row_latitude(y, 32);
                let lon = column_longitude(x, 64);
                let e = a.elevation_at(lat, lon);
                assert!((-1.0..=1.0).contains(&e));
                assert_eq!(e.to_bits(), b.elevation_at(lat, lon).to_bits());
            }
        }
    }

    #[test]
    fn no_ridges_below_sea() {
        // Without the bulge, ocean floor equals the raw continent value.
        let relief = ReliefSynthesizer::new(77, ReliefParams::default());
        for i in 0..400 {
            let lat = 0.05 + (i % 20) as f64 * 0.15;
            let lon = (i / 20) as f64 * 0.31;
            let p = sphere_point(lat, lon);
            let continents = fractal_sum(
                &relief.field,
                p,
                relief.continent_frequency,
                relief.params.continent_octaves,
                relief.params.continent_gain,
            )
            .clamp(-1.0, 1.0);
            if continents < 0.0 {
                let expected = (continents + EQUATOR_BULGE * lat.sin()).clamp(-1.0, 1.0) as f32;
                assert_eq!(relief.elevation_at(lat, lon), expected);
            }
        }
    }

    #[test]
    fn octave_counts_one_to_six() {
        for octaves in 1..=6 {
            let params = ReliefParams {
                continent_octaves: octaves,
                mountain_octaves: octaves,
                ..ReliefParams::default()
            };
            let relief = ReliefSynthesizer::new(9, params);
            let e = relief.elevation_at(1.0, 1.0);
            assert!(e.is_finite());
        }
    }

    #[test]
    fn band_matches_pointwise_samples() {
        let relief = ReliefSynthesizer::new(3, ReliefParams::default());
        let band = relief.sample_band(16, 16, 4..9);
        for y in 4..9 {
            for x in 0..16 {
                let e = relief.elevation_at(row_latitude(y, 16), column_longitude(x, 16));
                assert_eq!(band.get(x, y), e);
            }
        }
    }
}
