use std::f64::consts::PI;
use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::SurfaceError;
use crate::grid::with_halo;
use crate::noise::{sphere_point, CoherentNoiseField};
use crate::profile::PlanetProfile;
use crate::relief::{column_longitude, row_latitude, ElevationField, ReliefSynthesizer};
use crate::rng::{salted, SeededRandom};

const SALT_FINE: u32 = 0x0F1E_71A7;
const SALT_URBAN: u32 = 0x0C17_1E50;
const SALT_CAP: u32 = 0x0CA9_0001;

/// Class plane value for pixels covered by a polar cap.
pub const CLASS_POLAR_CAP: u8 = u8::MAX;
pub const POLAR_CAP_RGB: [u8; 3] = [238, 242, 246];

const FINE_FREQUENCY: f64 = 8.0;
const URBAN_FREQUENCY: f64 = 24.0;
/// Gas giant turbulence: stretched along longitude to streak the bands.
const GAS_STREAK: [f64; 3] = [2.0, 14.0, 2.0];
const GAS_WARP: f32 = 0.035;

/// Relative elevation over which coastal preference fades out.
const COAST_BAND: f32 = 0.12;
/// Latitude (0 equator, 1 pole) most favoured for settlement.
const PREFERRED_LATITUDE: f32 = 0.4;

/// Smoothstep: 0 at edge0, 1 at edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Finished surface: RGBA8 row-major, row 0 at the north pole, plus the
/// urban mask and per-pixel dominant band. Shared read-only once built.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceRaster {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
    /// 1 where city lights may be drawn on the night side.
    pub urban_mask: Vec<u8>,
    /// Dominant biome band per pixel, or [`CLASS_POLAR_CAP`].
    pub classes: Vec<u8>,
    pub seed: u32,
    pub development_level: f32,
    pub planet_type: String,
}

impl SurfaceRaster {
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    pub fn urban_count(&self) -> usize {
        self.urban_mask.iter().filter(|&&m| m != 0).count()
    }
}

/// Output planes under construction. Rows are filled in any order.
pub struct SurfaceBuffers {
    rgba: Vec<u8>,
    urban_mask: Vec<u8>,
    classes: Vec<u8>,
}

impl SurfaceBuffers {
    /// Reserve all planes up front so exhaustion surfaces as an error
    /// instead of an abort halfway through a job.
    pub fn allocate(width: usize, height: usize) -> Result<Self, SurfaceError> {
        let too_large = SurfaceError::Allocation { bytes: usize::MAX };
        let pixels = width.checked_mul(height).ok_or(too_large.clone())?;
        let rgba_len = pixels.checked_mul(4).ok_or(too_large)?;
        Ok(Self {
            rgba: zeroed(rgba_len)?,
            urban_mask: zeroed(pixels)?,
            classes: zeroed(pixels)?,
        })
    }
}

fn zeroed(len: usize) -> Result<Vec<u8>, SurfaceError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| SurfaceError::Allocation { bytes: len })?;
    v.resize(len, 0);
    Ok(v)
}

/// Per-body pixel pipeline: relief, biome color, polar cap, urban bit.
pub struct SurfaceCompositor {
    profile: Arc<PlanetProfile>,
    width: usize,
    height: usize,
    seed: u32,
    development: f32,
    relief: ReliefSynthesizer,
    fine: CoherentNoiseField,
    urban: CoherentNoiseField,
    cap_jitter: f32,
}

impl SurfaceCompositor {
    pub fn new(profile: Arc<PlanetProfile>, resolution: usize, seed: u32, development_level: f32) -> Self {
        let mut rng = SeededRandom::new(salted(seed, SALT_CAP));
        let cap_jitter = rng.range_f64(0.2, 0.5) as f32;
        Self {
            relief: ReliefSynthesizer::new(seed, profile.relief),
            fine: CoherentNoiseField::new(salted(seed, SALT_FINE)),
            urban: CoherentNoiseField::new(salted(seed, SALT_URBAN)),
            profile,
            width: resolution,
            height: resolution,
            seed,
            development: development_level.clamp(0.0, 1.0),
            cap_jitter,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn relief(&self) -> &ReliefSynthesizer {
        &self.relief
    }

    pub fn allocate(&self) -> Result<SurfaceBuffers, SurfaceError> {
        SurfaceBuffers::allocate(self.width, self.height)
    }

    /// Whole raster in one call.
    pub fn compose(&self) -> Result<SurfaceRaster, SurfaceError> {
        let mut buffers = self.allocate()?;
        self.compose_rows(0..self.height, &mut buffers);
        Ok(self.finish(buffers))
    }

    /// Fill `rows` of `buffers`. Output depends only on pixel coordinates,
    /// so any split into row chunks yields the same raster.
    pub fn compose_rows(&self, rows: Range<usize>, buffers: &mut SurfaceBuffers) {
        let w = self.width;
        let rows = rows.start..rows.end.min(self.height);
        if rows.is_empty() {
            return;
        }
        let elevation = if self.profile.is_gas_giant() {
            None
        } else {
            Some(self.relief.sample_band(w, self.height, with_halo(&rows, self.height)))
        };

        let rgba = &mut buffers.rgba[rows.start * w * 4..rows.end * w * 4];
        let mask = &mut buffers.urban_mask[rows.start * w..rows.end * w];
        let classes = &mut buffers.classes[rows.start * w..rows.end * w];

        rgba.par_chunks_mut(w * 4)
            .zip(mask.par_chunks_mut(w))
            .zip(classes.par_chunks_mut(w))
            .zip(rows)
            .for_each(|(((rgba_row, mask_row), class_row), y)| match &elevation {
                Some(field) => self.solid_row(y, field, rgba_row, mask_row, class_row),
                None => self.gas_row(y, rgba_row, class_row),
            });
    }

    pub fn finish(&self, buffers: SurfaceBuffers) -> SurfaceRaster {
        SurfaceRaster {
            width: self.width,
            height: self.height,
            rgba: buffers.rgba,
            urban_mask: buffers.urban_mask,
            classes: buffers.classes,
            seed: self.seed,
            development_level: self.development,
            planet_type: self.profile.name.clone(),
        }
    }

    fn solid_row(
        &self,
        y: usize,
        field: &ElevationField,
        rgba: &mut [u8],
        mask: &mut [u8],
        classes: &mut [u8],
    ) {
        let profile = &*self.profile;
        let lat = row_latitude(y, self.height);
        let v = (y as f32 + 0.5) / self.height as f32;
        let abs_lat = (1.0 - 2.0 * v).abs();
        let pole_distance = v.min(1.0 - v);

        for x in 0..self.width {
            let p = sphere_point(lat, column_longitude(x, self.width));
            let fine = self.fine.unit_at(p, FINE_FREQUENCY) as f32;
            let relative = field.get(x, y) - profile.water_level;
            let land = relative >= 0.0;

            let capped = land
                && profile.polar_cap_size > 0.0
                && pole_distance < profile.polar_cap_size * (1.0 + (fine - 0.5) * self.cap_jitter);

            let (rgb, class, urban) = if capped {
                (POLAR_CAP_RGB, CLASS_POLAR_CAP, false)
            } else {
                let blend = profile.biomes.classify(relative, abs_lat, fine);
                let urban = land
                    && self.development > 0.0
                    && profile.allows_urban(blend.primary)
                    && {
                        let suitability = self.suitability(field, x, y, relative, abs_lat);
                        let noise = self.urban.unit_at(p, URBAN_FREQUENCY) as f32;
                        noise > 1.0 - self.development * suitability
                    };
                (blend.rgb, blend.primary as u8, urban)
            };

            rgba[x * 4..x * 4 + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            mask[x] = urban as u8;
            classes[x] = class;
        }
    }

    fn gas_row(&self, y: usize, rgba: &mut [u8], classes: &mut [u8]) {
        let biomes = &self.profile.biomes;
        let lat = row_latitude(y, self.height);
        let v = (y as f32 + 0.5) / self.height as f32;
        let abs_lat = (1.0 - 2.0 * v).abs();

        for x in 0..self.width {
            let p = sphere_point(lat, column_longitude(x, self.width));
            let fine = self.fine.unit_at(p, FINE_FREQUENCY) as f32;
            let streak = self.fine.evaluate(p[0] * GAS_STREAK[0], p[1] * GAS_STREAK[1], p[2] * GAS_STREAK[2]) as f32;
            let warped = (abs_lat + streak * GAS_WARP).clamp(0.0, 1.0);
            let band = biomes.band_at_latitude(warped);
            let rgb = biomes.tinted(band, fine);

            rgba[x * 4..x * 4 + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            classes[x] = band as u8;
        }
    }

    /// Settlement suitability in [0, 1]: coastal, mid-latitude, smooth ground.
    fn suitability(&self, field: &ElevationField, x: usize, y: usize, relative: f32, abs_lat: f32) -> f32 {
        let here = field.get(x, y);
        let water = self.profile.water_level;
        let mut near_water = false;
        let mut max_step = 0.0f32;
        for (nx, ny) in field.neighbors8(x, y) {
            let e = field.get(nx, ny);
            near_water |= e < water;
            max_step = max_step.max((e - here).abs());
        }

        let coastal = if near_water {
            1.0
        } else {
            1.0 - (relative / COAST_BAND).clamp(0.0, 1.0)
        };
        let mid_latitude = 1.0 - ((abs_lat - PREFERRED_LATITUDE).abs() / PREFERRED_LATITUDE).clamp(0.0, 1.0);
        let pixel_angle = (PI / self.height as f64) as f32;
        let ruggedness = (max_step / pixel_angle * 0.5).clamp(0.0, 1.0);

        smoothstep(0.0, 1.0, 0.45 * coastal + 0.35 * mid_latitude + 0.20 * (1.0 - ruggedness))
    }
}
