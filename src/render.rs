use std::f32::consts::TAU;

use rayon::prelude::*;

use crate::compositor::{SurfaceRaster, CLASS_POLAR_CAP, POLAR_CAP_RGB};
use crate::profile::PlanetProfile;
use crate::relief::ElevationField;

const MASK_ON: [u8; 4] = [255, 214, 130, 255];
const MASK_OFF: [u8; 4] = [12, 14, 24, 255];
const CITY_LIGHT: [u8; 4] = [255, 196, 110, 255];
/// Brightness of the unlit hemisphere before city lights.
const NIGHT_FLOOR: f32 = 0.12;
/// Width of the dusk gradient, as a fraction of a full turn.
const TWILIGHT: f32 = 0.04;

#[inline]
fn lerp_color(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    [
        (a[0] as f32 + (b[0] as f32 - a[0] as f32) * t).round() as u8,
        (a[1] as f32 + (b[1] as f32 - a[1] as f32) * t).round() as u8,
        (a[2] as f32 + (b[2] as f32 - a[2] as f32) * t).round() as u8,
        255,
    ]
}

/// Diagnostic: urban mask as warm dots on a dark background.
pub fn render_urban_mask(raster: &SurfaceRaster) -> Vec<u8> {
    let mut rgba = vec![0u8; raster.urban_mask.len() * 4];
    for (i, &m) in raster.urban_mask.iter().enumerate() {
        let color = if m != 0 { MASK_ON } else { MASK_OFF };
        rgba[i * 4..i * 4 + 4].copy_from_slice(&color);
    }
    rgba
}

/// Diagnostic: each pixel in the flat base color of its dominant band.
pub fn render_biome_map(raster: &SurfaceRaster, profile: &PlanetProfile) -> Vec<u8> {
    let bands = profile.biomes.bands();
    let mut rgba = vec![0u8; raster.classes.len() * 4];
    for (i, &class) in raster.classes.iter().enumerate() {
        let rgb = if class == CLASS_POLAR_CAP {
            POLAR_CAP_RGB
        } else {
            bands.get(class as usize).map(|b| b.color).unwrap_or([255, 0, 255])
        };
        rgba[i * 4..i * 4 + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
    }
    rgba
}

/// Diagnostic: grayscale elevation, -1 black to +1 white.
pub fn render_heightmap(field: &ElevationField) -> Vec<u8> {
    let mut rgba = vec![0u8; field.data.len() * 4];
    for (i, &e) in field.data.iter().enumerate() {
        let v = ((e + 1.0) * 0.5 * 255.0).clamp(0.0, 255.0) as u8;
        rgba[i * 4..i * 4 + 4].copy_from_slice(&[v, v, v, 255]);
    }
    rgba
}

/// Preview of the downstream night-side pass: daylight centred on
/// `sun_longitude` (radians), a twilight ramp, then darkness lit by the
/// urban mask scaled by development.
pub fn render_night_lights(raster: &SurfaceRaster, sun_longitude: f32) -> Vec<u8> {
    let w = raster.width;
    let mut rgba = vec![0u8; raster.rgba.len()];
    let glow = raster.development_level.clamp(0.0, 1.0);

    rgba.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let i = y * w + x;
            let lon = x as f32 / w as f32 * TAU;
            // Angular distance from the sub-solar meridian, in turns [0, 0.5].
            let phase = (lon - sun_longitude).rem_euclid(TAU) / TAU;
            let turns = phase.min(1.0 - phase);
            let daylight = ((0.25 + TWILIGHT - turns) / (2.0 * TWILIGHT)).clamp(0.0, 1.0);
            let light = NIGHT_FLOOR + (1.0 - NIGHT_FLOOR) * daylight;

            let day = raster.pixel(x, y);
            let shaded = [
                (day[0] as f32 * light) as u8,
                (day[1] as f32 * light) as u8,
                (day[2] as f32 * light) as u8,
                255,
            ];
            let color = if raster.urban_mask[i] != 0 {
                lerp_color(shaded, CITY_LIGHT, (1.0 - daylight) * glow)
            } else {
                shaded
            };
            row[x * 4..x * 4 + 4].copy_from_slice(&color);
        }
    });

    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster() -> SurfaceRaster {
        SurfaceRaster {
            width: 4,
            height: 1,
            rgba: vec![200; 16],
            urban_mask: vec![1, 0, 1, 0],
            classes: vec![0, 1, CLASS_POLAR_CAP, 0],
            seed: 0,
            development_level: 1.0,
            planet_type: "terran".into(),
        }
    }

    #[test]
    fn night_side_shows_city_lights() {
        let out = render_night_lights(&raster(), 0.0);
        // x=0 faces the sun, x=2 is midnight.
        assert_eq!(&out[0..3], &[200, 200, 200]);
        assert_eq!(&out[8..11], &CITY_LIGHT[..3]);
        // x=1 and x=3 sit on the terminator.
        assert!(out[4] < 200 && out[4] > 24);
    }

    #[test]
    fn mask_render_marks_cities() {
        let out = render_urban_mask(&raster());
        assert_eq!(&out[0..4], &MASK_ON);
        assert_eq!(&out[4..8], &MASK_OFF);
    }

    #[test]
    fn heightmap_spans_gray_range() {
        let mut field = ElevationField::new(2, 0..1);
        field.set(0, 0, -1.0);
        field.set(1, 0, 1.0);
        let out = render_heightmap(&field);
        assert_eq!(out[0], 0);
        assert_eq!(out[4], 255);
    }
}
