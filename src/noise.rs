use crate::rng::SeededRandom;

const F3: f64 = 1.0 / 3.0;
const G3: f64 = 1.0 / 6.0;

/// Edge midpoints of a cube; the classic simplex gradient set.
const GRAD3: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0], [1.0, -1.0, 0.0], [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0], [-1.0, 0.0, 1.0], [1.0, 0.0, -1.0], [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0], [0.0, -1.0, 1.0], [0.0, 1.0, -1.0], [0.0, -1.0, -1.0],
];

/// Offset applied per octave so octaves don't share a lattice origin.
const OCTAVE_SHIFT: [f64; 3] = [19.19, -7.43, 11.71];

/// Unit-sphere point for colatitude `lat` (0 = north pole, pi = south pole)
/// and longitude `lon`. All surface sampling goes through here: sampling in
/// image space seams at lon = 0 and pinches at the poles.
#[inline]
pub fn sphere_point(lat: f64, lon: f64) -> [f64; 3] {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    [sin_lat * cos_lon, cos_lat, sin_lat * sin_lon]
}

/// 3-D simplex gradient noise over a seeded permutation table.
#[derive(Clone)]
pub struct CoherentNoiseField {
    perm: [u8; 512],
}

impl CoherentNoiseField {
    pub fn new(seed: u32) -> Self {
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = i as u8;
        }
        let mut rng = SeededRandom::new(seed);
        for i in (1..256).rev() {
            let j = rng.below(i + 1);
            table.swap(i, j);
        }
        let mut perm = [0u8; 512];
        for (i, v) in perm.iter_mut().enumerate() {
            *v = table[i & 255];
        }
        Self { perm }
    }

    #[inline]
    fn hash(&self, i: usize, j: usize, k: usize) -> usize {
        let p = &self.perm;
        p[i + p[j + p[k] as usize] as usize] as usize % 12
    }

    /// Noise value in roughly [-1, 1].
    pub fn evaluate(&self, x: f64, y: f64, z: f64) -> f64 {
        // Skew into simplex cell space.
        let s = (x + y + z) * F3;
        let i = (x + s).floor() as i32;
        let j = (y + s).floor() as i32;
        let k = (z + s).floor() as i32;
        let t = (i + j + k) as f64 * G3;
        let x0 = x - (i as f64 - t);
        let y0 = y - (j as f64 - t);
        let z0 = z - (k as f64 - t);

        let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
            if y0 >= z0 {
                (1, 0, 0, 1, 1, 0)
            } else if x0 >= z0 {
                (1, 0, 0, 1, 0, 1)
            } else {
                (0, 0, 1, 1, 0, 1)
            }
        } else if y0 < z0 {
            (0, 0, 1, 0, 1, 1)
        } else if x0 < z0 {
            (0, 1, 0, 0, 1, 1)
        } else {
            (0, 1, 0, 1, 1, 0)
        };

        let x1 = x0 - i1 as f64 + G3;
        let y1 = y0 - j1 as f64 + G3;
        let z1 = z0 - k1 as f64 + G3;
        let x2 = x0 - i2 as f64 + 2.0 * G3;
        let y2 = y0 - j2 as f64 + 2.0 * G3;
        let z2 = z0 - k2 as f64 + 2.0 * G3;
        let x3 = x0 - 1.0 + 3.0 * G3;
        let y3 = y0 - 1.0 + 3.0 * G3;
        let z3 = z0 - 1.0 + 3.0 * G3;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let kk = (k & 255) as usize;
        let g0 = self.hash(ii, jj, kk);
        let g1 = self.hash(ii + i1, jj + j1, kk + k1);
        let g2 = self.hash(ii + i2, jj + j2, kk + k2);
        let g3 = self.hash(ii + 1, jj + 1, kk + 1);

        let n0 = corner(g0, x0, y0, z0);
        let n1 = corner(g1, x1, y1, z1);
        let n2 = corner(g2, x2, y2, z2);
        let n3 = corner(g3, x3, y3, z3);

        32.0 * (n0 + n1 + n2 + n3)
    }

    #[inline]
    pub fn evaluate_at(&self, p: [f64; 3]) -> f64 {
        self.evaluate(p[0], p[1], p[2])
    }

    /// Noise remapped to [0, 1], for tint grain and clustering thresholds.
    #[inline]
    pub fn unit_at(&self, p: [f64; 3], frequency: f64) -> f64 {
        let v = self.evaluate(p[0] * frequency, p[1] * frequency, p[2] * frequency);
        ((v + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

#[inline]
fn corner(g: usize, x: f64, y: f64, z: f64) -> f64 {
    let t = 0.6 - x * x - y * y - z * z;
    if t < 0.0 {
        0.0
    } else {
        let grad = GRAD3[g];
        let t2 = t * t;
        t2 * t2 * (grad[0] * x + grad[1] * y + grad[2] * z)
    }
}

/// Fractal Brownian motion: lacunarity 2, amplitude decays by `gain` per
/// octave, normalized by the amplitude sum so the result stays in [-1, 1].
pub fn fractal_sum(
    field: &CoherentNoiseField,
    p: [f64; 3],
    frequency: f64,
    octaves: u32,
    gain: f64,
) -> f64 {
    let mut sum = 0.0;
    let mut amp = 1.0;
    let mut freq = frequency;
    let mut norm = 0.0;
    for i in 0..octaves {
        let o = i as f64;
        sum += field.evaluate(
            p[0] * freq + OCTAVE_SHIFT[0] * o,
            p[1] * freq + OCTAVE_SHIFT[1] * o,
            p[2] * freq + OCTAVE_SHIFT[2] * o,
        ) * amp;
        norm += amp;
        amp *= gain;
        freq *= 2.0;
    }
    if norm > 0.0 { sum / norm } else { 0.0 }
}

/// Sharp crests where `v` crosses zero.
#[inline]
pub fn ridge(v: f64) -> f64 {
    let r = 1.0 - v.abs();
    r * r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_is_a_shuffle_of_all_bytes() {
        let field = CoherentNoiseField::new(7);
        let mut seen = [false; 256];
        for &v in &field.perm[..256] {
            seen[v as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(&field.perm[..256], &field.perm[256..]);
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let a = CoherentNoiseField::new(42);
        let b = CoherentNoiseField::new(42);
        for i in 0..200 {
            let p = sphere_point(i as f64 * 0.013, i as f64 * 0.029);
            assert_eq!(a.evaluate_at(p).to_bits(), b.evaluate_at(p).to_bits());
        }
    }

    #[test]
    fn different_seeds_differ() {
        let a = CoherentNoiseField::new(1);
        let b = CoherentNoiseField::new(2);
        let differs = (0..50).any(|i| {
            let p = [i as f64 * 0.37, 0.5, -0.2];
            a.evaluate_at(p) != b.evaluate_at(p)
        });
        assert!(differs);
    }

    #[test]
    fn output_is_bounded_and_continuous() {
        let field = CoherentNoiseField::new(3);
        let mut prev = field.evaluate(0.0, 0.3, 0.7);
        for i in 1..5000 {
            let x = i as f64 * 0.001;
            let v = field.evaluate(x, 0.3, 0.7);
            assert!(v.abs() <= 1.05, "noise out of range: {v}");
            assert!((v - prev).abs() < 0.05, "jump at x={x}");
            prev = v;
        }
    }

    #[test]
    fn fractal_sum_supports_octaves_one_to_six() {
        let field = CoherentNoiseField::new(11);
        let p = sphere_point(1.1, 2.3);
        for octaves in 1..=6 {
            let v = fractal_sum(&field, p, 1.5, octaves, 0.5);
            assert!(v.abs() <= 1.05);
        }
        assert_eq!(fractal_sum(&field, p, 1.5, 0, 0.5), 0.0);
    }

    #[test]
    fn sphere_point_wraps_longitude() {
        let a = sphere_point(1.0, 0.0);
        let b = sphere_point(1.0, std::f64::consts::TAU);
        for k in 0..3 {
            assert!((a[k] - b[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn ridge_peaks_at_zero() {
        assert_eq!(ridge(0.0), 1.0);
        assert_eq!(ridge(1.0), 0.0);
        assert_eq!(ridge(-1.0), 0.0);
    }
}
