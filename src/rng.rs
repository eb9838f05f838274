/// Deterministic seeding and random streams. Integer-only mixing so every
/// platform reproduces the same surfaces bit for bit.

const GOLDEN_32: u32 = 0x9E3779B9;
const GOLDEN_64: u64 = 0x9E3779B97F4A7C15;

#[inline]
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(GOLDEN_64);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[inline]
pub fn mix32(mut z: u32) -> u32 {
    z = (z ^ (z >> 16)).wrapping_mul(0x7FEB352D);
    z = (z ^ (z >> 15)).wrapping_mul(0x846CA68B);
    z ^ (z >> 16)
}

/// Surface seed of a body. `seed_x`/`seed_y` are the originating star
/// position; moons pass their index in `satellite_index`, planets pass 0.
pub fn body_seed(seed_x: f64, seed_y: f64, body_index: u32, satellite_index: u32) -> u32 {
    let mut h = splitmix64(seed_x.to_bits());
    h = splitmix64(h ^ seed_y.to_bits());
    h = splitmix64(h ^ body_index as u64);
    h = splitmix64(h ^ ((satellite_index as u64) << 32));
    (h ^ (h >> 32)) as u32
}

/// Derive an independent sub-seed, e.g. one per noise layer.
#[inline]
pub fn salted(seed: u32, salt: u32) -> u32 {
    mix32(seed ^ salt.wrapping_mul(GOLDEN_32))
}

/// Float stream over a Weyl sequence finalized by `mix32`.
#[derive(Clone, Debug)]
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(GOLDEN_32);
        mix32(self.state)
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / 4294967296.0
    }

    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    /// Uniform integer in [0, n). `n` must be non-zero.
    pub fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SeededRandom::new(1234);
        let mut b = SeededRandom::new(1234);
        for _ in 0..1000 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn stream_stays_in_unit_interval() {
        let mut rng = SeededRandom::new(0);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn below_respects_bound() {
        let mut rng = SeededRandom::new(99);
        for n in 1..300 {
            assert!(rng.below(n) < n);
        }
    }

    #[test]
    fn body_seed_depends_on_every_coordinate() {
        let base = body_seed(0.123, 0.456, 0, 0);
        assert_eq!(base, body_seed(0.123, 0.456, 0, 0));
        assert_ne!(base, body_seed(0.124, 0.456, 0, 0));
        assert_ne!(base, body_seed(0.123, 0.457, 0, 0));
        assert_ne!(base, body_seed(0.123, 0.456, 1, 0));
        assert_ne!(base, body_seed(0.123, 0.456, 0, 1));
    }

    #[test]
    fn first_values_are_pinned() {
        // Reference values; changing the mixer changes every generated planet.
        let mut rng = SeededRandom::new(0);
        let first = rng.next_u32();
        assert_eq!(first, mix32(GOLDEN_32));
        let second = rng.next_u32();
        assert_eq!(second, mix32(GOLDEN_32.wrapping_mul(2)));
    }
}
