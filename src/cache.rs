use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::compositor::SurfaceRaster;

/// Identity of a finished raster. Floats are keyed by bit pattern so equal
/// requests always hash equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    seed_x: u64,
    seed_y: u64,
    body_index: u32,
    satellite_index: u32,
    planet_type: String,
    resolution: u32,
    development: u32,
}

impl CacheKey {
    pub fn new(
        seed_x: f64,
        seed_y: f64,
        body_index: u32,
        satellite_index: u32,
        planet_type: &str,
        resolution: u32,
        development_level: f32,
    ) -> Self {
        Self {
            seed_x: seed_x.to_bits(),
            seed_y: seed_y.to_bits(),
            body_index,
            satellite_index,
            planet_type: planet_type.to_string(),
            resolution,
            development: development_level.to_bits(),
        }
    }
}

/// Process-lifetime side table of finished rasters. Entries are only ever
/// dropped all at once by [`TextureCache::clear`].
#[derive(Default)]
pub struct TextureCache {
    entries: Mutex<HashMap<CacheKey, Arc<SurfaceRaster>>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<SurfaceRaster>>> {
        // Entries are immutable once inserted, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<SurfaceRaster>> {
        self.entries().get(key).cloned()
    }

    /// Store `raster` unless an entry already exists; returns the cached one.
    pub fn insert(&self, key: CacheKey, raster: Arc<SurfaceRaster>) -> Arc<SurfaceRaster> {
        self.entries().entry(key).or_insert(raster).clone()
    }

    /// Drop every entry; returns how many were held.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries();
        let n = entries.len();
        entries.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(seed: u32) -> Arc<SurfaceRaster> {
        Arc::new(SurfaceRaster {
            width: 1,
            height: 1,
            rgba: vec![0, 0, 0, 255],
            urban_mask: vec![0],
            classes: vec![0],
            seed,
            development_level: 0.0,
            planet_type: "rocky".into(),
        })
    }

    fn key(resolution: u32) -> CacheKey {
        CacheKey::new(0.5, 0.25, 2, 0, "rocky", resolution, 0.0)
    }

    #[test]
    fn first_insert_wins() {
        let cache = TextureCache::new();
        let a = cache.insert(key(64), raster(1));
        let b = cache.insert(key(64), raster(2));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.get(&key(64)).unwrap().seed, 1);
    }

    #[test]
    fn keys_distinguish_every_component() {
        let base = key(64);
        assert_ne!(base, key(128));
        assert_ne!(base, CacheKey::new(0.5, 0.25, 2, 1, "rocky", 64, 0.0));
        assert_ne!(base, CacheKey::new(0.5, 0.25, 2, 0, "gas", 64, 0.0));
        assert_ne!(base, CacheKey::new(0.5, 0.25, 2, 0, "rocky", 64, 0.5));
        assert_ne!(base, CacheKey::new(0.5, 0.26, 2, 0, "rocky", 64, 0.0));
    }

    #[test]
    fn clear_drops_everything() {
        let cache = TextureCache::new();
        cache.insert(key(64), raster(1));
        cache.insert(key(128), raster(1));
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert!(cache.get(&key(64)).is_none());
    }
}
