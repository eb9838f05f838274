pub mod biome;
pub mod cache;
pub mod compositor;
pub mod config;
pub mod error;
pub mod grid;
pub mod noise;
pub mod profile;
pub mod relief;
pub mod render;
pub mod rng;
pub mod scheduler;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use cache::{CacheKey, TextureCache};
use compositor::SurfaceCompositor;
use config::GeneratorConfig;
use profile::ProfileRegistry;

pub use compositor::SurfaceRaster;
pub use error::SurfaceError;

/// What to paint: a body identified by its star position and indices.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceRequest {
    pub seed_x: f64,
    pub seed_y: f64,
    pub body_index: u32,
    pub planet_type: String,
    /// Edge length in pixels; a power of two.
    pub resolution: u32,
    pub satellite_index: u32,
    /// 0 = untouched wilderness, 1 = fully developed.
    pub development_level: f32,
}

impl SurfaceRequest {
    pub fn new(seed_x: f64, seed_y: f64, body_index: u32, planet_type: &str, resolution: u32) -> Self {
        Self {
            seed_x,
            seed_y,
            body_index,
            planet_type: planet_type.to_string(),
            resolution,
            satellite_index: 0,
            development_level: 0.0,
        }
    }

    pub fn satellite(mut self, satellite_index: u32) -> Self {
        self.satellite_index = satellite_index;
        self
    }

    pub fn development(mut self, development_level: f32) -> Self {
        self.development_level = development_level;
        self
    }

    pub fn at_resolution(&self, resolution: u32) -> Self {
        Self {
            resolution,
            ..self.clone()
        }
    }

    pub fn seed(&self) -> u32 {
        rng::body_seed(self.seed_x, self.seed_y, self.body_index, self.satellite_index)
    }
}

pub struct Timing {
    pub name: &'static str,
    pub ms: f64,
}

/// Entry point: owns the planet types, the raster cache and the settings.
pub struct SurfaceGenerator {
    config: GeneratorConfig,
    profiles: ProfileRegistry,
    cache: TextureCache,
    compositions: AtomicU64,
}

impl SurfaceGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, SurfaceError> {
        config.validate()?;
        let mut profiles = ProfileRegistry::builtin();
        profiles.extend(config.profiles.clone())?;
        Ok(Self {
            config,
            profiles,
            cache: TextureCache::new(),
            compositions: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    pub fn cache(&self) -> &TextureCache {
        &self.cache
    }

    /// Number of rasters actually composed (cache misses).
    pub fn composition_count(&self) -> u64 {
        self.compositions.load(Ordering::Relaxed)
    }

    /// Zero, non-power-of-two and oversized resolutions are caller bugs.
    pub fn check_resolution(&self, resolution: u32) -> Result<usize, SurfaceError> {
        if resolution == 0
            || !resolution.is_power_of_two()
            || resolution > self.config.max_resolution
        {
            return Err(SurfaceError::InvalidResolution { resolution });
        }
        Ok(resolution as usize)
    }

    /// Compose the whole raster now, or return the cached one.
    pub fn generate_surface(&self, request: &SurfaceRequest) -> Result<Arc<SurfaceRaster>, SurfaceError> {
        let (key, compositor) = self.prepare(request)?;
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let start = Instant::now();
        let raster = compositor.compose()?;
        self.compositions.fetch_add(1, Ordering::Relaxed);
        debug!(
            planet_type = %raster.planet_type,
            resolution = request.resolution,
            ms = start.elapsed().as_secs_f64() * 1000.0,
            "composed surface"
        );
        Ok(self.cache.insert(key, Arc::new(raster)))
    }

    /// Compose `chunk_rows` rows at a time, yielding to the runtime between
    /// chunks so the caller's loop keeps running.
    pub async fn generate_surface_upgrade(
        &self,
        request: &SurfaceRequest,
        chunk_rows: usize,
    ) -> Result<Arc<SurfaceRaster>, SurfaceError> {
        let never = AtomicBool::new(false);
        self.upgrade(request, chunk_rows, &never).await
    }

    /// Drop every memoized raster. Returns how many were held.
    pub fn clear_surface_cache(&self) -> usize {
        let n = self.cache.clear();
        info!(entries = n, "cleared surface cache");
        n
    }

    pub(crate) async fn upgrade(
        &self,
        request: &SurfaceRequest,
        chunk_rows: usize,
        cancelled: &AtomicBool,
    ) -> Result<Arc<SurfaceRaster>, SurfaceError> {
        let (key, compositor) = self.prepare(request)?;
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let start = Instant::now();
        let mut buffers = compositor.allocate().inspect_err(|e| {
            warn!(resolution = request.resolution, "surface upgrade failed: {}", e);
        })?;

        let height = compositor.height();
        let step = chunk_rows.max(1);
        let mut row = 0;
        let mut chunks = 0u32;
        while row < height {
            if cancelled.load(Ordering::Acquire) {
                return Err(SurfaceError::Cancelled);
            }
            let end = (row + step).min(height);
            compositor.compose_rows(row..end, &mut buffers);
            chunks += 1;
            row = end;
            if row < height {
                tokio::task::yield_now().await;
            }
        }

        let raster = compositor.finish(buffers);
        self.compositions.fetch_add(1, Ordering::Relaxed);
        debug!(
            planet_type = %raster.planet_type,
            resolution = request.resolution,
            chunks,
            ms = start.elapsed().as_secs_f64() * 1000.0,
            "composed surface upgrade"
        );
        Ok(self.cache.insert(key, Arc::new(raster)))
    }

    fn prepare(&self, request: &SurfaceRequest) -> Result<(CacheKey, SurfaceCompositor), SurfaceError> {
        let resolution = self.check_resolution(request.resolution)?;
        let profile = self.profiles.get(&request.planet_type);
        let development = request.development_level.clamp(0.0, 1.0);
        let key = CacheKey::new(
            request.seed_x,
            request.seed_y,
            request.body_index,
            request.satellite_index,
            &profile.name,
            request.resolution,
            development,
        );
        let compositor = SurfaceCompositor::new(profile, resolution, request.seed(), development);
        Ok((key, compositor))
    }
}

impl Default for SurfaceGenerator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default()).expect("default generator config is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_resolutions() {
        let generator = SurfaceGenerator::default();
        for resolution in [0, 3, 100, 16384] {
            let request = SurfaceRequest::new(0.1, 0.2, 0, "terran", resolution);
            assert_eq!(
                generator.generate_surface(&request).err(),
                Some(SurfaceError::InvalidResolution { resolution })
            );
        }
        assert_eq!(generator.composition_count(), 0);
    }

    #[test]
    fn cache_hit_skips_composition() {
        let generator = SurfaceGenerator::default();
        let request = SurfaceRequest::new(0.1, 0.2, 3, "desert", 32).development(0.5);
        let a = generator.generate_surface(&request).unwrap();
        let b = generator.generate_surface(&request).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(generator.composition_count(), 1);

        assert_eq!(generator.clear_surface_cache(), 1);
        let c = generator.generate_surface(&request).unwrap();
        assert_eq!(generator.composition_count(), 2);
        assert_eq!(*a, *c);
    }

    #[test]
    fn clamped_development_shares_cache_entry() {
        let generator = SurfaceGenerator::default();
        let base = SurfaceRequest::new(0.3, 0.3, 0, "terran", 16);
        generator.generate_surface(&base.clone().development(1.0)).unwrap();
        generator.generate_surface(&base.development(4.0)).unwrap();
        assert_eq!(generator.composition_count(), 1);
    }

    #[test]
    fn unknown_type_renders_as_rocky() {
        let generator = SurfaceGenerator::default();
        let raster = generator
            .generate_surface(&SurfaceRequest::new(0.1, 0.1, 0, "plasma", 16))
            .unwrap();
        assert_eq!(raster.planet_type, "rocky");
        let rocky = generator
            .generate_surface(&SurfaceRequest::new(0.1, 0.1, 0, "rocky", 16))
            .unwrap();
        assert!(Arc::ptr_eq(&raster, &rocky));
    }

    #[test]
    fn satellites_get_their_own_surface() {
        let generator = SurfaceGenerator::default();
        let planet = SurfaceRequest::new(0.5, 0.5, 1, "rocky", 16);
        let moon = planet.clone().satellite(1);
        assert_ne!(planet.seed(), moon.seed());
        let a = generator.generate_surface(&planet).unwrap();
        let b = generator.generate_surface(&moon).unwrap();
        assert_ne!(a.rgba, b.rgba);
    }

    #[tokio::test]
    async fn upgrade_matches_synchronous_raster() {
        let generator = SurfaceGenerator::default();
        let request = SurfaceRequest::new(0.7, 0.1, 2, "terran", 32).development(0.8);
        let upgraded = generator.generate_surface_upgrade(&request, 7).await.unwrap();
        generator.clear_surface_cache();
        let direct = generator.generate_surface(&request).unwrap();
        assert_eq!(*upgraded, *direct);
    }

    #[tokio::test]
    async fn cancelled_upgrade_stops_between_chunks() {
        let generator = SurfaceGenerator::default();
        let request = SurfaceRequest::new(0.7, 0.1, 2, "terran", 32);
        let cancelled = AtomicBool::new(true);
        let result = generator.upgrade(&request, 4, &cancelled).await;
        assert_eq!(result.err(), Some(SurfaceError::Cancelled));
        assert!(generator.cache().is_empty());
    }
}
