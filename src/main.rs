use std::path::PathBuf;
use std::time::Instant;

use planetgen::config::GeneratorConfig;
use planetgen::relief::ReliefSynthesizer;
use planetgen::{render, SurfaceGenerator, SurfaceRequest, Timing};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let planet_type = args.get(1).cloned().unwrap_or_else(|| "terran".to_string());
    let seed_x: f64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(0.123);
    let seed_y: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.456);
    let body_index: u32 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
    let resolution: u32 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(1024);
    let development: f32 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(0.5);
    let out_dir: PathBuf = args
        .get(7)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("artifacts"));

    std::fs::create_dir_all(&out_dir).expect("failed to create output directory");

    let config = match std::env::var_os("PLANETGEN_CONFIG") {
        Some(path) => GeneratorConfig::load(path.as_ref()).expect("failed to load config"),
        None => GeneratorConfig::default(),
    };
    let chunk_rows = config.default_chunk_rows;
    let generator = SurfaceGenerator::new(config).expect("invalid generator config");
    let request = SurfaceRequest::new(seed_x, seed_y, body_index, &planet_type, resolution)
        .development(development);

    eprintln!(
        "Generating {} surface {}x{} with seed={} (development {:.2})",
        planet_type,
        resolution,
        resolution,
        request.seed(),
        development
    );

    let mut timings = Vec::new();

    // 1. Preview
    let t = Instant::now();
    let preview_resolution = generator.config().preview_resolution.min(resolution);
    let preview = generator
        .generate_surface(&request.at_resolution(preview_resolution))
        .expect("preview generation failed");
    timings.push(Timing {
        name: "preview",
        ms: t.elapsed().as_secs_f64() * 1000.0,
    });

    // 2. Chunked upgrade
    let t = Instant::now();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime");
    let raster = runtime
        .block_on(generator.generate_surface_upgrade(&request, chunk_rows))
        .expect("surface upgrade failed");
    timings.push(Timing {
        name: "upgrade",
        ms: t.elapsed().as_secs_f64() * 1000.0,
    });

    let profile = generator.profiles().get(&raster.planet_type);
    let side = raster.width;

    eprintln!("\nTimings:");
    for t in &timings {
        eprintln!("  {:20} {:8.1} ms", t.name, t.ms);
    }
    eprintln!("Urban pixels: {}", raster.urban_count());

    let save = |name: &str, rgba: &[u8], w: usize, h: usize| {
        let path = out_dir.join(name);
        image::save_buffer(&path, rgba, w as u32, h as u32, image::ColorType::Rgba8)
            .expect("failed to save image");
        eprintln!("Saved {}", path.display());
    };

    save("preview.png", &preview.rgba, preview.width, preview.height);
    save("surface.png", &raster.rgba, side, side);
    save("urban.png", &render::render_urban_mask(&raster), side, side);
    save("biomes.png", &render::render_biome_map(&raster, &profile), side, side);
    save("night.png", &render::render_night_lights(&raster, 0.0), side, side);

    let relief = ReliefSynthesizer::new(request.seed(), profile.relief);
    let field = relief.sample_band(side, side, 0..side);
    save("heightmap.png", &render::render_heightmap(&field), side, side);

    eprintln!("\nDone.");
}
