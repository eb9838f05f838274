use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use base64::Engine;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use planetgen::config::GeneratorConfig;
use planetgen::{render, SurfaceError, SurfaceGenerator, SurfaceRequest};

#[derive(Deserialize)]
struct SurfaceParams {
    seed_x: Option<f64>,
    seed_y: Option<f64>,
    body_index: Option<u32>,
    planet_type: Option<String>,
    resolution: Option<u32>,
    satellite_index: Option<u32>,
    development_level: Option<f32>,
    sun_longitude: Option<f32>,
}

#[derive(Serialize)]
struct SurfaceResponse {
    layers: Vec<Layer>,
    timings: Vec<TimingEntry>,
    planet_type: String,
    seed: u32,
    development_level: f32,
    urban_pixels: usize,
    width: usize,
    height: usize,
}

#[derive(Serialize)]
struct Layer {
    name: String,
    data_url: String,
}

#[derive(Serialize)]
struct TimingEntry {
    name: String,
    ms: f64,
}

type ApiError = (StatusCode, String);

fn encode_png(rgba: &[u8], w: usize, h: usize) -> Result<String, ApiError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    encoder
        .write_image(rgba, w as u32, h as u32, image::ExtendedColorType::Rgba8)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("PNG encode failed: {e}")))?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&buf);
    Ok(format!("data:image/png;base64,{}", b64))
}

fn status_for(err: &SurfaceError) -> StatusCode {
    match err {
        SurfaceError::InvalidResolution { .. } | SurfaceError::Config { .. } => StatusCode::BAD_REQUEST,
        SurfaceError::Allocation { .. } => StatusCode::INSUFFICIENT_STORAGE,
        SurfaceError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn surface_handler(
    State(generator): State<Arc<SurfaceGenerator>>,
    Json(params): Json<SurfaceParams>,
) -> Result<Json<SurfaceResponse>, ApiError> {
    let planet_type = params.planet_type.unwrap_or_else(|| "terran".into());
    let request = SurfaceRequest::new(
        params.seed_x.unwrap_or(0.123),
        params.seed_y.unwrap_or(0.456),
        params.body_index.unwrap_or(0),
        &planet_type,
        params.resolution.unwrap_or(512),
    )
    .satellite(params.satellite_index.unwrap_or(0))
    .development(params.development_level.unwrap_or(0.0));
    let sun_longitude = params.sun_longitude.unwrap_or(0.0);

    tokio::task::spawn_blocking(move || {
        let t = Instant::now();
        let raster = generator
            .generate_surface(&request)
            .map_err(|e| (status_for(&e), e.to_string()))?;
        let generate_ms = t.elapsed().as_secs_f64() * 1000.0;

        let t = Instant::now();
        let profile = generator.profiles().get(&raster.planet_type);
        let (w, h) = (raster.width, raster.height);
        let layers = vec![
            Layer {
                name: "surface".into(),
                data_url: encode_png(&raster.rgba, w, h)?,
            },
            Layer {
                name: "urban".into(),
                data_url: encode_png(&render::render_urban_mask(&raster), w, h)?,
            },
            Layer {
                name: "biomes".into(),
                data_url: encode_png(&render::render_biome_map(&raster, &profile), w, h)?,
            },
            Layer {
                name: "night".into(),
                data_url: encode_png(&render::render_night_lights(&raster, sun_longitude), w, h)?,
            },
        ];
        let encode_ms = t.elapsed().as_secs_f64() * 1000.0;

        Ok::<_, ApiError>(Json(SurfaceResponse {
            layers,
            timings: vec![
                TimingEntry {
                    name: "generate".into(),
                    ms: generate_ms,
                },
                TimingEntry {
                    name: "encode".into(),
                    ms: encode_ms,
                },
            ],
            planet_type: raster.planet_type.clone(),
            seed: raster.seed,
            development_level: raster.development_level,
            urban_pixels: raster.urban_count(),
            width: w,
            height: h,
        }))
    })
    .await
    .map_err(|e| {
        error!("surface task failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?
}

async fn clear_cache_handler(State(generator): State<Arc<SurfaceGenerator>>) -> Json<serde_json::Value> {
    let cleared = generator.clear_surface_cache();
    Json(serde_json::json!({ "cleared": cleared }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => GeneratorConfig::load(&path).expect("failed to load config"),
        None => GeneratorConfig::default(),
    };
    let generator = Arc::new(SurfaceGenerator::new(config).expect("invalid generator config"));
    info!(types = ?generator.profiles().names(), "planet types loaded");

    let app = Router::new()
        .route("/api/surface", post(surface_handler))
        .route("/api/cache/clear", post(clear_cache_handler))
        .layer(CorsLayer::permissive())
        .with_state(generator);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("planetgen server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind");
    axum::serve(listener, app).await.expect("server failed");
}
