//! NDVI API Server
//!
//! Serves on-demand vegetation-health data derived from satellite
//! reflectance imagery: map tiles for web maps, point samples for the
//! advisory UI, and templated agronomic recommendations.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use ee_client::RestBackend;
use ndvi_api::config::{RecommenderConfig, ServiceConfig};
use ndvi_api::handlers;
use ndvi_api::state::AppState;

/// NDVI API Server
#[derive(Parser, Debug)]
#[command(name = "ndvi-api")]
#[command(about = "Vegetation-health tile and point-sample server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8084", env = "NDVI_LISTEN_ADDR")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Path to the service-account key JSON file
    #[arg(long, env = "NDVI_SERVICE_ACCOUNT_KEY")]
    service_account_key: PathBuf,

    /// Project identifier for backend evaluation calls
    #[arg(long, env = "NDVI_PROJECT")]
    project: String,

    /// Base URL of the imagery evaluation backend
    #[arg(long, env = "NDVI_BACKEND_URL", default_value = RestBackend::DEFAULT_BASE_URL)]
    backend_url: String,

    /// Text-generation endpoint for the recommendation path
    #[arg(
        long,
        env = "NDVI_GENERATION_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
    )]
    generation_url: String,

    /// API key for the text-generation endpoint
    #[arg(long, env = "NDVI_GENERATION_API_KEY")]
    generation_api_key: Option<String>,

    /// Number of worker threads
    #[arg(long, env = "NDVI_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build runtime with configured threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .expect("Failed to create Tokio runtime");

    runtime.block_on(async move {
        run_server(args).await;
    });
}

async fn run_server(args: Args) {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    info!("Starting NDVI API server");

    // Configuration is loaded before anything request-specific; a missing
    // or malformed key file stops the process here.
    let config = match ServiceConfig::load(
        &args.service_account_key,
        &args.project,
        args.backend_url.clone(),
        RecommenderConfig {
            api_url: args.generation_url.clone(),
            api_key: args.generation_api_key.clone(),
        },
    ) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install metrics recorder");

    let state = match AppState::new(config, metrics_handle) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Failed to initialize application state: {:#}", e);
            std::process::exit(1);
        }
    };

    // Build router
    let app = Router::new()
        // Map tiles: redirect mode and server-side proxy mode
        .route("/tiles/:z/:x/:y", get(handlers::tiles::tile_redirect_handler))
        .route(
            "/tiles/proxy/:z/:x/:y",
            get(handlers::tiles::tile_proxy_handler),
        )
        // Point sample
        .route("/ndvi/value", get(handlers::value::ndvi_value_handler))
        // Recommendation (CORS pre-flight handled by the CORS layer)
        .route("/recommend", post(handlers::recommend::recommend_handler))
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    // Parse listen address
    let addr: SocketAddr = args.listen.parse().expect("Invalid listen address");

    info!("NDVI API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
