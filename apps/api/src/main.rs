mod assessments;
mod catalog;
mod config;
mod errors;
mod fallback;
mod models;
mod routes;
mod sessions;
mod state;
mod storage;
mod uploads;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::QuestionCatalog;
use crate::config::Config;
use crate::fallback::LocalCache;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::s3::S3ObjectStore;
use crate::storage::ObjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Canvass API v{}", env!("CARGO_PKG_VERSION"));

    // Question catalog is externally owned; without one, completion metrics
    // stay at zero.
    let catalog = match &config.question_catalog_path {
        Some(path) => QuestionCatalog::from_json_file(path)?,
        None => QuestionCatalog::default(),
    };
    info!("Question catalog loaded ({} questions)", catalog.len());

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let store: Arc<dyn ObjectStore> =
        Arc::new(S3ObjectStore::new(s3, config.s3_bucket.clone()));
    info!("S3 object store initialized (bucket: {})", config.s3_bucket);

    // Local mirror for degraded-mode writes
    let fallback = Arc::new(LocalCache::new(&config.fallback_cache_dir)?);
    if fallback.is_degraded() {
        info!("Fallback cache has journalled writes awaiting reconciliation");
    }

    // Build app state
    let state = AppState {
        store,
        fallback,
        catalog: Arc::new(catalog),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // browser clients upload cross-origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "canvass-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
