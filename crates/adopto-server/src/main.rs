mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use adopto_api::uploads::UploadStore;
use adopto_api::{AppState, AppStateInner, router, sweep};
use adopto_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "adopto=debug,adopto_api=debug,adopto_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::load()?;

    // A database that cannot be opened is fatal
    let db = Database::open(&config.db_path)?
        .with_replay_window(Duration::from_secs(config.idempotency_window_secs));
    let uploads = UploadStore::new(config.uploads_dir.clone(), config.max_upload_bytes).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        uploads,
        reject_extra_files: config.reject_extra_files,
    });

    // Background orphan sweep
    tokio::spawn(sweep::run_sweep_loop(
        state.clone(),
        Duration::from_secs(config.sweep_interval_secs.get()),
        Duration::from_secs(config.sweep_grace_secs),
    ));

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(&config.cors_origin)?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let app = router::build(state, config.cookie_secure)
        .fallback_service(ServeDir::new(&config.public_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Adopto server listening on {}", addr);
    info!("Serving site from {}", config.public_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
