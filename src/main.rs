//! AxoReel server binary.
//!
//! A small self-hosted media manager: upload, list, stream (with byte-range
//! seeking), download and delete files in one flat directory, guarded by a
//! single Basic auth credential pair. The main entry point builds the Axum
//! router and runs the HTTP listener until shutdown.

mod atomic;
mod auth;
mod background;
mod config;
mod error;
mod frontend;
mod http;
mod logging;
mod range;
mod sanitize;
mod storage;
mod stream;
mod upload;
mod version;
mod videos;

use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::Request;
use axum::routing::get;
use axum::{Router, middleware};
use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::auth::AuthConfig;
use crate::background::spawn_background_tasks;
use crate::config::Args;
use crate::http::{build_cors_layer, client_ip};
use crate::storage::MediaStore;
use crate::upload::UploadConfig;

shadow!(build);

/// Starts the AxoReel server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let storage = Arc::new(MediaStore::new(PathBuf::from(&args.video_dir)));
    let auth_config = Arc::new(AuthConfig {
        username: args.auth_user.clone(),
        password: args.auth_pass.clone(),
    });
    let upload_config = Arc::new(UploadConfig {
        max_size: args.upload_max_size,
        temp_ttl: Duration::from_secs(args.upload_temp_ttl_secs),
    });
    storage.ensure_root().await?;

    let mut app = build_app(storage.clone(), auth_config, upload_config.clone());
    if let Some(cors_layer) = build_cors_layer(args.cors_origins.as_deref()) {
        app = app.layer(cors_layer);
    }

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();

    info!("🚀 Media server running at http://{}", addr);
    info!(video_dir = %storage.root_path().display(), "serving media directory");

    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    spawn_background_tasks(storage, upload_config);
    tokio::select! {
        result = server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

/// Builds the application router with all shared state attached.
fn build_app(
    storage: Arc<MediaStore>,
    auth_config: Arc<AuthConfig>,
    upload_config: Arc<UploadConfig>,
) -> Router {
    Router::new()
        .route(
            "/api/videos",
            get(videos::list_videos).post(upload::upload_video),
        )
        .route(
            "/api/videos/{name}",
            get(videos::stream_video).delete(videos::delete_video),
        )
        .route("/api/videos/{name}/download", get(videos::download_video))
        .route("/api/version", get(version::get_version_info))
        .fallback(frontend::serve_frontend)
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn(auth::auth_middleware))
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip = client_ip(request),
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(storage))
        .layer(Extension(auth_config))
        .layer(Extension(upload_config))
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
