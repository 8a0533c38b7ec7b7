//! HTTP service.
//!
//! | Route | Body | Response |
//! |---|---|---|
//! | `POST /api/process` | multipart: `image` + optional text fields | `{base}-responsive.zip` |
//! | `POST /api/batch` | multipart: repeated `images` + optional text fields | `responsive-images.zip` |
//! | `GET /health` | none | `{"status": "ok", "version": …}` |
//!
//! Optional text fields: `widths`, `formats`, `quality_webp`, `quality_avif`,
//! `basename`, `sizes`. Errors are `{"error": "…"}` with a status code chosen
//! in [`error`].
//!
//! ## Limits
//!
//! - Request body capped at a full batch of maximum-size files
//!   ([`LimitsConfig::body_limit`](crate::config::LimitsConfig::body_limit)).
//! - Per-file size and batch count checked before any decoding.
//! - Fixed-window per-IP request budget on `/api/*` (429).
//! - At most `max_concurrent_jobs` requests encoding at once (503 otherwise).
//! - Overall request timeout (408).

mod app;
mod error;
mod handlers;
mod limits;
mod state;

pub use app::create_app;
pub use error::AppError;
pub use limits::RateLimiter;
pub use state::AppState;

use std::net::SocketAddr;
use tokio::{net::TcpListener, signal};

use crate::config::ServiceConfig;
use crate::imaging::RustCodec;

/// Bind the configured address and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &ServiceConfig) -> std::io::Result<()> {
    let state = AppState::new(Box::new(RustCodec::new()), config);
    let app = create_app(state);

    let listener = TcpListener::bind(config.server.address()).await?;
    tracing::info!(
        max_jobs = config.limits.max_concurrent_jobs,
        requests_per_minute = config.limits.requests_per_minute,
        "listening on {}",
        listener.local_addr()?
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
