//! Interactive HTTP endpoint
//!
//! A small JSON API over the progress gateway:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/api/health` | Liveness |
//! | POST | `/api/runs` | Start a run |
//! | GET | `/api/runs` | List runs |
//! | GET | `/api/runs/:id` | Progress snapshot |
//! | POST | `/api/runs/:id/stop` | Request stop |
//! | GET | `/api/runs/:id/events` | Live progress (server-sent events) |
//! | GET | `/api/runs/:id/sitemap.json` | Graph of a finished run |
//! | GET | `/api/runs/:id/sitemap.md` | Outline of a finished run |
//!
//! Cross-origin requests are allowed from any origin.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{StartRunRequest, StartRunResponse};

use crate::config::Config;
use crate::gateway::RunRegistry;
use crate::MapperError;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// How often finished runs are checked against their retention
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared state of the HTTP endpoint
#[derive(Clone)]
pub struct AppState {
    pub registry: RunRegistry,
    /// Defaults for runs started through the API
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            registry: RunRegistry::with_retention(config.server.run_retention()),
            config: Arc::new(config),
        }
    }
}

/// Builds the API router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/runs", get(handlers::list_runs).post(handlers::start_run))
        .route("/api/runs/:id", get(handlers::get_run))
        .route("/api/runs/:id/stop", post(handlers::stop_run))
        .route("/api/runs/:id/events", get(handlers::run_events))
        .route("/api/runs/:id/sitemap.json", get(handlers::sitemap_json))
        .route("/api/runs/:id/sitemap.md", get(handlers::sitemap_markdown))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves the API until `shutdown` completes, then stops every run
///
/// # Arguments
///
/// * `config` - Bind address and defaults for new runs
/// * `shutdown` - Resolves when the server should stop accepting requests
pub async fn serve<S>(config: Config, shutdown: S) -> Result<(), MapperError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let bind = config.server.bind.clone();
    let state = AppState::new(config);
    let registry = state.registry.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    let sweeper = CancellationToken::new();
    tokio::spawn(sweep_finished_runs(registry.clone(), sweeper.clone()));

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutting down, stopping all runs");
            registry.stop_all();
        })
        .await;

    sweeper.cancel();
    result?;
    Ok(())
}

/// Periodically drops finished runs past their retention
async fn sweep_finished_runs(registry: RunRegistry, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                registry.cleanup();
            }
            _ = cancel.cancelled() => break,
        }
    }
}
