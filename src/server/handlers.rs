//! Route handlers

use crate::config::Config;
use crate::gateway::{ProgressSnapshot, RunId};
use crate::server::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

/// Body of `POST /api/runs`
#[derive(Debug, Clone, Deserialize)]
pub struct StartRunRequest {
    pub url: String,
    pub max_pages: Option<u64>,
    pub max_depth: Option<u32>,
    pub time_budget_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRunResponse {
    pub run_id: RunId,
    pub status: String,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Starts a crawl; limits in the body override the configured ones
pub async fn start_run(
    State(state): State<AppState>,
    Json(request): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<StartRunResponse>), ApiError> {
    let config = run_config(&state.config, &request)?;
    let run_id = state.registry.start_http(request.url.trim(), &config)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartRunResponse {
            run_id,
            status: "started".to_string(),
        }),
    ))
}

fn run_config(base: &Config, request: &StartRunRequest) -> Result<Config, ApiError> {
    if request.max_pages == Some(0) {
        return Err(ApiError::BadRequest("max_pages must be >= 1".to_string()));
    }
    if request.time_budget_secs == Some(0) {
        return Err(ApiError::BadRequest(
            "time_budget_secs must be >= 1".to_string(),
        ));
    }

    let mut config = base.clone();
    if request.max_pages.is_some() {
        config.crawler.max_pages = request.max_pages;
    }
    if request.max_depth.is_some() {
        config.crawler.max_depth = request.max_depth;
    }
    if request.time_budget_secs.is_some() {
        config.crawler.time_budget_secs = request.time_budget_secs;
    }
    Ok(config)
}

pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<ProgressSnapshot>> {
    Json(state.registry.list())
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    Ok(Json(state.registry.snapshot(run_id)?))
}

pub async fn stop_run(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    Ok(Json(state.registry.request_stop(run_id)?))
}

/// The JSON graph, byte-identical across requests for a finished run
pub async fn sitemap_json(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state.registry.documents(run_id)?;
    let json = documents.graph_json()?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}

pub async fn sitemap_markdown(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state.registry.documents(run_id)?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        documents.outline,
    ))
}

/// Server-sent events for one run
///
/// Opens with a `snapshot` event, then relays `started`, `page` and
/// `finished` events. The stream ends after `finished`, or right after the
/// snapshot when the run is already terminal.
pub async fn run_events(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let (snapshot, receiver) = state.registry.subscribe(run_id)?;
    let done = snapshot.terminal;

    let initial = stream::once(async move { Event::default().event("snapshot").json_data(&snapshot) });

    let updates = stream::unfold((receiver, done), |(mut receiver, done)| async move {
        if done {
            return None;
        }
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    let sse = Event::default().event(event.name()).json_data(&event);
                    return Some((sse, (receiver, terminal)));
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("Event subscriber lagged, {} events dropped", missed);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(initial.chain(updates)).keep_alive(KeepAlive::default()))
}
