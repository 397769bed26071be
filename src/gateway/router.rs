//! HTTP router and handlers

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::debug;

use crate::availability::AggregateResult;
use crate::hours::HoursSummary;
use crate::service::{CacheReport, LibTools};
use crate::upstream::AvailabilityMode;
use crate::Result;

/// Shared application state
pub struct AppState {
    /// Read-through LibApps service
    pub service: Arc<LibTools>,
}

/// Create the router, with site routes nested under `mount_path`
pub fn create_router(state: Arc<AppState>, mount_path: &str, timeout: Duration) -> Router {
    let sites = Router::new()
        .route("/{site}/details", get(details_handler))
        .route("/{site}/availability", get(availability_handler))
        .route("/{site}/hours/today", get(hours_today_handler));

    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler));

    let mount_path = mount_path.trim_end_matches('/');
    let router = if mount_path.is_empty() {
        router.merge(sites)
    } else {
        router.nest(mount_path, sites)
    };

    router
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Root route, answers `true`
async fn root_handler() -> Json<bool> {
    Json(true)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "token_cached": state.service.upstream().tokens().has_valid_token(),
        "sites": state.service.sites().iter().map(|s| s.slug.as_str()).collect::<Vec<_>>(),
    }))
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<CacheReport> {
    Json(state.service.cache_stats())
}

#[derive(Debug, Deserialize)]
struct DetailsQuery {
    availability: Option<String>,
}

/// GET {mount}/{site}/details - raw per-location space listings
async fn details_handler(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    Query(query): Query<DetailsQuery>,
) -> Result<Json<Vec<Value>>> {
    let mode = match query.availability.as_deref() {
        Some(raw) => raw.parse()?,
        None => AvailabilityMode::Full,
    };
    debug!(site = %site, %mode, "Details request");
    Ok(Json(state.service.site_details(&site, mode).await?))
}

/// GET {mount}/{site}/availability - grouped availability summary
async fn availability_handler(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<Json<AggregateResult>> {
    debug!(site = %site, "Availability request");
    Ok(Json(state.service.site_availability(&site).await?))
}

/// GET {mount}/{site}/hours/today - today's status and hours, or `null`
async fn hours_today_handler(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<Json<Option<HoursSummary>>> {
    debug!(site = %site, "Hours request");
    Ok(Json(state.service.site_hours_today(&site).await?))
}
