//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Helpers for the rewards counters (registrations, orders, points)

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::db::PointsType;
use crate::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const REGISTRATIONS_TOTAL: &str = "registrations_total";
pub const ORDERS_TOTAL: &str = "orders_total";
pub const POINTS_AWARDED_TOTAL: &str = "points_awarded_total";
pub const POINTS_SPENT_TOTAL: &str = "points_spent_total";
pub const MEMBERS_TOTAL: &str = "members_total";

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Must be called at most once per process.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        REGISTRATIONS_TOTAL,
        "Registrations by outcome (success/failed)"
    );
    describe_counter!(ORDERS_TOTAL, "Orders by outcome (success/failed)");
    describe_counter!(POINTS_AWARDED_TOTAL, "Points credited, by ledger type");
    describe_counter!(POINTS_SPENT_TOTAL, "Points debited from member balances");
    describe_gauge!(MEMBERS_TOTAL, "Number of registered members");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// This endpoint is accessible without authentication.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not initialized".to_string(),
        ),
    }
}

async fn update_gauge_metrics(state: &AppState) {
    if let Ok(count) = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await
    {
        gauge!(MEMBERS_TOTAL).set(count as f64);
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Use the matched route template so ids do not explode label cardinality
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

pub fn record_registration(success: bool) {
    let status = if success { "success" } else { "failed" };
    counter!(REGISTRATIONS_TOTAL, "status" => status).increment(1);
}

pub fn record_order(success: bool) {
    let status = if success { "success" } else { "failed" };
    counter!(ORDERS_TOTAL, "status" => status).increment(1);
}

pub fn record_points_awarded(points_type: PointsType, points: i64) {
    if points > 0 {
        counter!(POINTS_AWARDED_TOTAL, "type" => points_type.as_str()).increment(points as u64);
    }
}

pub fn record_points_spent(points: i64) {
    if points > 0 {
        counter!(POINTS_SPENT_TOTAL).increment(points as u64);
    }
}
