//! Scrape handler.

use std::time::Duration;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use summary_scraper::prometheus::{self, render_prometheus};
use summary_scraper::Collector;

use crate::ApiState;

/// Header Prometheus uses to announce its scrape timeout.
pub const SCRAPE_TIMEOUT_HEADER: &str = "x-prometheus-scrape-timeout-seconds";

/// GET /metrics
pub async fn scrape<C: Collector>(
    State(state): State<ApiState<C>>,
    headers: HeaderMap,
) -> Response {
    let descs = state.collector.describe();

    let samples = match scrape_deadline(&headers) {
        Some(deadline) => match tokio::time::timeout(deadline, state.collector.collect()).await {
            Ok(samples) => samples,
            Err(_) => {
                warn!(deadline_ms = deadline.as_millis() as u64, "collection exceeded scrape deadline");
                return (StatusCode::SERVICE_UNAVAILABLE, "collection exceeded scrape deadline\n")
                    .into_response();
            }
        },
        None => state.collector.collect().await,
    };

    debug!(samples = samples.len(), "scrape served");
    (
        StatusCode::OK,
        [(CONTENT_TYPE, prometheus::CONTENT_TYPE)],
        render_prometheus(&descs, &samples),
    )
        .into_response()
}

/// Deadline announced by the scraper, if any and if sane.
fn scrape_deadline(headers: &HeaderMap) -> Option<Duration> {
    let secs: f64 = headers
        .get(SCRAPE_TIMEOUT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    if secs <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
