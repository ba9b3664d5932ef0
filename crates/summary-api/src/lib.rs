//! summary-api — HTTP scrape endpoint.
//!
//! Mounts a [`Collector`] at a configurable path and serves its output in
//! the Prometheus text exposition format.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` (configurable) | Describe + collect, rendered as text |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use summary_scraper::Collector;

/// Shared state for the scrape handler.
pub struct ApiState<C> {
    pub collector: Arc<C>,
}

impl<C> Clone for ApiState<C> {
    fn clone(&self) -> Self {
        Self {
            collector: Arc::clone(&self.collector),
        }
    }
}

/// Build the router serving `collector` at `metrics_path`.
pub fn build_router<C: Collector>(collector: Arc<C>, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(handlers::scrape::<C>))
        .with_state(ApiState { collector })
}
