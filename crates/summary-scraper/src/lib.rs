//! summary-scraper — pod ephemeral-storage metrics from the kubelet.
//!
//! Fetches the kubelet `stats/summary` document over TLS, decodes the
//! parts that matter, and turns them into gauge samples on demand.
//!
//! # Architecture
//!
//! ```text
//! SummaryCollector (Collector)
//!   ├── describe() → static descriptors, no I/O
//!   └── collect()
//!       ├── SummarySource::fetch() ← KubeletFetcher → HttpsClient (rustls)
//!       ├── Summary::decode()
//!       └── one gauge per pod with ephemeral storage,
//!           or one error counter sample on the first failure
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for the scrape endpoint
//! ```

pub mod client;
pub mod collector;
pub mod error;
pub mod fetcher;
pub mod metric;
pub mod prometheus;
pub mod summary;
pub mod tls;

pub use client::{HttpsClient, Target};
pub use collector::{Collector, SummaryCollector};
pub use error::{ErrorKind, ScrapeError, ScrapeResult};
pub use fetcher::{KUBELET_PORT, KubeletFetcher, SummarySource};
pub use metric::{Desc, ErrorTally, MetricKind, Sample};
pub use prometheus::render_prometheus;
pub use summary::Summary;
pub use tls::{TlsOptions, client_config};
