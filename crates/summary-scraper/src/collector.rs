//! On-demand collector for pod ephemeral-storage usage.
//!
//! Each `collect()` call runs the full pipeline once: fetch, decode, emit.
//! The first failure stops the pipeline and is reported as a single
//! sample of the cumulative error counter instead of any gauges.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{ErrorKind, ScrapeError};
use crate::fetcher::SummarySource;
use crate::metric::{Desc, ErrorTally, MetricKind, Sample};
use crate::summary::Summary;

/// Name of the per-pod ephemeral-storage gauge.
pub const STORAGE_METRIC: &str = "kube_pod_ephemeral_storage_used_bytes";

/// Name of the scrape error counter.
pub const ERRORS_METRIC: &str = "kubelet_summary_exporter_errors";

/// Pull-based metric producer.
pub trait Collector: Send + Sync + 'static {
    /// Static descriptors of every family this collector can emit. No I/O.
    fn describe(&self) -> Vec<Arc<Desc>>;

    /// Produce the current samples.
    fn collect(&self) -> impl Future<Output = Vec<Sample>> + Send;
}

/// Turns kubelet summaries into `kube_pod_ephemeral_storage_used_bytes`.
pub struct SummaryCollector<S> {
    source: S,
    storage: Arc<Desc>,
    errors: Arc<Desc>,
    tally: ErrorTally,
}

impl<S: SummarySource> SummaryCollector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            storage: Arc::new(Desc::new(
                "kube_pod",
                "",
                "ephemeral_storage_used_bytes",
                "Ephemeral storage used in bytes",
                MetricKind::Gauge,
                &["node", "namespace", "pod"],
            )),
            errors: Arc::new(Desc::new(
                "kubelet_summary_exporter",
                "",
                "errors",
                "Errors scraping kubelet stats summary",
                MetricKind::Counter,
                &["type"],
            )),
            tally: ErrorTally::new(),
        }
    }

    /// Total failed collections since construction.
    pub fn error_count(&self) -> u64 {
        self.tally.get()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn scrape(&self) -> Result<Vec<Sample>, ScrapeError> {
        let body = self.source.fetch().await?;
        let summary = Summary::decode(&body)?;

        let node = summary.node_name();
        let samples: Vec<Sample> = summary
            .ephemeral_usage()
            .map(|usage| {
                Sample::new(
                    &self.storage,
                    vec![
                        node.to_string(),
                        usage.namespace.to_string(),
                        usage.pod.to_string(),
                    ],
                    usage.used_bytes as f64,
                )
            })
            .collect();

        debug!(
            node,
            pods = summary.pods.len(),
            samples = samples.len(),
            "collected ephemeral storage"
        );
        Ok(samples)
    }

    fn failure(&self, err: &ScrapeError) -> Sample {
        let kind = err.kind();
        let total = self.tally.increment();

        match kind {
            ErrorKind::Transport | ErrorKind::Status => {
                warn!(component = "scraper", kind = %kind, total, error = %err, "stats summary scrape failed");
            }
            _ => {
                error!(component = "scraper", kind = %kind, total, error = %err, "stats summary scrape failed");
            }
        }

        Sample::new(&self.errors, vec![kind.label().to_string()], total as f64)
    }
}

impl<S: SummarySource + 'static> Collector for SummaryCollector<S> {
    fn describe(&self) -> Vec<Arc<Desc>> {
        vec![Arc::clone(&self.storage), Arc::clone(&self.errors)]
    }

    async fn collect(&self) -> Vec<Sample> {
        match self.scrape().await {
            Ok(samples) => samples,
            Err(err) => vec![self.failure(&err)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeResult;
    use bytes::Bytes;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned responses in order, repeating the last one.
    struct StubSource {
        responses: Mutex<Vec<StubResponse>>,
    }

    #[derive(Clone)]
    enum StubResponse {
        Body(&'static str),
        Status(u16),
        Timeout,
        MissingToken,
    }

    impl StubSource {
        fn new(responses: Vec<StubResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }

        fn body(body: &'static str) -> Self {
            Self::new(vec![StubResponse::Body(body)])
        }

        fn next(&self) -> StubResponse {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            }
        }
    }

    impl SummarySource for StubSource {
        async fn fetch(&self) -> ScrapeResult<Bytes> {
            match self.next() {
                StubResponse::Body(body) => Ok(Bytes::from_static(body.as_bytes())),
                StubResponse::Status(code) => Err(ScrapeError::Status(
                    http::StatusCode::from_u16(code).unwrap(),
                )),
                StubResponse::Timeout => {
                    tokio::task::yield_now().await;
                    Err(ScrapeError::Timeout(Duration::from_secs(5)))
                }
                StubResponse::MissingToken => Err(ScrapeError::TokenRead {
                    path: "/var/run/secrets/token".into(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    const ONE_POD: &str = r#"{"node":{"nodeName":"ip-1"},"pods":[{"podRef":{"name":"p1","namespace":"ns1"},"ephemeral-storage":{"usedBytes":36864,"availableBytes":92321636352}}]}"#;

    const THREE_PODS: &str = r#"{
        "node": {"nodeName": "node-a"},
        "pods": [
            {"podRef": {"name": "web-0", "namespace": "shop"}, "ephemeral-storage": {"usedBytes": 4096}},
            {"podRef": {"name": "web-1", "namespace": "shop"}, "ephemeral-storage": {"usedBytes": 8192}},
            null,
            {"podRef": {"name": "no-stats", "namespace": "shop"}},
            {"podRef": {"name": "db-0", "namespace": "data"}, "ephemeral-storage": {"usedBytes": 123456789012}}
        ]
    }"#;

    fn gauges(samples: &[Sample]) -> Vec<&Sample> {
        samples.iter().filter(|s| s.desc.name == STORAGE_METRIC).collect()
    }

    fn errors(samples: &[Sample]) -> Vec<&Sample> {
        samples.iter().filter(|s| s.desc.name == ERRORS_METRIC).collect()
    }

    #[test]
    fn describe_returns_both_descriptors() {
        let collector = SummaryCollector::new(StubSource::body(ONE_POD));
        let descs = collector.describe();
        assert_eq!(descs.len(), 2);

        assert_eq!(descs[0].name, STORAGE_METRIC);
        assert_eq!(descs[0].kind, MetricKind::Gauge);
        assert_eq!(descs[0].label_names, vec!["node", "namespace", "pod"]);

        assert_eq!(descs[1].name, ERRORS_METRIC);
        assert_eq!(descs[1].kind, MetricKind::Counter);
        assert_eq!(descs[1].label_names, vec!["type"]);
    }

    #[test]
    fn describe_is_idempotent_and_does_no_io() {
        let collector = SummaryCollector::new(StubSource::new(vec![StubResponse::Status(500)]));
        assert_eq!(collector.describe(), collector.describe());
        assert_eq!(collector.error_count(), 0);
    }

    #[tokio::test]
    async fn single_pod_produces_single_gauge() {
        let collector = SummaryCollector::new(StubSource::body(ONE_POD));
        let samples = collector.collect().await;

        assert_eq!(samples.len(), 1);
        let s = &samples[0];
        assert_eq!(s.desc.name, STORAGE_METRIC);
        assert_eq!(s.label_values, vec!["ip-1", "ns1", "p1"]);
        assert_eq!(s.value, 36864.0);
        assert_eq!(collector.error_count(), 0);
    }

    #[tokio::test]
    async fn one_gauge_per_pod_with_storage() {
        let collector = SummaryCollector::new(StubSource::body(THREE_PODS));
        let samples = collector.collect().await;

        assert!(errors(&samples).is_empty());
        let got: Vec<(Option<&str>, Option<&str>, Option<&str>, f64)> = gauges(&samples)
            .iter()
            .map(|s| (s.label("node"), s.label("namespace"), s.label("pod"), s.value))
            .collect();
        assert_eq!(
            got,
            vec![
                (Some("node-a"), Some("shop"), Some("web-0"), 4096.0),
                (Some("node-a"), Some("shop"), Some("web-1"), 8192.0),
                (Some("node-a"), Some("data"), Some("db-0"), 123456789012.0),
            ]
        );
    }

    #[tokio::test]
    async fn empty_node_emits_nothing() {
        let collector = SummaryCollector::new(StubSource::body(r#"{"node":{"nodeName":"n"},"pods":[]}"#));
        assert!(collector.collect().await.is_empty());
        assert_eq!(collector.error_count(), 0);
    }

    #[tokio::test]
    async fn status_error_emits_counter_only() {
        let collector = SummaryCollector::new(StubSource::new(vec![StubResponse::Status(503)]));
        let samples = collector.collect().await;

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].desc.name, ERRORS_METRIC);
        assert_eq!(samples[0].label("type"), Some("status-error"));
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(collector.error_count(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_counts_once() {
        let collector = SummaryCollector::new(StubSource::body(r#"{"pods": "nope"}"#));
        let samples = collector.collect().await;

        assert!(gauges(&samples).is_empty());
        assert_eq!(errors(&samples).len(), 1);
        assert_eq!(samples[0].label("type"), Some("parse-error"));
        assert_eq!(collector.error_count(), 1);
    }

    #[tokio::test]
    async fn counter_value_is_cumulative_across_categories() {
        let collector = SummaryCollector::new(StubSource::new(vec![
            StubResponse::Timeout,
            StubResponse::Status(401),
            StubResponse::Body(ONE_POD),
            StubResponse::Body("{"),
            StubResponse::MissingToken,
        ]));

        let first = collector.collect().await;
        assert_eq!(first[0].label("type"), Some("transport-error"));
        assert_eq!(first[0].value, 1.0);

        let second = collector.collect().await;
        assert_eq!(second[0].label("type"), Some("status-error"));
        assert_eq!(second[0].value, 2.0);

        let third = collector.collect().await;
        assert!(errors(&third).is_empty(), "success must not re-emit the counter");
        assert_eq!(gauges(&third).len(), 1);

        let fourth = collector.collect().await;
        assert_eq!(fourth[0].label("type"), Some("parse-error"));
        assert_eq!(fourth[0].value, 3.0);

        let fifth = collector.collect().await;
        assert_eq!(fifth[0].label("type"), Some("token-read-error"));
        assert_eq!(fifth[0].value, 4.0);

        assert_eq!(collector.error_count(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_are_not_lost() {
        let collector = Arc::new(SummaryCollector::new(StubSource::new(vec![
            StubResponse::Timeout,
        ])));

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let collector = Arc::clone(&collector);
                tokio::spawn(async move { collector.collect().await })
            })
            .collect();

        let mut values = Vec::new();
        for handle in handles {
            let samples = handle.await.unwrap();
            assert_eq!(samples.len(), 1);
            values.push(samples[0].value as u64);
        }

        assert_eq!(collector.error_count(), 64);
        values.sort_unstable();
        assert_eq!(values, (1..=64).collect::<Vec<u64>>());
    }
}
