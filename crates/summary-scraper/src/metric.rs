//! Metric descriptors, samples, and the cumulative error tally.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Exposition type of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// Static description of a metric family: name, help and label schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desc {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
}

impl Desc {
    /// Build a descriptor, joining non-empty name parts with `_`.
    pub fn new(
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: &str,
        kind: MetricKind,
        label_names: &[&str],
    ) -> Self {
        let name = [namespace, subsystem, name]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        Self {
            name,
            help: help.to_string(),
            kind,
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// One value of a metric family with its label values.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: Arc<Desc>,
    /// Label values, positionally matching `desc.label_names`.
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(desc: &Arc<Desc>, label_values: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(
            desc.label_names.len(),
            label_values.len(),
            "label cardinality mismatch for {}",
            desc.name
        );
        Self {
            desc: Arc::clone(desc),
            label_values,
            value,
        }
    }

    /// Value of the label called `name`, if the descriptor has one.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names
            .iter()
            .position(|l| l == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// Process-lifetime failure count. Only ever grows.
#[derive(Debug, Default)]
pub struct ErrorTally {
    count: AtomicU64,
}

impl ErrorTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure and return the cumulative count including it.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}
