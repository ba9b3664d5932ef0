//! Kubelet `stats/summary` schema.
//!
//! Only the fields needed for ephemeral-storage metrics are decoded. The
//! kubelet document carries far more (CPU, memory, network, per-volume
//! stats, inode counts, timestamps); unknown fields are ignored so newer
//! kubelets keep decoding.

use serde::{Deserialize, Deserializer};

use crate::error::ScrapeResult;

/// Root of the summary document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub node: NodeStats,
    /// Pod entries. A `null` entry is kept as `None` and skipped on emission.
    #[serde(default, deserialize_with = "null_as_default")]
    pub pods: Vec<Option<PodStats>>,
}

/// Node section of the summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeStats {
    #[serde(rename = "nodeName", default)]
    pub node_name: String,
}

/// Per-pod section of the summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PodStats {
    #[serde(rename = "podRef", default)]
    pub pod_ref: PodReference,
    #[serde(rename = "ephemeral-storage", default)]
    pub ephemeral_storage: Option<Volume>,
}

/// Identifies the pod a stats entry belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PodReference {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// Filesystem usage for a volume or the pod's ephemeral storage.
///
/// For volumes sharing a filesystem with the host (emptyDir, hostPath,
/// the container writable layer) `available_bytes` describes the
/// underlying filesystem and is shared with other pods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Volume {
    #[serde(rename = "usedBytes", default)]
    pub used_bytes: i64,
    #[serde(rename = "availableBytes", default)]
    pub available_bytes: i64,
}

/// One pod's ephemeral-storage usage, borrowed from a [`Summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PodUsage<'a> {
    pub namespace: &'a str,
    pub pod: &'a str,
    pub used_bytes: i64,
}

impl Summary {
    /// Decode a summary from the raw response body.
    pub fn decode(body: &[u8]) -> ScrapeResult<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Node name reported by the kubelet.
    pub fn node_name(&self) -> &str {
        &self.node.node_name
    }

    /// Pods carrying ephemeral-storage stats. `null` pods and pods
    /// without the section are skipped.
    pub fn ephemeral_usage(&self) -> impl Iterator<Item = PodUsage<'_>> {
        self.pods.iter().flatten().filter_map(|pod| {
            pod.ephemeral_storage.map(|storage| PodUsage {
                namespace: &pod.pod_ref.namespace,
                pod: &pod.pod_ref.name,
                used_bytes: storage.used_bytes,
            })
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
