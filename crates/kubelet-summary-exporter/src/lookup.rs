//! Node hostname lookup through the Kubernetes API server.
//!
//! The downward API hands us the node *name*, which is not always the
//! name on the kubelet's serving certificate. The node object's
//! `Hostname` address is.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use serde::Deserialize;
use summary_scraper::fetcher::read_token;
use summary_scraper::{HttpsClient, Target, TlsOptions, client_config};
use tracing::debug;

/// Mount point of the pod's service-account credentials.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Connection details for the API server as seen from inside a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InClusterConfig {
    pub host: String,
    pub port: u16,
    pub token_path: PathBuf,
    pub ca_file: PathBuf,
}

impl InClusterConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let (Some(host), Some(port)) = (
            lookup("KUBERNETES_SERVICE_HOST").filter(|h| !h.is_empty()),
            lookup("KUBERNETES_SERVICE_PORT").filter(|p| !p.is_empty()),
        ) else {
            bail!(
                "unable to load in-cluster configuration, KUBERNETES_SERVICE_HOST and \
                 KUBERNETES_SERVICE_PORT must be defined"
            );
        };
        let port = port
            .parse()
            .with_context(|| format!("invalid KUBERNETES_SERVICE_PORT {port:?}"))?;

        let dir = PathBuf::from(SERVICE_ACCOUNT_DIR);
        Ok(Self {
            host,
            port,
            token_path: dir.join("token"),
            ca_file: dir.join("ca.crt"),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct Node {
    #[serde(default)]
    status: NodeStatus,
}

#[derive(Debug, Default, Deserialize)]
struct NodeStatus {
    #[serde(default)]
    addresses: Vec<NodeAddress>,
}

#[derive(Debug, Deserialize)]
struct NodeAddress {
    #[serde(rename = "type")]
    kind: String,
    address: String,
}

/// Ask the API server for the `Hostname` address of `node_name`.
pub async fn node_hostname(
    cluster: &InClusterConfig,
    node_name: &str,
    timeout: Duration,
) -> anyhow::Result<String> {
    let tls = client_config(&TlsOptions {
        ca_file: Some(cluster.ca_file.clone()),
        insecure: false,
    })?;
    let client = HttpsClient::new(tls, Target::new(&cluster.host, cluster.port), timeout);
    let token = read_token(&cluster.token_path).await?;

    let path = format!("/api/v1/nodes/{node_name}");
    debug!(host = %cluster.host, %path, "looking up node");
    let body = client
        .get(&path, &token)
        .await
        .with_context(|| format!("failed to get node {node_name:?}"))?;

    hostname_from(&body, node_name)
}

fn hostname_from(body: &[u8], node_name: &str) -> anyhow::Result<String> {
    let node: Node = serde_json::from_slice(body).context("failed to decode node object")?;
    node.status
        .addresses
        .into_iter()
        .find(|addr| addr.kind == "Hostname")
        .map(|addr| addr.address)
        .ok_or_else(|| anyhow!("no hostname address found for node {node_name:?}"))
}
