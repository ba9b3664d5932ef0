//! Fetches the raw summary document from the kubelet.

use std::future::Future;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::client::HttpsClient;
use crate::error::{ScrapeError, ScrapeResult};

/// Kubelet read-only stats port.
pub const KUBELET_PORT: u16 = 10250;

/// Path of the kubelet summary endpoint.
pub const SUMMARY_PATH: &str = "/stats/summary";

/// Anything that can produce a raw summary payload.
pub trait SummarySource: Send + Sync {
    /// Make one attempt at retrieving the payload.
    fn fetch(&self) -> impl Future<Output = ScrapeResult<Bytes>> + Send;
}

/// Fetches `/stats/summary` over HTTPS with a bearer token.
///
/// The token file is re-read on every fetch so a rotated service-account
/// token is picked up without a restart.
pub struct KubeletFetcher {
    client: HttpsClient,
    token_path: PathBuf,
}

impl KubeletFetcher {
    pub fn new(client: HttpsClient, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            token_path: token_path.into(),
        }
    }
}

impl SummarySource for KubeletFetcher {
    async fn fetch(&self) -> ScrapeResult<Bytes> {
        let token = read_token(&self.token_path).await?;
        let body = self.client.get(SUMMARY_PATH, &token).await?;
        debug!(
            host = %self.client.target().server_name,
            bytes = body.len(),
            "fetched stats summary"
        );
        Ok(body)
    }
}

/// Read a bearer token, trimming the trailing newline most token files carry.
pub async fn read_token(path: &Path) -> ScrapeResult<String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ScrapeError::TokenRead {
            path: path.to_path_buf(),
            source,
        })?;

    let token = raw.trim();
    if token.is_empty() {
        return Err(ScrapeError::EmptyToken(path.to_path_buf()));
    }
    Ok(token.to_string())
}
