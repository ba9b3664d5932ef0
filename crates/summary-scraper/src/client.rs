//! Minimal HTTPS GET client.
//!
//! One connection per request: TCP connect, TLS handshake, a single
//! HTTP/1.1 exchange, then the connection is dropped. The whole exchange
//! is bounded by the configured timeout.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, HOST, USER_AGENT};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Empty};
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::{ScrapeError, ScrapeResult};

/// Where to connect and which name to present for TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Address dialled over TCP.
    pub connect_host: String,
    /// Name used for SNI, certificate verification and the `Host` header.
    pub server_name: String,
    pub port: u16,
}

impl Target {
    /// Dial and verify the same host.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            connect_host: host.clone(),
            server_name: host,
            port,
        }
    }

    /// Dial `connect_host` but verify the certificate against `server_name`.
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }

    fn authority(&self) -> String {
        if self.server_name.contains(':') {
            format!("[{}]:{}", self.server_name, self.port)
        } else {
            format!("{}:{}", self.server_name, self.port)
        }
    }
}

/// HTTPS client bound to a single target.
#[derive(Clone)]
pub struct HttpsClient {
    connector: TlsConnector,
    target: Target,
    timeout: Duration,
}

impl HttpsClient {
    pub fn new(tls: Arc<rustls::ClientConfig>, target: Target, timeout: Duration) -> Self {
        Self {
            connector: TlsConnector::from(tls),
            target,
            timeout,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// GET `path` with a bearer token and return the body of a 200 response.
    pub async fn get(&self, path: &str, bearer_token: &str) -> ScrapeResult<Bytes> {
        let request = self.build_request(path, bearer_token)?;
        let server_name = ServerName::try_from(self.target.server_name.clone())
            .map_err(|e| ScrapeError::Request(format!("invalid server name: {e}")))?;

        match tokio::time::timeout(self.timeout, self.exchange(server_name, request)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(target = %self.target.authority(), path, "request timed out");
                Err(ScrapeError::Timeout(self.timeout))
            }
        }
    }

    fn build_request(&self, path: &str, bearer_token: &str) -> ScrapeResult<Request<Empty<Bytes>>> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(HOST, self.target.authority())
            .header(AUTHORIZATION, format!("Bearer {bearer_token}"))
            .header(USER_AGENT, concat!("kubelet-summary-exporter/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<Bytes>::new())
            .map_err(|e| ScrapeError::Request(e.to_string()))
    }

    async fn exchange(
        &self,
        server_name: ServerName<'static>,
        request: Request<Empty<Bytes>>,
    ) -> ScrapeResult<Bytes> {
        let addr = (self.target.connect_host.as_str(), self.target.port);
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|e| ScrapeError::Transport(format!("connect: {e}")))?;

        let tls = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| ScrapeError::Transport(format!("tls handshake: {e}")))?;

        let io = hyper_util::rt::TokioIo::new(tls);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ScrapeError::Transport(format!("http handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "connection closed with error");
            }
        });

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| ScrapeError::Transport(format!("send request: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScrapeError::Status(status));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ScrapeError::Body(e.to_string()))?;
        Ok(body.to_bytes())
    }
}
