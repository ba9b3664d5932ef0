//! Command-line and environment configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use summary_scraper::TlsOptions;
use summary_scraper::fetcher::read_token;
use tracing::warn;

/// Default location of the projected service-account token.
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubelet-summary-exporter",
    about = "Expose pod ephemeral-storage usage from the kubelet summary API",
    version
)]
pub struct Cli {
    /// Address to listen on for Prometheus scrapes (`:port` binds all interfaces).
    #[arg(long, env = "PROM_LISTEN", default_value = ":9091")]
    pub prom_listen: String,

    /// Path the metrics are served on.
    #[arg(long, env = "METRICS_PATH", default_value = "/metrics", value_parser = parse_metrics_path)]
    pub metrics_path: String,

    /// Address to request the kubelet's stats/summary from.
    #[arg(long, env = "NODE_HOST")]
    pub node_host: String,

    /// Don't validate kubelet certificates.
    #[arg(long, env = "INSECURE")]
    pub insecure: bool,

    /// CA bundle (PEM) used to verify the kubelet certificate.
    #[arg(long = "ca", env = "CA_CRT")]
    pub ca: Option<PathBuf>,

    /// Bearer token file, re-read on every scrape.
    #[arg(long, env = "TOKEN", default_value = DEFAULT_TOKEN_PATH)]
    pub token_path: PathBuf,

    /// Timeout for the whole kubelet request (e.g. `500ms`, `5s`, `1m`).
    #[arg(long, env = "TIMEOUT", default_value = "5s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Use the API server to determine the node hostname (assumes in-cluster config).
    #[arg(
        long,
        env = "LOOK_UP_HOSTNAME",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub look_up_hostname: bool,

    /// Refuse to start when the token file is missing or empty instead of warning.
    #[arg(long, env = "REQUIRE_TOKEN")]
    pub require_token: bool,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

impl Cli {
    /// Listen address in a form `TcpListener::bind` accepts.
    pub fn listen_addr(&self) -> String {
        if self.prom_listen.starts_with(':') {
            format!("0.0.0.0{}", self.prom_listen)
        } else {
            self.prom_listen.clone()
        }
    }

    pub fn tls_options(&self) -> TlsOptions {
        TlsOptions {
            ca_file: self.ca.clone(),
            insecure: self.insecure,
        }
    }

    /// Startup check of the token file. Scrapes re-read it regardless.
    pub async fn check_token(&self) -> anyhow::Result<()> {
        check_token(&self.token_path, self.require_token).await
    }
}

async fn check_token(path: &Path, required: bool) -> anyhow::Result<()> {
    match read_token(path).await {
        Ok(_) => Ok(()),
        Err(e) if required => Err(e).context("bearer token unusable"),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "token not usable yet");
            Ok(())
        }
    }
}

fn parse_metrics_path(s: &str) -> Result<String, String> {
    if s.starts_with('/') {
        Ok(s.to_string())
    } else {
        Err(format!("metrics path must start with '/': {s:?}"))
    }
}

/// Parse a duration string like "5s", "500ms", "1m", or a bare number of seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let parsed = if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<f64>()
            .ok()
            .and_then(|v| Duration::try_from_secs_f64(v).ok())
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    };

    match parsed {
        Some(d) if !d.is_zero() => Ok(d),
        Some(_) => Err("timeout must be greater than zero".to_string()),
        None => Err(format!("invalid duration: {s:?}")),
    }
}
