//! kubelet-summary-exporter — per-node pod ephemeral-storage metrics.
//!
//! Runs next to the kubelet, scrapes `https://<node>:10250/stats/summary`
//! on every Prometheus scrape, and republishes per-pod ephemeral-storage
//! usage as `kube_pod_ephemeral_storage_used_bytes`.
//!
//! # Usage
//!
//! ```text
//! NODE_HOST=ip-10-0-0-7 CA_CRT=/etc/kubelet/ca.crt kubelet-summary-exporter
//! ```

mod config;
mod lookup;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use summary_scraper::{HttpsClient, KUBELET_PORT, KubeletFetcher, SummaryCollector, Target};

use crate::config::{Cli, LogFormat};

/// Time in-flight scrapes get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let span = info_span!("exporter", app = "kubelet-summary-exporter");
    if let Err(e) = run(cli).instrument(span.clone()).await {
        let message = format!("{e:#}");
        span.in_scope(|| error!(error = %message, "exporter failed"));
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!(node = %cli.node_host, "kubelet summary exporter starting");

    let tls = summary_scraper::client_config(&cli.tls_options()).context("unable to configure tls")?;
    cli.check_token().await?;

    let server_name = if cli.look_up_hostname {
        // The downward API gives the node name, which may differ from the
        // hostname on the kubelet certificate.
        let cluster = lookup::InClusterConfig::from_env()?;
        let hostname = lookup::node_hostname(&cluster, &cli.node_host, cli.timeout)
            .await
            .context("failed to retrieve node hostname")?;
        info!(
            hostname = %hostname,
            original = %cli.node_host,
            "using updated server name for certificate validation"
        );
        hostname
    } else {
        cli.node_host.clone()
    };

    let target = Target::new(&cli.node_host, KUBELET_PORT).with_server_name(server_name);
    let fetcher = KubeletFetcher::new(HttpsClient::new(tls, target, cli.timeout), &cli.token_path);
    let collector = Arc::new(SummaryCollector::new(fetcher));
    let router = summary_api::build_router(collector, &cli.metrics_path);

    let addr = cli.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to open prometheus listener on {addr}"))?;
    info!(
        %addr,
        path = %cli.metrics_path,
        timeout_ms = cli.timeout.as_millis() as u64,
        "metrics server listening"
    );

    serve(listener, router).await
}

/// Serve until SIGINT/SIGTERM, then give in-flight scrapes a grace period.
async fn serve(listener: TcpListener, router: Router) -> anyhow::Result<()> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let signal = shutdown_signal().await;
            info!(signal, "caught signal");
            let _ = shutdown_tx.send(true);
        })
        .into_future();

    let grace = async move {
        if shutdown_rx.changed().await.is_ok() {
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result.context("metrics server failed")?,
        _ = grace => {
            warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "in-flight scrapes did not finish in time");
        }
    }

    info!("kubelet summary exporter stopped");
    Ok(())
}

async fn shutdown_signal() -> &'static str {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
