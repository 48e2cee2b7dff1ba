//! Media ingestion worker binary.
//!
//! `ingest-worker <url>... [--op download|metadata|captions]`

use futures::stream::{self, StreamExt};
use ingest_models::OperationKind;
use ingest_resilience::CancellationToken;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ingest_worker::{FailureTracker, IngestWorker, WorkerConfig};

fn parse_args(
    mut args: impl Iterator<Item = String>,
) -> anyhow::Result<(OperationKind, Vec<String>)> {
    let mut kind = OperationKind::Download;
    let mut urls = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--op" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--op requires a value"))?;
                kind = value.parse::<OperationKind>()?;
            }
            _ => urls.push(arg),
        }
    }

    if urls.is_empty() {
        anyhow::bail!("usage: ingest-worker <url>... [--op download|metadata|captions]");
    }
    Ok((kind, urls))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("ingest_resilience=info".parse()?)
        .add_directive("ingest_worker=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let (kind, urls) = parse_args(std::env::args().skip(1))?;

    let config = WorkerConfig::from_env()?;
    info!("Worker config: {:?}", config);

    if let Some(addr) = &config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr.parse::<std::net::SocketAddr>()?)
            .install()?;
        info!(addr = %addr, "Prometheus exporter listening");
    }

    tokio::fs::create_dir_all(&config.work_dir).await?;

    let worker = IngestWorker::from_config(&config)?;
    let binary = worker.action().check_binary()?;
    info!(
        binary = %binary.display(),
        items = urls.len(),
        operation = %kind,
        "Starting ingest-worker"
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown.cancel();
    });

    let results: Vec<_> = stream::iter(urls)
        .map(|url| {
            let worker = &worker;
            let cancel = &cancel;
            async move {
                let result = worker.process(&url, kind, cancel).await;
                (url, result)
            }
        })
        .buffer_unordered(config.max_concurrent)
        .collect()
        .await;

    let mut failures = 0usize;
    let mut tracker = FailureTracker::new(5);
    for (url, result) in &results {
        match result {
            Ok(fetched) => {
                tracker.record_success();
                info!(url = %url, "{}", fetched.summary());
            }
            Err(e) => {
                failures += 1;
                if tracker.record_failure() {
                    if e.is_permanent_failure() {
                        warn!(url = %url, "Permanent failure: {}", e);
                    } else {
                        error!(url = %url, retryable = e.is_retryable(), "Ingest failed: {}", e);
                    }
                }
            }
        }
    }

    for snapshot in worker.orchestrator().breakers().snapshots() {
        info!(
            resource = %snapshot.name,
            state = snapshot.state.as_str(),
            total_failures = snapshot.total_failures,
            "Circuit breaker state"
        );
    }

    info!(
        succeeded = results.len() - failures,
        failed = failures,
        "Worker finished"
    );

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args_default_operation() {
        let (kind, urls) = assert_ok!(parse_args(args(&["https://youtu.be/dQw4w9WgXcQ"])));
        assert_eq!(kind, OperationKind::Download);
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn test_parse_args_operation_flag() {
        let (kind, urls) =
            parse_args(args(&["--op", "captions", "https://youtu.be/a", "https://youtu.be/b"]))
                .unwrap();
        assert_eq!(kind, OperationKind::Captions);
        assert_eq!(urls, vec!["https://youtu.be/a", "https://youtu.be/b"]);
    }

    #[test]
    fn test_parse_args_errors() {
        assert_err!(parse_args(args(&[])));
        assert_err!(parse_args(args(&["--op"])));
        assert_err!(parse_args(args(&["--op", "upload", "https://youtu.be/a"])));
    }
}
