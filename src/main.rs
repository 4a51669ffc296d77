use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use logwatch::config::Config;
use logwatch::{
    Dispatcher, HttpTransport, MemoryStore, Pipeline, ProjectId, StaticWebhookConfigs,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "logwatch", about = "Log aggregation, error reports and webhook alerts")]
struct Cli {
    /// Config file (defaults to ~/.config/logwatch/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write debug logs to /tmp/logwatch-debug.log (tail -f to inspect).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an error/latency report from a file of log lines.
    Report {
        /// Log lines (JSON, logfmt or plain text), `-` for stdin.
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        project: u64,
        /// Window start (RFC 3339). Defaults to 24h before --to.
        #[arg(long, value_parser = parse_rfc3339)]
        from: Option<DateTime<Utc>>,
        /// Window end, exclusive (RFC 3339). Defaults to now.
        #[arg(long, value_parser = parse_rfc3339)]
        to: Option<DateTime<Utc>>,
        /// Overrides `report.timeout_ms`.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Stream log lines through ingestion and deliver alerts to configured webhooks.
    Watch {
        /// Log lines, `-` for stdin.
        #[arg(long, default_value = "-")]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load().with_context(|| {
            format!("loading config from {}", Config::default_path().display())
        })?,
    };

    match cli.command {
        Command::Report {
            input,
            project,
            from,
            to,
            timeout_ms,
        } => report(&config, &input, ProjectId(project), from, to, timeout_ms).await,
        Command::Watch { input } => watch(&config, &input).await,
    }
}

async fn report(
    config: &Config,
    input: &Path,
    project: ProjectId,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    timeout_ms: Option<u64>,
) -> anyhow::Result<()> {
    let end = to.unwrap_or_else(Utc::now);
    let start = from.unwrap_or(end - chrono::Duration::hours(24));
    let deadline = timeout_ms
        .map(std::time::Duration::from_millis)
        .unwrap_or_else(|| config.report.timeout());

    // Reports never alert: no webhooks are wired in.
    let pipeline = build_pipeline(config, StaticWebhookConfigs::default())?;
    let ingested = ingest_lines(&pipeline, open_input(input).await?).await?;
    tracing::info!(ingested, "input loaded");

    let report = pipeline.report_within(project, start, end, deadline).await?;
    println!("{}", serde_json::to_string_pretty(&report.to_response())?);
    Ok(())
}

async fn watch(config: &Config, input: &Path) -> anyhow::Result<()> {
    let webhooks = StaticWebhookConfigs::new(config.webhooks.iter().cloned());
    let pipeline = build_pipeline(config, webhooks)?;

    let ingested = ingest_lines(&pipeline, open_input(input).await?).await?;
    tracing::info!(ingested, "input exhausted; draining alert queues");

    pipeline.dispatcher().shutdown().await;
    for (url, stats) in pipeline.dispatcher().all_stats() {
        tracing::info!(
            url = %url,
            queued = stats.queued,
            dropped = stats.dropped,
            attempts = stats.attempts,
            delivered = stats.delivered,
            exhausted = stats.exhausted,
            "destination summary"
        );
    }
    Ok(())
}

fn build_pipeline(config: &Config, webhooks: StaticWebhookConfigs) -> anyhow::Result<Pipeline> {
    let transport = HttpTransport::new()?;
    let dispatcher = Dispatcher::new(
        Arc::new(transport),
        &config.dispatch,
        tokio::runtime::Handle::current(),
    );
    Ok(Pipeline::new(
        config,
        Arc::new(MemoryStore::new(config.store.retention_per_project)),
        Arc::new(webhooks),
        Arc::new(dispatcher),
    ))
}

async fn open_input(path: &Path) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

async fn ingest_lines(
    pipeline: &Pipeline,
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
) -> anyhow::Result<u64> {
    let mut lines = reader.lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let receipt = pipeline.ingest_line(&line);
        if let Some(outcome) = receipt.alert {
            tracing::debug!(project = %receipt.project_id, ?outcome, "alert raised");
        }
        count += 1;
    }
    Ok(count)
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    if debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/logwatch-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("logwatch debug log started; tail -f /tmp/logwatch-debug.log");
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
    Ok(())
}
