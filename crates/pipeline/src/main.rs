//! LeadForge CLI
//!
//! Runs a listing search (or a batch of them) and prints the outcome as
//! JSON on stdout. Logs go to stderr.
//!
//! Usage:
//!   leadforge search "dentists in Miami" --limit 25
//!   leadforge search dentists --location "Austin, TX" --sources openstreetmap,directory
//!   leadforge batch dentists orthodontists --location Miami

use clap::{Parser, Subcommand};
use leadforge_common::{metrics, AppConfig, CancelFlag};
use leadforge_pipeline::LeadPipeline;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "leadforge", version)]
#[command(about = "Collect business listings from several sources")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file loaded on top of the layered configuration
    #[arg(long, global = true, env = "LEADFORGE_CONFIG")]
    config: Option<String>,

    /// Source order override (comma separated source names)
    #[arg(long, global = true, value_delimiter = ',')]
    sources: Vec<String>,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search one query ("dentists in Miami" or "dentists" with --location)
    Search {
        query: String,

        #[arg(long, short = 'l')]
        location: Option<String>,

        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
    /// Search several keywords, deduplicating across all of them
    Batch {
        #[arg(required = true)]
        queries: Vec<String>,

        #[arg(long, short = 'l')]
        location: Option<String>,

        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    if !cli.sources.is_empty() {
        config.sources.order = cli.sources.clone();
    }

    init_tracing(&config);
    info!("Starting {} v{}", config.observability.service_name, leadforge_common::VERSION);

    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Suffix("source_call_duration_seconds".to_string()),
                metrics::SOURCE_CALL_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Suffix("pipeline_duration_seconds".to_string()),
                metrics::PIPELINE_BUCKETS,
            )?
            .install()?;
        info!(%addr, "Metrics exporter listening");
    }
    metrics::register_metrics();

    let pipeline = LeadPipeline::from_config(&config).map_err(|e| {
        error!(error = %e, code = e.code().as_code(), "Failed to build pipeline");
        e
    })?;

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current source");
            on_signal.cancel();
        }
    });

    let outcome = match &cli.command {
        Command::Search { query, location, limit } => {
            pipeline.run(query, location.as_deref(), *limit, &cancel).await
        }
        Command::Batch { queries, location, limit } => {
            pipeline.run_batch(queries.as_slice(), location.as_deref(), *limit, &cancel).await
        }
    }
    .map_err(|e| {
        error!(error = %e, code = e.code().as_code(), "Search rejected");
        e
    })?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string(&outcome)?
    };
    println!("{}", json);

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
