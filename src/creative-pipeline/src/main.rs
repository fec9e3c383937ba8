//! Creative Pipeline — campaign brief to brand-compliant ad variants.
//!
//! Main entry point: loads configuration, wires the provider seams and
//! runs one brief (or a whole directory of briefs) through the
//! orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use creative_core::config::AppConfig;
use creative_core::types::JobStatus;
use creative_generation::OpenAiImageProvider;
use creative_orchestrator::output::human_readable_report;
use creative_orchestrator::{CampaignOrchestrator, PipelineServices};
use creative_translation::HttpTranslationProvider;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "creative-pipeline")]
#[command(about = "Campaign asset orchestration: briefs in, ad variants out")]
#[command(version)]
struct Cli {
    /// Path to a campaign brief JSON file
    #[arg(required_unless_present = "batch")]
    brief: Option<PathBuf>,

    /// Process every .json brief in this directory
    #[arg(long, value_name = "DIR", conflicts_with = "brief")]
    batch: Option<PathBuf>,

    /// Output directory (overrides config)
    #[arg(long, env = "CREATIVE_PIPELINE__OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Worker count (overrides config)
    #[arg(long, env = "CREATIVE_PIPELINE__WORKER_COUNT")]
    workers: Option<usize>,

    /// Expose Prometheus metrics on this port for the run
    #[arg(long, env = "CREATIVE_PIPELINE__METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Enable debug logging
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "creative_pipeline=debug,creative_orchestrator=debug"
    } else {
        "creative_pipeline=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    info!("Creative Pipeline starting up");

    // Without a recorder the pipeline's counters and histograms are
    // no-ops; installing one is opt-in for batch runs.
    if let Some(port) = cli.metrics_port {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        builder
            .with_http_listener(std::net::SocketAddr::from(([0, 0, 0, 0], port)))
            .install()
            .context("failed to start metrics exporter")?;
        info!(port, "Metrics exporter started");
    }

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }

    info!(
        workers = config.worker_count,
        output_dir = %config.output_dir.display(),
        model = %config.generation.model,
        "Configuration loaded"
    );

    let image_provider = Arc::new(
        OpenAiImageProvider::new(&config.generation)
            .map_err(|e| anyhow::anyhow!("image provider init: {e}"))?,
    );
    let translation_provider = Arc::new(
        HttpTranslationProvider::new(&config.translation)
            .map_err(|e| anyhow::anyhow!("translation provider init: {e}"))?,
    );

    let services = PipelineServices::build(config, image_provider, translation_provider)
        .await
        .context("failed to wire pipeline services")?;
    let orchestrator = CampaignOrchestrator::start(services);

    let briefs = match (&cli.brief, &cli.batch) {
        (Some(path), _) => vec![path.clone()],
        (None, Some(dir)) => collect_briefs(dir)?,
        (None, None) => unreachable!("clap enforces brief or --batch"),
    };
    if briefs.is_empty() {
        anyhow::bail!("no briefs to process");
    }

    let mut submitted = Vec::new();
    for path in &briefs {
        match submit_brief(&orchestrator, path).await {
            Ok(id) => submitted.push((path.clone(), id)),
            Err(e) => {
                error!(brief = %path.display(), error = %e, "brief rejected");
            }
        }
    }

    let mut failed = briefs.len() - submitted.len();
    for (path, id) in &submitted {
        let Some(job) = orchestrator.wait(*id).await else {
            continue;
        };
        match job.status {
            JobStatus::Completed => {
                info!(brief = %path.display(), job_id = %id, "campaign completed");
            }
            status => {
                failed += 1;
                error!(
                    brief = %path.display(),
                    job_id = %id,
                    status = ?status,
                    error = job.error.as_deref().unwrap_or("unknown"),
                    "campaign did not complete"
                );
            }
        }
        if let Some(report) = orchestrator.report(*id) {
            println!("{}", human_readable_report(&report));
        }
    }

    let stats = orchestrator.queue_stats();
    info!(
        completed = stats.completed,
        failed = stats.failed,
        cancelled = stats.cancelled,
        avg_secs = format!("{:.1}", stats.avg_processing_secs),
        "run finished"
    );

    if failed > 0 {
        anyhow::bail!("{failed} of {} campaigns failed", briefs.len());
    }
    Ok(())
}

async fn submit_brief(
    orchestrator: &CampaignOrchestrator,
    path: &PathBuf,
) -> anyhow::Result<uuid::Uuid> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading brief {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing brief {}", path.display()))?;
    let id = orchestrator.submit_value(value).await?;
    Ok(id)
}

/// Every `.json` file directly under the batch directory, sorted for a
/// stable processing order.
fn collect_briefs(dir: &PathBuf) -> anyhow::Result<Vec<PathBuf>> {
    let mut briefs = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            briefs.push(path);
        }
    }
    briefs.sort();
    Ok(briefs)
}
