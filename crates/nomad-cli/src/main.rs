use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use nomad_client::{PlatformAdapter, PlatformRegistry, ReqwestClient};
use nomad_core::models::ScrapedJob;
use nomad_core::{BatchOrchestrator, InMemoryTargetStore, ScrapeConfig, TracingRunReporter};

#[derive(Parser)]
#[command(name = "nomad", version, about = "Remote job listing aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every enabled target in a targets file
    Scrape {
        /// JSON file with the targets to scrape
        #[arg(short, long, env = "NOMAD_TARGETS")]
        targets: PathBuf,

        /// Platform to use for every target, or "auto" to detect per target
        #[arg(short, long, default_value = "auto")]
        platform: String,

        /// Only scrape targets of this job board (all targets when omitted)
        #[arg(short, long)]
        board: Option<Uuid>,

        /// Targets processed in parallel (overrides NOMAD_MAX_CONCURRENT)
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Pause between batches in milliseconds (overrides NOMAD_BATCH_DELAY_MS)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Per-request timeout in seconds (overrides NOMAD_REQUEST_TIMEOUT_SECS)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Output format for scraped jobs
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Number of target errors to list after the run
        #[arg(long, default_value_t = 5)]
        show_errors: usize,
    },

    /// Show which platform a URL or slug resolves to
    Detect {
        /// Source URL of the target
        #[arg(short, long)]
        url: Option<String>,

        /// Company slug, used when the URL matches nothing
        #[arg(short, long, default_value = "")]
        slug: String,
    },

    /// List known platforms in detection order
    Platforms,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nomad=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            targets,
            platform,
            board,
            max_concurrent,
            delay_ms,
            timeout_secs,
            format,
            show_errors,
        } => {
            let mut config = ScrapeConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
            if let Some(n) = max_concurrent {
                if n == 0 {
                    bail!("--max-concurrent must be at least 1");
                }
                config = config.with_max_concurrent(n);
            }
            if let Some(ms) = delay_ms {
                config = config.with_inter_batch_delay(Duration::from_millis(ms));
            }
            if let Some(secs) = timeout_secs {
                config = config.with_request_timeout(Duration::from_secs(secs));
            }

            cmd_scrape(
                &targets,
                &platform,
                board.unwrap_or(Uuid::nil()),
                config,
                format,
                show_errors,
            )
            .await?;
        }
        Commands::Detect { url, slug } => cmd_detect(url.as_deref(), &slug)?,
        Commands::Platforms => cmd_platforms(),
    }

    Ok(())
}

async fn cmd_scrape(
    targets_path: &Path,
    platform: &str,
    job_board_id: Uuid,
    config: ScrapeConfig,
    format: OutputFormat,
    show_errors: usize,
) -> Result<()> {
    let store = InMemoryTargetStore::from_json_file(targets_path).map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(
        "Loaded {} targets from {}",
        store.len(),
        targets_path.display()
    );

    let http = ReqwestClient::with_timeout(config.request_timeout)
        .context("Failed to create HTTP client")?;
    let registry = PlatformRegistry::builtin();
    let source = if platform.eq_ignore_ascii_case("auto") {
        PlatformAdapter::generic(http, registry)
    } else {
        let descriptor = registry.get(platform).with_context(|| {
            format!("Unknown platform '{platform}'. Run `nomad platforms` to list them.")
        })?;
        PlatformAdapter::for_descriptor(http, descriptor)
    }
    .with_request_timeout(config.request_timeout);

    let orchestrator = BatchOrchestrator::new(store, source, config);

    // Ctrl-C stops the run between batches; finished work is still printed.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current batch");
            on_signal.cancel();
        }
    });

    let run = orchestrator
        .run(job_board_id, &cancel, &TracingRunReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!("{}", run.stats.summary());
    for error in run.stats.top_errors(show_errors) {
        tracing::warn!("  {}: {}", error.target, error.message);
    }
    if run.stats.errors.len() > show_errors {
        tracing::warn!(
            "  ... and {} more errors",
            run.stats.errors.len() - show_errors
        );
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &run.jobs)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&mut out, &run.jobs)?,
    }

    Ok(())
}

/// Flat CSV view of a job; list fields are joined with `;`.
#[derive(Serialize)]
struct JobRow<'a> {
    platform: &'a str,
    external_id: &'a str,
    company_slug: &'a str,
    title: &'a str,
    location: &'a str,
    salary: &'a str,
    seniority: &'a str,
    employment_type: &'a str,
    tags: String,
    countries: String,
    external_url: &'a str,
    published_at: String,
}

impl<'a> From<&'a ScrapedJob> for JobRow<'a> {
    fn from(job: &'a ScrapedJob) -> Self {
        Self {
            platform: &job.platform,
            external_id: &job.external_id,
            company_slug: &job.company_slug,
            title: &job.title,
            location: &job.location,
            salary: job.salary.as_deref().unwrap_or_default(),
            seniority: job.seniority.as_str(),
            employment_type: job.employment_type.as_str(),
            tags: job.tags.join(";"),
            countries: job.countries.join(";"),
            external_url: &job.external_url,
            published_at: job.published_at.to_rfc3339(),
        }
    }
}

fn write_csv(out: impl Write, jobs: &[ScrapedJob]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for job in jobs {
        writer
            .serialize(JobRow::from(job))
            .context("Failed to write CSV row")?;
    }
    writer.flush()?;
    Ok(())
}

fn cmd_detect(url: Option<&str>, slug: &str) -> Result<()> {
    if url.is_none() && slug.is_empty() {
        bail!("Pass --url, --slug, or both");
    }

    let registry = PlatformRegistry::builtin();
    match registry.detect(url, slug) {
        Some(descriptor) => {
            let board = descriptor
                .board_slug(url, slug)
                .unwrap_or_else(|| slug.to_string());
            println!("platform: {}", descriptor.name);
            println!("strategy: {}", descriptor.strategy());
            if !board.is_empty() {
                println!("slug:     {board}");
            }
        }
        None => {
            println!("platform: generic");
            println!("strategy: generic-fallback");
        }
    }
    Ok(())
}

fn cmd_platforms() {
    let registry = PlatformRegistry::builtin();
    println!("{} platforms, in detection order:\n", registry.len());
    for descriptor in registry.iter() {
        println!(
            "  {:<16} {:<26} {}",
            descriptor.name,
            descriptor.strategy().as_str(),
            descriptor.patterns.join(", ")
        );
    }
}
