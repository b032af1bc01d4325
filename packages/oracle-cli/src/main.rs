//! Grant Oracle CLI
//!
//! Thin command-line surface over the `grant_oracle` library. Results go to
//! stdout (or `--output`) as pretty JSON; summaries go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grant_oracle::quality::StatusReport;
use grant_oracle::{
    CandidateRecord, DiscoveryOrchestrator, DiscoveryRun, DiscoveryTask, GrantOracle,
    HttpFetcher, MemoryStore, OracleConfig, QualityOutput, QualityPipeline, QualityRequest,
    RequesterProfile, SessionLifecycleManager, TaskTarget, TracingNotifier, VettedRecord,
};

#[derive(Parser)]
#[command(name = "oracle", version, about = "Discover and vet startup grants")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run discovery over one or more targets, then vet the results
    Discover {
        /// URLs (or document paths for extract-pdf)
        #[arg(required = true)]
        targets: Vec<String>,

        #[arg(long, value_enum, default_value_t = KindArg::Discover)]
        kind: KindArg,

        /// Per-task deadline; defaults depend on the kind
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Preferred backend for every task (openai or gemini)
        #[arg(long)]
        backend: Option<String>,

        /// Requester profile JSON for eligibility scoring
        #[arg(long)]
        profile: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Vet candidate records from a file
    Vet {
        /// JSON array of candidate records
        #[arg(long)]
        candidates: PathBuf,

        /// JSON array of previously vetted records
        #[arg(long)]
        existing: Option<PathBuf>,

        #[arg(long)]
        profile: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Refresh the status of vetted records from a file
    Refresh {
        /// JSON array of vetted records
        #[arg(long)]
        records: PathBuf,

        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Discover,
    ExtractPdf,
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so RUST_LOG from it applies
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,grant_oracle=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = OracleConfig::from_env()?;
    tracing::debug!(
        primary = %config.primary_backend,
        pinned = ?config.pinned_backend,
        openai = config.openai.is_some(),
        gemini = config.gemini.is_some(),
        "Configuration loaded"
    );

    match cli.command {
        Command::Discover {
            targets,
            kind,
            deadline_secs,
            backend,
            profile,
            output,
        } => {
            let tasks = targets
                .into_iter()
                .map(|target| {
                    let mut task = match kind {
                        KindArg::Discover => DiscoveryTask::discover(target),
                        KindArg::ExtractPdf => DiscoveryTask::extract_pdf(target),
                        KindArg::Validate => DiscoveryTask::validate(TaskTarget::Url(target)),
                    };
                    if let Some(secs) = deadline_secs {
                        task = task.with_deadline(Duration::from_secs(secs));
                    }
                    if let Some(backend) = &backend {
                        task = task.with_backend(backend.clone());
                    }
                    task
                })
                .collect();
            let profile = read_optional::<RequesterProfile>(profile.as_deref())?;
            discover(&config, tasks, profile, output.as_deref()).await
        }
        Command::Vet {
            candidates,
            existing,
            profile,
            output,
        } => {
            let request = QualityRequest::new(read_json::<Vec<CandidateRecord>>(&candidates)?)
                .with_existing(
                    read_optional::<Vec<VettedRecord>>(existing.as_deref())?.unwrap_or_default(),
                )
                .with_profile(read_optional(profile.as_deref())?);
            vet(&config, request, output.as_deref()).await
        }
        Command::Refresh { records, output } => {
            let records = read_json::<Vec<VettedRecord>>(&records)?;
            refresh(&config, records, output.as_deref()).await
        }
    }
}

async fn discover(
    config: &OracleConfig,
    tasks: Vec<DiscoveryTask>,
    profile: Option<RequesterProfile>,
    output: Option<&Path>,
) -> Result<()> {
    let controller = Arc::new(config.controller()?);
    let fetcher = Arc::new(HttpFetcher::new()?);
    let sessions = SessionLifecycleManager::new(controller, fetcher.clone());
    let orchestrator =
        DiscoveryOrchestrator::new(sessions).with_inter_task_delay(config.inter_task_delay);
    let pipeline = QualityPipeline::new(fetcher).with_status_monitor(config.status_monitor());
    let oracle = GrantOracle::new(
        orchestrator,
        pipeline,
        Arc::new(MemoryStore::new()),
        Arc::new(TracingNotifier),
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted; finishing the current task...".yellow());
            on_signal.cancel();
        }
    });

    let run = oracle.run_discovery(tasks, profile, &cancel).await;
    print_discovery_summary(&run);
    write_json(&run.quality.records, output)
}

async fn vet(config: &OracleConfig, request: QualityRequest, output: Option<&Path>) -> Result<()> {
    let pipeline = QualityPipeline::new(Arc::new(HttpFetcher::new()?))
        .with_status_monitor(config.status_monitor());
    let result = pipeline.run(request, Utc::now()).await;
    print_quality_summary(&result);
    write_json(&result, output)
}

async fn refresh(
    config: &OracleConfig,
    mut records: Vec<VettedRecord>,
    output: Option<&Path>,
) -> Result<()> {
    let prober = HttpFetcher::new()?;
    let report = config
        .status_monitor()
        .check(
            records.iter_mut().filter(|r| !r.is_duplicate),
            &prober,
            Utc::now(),
        )
        .await;
    print_status_summary(&report);
    write_json(&records, output)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn read_optional<T: DeserializeOwned>(path: Option<&Path>) -> Result<Option<T>> {
    path.map(read_json::<T>).transpose()
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn print_discovery_summary(run: &DiscoveryRun) {
    let report = &run.report;
    eprintln!();
    eprintln!("{}", "Discovery summary".bright_cyan().bold());
    eprintln!(
        "  tasks: {} succeeded, {} failed",
        report.tasks_succeeded.to_string().green(),
        report.tasks_failed.to_string().red()
    );
    for failure in &run.batch.failed {
        eprintln!(
            "    {} {} ({})",
            "✗".red(),
            failure.target,
            failure.reason.dimmed()
        );
    }
    if !run.batch.not_started.is_empty() {
        eprintln!(
            "  {} {} task(s) not started",
            "cancelled:".yellow(),
            run.batch.not_started.len()
        );
    }
    eprintln!(
        "  candidates: {}  vetted: {}  duplicates: {}  new: {}",
        report.candidates_found,
        report.records_vetted,
        report.duplicates_found,
        report.new_records
    );
    if report.store_errors > 0 {
        eprintln!("  {} {}", "store errors:".red(), report.store_errors);
    }
}

fn print_quality_summary(output: &QualityOutput) {
    let dedup = &output.dedup_report;
    eprintln!();
    eprintln!("{}", "Vetting summary".bright_cyan().bold());
    eprintln!(
        "  records: {}  unique: {}  duplicates: {} ({:.0}%)",
        dedup.total_records,
        dedup.unique_records,
        dedup.duplicates_found,
        dedup.duplicate_rate * 100.0
    );
    for pair in &dedup.pairs {
        eprintln!(
            "    {} {} → {}",
            "≡".yellow(),
            pair.duplicate_title,
            pair.original_title
        );
    }
    print_status_summary(&output.status_report);
}

fn print_status_summary(report: &StatusReport) {
    eprintln!(
        "  status: {} checked, {} skipped, {} unreachable",
        report.checked, report.skipped, report.unreachable
    );
    for change in &report.changes {
        eprintln!(
            "    {} {}: {} → {}",
            "↻".bright_blue(),
            change.title,
            change.from,
            change.to
        );
    }
}
