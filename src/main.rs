//! ReportHub: asynchronous report generation service.
//!
//! Main entry point that wires the store, renderer, artifact store and
//! scheduler together and runs until interrupted.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use reporthub_core::config::{AppConfig, ScheduleConfig};
use reporthub_core::error::AppError;
use reporthub_render::{LocalArtifactStore, ReportRenderer};
use reporthub_store::{JobStoreManager, SharedJobStore};
use reporthub_worker::producers::CustomReportProducer;
use reporthub_worker::{RecurringReports, ReportDispatcher, ReportScheduler};

/// ReportHub report scheduler
#[derive(Debug, Parser)]
#[command(name = "reporthub", version, about)]
struct Cli {
    /// Configuration overlay to load from `config/<env>.toml`.
    /// Falls back to `REPORTHUB_ENV`, then `development`.
    #[arg(long)]
    env: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let env = cli
        .env
        .or_else(|| std::env::var("REPORTHUB_ENV").ok())
        .unwrap_or_else(|| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Loaded configuration");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "ReportHub exited with an error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting ReportHub");

    // ── Step 1: Job store ────────────────────────────────────────
    tracing::info!(provider = %config.store.provider, "Initializing job store");
    let store: SharedJobStore = Arc::new(JobStoreManager::new(&config.store).await?);

    // ── Step 2: Rendering and artifacts ──────────────────────────
    let renderer = Arc::new(ReportRenderer::new(config.artifacts.document_fallback));
    let artifacts = Arc::new(
        LocalArtifactStore::new(
            &config.artifacts.root_path,
            &config.artifacts.public_base_url,
        )
        .await?,
    );
    tracing::info!(root = %config.artifacts.root_path, "Artifact store ready");

    // ── Step 3: Producers ────────────────────────────────────────
    let dispatcher =
        ReportDispatcher::new().with_producer(Arc::new(CustomReportProducer::new()));

    // ── Step 4: Scheduler ────────────────────────────────────────
    let scheduler = Arc::new(ReportScheduler::new(
        config.worker.clone(),
        store,
        dispatcher,
        renderer,
        artifacts,
    ));
    if config.worker.enabled {
        scheduler.start().await?;
    } else {
        tracing::warn!("Report worker disabled; jobs will be accepted but not executed");
    }

    // ── Step 5: Recurring schedules ──────────────────────────────
    let recurring = start_recurring(&scheduler, &config.schedules).await?;

    tracing::info!("ReportHub is running, press Ctrl+C to stop");
    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    if let Err(e) = recurring.shutdown().await {
        tracing::error!(error = %e, "Failed to stop recurring schedules");
    }
    if scheduler.is_running().await {
        scheduler.stop().await?;
    }

    tracing::info!("ReportHub stopped");
    Ok(())
}

/// Register and start the recurring schedules.
///
/// On failure the already running scheduler is stopped before the error is
/// returned, so in-flight jobs get their shutdown grace period.
async fn start_recurring(
    scheduler: &Arc<ReportScheduler>,
    schedules: &[ScheduleConfig],
) -> Result<RecurringReports, AppError> {
    let started = async {
        let recurring = RecurringReports::new(Arc::clone(scheduler)).await?;
        recurring.register_all(schedules).await?;
        recurring.start().await?;
        Ok::<_, AppError>(recurring)
    }
    .await;

    if started.is_err() && scheduler.is_running().await {
        tracing::warn!("Recurring schedules failed to start, stopping the report scheduler");
        if let Err(e) = scheduler.stop().await {
            tracing::error!(error = %e, "Failed to stop the report scheduler");
        }
    }
    started
}

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
}
