//! Scheduler loop and the per-job execution routine.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info};

use reporthub_entity::job::JobRequest;

use crate::error::JobExecutionError;
use crate::pool::Claim;
use crate::progress::ProgressReporter;
use crate::scheduler::SchedulerCore;

/// Checkpoint reached before the producer runs.
pub(crate) const PROGRESS_INITIALIZED: u8 = 10;
/// Checkpoint reached once the body is produced.
pub(crate) const PROGRESS_FORMATTING: u8 = 70;
/// Checkpoint reached once the body is rendered.
pub(crate) const PROGRESS_SAVING: u8 = 90;

/// Run claim passes until the shutdown signal flips to `true`.
///
/// A pass runs on every tick, on every wake-up (enqueue, cancel, a finished
/// job) and as soon as a deferred job becomes eligible.
pub(crate) async fn run_loop(core: Arc<SchedulerCore>, mut shutdown: watch::Receiver<bool>) {
    info!("Report scheduler loop started");

    loop {
        let launched = core.dispatch_ready().await;
        if launched > 0 {
            debug!(launched, "Dispatched report jobs");
        }

        let wait = core.next_wake_delay().await;
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Report scheduler loop received shutdown signal");
                    break;
                }
            }
            _ = core.wake.notified() => {}
            _ = time::sleep(wait) => {}
        }
    }
}

/// Execute one claimed attempt and hand its outcome to the scheduler.
///
/// Panics in a producer, renderer or artifact store are caught and count
/// as transient failures.
pub(crate) async fn run_job(core: Arc<SchedulerCore>, claim: Claim, request: JobRequest) {
    let started = Instant::now();
    let outcome = AssertUnwindSafe(generate(&core, &claim, &request))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(JobExecutionError::Transient(format!(
                "Report generation panicked: {}",
                panic_message(panic.as_ref())
            )))
        });

    debug!(
        job_id = %claim.id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        succeeded = outcome.is_ok(),
        "Execution attempt finished"
    );
    core.finish(claim.id, outcome).await;
}

async fn generate(
    core: &Arc<SchedulerCore>,
    claim: &Claim,
    request: &JobRequest,
) -> Result<String, JobExecutionError> {
    core.checkpoint(claim.id, &claim.token, PROGRESS_INITIALIZED, "Initializing report generation")
        .await?;

    let progress = ProgressReporter::new(claim.id, claim.token.clone(), Arc::clone(core));
    let body = tokio::select! {
        biased;
        _ = claim.token.cancelled() => return Err(JobExecutionError::Cancelled),
        body = core.dispatcher.produce(&request.report_type, &request.parameters, &progress) => body?,
    };

    core.checkpoint(claim.id, &claim.token, PROGRESS_FORMATTING, "Formatting report")
        .await?;
    let data = core
        .renderer
        .render(&body, request.format, request.language)
        .await?;

    core.checkpoint(claim.id, &claim.token, PROGRESS_SAVING, "Saving report")
        .await?;
    let url = core
        .artifacts
        .store(claim.id, request.format.extension(), data)
        .await?;

    Ok(url)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
