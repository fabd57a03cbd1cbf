//! Report job scheduler.
//!
//! [`ReportScheduler`] owns every job record between enqueue and its
//! terminal state. Active records, the priority queue and the worker pool
//! sit behind one async mutex; each transition is validated, written
//! through to the store and applied while that lock is held. A job's slot
//! is released in the same critical section as its final transition, so
//! a late release can never free a slot that a retry of the same job has
//! since re-claimed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use validator::Validate;

use reporthub_core::config::WorkerConfig;
use reporthub_core::error::AppError;
use reporthub_core::result::AppResult;
use reporthub_core::traits::artifact::ArtifactStore;
use reporthub_core::types::id::JobId;
use reporthub_entity::job::{JobRecord, JobRequest, JobStatus};
use reporthub_render::Renderer;
use reporthub_store::SharedJobStore;

use crate::clock::{Clock, SystemClock};
use crate::dispatcher::ReportDispatcher;
use crate::error::JobExecutionError;
use crate::pool::WorkerPool;
use crate::queue::PriorityQueue;
use crate::retry::RetryPolicy;
use crate::runner;

/// Lower bound on the loop's sleep between passes.
const MIN_LOOP_WAIT: Duration = Duration::from_millis(20);

/// Job counts by status plus mean processing time of completed jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    /// All records in the store.
    pub total_jobs: usize,
    /// Records waiting to be claimed.
    pub queued_jobs: usize,
    /// Records currently holding a slot.
    pub processing_jobs: usize,
    /// Completed records.
    pub completed_jobs: usize,
    /// Failed records.
    pub failed_jobs: usize,
    /// Cancelled records.
    pub cancelled_jobs: usize,
    /// Mean of `completed_at - started_at` over completed records, 0 when none.
    pub avg_processing_time_ms: f64,
}

impl QueueStats {
    /// Aggregate a set of records.
    pub fn from_records(records: &[JobRecord]) -> Self {
        let mut stats = Self {
            total_jobs: records.len(),
            ..Self::default()
        };
        let mut total_ms = 0i64;
        for record in records {
            match record.status {
                JobStatus::Queued => stats.queued_jobs += 1,
                JobStatus::Processing => stats.processing_jobs += 1,
                JobStatus::Completed => stats.completed_jobs += 1,
                JobStatus::Failed => stats.failed_jobs += 1,
                JobStatus::Cancelled => stats.cancelled_jobs += 1,
            }
            if let Some(elapsed) = record.processing_time() {
                total_ms += elapsed.num_milliseconds();
            }
        }
        if stats.completed_jobs > 0 {
            stats.avg_processing_time_ms = total_ms as f64 / stats.completed_jobs as f64;
        }
        stats
    }
}

/// Criteria for [`ReportScheduler::list_jobs`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Only records in this status.
    pub status: Option<JobStatus>,
    /// Only records requested by this user.
    pub user_id: Option<String>,
}

impl JobFilter {
    /// Restrict to a status.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to a user.
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Whether `record` passes the filter.
    pub fn matches(&self, record: &JobRecord) -> bool {
        self.status.is_none_or(|s| record.status == s)
            && self
                .user_id
                .as_deref()
                .is_none_or(|u| record.request.user_id == u)
    }
}

#[derive(Debug)]
struct SchedulerState {
    /// Non-terminal records owned by this process.
    active: HashMap<JobId, JobRecord>,
    /// Final records whose write to the store failed, retried every pass.
    unsaved: HashMap<JobId, JobRecord>,
    queue: PriorityQueue,
    pool: WorkerPool,
}

/// State and collaborators shared by the scheduler handle, its loop and the
/// execution routines.
#[derive(Debug)]
pub(crate) struct SchedulerCore {
    config: WorkerConfig,
    store: SharedJobStore,
    pub(crate) dispatcher: ReportDispatcher,
    pub(crate) renderer: Arc<dyn Renderer>,
    pub(crate) artifacts: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    state: Mutex<SchedulerState>,
    pub(crate) wake: Notify,
    tasks: TaskTracker,
}

impl SchedulerCore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Claim every eligible job that fits in the pool and spawn its routine.
    pub(crate) async fn dispatch_ready(self: &Arc<Self>) -> usize {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        self.flush_unsaved(state).await;
        let now = self.now();
        let mut launched = 0;

        while let Some(claim) = state.pool.try_claim(&mut state.queue, now) {
            let Some(queued) = state.active.get(&claim.id).cloned() else {
                warn!(job_id = %claim.id, "Queued job has no active record, dropping it");
                state.pool.release(&claim.id);
                continue;
            };

            let mut record = queued.clone();
            if let Err(e) = record.mark_processing(now) {
                warn!(job_id = %claim.id, error = %e, "Skipping job that cannot be claimed");
                state.pool.release(&claim.id);
                continue;
            }

            if let Err(e) = self.store.put(&record).await {
                error!(job_id = %claim.id, error = %e, "Failed to persist claim, job stays queued");
                state.pool.release(&claim.id);
                state.queue.push(&queued);
                break;
            }

            info!(
                job_id = %record.id,
                report_type = %record.request.report_type,
                priority = %record.request.priority,
                attempt = record.retry_count + 1,
                "Claimed report job"
            );

            let request = record.request.clone();
            state.active.insert(claim.id, record);
            self.tasks
                .spawn(runner::run_job(Arc::clone(self), claim, request));
            launched += 1;
        }

        launched
    }

    /// Persist a checkpoint of a processing job.
    ///
    /// Fails with [`JobExecutionError::Cancelled`] once the job's token has
    /// fired or the job left `processing`.
    pub(crate) async fn checkpoint(
        &self,
        id: JobId,
        token: &CancellationToken,
        percent: u8,
        message: &str,
    ) -> Result<(), JobExecutionError> {
        if token.is_cancelled() {
            return Err(JobExecutionError::Cancelled);
        }

        let mut state = self.state.lock().await;
        let mut next = match state.active.get(&id) {
            Some(record) if record.status == JobStatus::Processing => record.clone(),
            _ => return Err(JobExecutionError::Cancelled),
        };
        next.record_progress(percent, Some(message), self.now());

        self.store.put(&next).await.map_err(|e| {
            error!(job_id = %id, error = %e, "Failed to persist job progress");
            JobExecutionError::Transient(format!("Failed to persist progress: {e}"))
        })?;

        debug!(job_id = %id, progress = next.progress, checkpoint = message, "Job checkpoint");
        state.active.insert(id, next);
        Ok(())
    }

    /// Apply the outcome of an execution attempt and release its slot.
    pub(crate) async fn finish(&self, id: JobId, outcome: Result<String, JobExecutionError>) {
        let now = self.now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let mut next = match state.active.get(&id) {
            Some(record) if record.status == JobStatus::Processing => record.clone(),
            _ => {
                debug!(job_id = %id, "Job is no longer processing, discarding outcome");
                return;
            }
        };

        let transition = match outcome {
            Ok(url) => next.mark_completed(url, now),
            Err(JobExecutionError::Cancelled) => {
                // Interrupted by shutdown: the stored record stays `processing`
                // and is re-queued by the next start.
                state.active.remove(&id);
                state.pool.release(&id);
                warn!(job_id = %id, "Report job interrupted, left for recovery");
                return;
            }
            Err(err) => {
                let decision = self.retry.decide(next.retry_count, next.max_retries, &err);
                if decision.retryable {
                    next.requeue_for_retry(not_before(now, decision.delay), &err.to_string(), now)
                } else {
                    next.mark_failed(err.to_string(), now)
                }
            }
        };

        if let Err(e) = transition {
            error!(job_id = %id, error = %e, "Rejected job transition");
            state.active.remove(&id);
            state.pool.release(&id);
            return;
        }

        match self.store.put(&next).await {
            Ok(()) => {
                match next.status {
                    JobStatus::Completed => info!(
                        job_id = %id,
                        result_url = next.result_url.as_deref().unwrap_or_default(),
                        "Report job completed"
                    ),
                    JobStatus::Queued => warn!(
                        job_id = %id,
                        retry = next.retry_count,
                        max_retries = next.max_retries,
                        not_before = ?next.request.scheduled_at,
                        "Report job failed, retry scheduled"
                    ),
                    _ => error!(
                        job_id = %id,
                        error = next.error.as_deref().unwrap_or_default(),
                        retry_count = next.retry_count,
                        "Report job failed"
                    ),
                }
                if next.status == JobStatus::Queued {
                    state.queue.push(&next);
                    state.active.insert(id, next);
                } else {
                    state.active.remove(&id);
                }
            }
            Err(e) => {
                error!(
                    job_id = %id,
                    status = %next.status,
                    error = %e,
                    "Failed to persist job outcome, retrying on the next pass"
                );
                if next.status == JobStatus::Queued {
                    // The next claim writes the record again.
                    state.queue.push(&next);
                    state.active.insert(id, next);
                } else {
                    state.active.remove(&id);
                    state.unsaved.insert(id, next);
                }
            }
        }

        state.pool.release(&id);
        drop(guard);
        self.wake.notify_one();
    }

    /// Retry writing final records that could not be persisted earlier.
    async fn flush_unsaved(&self, state: &mut SchedulerState) {
        if state.unsaved.is_empty() {
            return;
        }
        let mut saved = Vec::new();
        for (id, record) in &state.unsaved {
            match self.store.put(record).await {
                Ok(()) => {
                    info!(job_id = %id, status = %record.status, "Persisted deferred job outcome");
                    saved.push(*id);
                }
                Err(e) => {
                    warn!(job_id = %id, error = %e, "Job outcome still not persisted");
                }
            }
        }
        for id in saved {
            state.unsaved.remove(&id);
        }
    }

    /// How long the loop may sleep before the next pass.
    pub(crate) async fn next_wake_delay(&self) -> Duration {
        let tick = self.config.tick_interval();
        let state = self.state.lock().await;
        let now = self.now();
        state
            .queue
            .next_eligible_at(now)
            .and_then(|at| (at - now).to_std().ok())
            .map_or(tick, |until| until.min(tick))
            .max(MIN_LOOP_WAIT)
    }

    /// Load unfinished records left in the store by an earlier run.
    async fn recover(&self) -> AppResult<usize> {
        let unfinished =
            |r: &JobRecord| matches!(r.status, JobStatus::Queued | JobStatus::Processing);
        let records = self.store.list(Some(&unfinished)).await?;
        let now = self.now();

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let mut recovered = 0;
        for mut record in records {
            if state.active.contains_key(&record.id) || state.unsaved.contains_key(&record.id) {
                continue;
            }
            if record.status == JobStatus::Processing {
                record.requeue_interrupted(now)?;
                self.store.put(&record).await?;
                warn!(job_id = %record.id, "Re-queued job interrupted by an earlier shutdown");
            }
            state.queue.push(&record);
            state.active.insert(record.id, record);
            recovered += 1;
        }
        Ok(recovered)
    }
}

fn not_before(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug)]
struct LoopHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Asynchronous report-generation job scheduler.
///
/// Construct once, share behind an `Arc`, then [`start`](Self::start) the
/// loop. [`tick`](Self::tick) runs a single claim pass and works without a
/// running loop.
#[derive(Debug)]
pub struct ReportScheduler {
    core: Arc<SchedulerCore>,
    runtime: Mutex<Option<LoopHandle>>,
}

impl ReportScheduler {
    /// Create a scheduler on the system clock.
    pub fn new(
        config: WorkerConfig,
        store: SharedJobStore,
        dispatcher: ReportDispatcher,
        renderer: Arc<dyn Renderer>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self::with_clock(
            config,
            store,
            dispatcher,
            renderer,
            artifacts,
            Arc::new(SystemClock),
        )
    }

    /// Create a scheduler on the given clock.
    pub fn with_clock(
        config: WorkerConfig,
        store: SharedJobStore,
        dispatcher: ReportDispatcher,
        renderer: Arc<dyn Renderer>,
        artifacts: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = SchedulerState {
            active: HashMap::new(),
            unsaved: HashMap::new(),
            queue: PriorityQueue::new(),
            pool: WorkerPool::new(config.max_concurrent),
        };
        let core = SchedulerCore {
            retry: RetryPolicy::from_config(&config),
            config,
            store,
            dispatcher,
            renderer,
            artifacts,
            clock,
            state: Mutex::new(state),
            wake: Notify::new(),
            tasks: TaskTracker::new(),
        };
        Self {
            core: Arc::new(core),
            runtime: Mutex::new(None),
        }
    }

    /// Worker configuration in effect.
    pub fn config(&self) -> &WorkerConfig {
        &self.core.config
    }

    /// Accept a request and persist it as a `queued` record.
    ///
    /// Any id on the request is replaced by a freshly generated one.
    pub async fn enqueue(&self, request: JobRequest) -> AppResult<JobRecord> {
        request.validate()?;
        let record = JobRecord::new(
            JobId::new(),
            request,
            self.core.config.default_max_retries,
            self.core.now(),
        );

        {
            let mut state = self.core.state.lock().await;
            self.core.store.put(&record).await?;
            state.queue.push(&record);
            state.active.insert(record.id, record.clone());
        }

        info!(
            job_id = %record.id,
            report_type = %record.request.report_type,
            format = %record.request.format,
            priority = %record.request.priority,
            user_id = %record.request.user_id,
            "Enqueued report job"
        );
        self.core.wake.notify_one();
        Ok(record)
    }

    /// Current record of a job, read from the store.
    ///
    /// A final outcome that is still waiting to be persisted wins over the
    /// stored record.
    pub async fn get_status(&self, id: JobId) -> AppResult<JobRecord> {
        if let Some(record) = self.core.state.lock().await.unsaved.get(&id) {
            return Ok(record.clone());
        }
        self.core
            .store
            .get(&id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Report job not found: {id}")))
    }

    /// Cancel a queued or processing job.
    ///
    /// Returns `false` without touching anything when the job is unknown or
    /// already terminal. A processing job's slot is freed immediately; its
    /// routine stops at the next checkpoint.
    pub async fn cancel(&self, id: JobId) -> bool {
        let now = self.core.now();
        let mut guard = self.core.state.lock().await;
        let state = &mut *guard;

        let current = match state.active.get(&id).or_else(|| state.unsaved.get(&id)) {
            Some(record) => record.clone(),
            None => match self.core.store.get(&id).await {
                Ok(Some(record)) => record,
                Ok(None) => return false,
                Err(e) => {
                    error!(job_id = %id, error = %e, "Failed to load job for cancellation");
                    return false;
                }
            },
        };
        if current.status.is_terminal() {
            debug!(job_id = %id, status = %current.status, "Ignoring cancel of finished job");
            return false;
        }

        let mut next = current.clone();
        if let Err(e) = next.mark_cancelled(now) {
            warn!(job_id = %id, error = %e, "Job cannot be cancelled");
            return false;
        }
        if let Err(e) = self.core.store.put(&next).await {
            error!(job_id = %id, error = %e, "Failed to persist cancellation");
            return false;
        }

        state.queue.remove(&id);
        state.pool.cancel(&id);
        state.active.remove(&id);
        drop(guard);

        info!(job_id = %id, previous = %current.status, "Cancelled report job");
        self.core.wake.notify_one();
        true
    }

    /// Aggregate counts over every record in the store.
    pub async fn queue_stats(&self) -> AppResult<QueueStats> {
        let records = self.core.store.list(None).await?;
        Ok(QueueStats::from_records(&records))
    }

    /// Records matching `filter`, oldest first.
    pub async fn list_jobs(&self, filter: &JobFilter) -> AppResult<Vec<JobRecord>> {
        let matches = |r: &JobRecord| filter.matches(r);
        self.core.store.list(Some(&matches)).await
    }

    /// Number of jobs holding a slot right now.
    pub async fn processing_count(&self) -> usize {
        self.core.state.lock().await.pool.active_count()
    }

    /// Number of jobs waiting in the queue, eligible or not.
    pub async fn queued_count(&self) -> usize {
        self.core.state.lock().await.queue.len()
    }

    /// Run one claim pass. Returns the number of jobs started.
    pub async fn tick(&self) -> usize {
        self.core.dispatch_ready().await
    }

    /// Whether the loop is running.
    pub async fn is_running(&self) -> bool {
        self.runtime.lock().await.is_some()
    }

    /// Recover unfinished records from the store and start the loop.
    pub async fn start(&self) -> AppResult<()> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            return Err(AppError::conflict("Report scheduler is already running"));
        }

        let recovered = self.core.recover().await?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(runner::run_loop(Arc::clone(&self.core), shutdown_rx));
        *runtime = Some(LoopHandle { shutdown, handle });

        info!(
            max_concurrent = self.core.config.max_concurrent,
            tick_interval_secs = self.core.config.tick_interval_seconds,
            recovered,
            "Report scheduler started"
        );
        Ok(())
    }

    /// Stop the loop and wait for in-flight jobs.
    ///
    /// Jobs still running after the grace period are interrupted; their
    /// records stay `processing` in the store and are re-queued on the next
    /// start.
    pub async fn stop(&self) -> AppResult<()> {
        if let Some(LoopHandle { shutdown, handle }) = self.runtime.lock().await.take() {
            let _ = shutdown.send(true);
            if let Err(e) = handle.await {
                error!(error = %e, "Report scheduler loop ended abnormally");
            }
        }

        let grace = self.core.config.shutdown_grace();
        info!(
            in_flight = self.core.tasks.len(),
            grace_secs = grace.as_secs(),
            "Waiting for in-flight report jobs"
        );

        self.core.tasks.close();
        let mut drained = time::timeout(grace, self.core.tasks.wait()).await.is_ok();
        if !drained {
            let interrupted = self.core.state.lock().await.pool.interrupt_all();
            warn!(interrupted, "Shutdown grace elapsed, interrupting report jobs");
            drained = time::timeout(grace, self.core.tasks.wait()).await.is_ok();
        }
        self.core.tasks.reopen();

        {
            let mut state = self.core.state.lock().await;
            self.core.flush_unsaved(&mut state).await;
            if !state.unsaved.is_empty() {
                error!(
                    pending = state.unsaved.len(),
                    "Some job outcomes were never persisted; the store keeps them as processing until the next start"
                );
            }
        }

        if !drained {
            return Err(AppError::scheduler(
                "In-flight report jobs did not stop within the grace period",
            ));
        }
        info!("Report scheduler stopped");
        Ok(())
    }
}
