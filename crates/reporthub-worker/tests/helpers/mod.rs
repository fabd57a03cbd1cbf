//! Shared helpers for scheduler integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::Semaphore;

use reporthub_core::config::WorkerConfig;
use reporthub_core::error::AppError;
use reporthub_core::result::AppResult;
use reporthub_core::traits::record_store::{RecordFilter, RecordStore};
use reporthub_core::types::id::JobId;
use reporthub_entity::job::{JobRecord, JobStatus, ReportType};
use reporthub_render::{LocalArtifactStore, ReportRenderer};
use reporthub_store::SharedJobStore;
use reporthub_store::memory::MemoryJobStore;
use reporthub_worker::{ProgressReporter, ReportDispatcher, ReportError, ReportProducer, ReportScheduler};

/// Public base URL used by the test artifact store.
pub const BASE_URL: &str = "http://reports.test/files";

/// Worker configuration with fast backoff and a short tick.
pub fn fast_config(max_concurrent: usize) -> WorkerConfig {
    WorkerConfig {
        max_concurrent,
        tick_interval_seconds: 1,
        retry_base_delay_ms: 5,
        retry_max_delay_ms: 100,
        shutdown_grace_seconds: 5,
        ..WorkerConfig::default()
    }
}

/// Scheduler wired to a memory (or given) store and a temp artifact dir.
pub struct TestApp {
    /// Scheduler under test
    pub scheduler: Arc<ReportScheduler>,
    /// Backing job store
    pub store: SharedJobStore,
    /// Directory receiving rendered reports
    pub artifacts_dir: TempDir,
}

impl TestApp {
    /// Build an app over an in-memory store.
    pub async fn new(config: WorkerConfig, producers: Vec<Arc<dyn ReportProducer>>) -> Self {
        Self::with_store(config, Arc::new(MemoryJobStore::new()), producers).await
    }

    /// Build an app over `store`.
    pub async fn with_store(
        config: WorkerConfig,
        store: SharedJobStore,
        producers: Vec<Arc<dyn ReportProducer>>,
    ) -> Self {
        let artifacts_dir = tempfile::tempdir().expect("Failed to create artifact dir");
        let artifacts = LocalArtifactStore::new(artifacts_dir.path().to_str().unwrap(), BASE_URL)
            .await
            .expect("Failed to init artifact store");

        let mut dispatcher = ReportDispatcher::new();
        for producer in producers {
            dispatcher.register(producer);
        }

        let scheduler = Arc::new(ReportScheduler::new(
            config,
            Arc::clone(&store),
            dispatcher,
            Arc::new(ReportRenderer::default()),
            Arc::new(artifacts),
        ));

        Self {
            scheduler,
            store,
            artifacts_dir,
        }
    }

    /// Poll until the job satisfies `done`, panicking after five seconds.
    pub async fn wait_for(&self, id: JobId, done: impl Fn(&JobRecord) -> bool) -> JobRecord {
        for _ in 0..1000 {
            let record = self.scheduler.get_status(id).await.expect("job must exist");
            if done(&record) {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let record = self.scheduler.get_status(id).await.expect("job must exist");
        panic!("Timed out waiting for job {id}, last seen {:?}", record.status);
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait_terminal(&self, id: JobId) -> JobRecord {
        self.wait_for(id, |r| r.status.is_terminal()).await
    }

    /// Number of records currently `processing` in the store.
    pub async fn processing_in_store(&self) -> usize {
        let processing = |r: &JobRecord| r.status == JobStatus::Processing;
        self.store.list(Some(&processing)).await.unwrap().len()
    }
}

/// One scripted attempt outcome.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return this error.
    Fail(ReportError),
    /// Panic inside the producer.
    Panic,
}

/// Producer that plays back a script of failures, then succeeds.
///
/// Records call order, concurrent invocations and the peak concurrency it
/// observed.
#[derive(Debug)]
pub struct ScriptedProducer {
    report_type: ReportType,
    script: Mutex<VecDeque<Step>>,
    body: Value,
    delay: Duration,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    order: Mutex<Vec<JobId>>,
}

impl ScriptedProducer {
    /// Producer for `report_type` that always succeeds with a tabular body.
    pub fn new(report_type: impl Into<ReportType>) -> Self {
        Self {
            report_type: report_type.into(),
            script: Mutex::new(VecDeque::new()),
            body: json!({
                "title": "Scripted Report",
                "data": [ { "id": 1, "name": "alpha" }, { "id": 2, "name": "beta" } ]
            }),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Play these steps before succeeding.
    pub fn with_script(self, steps: impl IntoIterator<Item = Step>) -> Self {
        *self.script.lock().unwrap() = steps.into_iter().collect();
        self
    }

    /// Fail `n` times with a transient data-source error first.
    pub fn failing(self, n: usize) -> Self {
        self.with_script(
            (0..n).map(|i| Step::Fail(ReportError::DataFetchFailed(format!("upstream timeout #{}", i + 1)))),
        )
    }

    /// Body returned on success.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Time spent in every invocation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous invocations seen.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Job ids in invocation order.
    pub fn order(&self) -> Vec<JobId> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportProducer for ScriptedProducer {
    fn report_type(&self) -> ReportType {
        self.report_type.clone()
    }

    async fn produce(&self, _parameters: &Value, progress: &ProgressReporter) -> Result<Value, ReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(progress.job_id());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let step = self.script.lock().unwrap().pop_front();
        let outcome = async {
            progress.report(30, "Fetching rows").await?;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match step {
                Some(Step::Fail(err)) => Err(err),
                Some(Step::Panic) => panic!("scripted producer panic"),
                None => Ok(self.body.clone()),
            }
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Producer that blocks until a permit is added to its gate.
#[derive(Debug)]
pub struct GatedProducer {
    report_type: ReportType,
    gate: Arc<Semaphore>,
    started: AtomicUsize,
}

impl GatedProducer {
    /// Create a closed gate for `report_type`.
    pub fn new(report_type: impl Into<ReportType>) -> Self {
        Self {
            report_type: report_type.into(),
            gate: Arc::new(Semaphore::new(0)),
            started: AtomicUsize::new(0),
        }
    }

    /// Let `n` blocked invocations through.
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Number of invocations that have started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportProducer for GatedProducer {
    fn report_type(&self) -> ReportType {
        self.report_type.clone()
    }

    async fn produce(&self, _parameters: &Value, progress: &ProgressReporter) -> Result<Value, ReportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        progress.report(20, "Waiting for data source").await?;
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ReportError::Internal(e.to_string()))?;
        permit.forget();
        progress.report(60, "Data source answered").await?;
        Ok(json!({ "data": [ { "ok": true } ] }))
    }
}

/// Memory store whose next `n` writes of finished records fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryJobStore,
    failing_final_writes: AtomicUsize,
    failed: AtomicUsize,
}

impl FlakyStore {
    /// Fail the next `n` writes of completed, failed or cancelled records.
    pub fn fail_final_writes(&self, n: usize) {
        self.failing_final_writes.store(n, Ordering::SeqCst);
    }

    /// Number of writes rejected so far.
    pub fn failed_writes(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore<JobRecord, JobId> for FlakyStore {
    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        if record.status.is_terminal()
            && self
                .failing_final_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            self.failed.fetch_add(1, Ordering::SeqCst);
            return Err(AppError::storage("disk unavailable"));
        }
        self.inner.put(record).await
    }

    async fn get(&self, id: &JobId) -> AppResult<Option<JobRecord>> {
        self.inner.get(id).await
    }

    async fn list(&self, filter: Option<RecordFilter<'_, JobRecord>>) -> AppResult<Vec<JobRecord>> {
        self.inner.list(filter).await
    }
}
