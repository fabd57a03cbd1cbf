//! Integration tests for the report scheduler: retries, capacity, ordering,
//! cancellation and restart recovery.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use reporthub_core::types::id::JobId;
use reporthub_entity::job::{JobPriority, JobRecord, JobRequest, JobStatus, ReportFormat};
use reporthub_store::SharedJobStore;
use reporthub_store::file::FileJobStore;
use reporthub_worker::ReportError;

use helpers::{FlakyStore, GatedProducer, ScriptedProducer, Step, TestApp, fast_config};

fn custom(format: ReportFormat) -> JobRequest {
    JobRequest::new("custom", format, "analyst-1")
}

#[tokio::test]
async fn test_fails_twice_then_succeeds() {
    let producer = Arc::new(ScriptedProducer::new("custom").failing(2));
    let app = TestApp::new(fast_config(3), vec![producer.clone()]).await;
    app.scheduler.start().await.unwrap();

    let job = app
        .scheduler
        .enqueue(custom(ReportFormat::Json).with_max_retries(2))
        .await
        .unwrap();
    let done = app.wait_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.retry_count, 2);
    assert_eq!(done.progress, 100);
    assert!(done.error.is_none());
    assert!(done.result_url.is_some());
    assert_eq!(
        done.request.metadata["lastError"],
        json!("Failed to fetch report data: upstream timeout #2")
    );
    assert_eq!(producer.calls(), 3);

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_retry_bound_is_respected() {
    let producer = Arc::new(ScriptedProducer::new("custom").failing(10));
    let app = TestApp::new(fast_config(1), vec![producer.clone()]).await;
    app.scheduler.start().await.unwrap();

    let job = app
        .scheduler
        .enqueue(custom(ReportFormat::Json).with_max_retries(2))
        .await
        .unwrap();
    let done = app.wait_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.retry_count, 2);
    assert_eq!(producer.calls(), 3);
    assert!(done.error.unwrap().contains("upstream timeout #3"));
    assert!(done.result_url.is_none());
    assert!(done.completed_at.is_some());

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_report_type_fails_without_retry() {
    let app = TestApp::new(fast_config(1), vec![Arc::new(ScriptedProducer::new("custom"))]).await;
    app.scheduler.start().await.unwrap();

    let job = app
        .scheduler
        .enqueue(JobRequest::new("nonexistent", ReportFormat::Json, "analyst-1"))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);

    let done = app.wait_terminal(job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.retry_count, 0);
    assert!(done.error.unwrap().contains("Unknown report type"));

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_permanent_errors_skip_retry() {
    let producer = Arc::new(
        ScriptedProducer::new("custom")
            .with_script([Step::Fail(ReportError::InvalidParameters("missing countryId".into()))]),
    );
    let app = TestApp::new(fast_config(1), vec![producer.clone()]).await;
    app.scheduler.start().await.unwrap();

    let job = app.scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap();
    let done = app.wait_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.retry_count, 0);
    assert_eq!(producer.calls(), 1);

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_non_tabular_csv_fails_permanently() {
    let producer = Arc::new(ScriptedProducer::new("custom").with_body(json!({ "title": "No rows" })));
    let app = TestApp::new(fast_config(1), vec![producer]).await;
    app.scheduler.start().await.unwrap();

    let job = app.scheduler.enqueue(custom(ReportFormat::Csv)).await.unwrap();
    let done = app.wait_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.retry_count, 0);
    assert!(done.error.unwrap().contains("CSV"));

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_panicking_producer_is_retried() {
    let producer = Arc::new(ScriptedProducer::new("custom").with_script([Step::Panic]));
    let app = TestApp::new(fast_config(1), vec![producer.clone()]).await;
    app.scheduler.start().await.unwrap();

    let job = app.scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap();
    let done = app.wait_terminal(job.id).await;

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.retry_count, 1);
    assert!(
        done.request.metadata["lastError"]
            .as_str()
            .unwrap()
            .contains("scripted producer panic")
    );
    assert_eq!(app.scheduler.processing_count().await, 0);

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_four_jobs_two_slots() {
    let producer = Arc::new(ScriptedProducer::new("custom").with_delay(Duration::from_millis(60)));
    let app = TestApp::new(fast_config(2), vec![producer.clone()]).await;

    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(app.scheduler.enqueue(custom(ReportFormat::Csv)).await.unwrap().id);
    }
    app.scheduler.start().await.unwrap();

    let mut peak_in_store = 0;
    loop {
        peak_in_store = peak_in_store.max(app.processing_in_store().await);
        let stats = app.scheduler.queue_stats().await.unwrap();
        if stats.completed_jobs == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(peak_in_store <= 2, "saw {peak_in_store} processing records");
    assert_eq!(producer.peak_in_flight(), 2);
    for id in ids {
        let record = app.scheduler.get_status(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.progress, 100);
    }

    let stats = app.scheduler.queue_stats().await.unwrap();
    assert_eq!(stats.total_jobs, 4);
    assert!(stats.avg_processing_time_ms >= 60.0);

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_slots_are_released_between_jobs() {
    let producer = Arc::new(ScriptedProducer::new("custom").failing(1));
    let app = TestApp::new(fast_config(1), vec![producer.clone()]).await;
    app.scheduler.start().await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(app.scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap().id);
    }
    for id in &ids {
        assert_eq!(app.wait_terminal(*id).await.status, JobStatus::Completed);
    }

    assert_eq!(producer.peak_in_flight(), 1);
    assert_eq!(producer.calls(), 6);
    assert_eq!(app.scheduler.processing_count().await, 0);
    assert_eq!(app.scheduler.queued_count().await, 0);

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_priority_order_with_single_slot() {
    let producer = Arc::new(ScriptedProducer::new("custom"));
    let app = TestApp::new(fast_config(1), vec![producer.clone()]).await;

    let low = app
        .scheduler
        .enqueue(custom(ReportFormat::Json).with_priority(JobPriority::Low))
        .await
        .unwrap();
    let normal = app.scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap();
    let high = app
        .scheduler
        .enqueue(custom(ReportFormat::Json).with_priority(JobPriority::High))
        .await
        .unwrap();
    let deferred = app
        .scheduler
        .enqueue(
            custom(ReportFormat::Json)
                .with_priority(JobPriority::High)
                .with_scheduled_at(Utc::now() + chrono::Duration::milliseconds(300)),
        )
        .await
        .unwrap();

    app.scheduler.start().await.unwrap();
    for id in [low.id, normal.id, high.id, deferred.id] {
        app.wait_terminal(id).await;
    }

    assert_eq!(producer.order(), vec![high.id, normal.id, low.id, deferred.id]);
    let deferred = app.scheduler.get_status(deferred.id).await.unwrap();
    assert!(deferred.started_at.unwrap() >= deferred.request.scheduled_at.unwrap());

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancel_processing_job_frees_its_slot() {
    let producer = Arc::new(GatedProducer::new("custom"));
    let app = TestApp::new(fast_config(1), vec![producer.clone()]).await;
    app.scheduler.start().await.unwrap();

    let first = app.scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap();
    let second = app.scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap();
    app.wait_for(first.id, |r| r.status == JobStatus::Processing && r.progress >= 20)
        .await;

    assert!(app.scheduler.cancel(first.id).await);
    let cancelled = app.scheduler.get_status(first.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    // The slot is free even though the first producer never got its permit.
    app.wait_for(second.id, |r| r.status == JobStatus::Processing).await;
    producer.open(1);
    let done = app.wait_terminal(second.id).await;
    assert_eq!(done.status, JobStatus::Completed);

    assert_eq!(
        app.scheduler.get_status(first.id).await.unwrap().status,
        JobStatus::Cancelled
    );
    assert!(!app.scheduler.cancel(first.id).await);
    assert!(!app.scheduler.cancel(second.id).await);
    assert!(!app.scheduler.cancel(JobId::new()).await);

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancel_leaves_finished_jobs_untouched() {
    let app = TestApp::new(fast_config(2), vec![Arc::new(ScriptedProducer::new("custom"))]).await;
    app.scheduler.start().await.unwrap();

    let completed = app.scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap();
    let failed = app
        .scheduler
        .enqueue(JobRequest::new("nonexistent", ReportFormat::Json, "analyst-1"))
        .await
        .unwrap();
    let completed = app.wait_terminal(completed.id).await;
    let failed = app.wait_terminal(failed.id).await;
    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(failed.status, JobStatus::Failed);

    for snapshot in [completed, failed] {
        assert!(!app.scheduler.cancel(snapshot.id).await);
        let after = app.scheduler.get_status(snapshot.id).await.unwrap();
        assert_eq!(after, snapshot);
    }

    let stats = app.scheduler.queue_stats().await.unwrap();
    assert_eq!(stats.cancelled_jobs, 0);

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_distinct_ids_under_concurrent_enqueue() {
    let app = TestApp::new(fast_config(1), vec![Arc::new(GatedProducer::new("custom"))]).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let scheduler = Arc::clone(&app.scheduler);
        handles.push(tokio::spawn(async move {
            scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap().id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);
    assert_eq!(app.scheduler.queue_stats().await.unwrap().queued_jobs, 20);
}

#[tokio::test]
async fn test_artifact_is_written_under_public_url() {
    let app = TestApp::new(fast_config(1), vec![Arc::new(ScriptedProducer::new("custom"))]).await;
    app.scheduler.start().await.unwrap();

    let job = app
        .scheduler
        .enqueue(custom(ReportFormat::Csv).with_language(reporthub_entity::job::Language::Ar))
        .await
        .unwrap();
    let done = app.wait_terminal(job.id).await;

    let url = done.result_url.unwrap();
    let prefix = format!("{}/report_{}_", helpers::BASE_URL, job.id);
    assert!(url.starts_with(&prefix), "unexpected url {url}");
    let file_name = url.rsplit('/').next().unwrap();
    let contents = std::fs::read_to_string(app.artifacts_dir.path().join(file_name)).unwrap();
    assert_eq!(contents, "\u{feff}id,name\n1,alpha\n2,beta\n");

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_jobs() {
    let producer = Arc::new(ScriptedProducer::new("custom").with_delay(Duration::from_millis(100)));
    let app = TestApp::new(fast_config(1), vec![producer]).await;
    app.scheduler.start().await.unwrap();

    let job = app.scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap();
    app.wait_for(job.id, |r| r.status == JobStatus::Processing).await;

    app.scheduler.stop().await.unwrap();
    assert!(!app.scheduler.is_running().await);
    let record = app.scheduler.get_status(job.id).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_str().unwrap().to_string();

    // A previous process left one queued record and one it was processing.
    let store: SharedJobStore = Arc::new(FileJobStore::new(&path).await.unwrap());
    let now = Utc::now();
    let queued = JobRecord::new(JobId::new(), custom(ReportFormat::Json), 3, now);
    let mut interrupted = JobRecord::new(JobId::new(), custom(ReportFormat::Json), 3, now);
    interrupted.mark_processing(now).unwrap();
    store.put(&queued).await.unwrap();
    store.put(&interrupted).await.unwrap();

    let reopened: SharedJobStore = Arc::new(FileJobStore::new(&path).await.unwrap());
    let app = TestApp::with_store(
        fast_config(2),
        reopened,
        vec![Arc::new(ScriptedProducer::new("custom"))],
    )
    .await;
    app.scheduler.start().await.unwrap();

    for id in [queued.id, interrupted.id] {
        let done = app.wait_terminal(id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.retry_count, 0);
    }

    app.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_unpersisted_outcome_is_written_on_a_later_pass() {
    let flaky = Arc::new(FlakyStore::default());
    flaky.fail_final_writes(1);
    let store: SharedJobStore = flaky.clone();
    let app = TestApp::with_store(
        fast_config(1),
        store,
        vec![Arc::new(ScriptedProducer::new("custom"))],
    )
    .await;
    app.scheduler.start().await.unwrap();

    let job = app.scheduler.enqueue(custom(ReportFormat::Json)).await.unwrap();
    let done = app.wait_terminal(job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(!app.scheduler.cancel(job.id).await);

    let mut stored = None;
    for _ in 0..400 {
        stored = app.store.get(&job.id).await.unwrap();
        if stored.as_ref().is_some_and(|r| r.status == JobStatus::Completed) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let stored = stored.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.result_url, done.result_url);
    assert_eq!(flaky.failed_writes(), 1);
    assert_eq!(app.scheduler.queue_stats().await.unwrap().processing_jobs, 0);
    assert_eq!(app.scheduler.processing_count().await, 0);

    app.scheduler.stop().await.unwrap();
}
