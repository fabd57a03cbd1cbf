//! Cron-driven recurring reports.

use std::sync::Arc;

use serde_json::Value;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{error, info};
use validator::Validate;

use reporthub_core::config::ScheduleConfig;
use reporthub_core::error::AppError;
use reporthub_entity::schedule::ReportSchedule;

use crate::scheduler::ReportScheduler;

/// Metadata key naming the schedule that enqueued a job.
pub const SCHEDULE_NAME_KEY: &str = "scheduleName";

/// Enqueues report requests on cron timetables (UTC).
pub struct RecurringReports {
    /// The underlying cron scheduler
    scheduler: JobScheduler,
    /// Report scheduler that receives the requests
    reports: Arc<ReportScheduler>,
}

impl std::fmt::Debug for RecurringReports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurringReports").finish()
    }
}

impl RecurringReports {
    /// Create a cron scheduler feeding `reports`.
    pub async fn new(reports: Arc<ReportScheduler>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::scheduler(format!("Failed to create cron scheduler: {}", e)))?;

        Ok(Self { scheduler, reports })
    }

    /// Validate and register every configured schedule.
    ///
    /// Returns how many active schedules were registered. Stops at the first
    /// invalid entry.
    pub async fn register_all(&self, configs: &[ScheduleConfig]) -> Result<usize, AppError> {
        let mut registered = 0;
        for config in configs {
            let schedule = ReportSchedule::from_config(config)?;
            if self.register(&schedule).await? {
                registered += 1;
            }
        }
        info!(registered, "Registered recurring report schedules");
        Ok(registered)
    }

    /// Register one schedule. Inactive schedules are skipped and return
    /// `false`.
    pub async fn register(&self, schedule: &ReportSchedule) -> Result<bool, AppError> {
        schedule.validate()?;
        if !schedule.is_active {
            info!(schedule = %schedule.name, "Skipping inactive schedule");
            return Ok(false);
        }

        let expression = schedule.cron_expression();
        let reports = Arc::clone(&self.reports);
        let name = schedule.name.clone();
        let mut template = schedule.request.clone();
        template.set_metadata(SCHEDULE_NAME_KEY, Value::String(name.clone()));

        let job = CronJob::new_async(expression.as_str(), move |_uuid, _lock| {
            let reports = Arc::clone(&reports);
            let request = template.clone();
            let name = name.clone();
            Box::pin(async move {
                match reports.enqueue(request).await {
                    Ok(record) => info!(
                        schedule = %name,
                        job_id = %record.id,
                        "Scheduled report enqueued"
                    ),
                    Err(e) => error!(schedule = %name, error = %e, "Scheduled report failed to enqueue"),
                }
            })
        })
        .map_err(|e| {
            AppError::validation(format!(
                "Invalid cron expression '{}' for schedule '{}': {}",
                expression, schedule.name, e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::scheduler(format!("Failed to add schedule '{}': {}", schedule.name, e))
        })?;

        info!(schedule = %schedule.name, cron = %expression, "Registered recurring report");
        Ok(true)
    }

    /// Start firing registered schedules.
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::scheduler(format!("Failed to start cron scheduler: {}", e)))?;

        info!("Cron scheduler started");
        Ok(())
    }

    /// Stop firing schedules.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::scheduler(format!("Failed to shutdown cron scheduler: {}", e)))?;

        info!("Cron scheduler shut down");
        Ok(())
    }
}
