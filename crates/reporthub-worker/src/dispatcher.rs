//! Report dispatcher: routes a job to the producer registered for its type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use reporthub_entity::job::ReportType;

use crate::error::ReportError;
use crate::progress::ProgressReporter;

/// Builds the body of one kind of report.
///
/// Producers fetch whatever data their report needs from `parameters` and
/// may report intermediate progress. Progress reported here lands strictly
/// between the initialization and formatting checkpoints.
#[async_trait]
pub trait ReportProducer: Send + Sync + std::fmt::Debug {
    /// Report type this producer handles.
    fn report_type(&self) -> ReportType;

    /// Build the report body.
    async fn produce(&self, parameters: &Value, progress: &ProgressReporter) -> Result<Value, ReportError>;
}

/// Registry of report producers keyed by report type.
#[derive(Debug, Default)]
pub struct ReportDispatcher {
    producers: HashMap<ReportType, Arc<dyn ReportProducer>>,
}

impl ReportDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a producer, replacing any earlier one for the same type.
    pub fn register(&mut self, producer: Arc<dyn ReportProducer>) {
        let report_type = producer.report_type();
        info!(report_type = %report_type, "Registered report producer");
        self.producers.insert(report_type, producer);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_producer(mut self, producer: Arc<dyn ReportProducer>) -> Self {
        self.register(producer);
        self
    }

    /// Whether a producer is registered for `report_type`.
    pub fn has_producer(&self, report_type: &ReportType) -> bool {
        self.producers.contains_key(report_type)
    }

    /// Registered report types.
    pub fn registered_types(&self) -> Vec<ReportType> {
        self.producers.keys().cloned().collect()
    }

    /// Build the body for `report_type`. Unregistered types fail closed.
    pub async fn produce(
        &self,
        report_type: &ReportType,
        parameters: &Value,
        progress: &ProgressReporter,
    ) -> Result<Value, ReportError> {
        let producer = self
            .producers
            .get(report_type)
            .ok_or_else(|| ReportError::ReportTypeUnknown(report_type.to_string()))?;

        debug!(job_id = %progress.job_id(), report_type = %report_type, "Dispatching report");
        producer.produce(parameters, progress).await
    }
}
