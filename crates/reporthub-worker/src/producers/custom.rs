//! Caller-supplied template and data.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::debug;

use reporthub_entity::job::ReportType;

use crate::dispatcher::ReportProducer;
use crate::error::ReportError;
use crate::progress::ProgressReporter;

/// Echoes the `template` and `data` parameters into a titled report body.
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomReportProducer;

impl CustomReportProducer {
    /// Create the producer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportProducer for CustomReportProducer {
    fn report_type(&self) -> ReportType {
        ReportType::Custom
    }

    async fn produce(&self, parameters: &Value, progress: &ProgressReporter) -> Result<Value, ReportError> {
        let params = parameters
            .as_object()
            .ok_or_else(|| ReportError::InvalidParameters("parameters must be an object".into()))?;

        progress.report(40, "Assembling custom report").await?;
        debug!(job_id = %progress.job_id(), has_data = params.contains_key("data"), "Building custom report");

        Ok(json!({
            "title": "Custom Report",
            "template": params.get("template").cloned().unwrap_or(Value::Null),
            "data": params.get("data").cloned().unwrap_or(Value::Null),
            "generatedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }))
    }
}
