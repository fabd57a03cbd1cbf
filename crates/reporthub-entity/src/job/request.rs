//! Report request value objects.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use reporthub_core::types::id::JobId;

use super::status::JobPriority;

/// Kind of report a job produces.
///
/// Unrecognized names are kept as [`ReportType::Unknown`] so that a request
/// naming an unsupported type is still accepted and then fails as a
/// non-retryable job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportType {
    /// Country profile with optional organizations, events and MoUs.
    CountryOverview,
    /// Organization metrics over a date range.
    OrganizationSummary,
    /// MoU workflow states and upcoming expiries.
    MouStatus,
    /// Events grouped by day.
    EventCalendar,
    /// Published intelligence reports grouped by confidence and topic.
    IntelligenceDigest,
    /// Audit-log activity for a single user.
    ActivityReport,
    /// Caller-supplied template and data.
    Custom,
    /// Any other name.
    Unknown(String),
}

impl ReportType {
    /// Return the wire name of the report type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::CountryOverview => "country_overview",
            Self::OrganizationSummary => "organization_summary",
            Self::MouStatus => "mou_status",
            Self::EventCalendar => "event_calendar",
            Self::IntelligenceDigest => "intelligence_digest",
            Self::ActivityReport => "activity_report",
            Self::Custom => "custom",
            Self::Unknown(name) => name,
        }
    }

    /// Whether this is one of the known report kinds.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for ReportType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "country_overview" => Self::CountryOverview,
            "organization_summary" => Self::OrganizationSummary,
            "mou_status" => Self::MouStatus,
            "event_calendar" => Self::EventCalendar,
            "intelligence_digest" => Self::IntelligenceDigest,
            "activity_report" => Self::ActivityReport,
            "custom" => Self::Custom,
            _ => Self::Unknown(name),
        }
    }
}

impl From<&str> for ReportType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<ReportType> for String {
    fn from(report_type: ReportType) -> Self {
        match report_type {
            ReportType::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// PDF document.
    Pdf,
    /// Excel workbook.
    Excel,
    /// Comma-separated values.
    Csv,
    /// Pretty-printed JSON.
    Json,
}

impl ReportFormat {
    /// File extension used for stored artifacts.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Excel => "xlsx",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Return the format as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Excel => "excel",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language of the rendered report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Arabic.
    Ar,
    /// Bilingual English and Arabic.
    Both,
}

impl Language {
    /// Whether the output contains right-to-left text.
    pub fn includes_arabic(&self) -> bool {
        matches!(self, Self::Ar | Self::Both)
    }
}

/// A caller's request for one report.
///
/// [`Validate`] rejects structurally malformed requests. Unknown report
/// types pass validation and fail later as non-retryable jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct JobRequest {
    /// Job id, mirrored from the owning record once enqueued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobId>,
    /// Report kind.
    #[serde(rename = "type")]
    pub report_type: ReportType,
    /// Output format.
    pub format: ReportFormat,
    /// Producer-specific parameters.
    #[serde(default = "empty_object")]
    #[validate(custom(function = json_object))]
    pub parameters: Value,
    /// Requesting user.
    #[validate(
        length(min = 1, message = "Report request requires a user_id"),
        custom(function = not_blank)
    )]
    pub user_id: String,
    /// Output language.
    #[serde(default)]
    pub language: Language,
    /// Not-before time; absent means immediately eligible.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Claim priority.
    #[serde(default)]
    pub priority: JobPriority,
    /// Free-form metadata, also used for progress messages.
    #[serde(default = "empty_object")]
    #[validate(custom(function = json_object))]
    pub metadata: Value,
    /// Per-request retry budget, overriding the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl JobRequest {
    /// Create a request with default language, priority and metadata.
    pub fn new(
        report_type: impl Into<ReportType>,
        format: ReportFormat,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            report_type: report_type.into(),
            format,
            parameters: empty_object(),
            user_id: user_id.into(),
            language: Language::default(),
            scheduled_at: None,
            priority: JobPriority::default(),
            metadata: empty_object(),
            max_retries: None,
        }
    }

    /// Set the producer parameters.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the claim priority.
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the output language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Set the not-before time.
    pub fn with_scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Set the per-request retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set a metadata key, turning non-object metadata into an object.
    pub fn set_metadata(&mut self, key: &str, value: Value) {
        if !self.metadata.is_object() {
            self.metadata = empty_object();
        }
        if let Value::Object(map) = &mut self.metadata {
            map.insert(key.to_string(), value);
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn json_object(value: &Value) -> Result<(), ValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("json_object").with_message("must be a JSON object".into()))
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank").with_message("must not be blank".into()))
    } else {
        Ok(())
    }
}
