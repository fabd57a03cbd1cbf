//! Recurring report schedule configuration.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Frequencies a schedule entry may name.
pub const SCHEDULE_FREQUENCIES: [&str; 4] = ["daily", "weekly", "monthly", "quarterly"];

/// A recurring report as written in the configuration file.
///
/// Field ranges and the `HH:mm` time are checked by [`Validate`] when the
/// schedule is registered, not at load time. The request body is checked
/// separately once it is parsed into a job request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_frequency_days))]
pub struct ScheduleConfig {
    /// Human-readable schedule name.
    #[validate(length(min = 1, message = "Schedule name is required"))]
    pub name: String,
    /// `"daily"`, `"weekly"`, `"monthly"` or `"quarterly"`.
    pub frequency: String,
    /// Time of day in `HH:mm` (UTC).
    #[validate(custom(function = validate_time_of_day))]
    pub time: String,
    /// Day of week, 0 = Sunday (weekly only).
    #[serde(default)]
    #[validate(range(max = 6, message = "day_of_week must be 0-6"))]
    pub day_of_week: Option<u8>,
    /// Day of month, 1-31 (monthly and quarterly only).
    #[serde(default)]
    #[validate(range(min = 1, max = 31, message = "day_of_month must be 1-31"))]
    pub day_of_month: Option<u8>,
    /// Report request enqueued on every fire.
    pub request: serde_json::Value,
    /// Inactive schedules are skipped.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ScheduleConfig {
    /// Hour and minute of `time`, or `None` when it is not a valid `HH:mm`.
    pub fn time_of_day(&self) -> Option<(u8, u8)> {
        parse_time_of_day(&self.time)
    }
}

fn parse_time_of_day(time: &str) -> Option<(u8, u8)> {
    let (hour, minute) = time.split_once(':')?;
    let hour: u8 = hour.trim().parse().ok()?;
    let minute: u8 = minute.trim().parse().ok()?;
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

fn validate_time_of_day(time: &str) -> Result<(), ValidationError> {
    match parse_time_of_day(time) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("time_of_day")
            .with_message(format!("Invalid schedule time '{time}', expected HH:mm").into())),
    }
}

fn validate_frequency_days(config: &ScheduleConfig) -> Result<(), ValidationError> {
    let missing = match config.frequency.as_str() {
        "daily" => None,
        "weekly" => config.day_of_week.is_none().then_some("day_of_week"),
        "monthly" | "quarterly" => config.day_of_month.is_none().then_some("day_of_month"),
        other => {
            return Err(ValidationError::new("frequency").with_message(
                format!(
                    "Unsupported frequency '{other}', expected one of {}",
                    SCHEDULE_FREQUENCIES.join(", ")
                )
                .into(),
            ));
        }
    };
    match missing {
        Some(field) => Err(ValidationError::new("missing_day").with_message(
            format!("Frequency '{}' requires {field}", config.frequency).into(),
        )),
        None => Ok(()),
    }
}

fn default_true() -> bool {
    true
}
