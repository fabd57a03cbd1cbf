//! Recurring report schedule model.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use reporthub_core::config::ScheduleConfig;
use reporthub_core::error::AppError;
use reporthub_core::types::id::ScheduleId;

use crate::job::request::JobRequest;

/// How often a recurring report fires. All times are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScheduleFrequency {
    /// Every day.
    Daily,
    /// Once a week on `day_of_week` (0 = Sunday).
    Weekly {
        /// Day of week, 0-6.
        day_of_week: u8,
    },
    /// Once a month on `day_of_month`. Months without that day are skipped.
    Monthly {
        /// Day of month, 1-31.
        day_of_month: u8,
    },
    /// January, April, July and October on `day_of_month`.
    Quarterly {
        /// Day of month, 1-31.
        day_of_month: u8,
    },
}

/// A report request enqueued on a recurring timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReportSchedule {
    /// Schedule identifier.
    pub id: ScheduleId,
    /// Human-readable name.
    #[validate(length(min = 1))]
    pub name: String,
    /// Recurrence rule.
    #[validate(custom(function = validate_frequency))]
    pub frequency: ScheduleFrequency,
    /// Hour of day, 0-23.
    #[validate(range(max = 23))]
    pub hour: u8,
    /// Minute of hour, 0-59.
    #[validate(range(max = 59))]
    pub minute: u8,
    /// Request template enqueued on every fire.
    #[validate(nested)]
    pub request: JobRequest,
    /// Inactive schedules are never registered.
    pub is_active: bool,
}

impl ReportSchedule {
    /// Build and validate a schedule from its configuration entry.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, AppError> {
        config.validate()?;

        let invalid = || {
            AppError::validation(format!(
                "Schedule '{}' has an invalid time or frequency",
                config.name
            ))
        };
        let (hour, minute) = config.time_of_day().ok_or_else(invalid)?;
        let frequency = match (config.frequency.as_str(), config.day_of_week, config.day_of_month) {
            ("daily", _, _) => ScheduleFrequency::Daily,
            ("weekly", Some(day_of_week), _) => ScheduleFrequency::Weekly { day_of_week },
            ("monthly", _, Some(day_of_month)) => ScheduleFrequency::Monthly { day_of_month },
            ("quarterly", _, Some(day_of_month)) => ScheduleFrequency::Quarterly { day_of_month },
            _ => return Err(invalid()),
        };

        let request: JobRequest = serde_json::from_value(config.request.clone()).map_err(|e| {
            AppError::validation(format!(
                "Schedule '{}' has an invalid request: {}",
                config.name, e
            ))
        })?;

        let schedule = Self {
            id: ScheduleId::new(),
            name: config.name.clone(),
            frequency,
            hour,
            minute,
            request,
            is_active: config.is_active,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Six-field cron expression (`sec min hour dom month dow`).
    pub fn cron_expression(&self) -> String {
        let (m, h) = (self.minute, self.hour);
        match self.frequency {
            ScheduleFrequency::Daily => format!("0 {m} {h} * * *"),
            ScheduleFrequency::Weekly { day_of_week } => format!("0 {m} {h} * * {day_of_week}"),
            ScheduleFrequency::Monthly { day_of_month } => format!("0 {m} {h} {day_of_month} * *"),
            ScheduleFrequency::Quarterly { day_of_month } => {
                format!("0 {m} {h} {day_of_month} 1,4,7,10 *")
            }
        }
    }
}

fn validate_frequency(frequency: &ScheduleFrequency) -> Result<(), ValidationError> {
    let in_range = match *frequency {
        ScheduleFrequency::Daily => true,
        ScheduleFrequency::Weekly { day_of_week } => day_of_week <= 6,
        ScheduleFrequency::Monthly { day_of_month }
        | ScheduleFrequency::Quarterly { day_of_month } => (1..=31).contains(&day_of_month),
    };
    if in_range {
        Ok(())
    } else {
        Err(ValidationError::new("frequency_day")
            .with_message("day_of_week must be 0-6 and day_of_month 1-31".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(frequency: &str, time: &str, dow: Option<u8>, dom: Option<u8>) -> ScheduleConfig {
        ScheduleConfig {
            name: "test".to_string(),
            frequency: frequency.to_string(),
            time: time.to_string(),
            day_of_week: dow,
            day_of_month: dom,
            request: json!({ "type": "mou_status", "format": "csv", "user_id": "system" }),
            is_active: true,
        }
    }

    #[test]
    fn test_cron_expressions() {
        let daily = ReportSchedule::from_config(&config("daily", "06:05", None, None)).unwrap();
        assert_eq!(daily.cron_expression(), "0 5 6 * * *");

        let weekly = ReportSchedule::from_config(&config("weekly", "08:00", Some(1), None)).unwrap();
        assert_eq!(weekly.cron_expression(), "0 0 8 * * 1");

        let monthly = ReportSchedule::from_config(&config("monthly", "23:59", None, Some(15))).unwrap();
        assert_eq!(monthly.cron_expression(), "0 59 23 15 * *");

        let quarterly = ReportSchedule::from_config(&config("quarterly", "00:30", None, Some(1))).unwrap();
        assert_eq!(quarterly.cron_expression(), "0 30 0 1 1,4,7,10 *");
    }

    #[test]
    fn test_invalid_time_rejected() {
        assert!(ReportSchedule::from_config(&config("daily", "24:00", None, None)).is_err());
        assert!(ReportSchedule::from_config(&config("daily", "0830", None, None)).is_err());
    }

    #[test]
    fn test_missing_or_out_of_range_day_rejected() {
        assert!(ReportSchedule::from_config(&config("weekly", "08:00", None, None)).is_err());
        assert!(ReportSchedule::from_config(&config("weekly", "08:00", Some(7), None)).is_err());
        assert!(ReportSchedule::from_config(&config("monthly", "08:00", None, Some(0))).is_err());
    }

    #[test]
    fn test_unknown_frequency_rejected() {
        let err = ReportSchedule::from_config(&config("hourly", "08:00", None, None)).unwrap_err();
        assert!(err.is_validation());
        assert!(err.message.contains("hourly"));
    }

    #[test]
    fn test_directly_built_schedule_is_checked() {
        let mut schedule = ReportSchedule::from_config(&config("daily", "08:00", None, None)).unwrap();
        schedule.hour = 24;
        assert!(schedule.validate().is_err());

        schedule.hour = 8;
        schedule.frequency = ScheduleFrequency::Weekly { day_of_week: 9 };
        let errors = schedule.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("frequency"));

        schedule.frequency = ScheduleFrequency::Daily;
        schedule.request.user_id = String::new();
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn test_invalid_request_rejected() {
        let mut cfg = config("daily", "08:00", None, None);
        cfg.request = json!({ "type": "mou_status" });
        assert!(ReportSchedule::from_config(&cfg).is_err());
    }
}
