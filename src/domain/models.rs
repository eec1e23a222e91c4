use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderCategory {
    Medication,
    Appointment,
    Exercise,
    Other,
}

impl ReminderCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ReminderCategory::Medication => "Medication",
            ReminderCategory::Appointment => "Appointment",
            ReminderCategory::Exercise => "Exercise",
            ReminderCategory::Other => "Reminder",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
}

/// A reminder as handed over by the UI/persistence layer. The backend never
/// stores these; they are passed into `schedule`/`schedule_all` by value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub category: ReminderCategory,
    /// Time of day, "HH:MM" (24h).
    pub time: String,
    /// Calendar date, "YYYY-MM-DD". Required for one-time reminders and as
    /// the day-of-month anchor for monthly recurrence.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// Weekday numbers 0 (Sunday) through 6 (Saturday); weekly pattern only.
    #[serde(default)]
    pub recurring_days: Option<Vec<u8>>,
    pub active: bool,
    pub completed: bool,
    /// ISO dates of completed occurrences of a recurring reminder.
    #[serde(default)]
    pub completed_dates: Vec<String>,
}

impl Reminder {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "reminder.id")?;
        validate_non_empty(&self.title, "reminder.title")?;
        if parse_hhmm(&self.time).is_none() {
            return Err(format!("reminder.time '{}' is not HH:MM", self.time));
        }
        if let Some(date) = &self.date {
            if parse_date(date).is_none() {
                return Err(format!("reminder.date '{date}' is not YYYY-MM-DD"));
            }
        }
        if !self.recurring {
            if self.date.is_none() {
                return Err("reminder.date is required for one-time reminders".to_string());
            }
            return Ok(());
        }
        match self.recurrence_pattern {
            None => Err("reminder.recurrence_pattern is required when recurring".to_string()),
            Some(RecurrencePattern::Daily) => Ok(()),
            Some(RecurrencePattern::Weekly) => {
                let days = self
                    .recurring_days
                    .as_deref()
                    .filter(|days| !days.is_empty())
                    .ok_or_else(|| {
                        "reminder.recurring_days must be non-empty for weekly reminders"
                            .to_string()
                    })?;
                for day in days {
                    if *day > 6 {
                        return Err(format!("reminder.recurring_days value {day} is not 0-6"));
                    }
                }
                Ok(())
            }
            Some(RecurrencePattern::Monthly) => {
                if self.date.is_none() {
                    return Err(
                        "reminder.date is required as the monthly recurrence anchor".to_string()
                    );
                }
                Ok(())
            }
        }
    }
}

/// Delivery options attached to a scheduled notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub sound: bool,
    pub vibrate: bool,
}

impl Default for NotificationOptions {
    fn default() -> Self {
        Self {
            sound: true,
            vibrate: false,
        }
    }
}

fn validate_non_empty(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Maps the UI's weekday numbering (0 = Sunday) onto chrono's `Weekday`.
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

pub fn weekday_index(weekday: Weekday) -> u8 {
    match weekday {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_one_time() -> Reminder {
        Reminder {
            id: "rem-1".to_string(),
            title: "Take morning pills".to_string(),
            category: ReminderCategory::Medication,
            time: "08:00".to_string(),
            date: Some("2024-06-01".to_string()),
            notes: Some("With breakfast".to_string()),
            recurring: false,
            recurrence_pattern: None,
            recurring_days: None,
            active: true,
            completed: false,
            completed_dates: Vec::new(),
        }
    }

    fn sample_weekly() -> Reminder {
        Reminder {
            id: "rem-2".to_string(),
            title: "Physio exercises".to_string(),
            category: ReminderCategory::Exercise,
            time: "09:00".to_string(),
            date: None,
            notes: None,
            recurring: true,
            recurrence_pattern: Some(RecurrencePattern::Weekly),
            recurring_days: Some(vec![1, 3, 5]),
            active: true,
            completed: false,
            completed_dates: Vec::new(),
        }
    }

    #[test]
    fn valid_reminders_pass_validation() {
        assert_eq!(sample_one_time().validate(), Ok(()));
        assert_eq!(sample_weekly().validate(), Ok(()));
    }

    #[test]
    fn one_time_reminder_requires_date() {
        let mut reminder = sample_one_time();
        reminder.date = None;
        assert!(reminder.validate().is_err());
    }

    #[test]
    fn weekly_reminder_rejects_empty_day_set() {
        let mut reminder = sample_weekly();
        reminder.recurring_days = Some(Vec::new());
        assert!(reminder.validate().is_err());
        reminder.recurring_days = None;
        assert!(reminder.validate().is_err());
    }

    #[test]
    fn weekly_reminder_rejects_out_of_range_day() {
        let mut reminder = sample_weekly();
        reminder.recurring_days = Some(vec![1, 7]);
        assert!(reminder.validate().is_err());
    }

    #[test]
    fn recurring_reminder_requires_pattern() {
        let mut reminder = sample_weekly();
        reminder.recurrence_pattern = None;
        assert!(reminder.validate().is_err());
    }

    #[test]
    fn monthly_reminder_requires_anchor_date() {
        let mut reminder = sample_weekly();
        reminder.recurrence_pattern = Some(RecurrencePattern::Monthly);
        reminder.recurring_days = None;
        reminder.date = None;
        assert!(reminder.validate().is_err());
        reminder.date = Some("2024-06-15".to_string());
        assert_eq!(reminder.validate(), Ok(()));
    }

    #[test]
    fn malformed_time_is_rejected() {
        let mut reminder = sample_one_time();
        reminder.time = "8am".to_string();
        assert!(reminder.validate().is_err());
    }

    #[test]
    fn reminder_serde_uses_camel_case_field_names() {
        let serialized =
            serde_json::to_value(sample_weekly()).expect("reminder serializes to JSON");
        assert!(serialized.get("recurrencePattern").is_some());
        assert!(serialized.get("recurringDays").is_some());
        assert!(serialized.get("completedDates").is_some());
        assert_eq!(
            serialized.get("recurrencePattern"),
            Some(&serde_json::Value::String("weekly".to_string()))
        );
    }

    #[test]
    fn weekday_index_round_trips() {
        for index in 0u8..=6 {
            let weekday = weekday_from_index(index).expect("index 0-6 maps to a weekday");
            assert_eq!(weekday_index(weekday), index);
        }
        assert!(weekday_from_index(7).is_none());
    }
}
