use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const APP_JSON: &str = "app.json";
const NOTIFICATIONS_JSON: &str = "notifications.json";

/// Tunables for the notification pipeline, loaded from
/// `config/notifications.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub schema: u8,
    /// IANA timezone in which reminder wall-clock times are evaluated.
    pub timezone: String,
    pub snooze_minutes: u32,
    /// Bound on the scheduler's wait for the worker to become reachable.
    pub ready_timeout_ms: u64,
    /// Delay inserted between schedule messages during `schedule_all`.
    pub stagger_delay_ms: u64,
    pub default_sound: bool,
    pub default_vibrate: bool,
    pub icon: String,
    pub badge: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            schema: 1,
            timezone: "UTC".to_string(),
            snooze_minutes: 10,
            ready_timeout_ms: 3000,
            stagger_delay_ms: 250,
            default_sound: true,
            default_vibrate: false,
            icon: "icons/reminder.png".to_string(),
            badge: "icons/badge.png".to_string(),
        }
    }
}

impl NotificationSettings {
    pub fn timezone(&self) -> Result<Tz, InfraError> {
        self.timezone.parse().map_err(|_| {
            InfraError::InvalidConfig(format!(
                "notifications.timezone '{}' is not a known IANA timezone",
                self.timezone
            ))
        })
    }

    pub fn snooze_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.snooze_minutes) * 60)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn stagger_delay(&self) -> Duration {
        Duration::from_millis(self.stagger_delay_ms)
    }

    fn validate(&self) -> Result<(), InfraError> {
        let _ = self.timezone()?;
        if self.snooze_minutes == 0 {
            return Err(InfraError::InvalidConfig(
                "notifications.snoozeMinutes must be at least 1".to_string(),
            ));
        }
        if self.ready_timeout_ms == 0 {
            return Err(InfraError::InvalidConfig(
                "notifications.readyTimeoutMs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": "MemoCare",
        "remindersView": "main"
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    fs::create_dir_all(config_dir)?;

    let app_path = config_dir.join(APP_JSON);
    if !app_path.exists() {
        let payload = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(&app_path, payload)?;
    }

    let notifications_path = config_dir.join(NOTIFICATIONS_JSON);
    if !notifications_path.exists() {
        let payload = serde_json::to_string_pretty(&NotificationSettings::default())?;
        fs::write(&notifications_path, payload)?;
    }

    Ok(())
}

pub fn load_notification_settings(config_dir: &Path) -> Result<NotificationSettings, InfraError> {
    let path = config_dir.join(NOTIFICATIONS_JSON);
    let raw = fs::read_to_string(&path)?;
    let settings: NotificationSettings = serde_json::from_str(&raw).map_err(|error| {
        InfraError::InvalidConfig(format!("{NOTIFICATIONS_JSON} is malformed: {error}"))
    })?;
    settings.validate()?;
    Ok(settings)
}
