use crate::domain::models::{NotificationOptions, Reminder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Foreground-to-worker messages. Fire-and-forget: there is no
/// acknowledgement channel, and the scheduler's readiness handshake is the
/// only delivery guarantee.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    Schedule {
        reminder: Reminder,
        trigger: DateTime<Utc>,
        options: NotificationOptions,
    },
    Cancel {
        reminder_id: String,
    },
}

/// Worker-to-foreground broadcasts, delivered to every connected listener
/// and surfaced to the UI as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderEvent {
    Completed { reminder_id: String },
}

/// The action ids attached to a displayed notification. These strings are
/// what the platform hands back on a click.
pub const ACTION_COMPLETE: &str = "complete";
pub const ACTION_SNOOZE: &str = "snooze";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Complete,
    Snooze,
}

impl NotificationAction {
    pub fn from_action_id(id: &str) -> Option<Self> {
        match id {
            ACTION_COMPLETE => Some(NotificationAction::Complete),
            ACTION_SNOOZE => Some(NotificationAction::Snooze),
            _ => None,
        }
    }

    pub fn action_id(&self) -> &'static str {
        match self {
            NotificationAction::Complete => ACTION_COMPLETE,
            NotificationAction::Snooze => ACTION_SNOOZE,
        }
    }
}

/// A user interaction with a displayed notification. `action = None` is the
/// default click on the notification body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionEvent {
    pub reminder_id: String,
    pub action: Option<NotificationAction>,
}
