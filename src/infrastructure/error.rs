use crate::domain::recurrence::RecurrenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid reminder: {0}")]
    InvalidReminder(String),
    #[error("Invalid recurrence: {0}")]
    Recurrence(#[from] RecurrenceError),
    #[error("Notification worker unavailable")]
    WorkerUnavailable,
    #[error("Notification worker not ready within {0} ms")]
    ControllerNotReady(u64),
    #[error("Notification error: {0}")]
    Notification(String),
}
