use crate::domain::models::Reminder;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::protocol::{InteractionEvent, NotificationAction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// One entry of the action list attached to a notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationActionSpec {
    pub id: String,
    pub label: String,
}

/// The full payload handed to the platform notification primitive. The tag
/// is the reminder id; the host uses it for replace/dedupe semantics, and it
/// comes back with every interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationActionSpec>,
    pub sound: bool,
    pub vibrate: bool,
    pub data: Reminder,
}

#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    async fn show(&self, payload: &NotificationPayload) -> Result<(), InfraError>;
    async fn dismiss(&self, tag: &str) -> Result<(), InfraError>;
}

/// Desktop presenter backed by notify-rust. On XDG platforms the action
/// buttons are real and clicks are forwarded as `InteractionEvent`s; on
/// other platforms the notification is display-only.
pub struct NotifyRustPresenter {
    interactions: mpsc::UnboundedSender<InteractionEvent>,
}

impl NotifyRustPresenter {
    const APP_NAME: &'static str = "MemoCare";

    pub fn new(interactions: mpsc::UnboundedSender<InteractionEvent>) -> Self {
        Self { interactions }
    }

    fn show_blocking(
        payload: NotificationPayload,
        interactions: mpsc::UnboundedSender<InteractionEvent>,
        displayed: oneshot::Sender<Result<(), InfraError>>,
    ) {
        let mut notification = notify_rust::Notification::new();
        notification
            .summary(&payload.title)
            .body(&payload.body)
            .appname(Self::APP_NAME);
        if !payload.icon.is_empty() {
            notification.icon(&payload.icon);
        }
        if payload.require_interaction {
            notification.timeout(notify_rust::Timeout::Never);
        }

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            for action in &payload.actions {
                notification.action(&action.id, &action.label);
            }
            match notification.show() {
                Ok(handle) => {
                    let _ = displayed.send(Ok(()));
                    let tag = payload.tag;
                    // Blocks until the notification is acted on or closed.
                    handle.wait_for_action(|action| match action {
                        "__closed" => {}
                        "default" => {
                            let _ = interactions.send(InteractionEvent {
                                reminder_id: tag.clone(),
                                action: None,
                            });
                        }
                        other => {
                            if let Some(action) = NotificationAction::from_action_id(other) {
                                let _ = interactions.send(InteractionEvent {
                                    reminder_id: tag.clone(),
                                    action: Some(action),
                                });
                            }
                        }
                    });
                }
                Err(error) => {
                    let _ = displayed.send(Err(InfraError::Notification(error.to_string())));
                }
            }
        }

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            let _ = interactions;
            let result = notification
                .show()
                .map(|_| ())
                .map_err(|error| InfraError::Notification(error.to_string()));
            let _ = displayed.send(result);
        }
    }
}

#[async_trait]
impl NotificationPresenter for NotifyRustPresenter {
    async fn show(&self, payload: &NotificationPayload) -> Result<(), InfraError> {
        let payload = payload.clone();
        let interactions = self.interactions.clone();
        let (displayed_tx, displayed_rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            Self::show_blocking(payload, interactions, displayed_tx)
        });
        displayed_rx.await.unwrap_or_else(|_| {
            Err(InfraError::Notification(
                "notification task ended before display".to_string(),
            ))
        })
    }

    async fn dismiss(&self, tag: &str) -> Result<(), InfraError> {
        // notify-rust has no portable close-by-tag; on XDG the platform
        // closes the notification when an action is clicked.
        log::debug!("dismiss '{tag}' left to the platform");
        Ok(())
    }
}
