use crate::application::bootstrap::bootstrap_workspace;
use crate::application::permission::PermissionProvider;
use crate::application::scheduler::{NotificationScheduler, SchedulerSettings};
use crate::domain::models::{NotificationOptions, Reminder};
use crate::infrastructure::config::{load_notification_settings, NotificationSettings};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::presenter::NotificationPresenter;
use crate::infrastructure::protocol::{InteractionEvent, NotificationAction, ReminderEvent};
use crate::infrastructure::surface::ClientSurface;
use crate::infrastructure::worker::{spawn_notification_worker, WorkerSettings};
use chrono::Utc;
use log::warn;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

pub type PresenterFactory =
    Box<dyn FnOnce(mpsc::UnboundedSender<InteractionEvent>) -> Arc<dyn NotificationPresenter> + Send>;

/// Everything needed to register the background worker: built from real
/// platform pieces in `lib.rs` and from fakes in tests.
pub struct RuntimeParts {
    pub permission: Arc<dyn PermissionProvider>,
    pub surface: Arc<dyn ClientSurface>,
    pub presenter_factory: PresenterFactory,
}

struct NotificationRuntime {
    scheduler: Arc<NotificationScheduler>,
    interactions: mpsc::UnboundedSender<InteractionEvent>,
    worker_task: JoinHandle<()>,
    forwarder_task: JoinHandle<()>,
}

pub struct AppState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    settings: NotificationSettings,
    runtime: Mutex<Option<NotificationRuntime>>,
    events: Arc<Mutex<Vec<ReminderEvent>>>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let settings = load_notification_settings(&bootstrap.config_dir)?;

        Ok(Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            settings,
            runtime: Mutex::new(None),
            events: Arc::new(Mutex::new(Vec::new())),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn scheduler(&self) -> Option<Arc<NotificationScheduler>> {
        let guard = self.runtime.lock().ok()?;
        guard.as_ref().map(|runtime| Arc::clone(&runtime.scheduler))
    }

    fn interactions(&self) -> Option<mpsc::UnboundedSender<InteractionEvent>> {
        let guard = self.runtime.lock().ok()?;
        guard.as_ref().map(|runtime| runtime.interactions.clone())
    }

    /// Registers the background worker if no live registration exists and
    /// returns the scheduler over it. Idempotent: a second call reuses the
    /// existing registration.
    fn ensure_runtime(&self, parts: RuntimeParts) -> Result<Arc<NotificationScheduler>, InfraError> {
        let mut guard = self
            .runtime
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))?;
        if let Some(runtime) = guard.as_ref() {
            return Ok(Arc::clone(&runtime.scheduler));
        }

        let scheduler_settings = SchedulerSettings::from_config(&self.settings)?;
        let (interactions_tx, interactions_rx) = mpsc::unbounded_channel();
        let presenter = (parts.presenter_factory)(interactions_tx.clone());
        let spawned = spawn_notification_worker(
            presenter,
            parts.surface,
            WorkerSettings::from(&self.settings),
            interactions_rx,
        );
        let scheduler = Arc::new(NotificationScheduler::new(
            parts.permission,
            spawned.handle.clone(),
            scheduler_settings,
        ));

        // Foreground listener: drains worker broadcasts into a queue the UI
        // polls through `drain_reminder_events`.
        let mut events_rx = spawned.events.subscribe();
        let sink = Arc::clone(&self.events);
        let forwarder_task = tokio::spawn(async move {
            loop {
                match events_rx.recv().await {
                    Ok(event) => {
                        if let Ok(mut events) = sink.lock() {
                            events.push(event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("dropped {skipped} reminder events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        *guard = Some(NotificationRuntime {
            scheduler: Arc::clone(&scheduler),
            interactions: interactions_tx,
            worker_task: spawned.task,
            forwarder_task,
        });
        Ok(scheduler)
    }

    /// Tears down the worker registration. Dropping the runtime closes the
    /// command channel, which is the worker's shutdown signal; the aborts
    /// just make teardown immediate.
    pub fn dispose(&self) {
        let Ok(mut guard) = self.runtime.lock() else {
            return;
        };
        if let Some(runtime) = guard.take() {
            runtime.worker_task.abort();
            runtime.forwarder_task.abort();
        }
    }
}

pub async fn initialize_notifications_impl(
    state: &AppState,
    parts: RuntimeParts,
) -> Result<bool, InfraError> {
    let scheduler = state.ensure_runtime(parts)?;
    let ready = scheduler.initialize().await;
    if ready {
        state.log_info("initialize_notifications", "notification pipeline ready");
    }
    Ok(ready)
}

pub async fn schedule_reminder_impl(
    state: &AppState,
    reminder: Reminder,
    sound: Option<bool>,
    vibrate: Option<bool>,
) -> Result<bool, InfraError> {
    let Some(scheduler) = state.scheduler() else {
        state.log_error("schedule_reminder", "notifications not initialized");
        return Ok(false);
    };
    let options = NotificationOptions {
        sound: sound.unwrap_or(state.settings.default_sound),
        vibrate: vibrate.unwrap_or(state.settings.default_vibrate),
    };
    Ok(scheduler.schedule(&reminder, options).await)
}

pub fn cancel_reminder_impl(state: &AppState, reminder_id: &str) -> Result<(), InfraError> {
    if let Some(scheduler) = state.scheduler() {
        scheduler.cancel(reminder_id);
    }
    Ok(())
}

pub async fn schedule_all_reminders_impl(
    state: &AppState,
    reminders: Vec<Reminder>,
) -> Result<usize, InfraError> {
    let Some(scheduler) = state.scheduler() else {
        state.log_error("schedule_all_reminders", "notifications not initialized");
        return Ok(0);
    };
    Ok(scheduler.schedule_all(&reminders).await)
}

/// Entry point for notification interactions reported by UI chrome on
/// platforms where the presenter cannot observe clicks itself.
pub fn notification_action_impl(
    state: &AppState,
    reminder_id: &str,
    action: Option<&str>,
) -> Result<(), InfraError> {
    let action = match action {
        None => None,
        Some(raw) => Some(NotificationAction::from_action_id(raw).ok_or_else(|| {
            InfraError::Notification(format!("unknown notification action '{raw}'"))
        })?),
    };
    let interactions = state.interactions().ok_or(InfraError::WorkerUnavailable)?;
    interactions
        .send(InteractionEvent {
            reminder_id: reminder_id.to_string(),
            action,
        })
        .map_err(|_| InfraError::WorkerUnavailable)
}

pub fn drain_reminder_events_impl(state: &AppState) -> Vec<ReminderEvent> {
    state
        .events
        .lock()
        .map(|mut events| std::mem::take(&mut *events))
        .unwrap_or_default()
}
