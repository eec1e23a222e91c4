use crate::domain::models::{NotificationOptions, Reminder};
use crate::infrastructure::config::NotificationSettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::presenter::{
    NotificationActionSpec, NotificationPayload, NotificationPresenter,
};
use crate::infrastructure::protocol::{
    InteractionEvent, NotificationAction, ReminderEvent, WorkerCommand,
};
use crate::infrastructure::surface::ClientSurface;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub snooze_interval: Duration,
    pub icon: String,
    pub badge: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&NotificationSettings::default())
    }
}

impl From<&NotificationSettings> for WorkerSettings {
    fn from(settings: &NotificationSettings) -> Self {
        Self {
            snooze_interval: settings.snooze_interval(),
            icon: settings.icon.clone(),
            badge: settings.badge.clone(),
        }
    }
}

/// Outcome of the scheduler's bounded readiness handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerReadiness {
    Ready,
    TimedOut,
    Closed,
}

/// The foreground's connection to a spawned worker: a command channel plus
/// a readiness watch.
#[derive(Clone)]
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    ready: watch::Receiver<bool>,
}

impl WorkerHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<WorkerCommand>,
        ready: watch::Receiver<bool>,
    ) -> Self {
        Self { commands, ready }
    }

    pub fn is_reachable(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn send(&self, command: WorkerCommand) -> Result<(), InfraError> {
        self.commands
            .send(command)
            .map_err(|_| InfraError::WorkerUnavailable)
    }

    /// Bounded wait for the worker to publish readiness. Replaces the
    /// source's raw polling loop with a typed handshake result.
    pub async fn wait_ready(&self, timeout: Duration) -> WorkerReadiness {
        let mut ready = self.ready.clone();
        if *ready.borrow() {
            return WorkerReadiness::Ready;
        }
        let waited = tokio::time::timeout(timeout, ready.wait_for(|ready| *ready)).await;
        match waited {
            Ok(Ok(_)) => WorkerReadiness::Ready,
            Ok(Err(_)) => WorkerReadiness::Closed,
            Err(_) => WorkerReadiness::TimedOut,
        }
    }
}

pub struct SpawnedWorker {
    pub handle: WorkerHandle,
    /// Broadcasts worker-to-foreground events to every subscriber.
    pub events: broadcast::Sender<ReminderEvent>,
    pub task: JoinHandle<()>,
}

/// Spawns the background notification worker. The worker outlives any
/// single foreground view and shuts down when every command sender has been
/// dropped.
pub fn spawn_notification_worker(
    presenter: Arc<dyn NotificationPresenter>,
    surface: Arc<dyn ClientSurface>,
    settings: WorkerSettings,
    interactions: mpsc::UnboundedReceiver<InteractionEvent>,
) -> SpawnedWorker {
    spawn_notification_worker_with_now(presenter, surface, settings, interactions, Arc::new(Utc::now))
}

pub fn spawn_notification_worker_with_now(
    presenter: Arc<dyn NotificationPresenter>,
    surface: Arc<dyn ClientSurface>,
    settings: WorkerSettings,
    interactions: mpsc::UnboundedReceiver<InteractionEvent>,
    now_provider: NowProvider,
) -> SpawnedWorker {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = watch::channel(false);
    let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let worker = NotificationWorker::new(presenter, surface, settings, events_tx.clone(), now_provider);
    let task = tokio::spawn(worker.run(commands_rx, interactions, ready_tx));

    SpawnedWorker {
        handle: WorkerHandle::new(commands_tx, ready_rx),
        events: events_tx,
        task,
    }
}

struct ArmedTimer {
    trigger: DateTime<Utc>,
    reminder: Reminder,
    options: NotificationOptions,
    task: JoinHandle<()>,
}

struct DisplayedNotification {
    reminder: Reminder,
    options: NotificationOptions,
}

/// Owns the armed-timer table. The table is only ever touched from inside
/// `run`, so each handler's mutation completes before the next message is
/// taken and no locking is needed.
struct NotificationWorker {
    presenter: Arc<dyn NotificationPresenter>,
    surface: Arc<dyn ClientSurface>,
    settings: WorkerSettings,
    events: broadcast::Sender<ReminderEvent>,
    now_provider: NowProvider,
    timers: HashMap<String, ArmedTimer>,
    displayed: HashMap<String, DisplayedNotification>,
}

impl NotificationWorker {
    fn new(
        presenter: Arc<dyn NotificationPresenter>,
        surface: Arc<dyn ClientSurface>,
        settings: WorkerSettings,
        events: broadcast::Sender<ReminderEvent>,
        now_provider: NowProvider,
    ) -> Self {
        Self {
            presenter,
            surface,
            settings,
            events,
            now_provider,
            timers: HashMap::new(),
            displayed: HashMap::new(),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
        mut interactions: mpsc::UnboundedReceiver<InteractionEvent>,
        ready: watch::Sender<bool>,
    ) {
        let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();

        // Take over immediately: readiness is published before the first
        // message is taken, so a waiting scheduler unblocks right away.
        let _ = ready.send(true);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &fired_tx),
                    None => break,
                },
                Some(tag) = fired_rx.recv() => self.handle_fired(tag).await,
                Some(event) = interactions.recv() => self.handle_interaction(event, &fired_tx).await,
            }
        }

        for (_, timer) in self.timers.drain() {
            timer.task.abort();
        }
    }

    fn handle_command(&mut self, command: WorkerCommand, fired: &mpsc::UnboundedSender<String>) {
        match command {
            WorkerCommand::Schedule {
                reminder,
                trigger,
                options,
            } => self.arm_timer(reminder, trigger, options, fired),
            WorkerCommand::Cancel { reminder_id } => self.cancel_timer(&reminder_id),
        }
    }

    /// Arms a timer for the reminder. A schedule for an id that already has
    /// a live timer cancels the old timer first, so at most one timer per
    /// reminder id is live at any moment.
    fn arm_timer(
        &mut self,
        reminder: Reminder,
        trigger: DateTime<Utc>,
        options: NotificationOptions,
        fired: &mpsc::UnboundedSender<String>,
    ) {
        let tag = reminder.id.clone();
        if let Some(existing) = self.timers.remove(&tag) {
            existing.task.abort();
            debug!("replaced live timer for '{tag}' (was {})", existing.trigger);
        }

        let now = (self.now_provider)();
        // A trigger already in the past fires on the next tick.
        let delay = (trigger - now).to_std().unwrap_or(Duration::ZERO);
        debug!("arming '{tag}' to fire in {delay:?}");

        let fired = fired.clone();
        let sleeper_tag = tag.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired.send(sleeper_tag);
        });

        self.timers.insert(
            tag,
            ArmedTimer {
                trigger,
                reminder,
                options,
                task,
            },
        );
    }

    /// Unknown ids are a no-op, not an error.
    fn cancel_timer(&mut self, reminder_id: &str) {
        match self.timers.remove(reminder_id) {
            Some(timer) => {
                timer.task.abort();
                debug!("cancelled timer for '{reminder_id}'");
            }
            None => debug!("cancel for unknown id '{reminder_id}' ignored"),
        }
    }

    async fn handle_fired(&mut self, tag: String) {
        // A cancel racing the sleeper's completion wins: no entry, no popup.
        let Some(timer) = self.timers.remove(&tag) else {
            return;
        };

        let payload = self.build_payload(&timer.reminder, timer.options);
        self.displayed.insert(
            tag.clone(),
            DisplayedNotification {
                reminder: timer.reminder,
                options: timer.options,
            },
        );

        // Display failure is not retried; the timer entry is already gone
        // either way so nothing leaks.
        if let Err(error) = self.presenter.show(&payload).await {
            warn!("failed to display notification for '{tag}': {error}");
        }
    }

    async fn handle_interaction(
        &mut self,
        event: InteractionEvent,
        fired: &mpsc::UnboundedSender<String>,
    ) {
        match event.action {
            Some(NotificationAction::Complete) => {
                // The foreground owns reminder state; it reacts to the
                // broadcast and marks the occurrence done.
                let _ = self.events.send(ReminderEvent::Completed {
                    reminder_id: event.reminder_id.clone(),
                });
                if let Err(error) = self.presenter.dismiss(&event.reminder_id).await {
                    debug!("dismiss for '{}' failed: {error}", event.reminder_id);
                }
                self.displayed.remove(&event.reminder_id);
            }
            Some(NotificationAction::Snooze) => {
                let Some(displayed) = self.displayed.remove(&event.reminder_id) else {
                    debug!("snooze for unknown notification '{}'", event.reminder_id);
                    return;
                };
                let now = (self.now_provider)();
                let snooze = chrono::Duration::from_std(self.settings.snooze_interval)
                    .unwrap_or_else(|_| chrono::Duration::minutes(10));
                self.arm_timer(displayed.reminder, now + snooze, displayed.options, fired);
            }
            None => {
                match self.surface.focus_reminders_view().await {
                    Ok(true) => debug!("focused reminders view for '{}'", event.reminder_id),
                    Ok(false) => debug!("opened reminders view for '{}'", event.reminder_id),
                    Err(error) => warn!("failed to surface reminders view: {error}"),
                }
                self.displayed.remove(&event.reminder_id);
            }
        }
    }

    fn build_payload(&self, reminder: &Reminder, options: NotificationOptions) -> NotificationPayload {
        let body = reminder
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("{} at {}", reminder.category.label(), reminder.time));

        NotificationPayload {
            title: reminder.title.clone(),
            body,
            icon: self.settings.icon.clone(),
            badge: self.settings.badge.clone(),
            tag: reminder.id.clone(),
            require_interaction: true,
            actions: vec![
                NotificationActionSpec {
                    id: NotificationAction::Complete.action_id().to_string(),
                    label: "Mark Complete".to_string(),
                },
                NotificationActionSpec {
                    id: NotificationAction::Snooze.action_id().to_string(),
                    label: "Snooze".to_string(),
                },
            ],
            sound: options.sound,
            vibrate: options.vibrate,
            data: reminder.clone(),
        }
    }
}
