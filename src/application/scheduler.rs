use crate::application::permission::{PermissionProvider, PermissionStatus};
use crate::domain::models::{NotificationOptions, Reminder};
use crate::domain::recurrence::next_trigger;
use crate::infrastructure::config::NotificationSettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::protocol::WorkerCommand;
use crate::infrastructure::worker::{NowProvider, WorkerHandle, WorkerReadiness};
use chrono::Utc;
use chrono_tz::Tz;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Timezone in which reminder wall-clock times are evaluated.
    pub timezone: Tz,
    pub ready_timeout: Duration,
    pub stagger_delay: Duration,
    pub default_options: NotificationOptions,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            ready_timeout: Duration::from_secs(3),
            stagger_delay: Duration::from_millis(250),
            default_options: NotificationOptions::default(),
        }
    }
}

impl SchedulerSettings {
    pub fn from_config(settings: &NotificationSettings) -> Result<Self, InfraError> {
        Ok(Self {
            timezone: settings.timezone()?,
            ready_timeout: settings.ready_timeout(),
            stagger_delay: settings.stagger_delay(),
            default_options: NotificationOptions {
                sound: settings.default_sound,
                vibrate: settings.default_vibrate,
            },
        })
    }
}

/// Foreground orchestrator. Stateless apart from the one-shot permission
/// prompt flag: everything it does is re-derivable from the reminder set
/// passed in, so it can be rebuilt at any time.
pub struct NotificationScheduler {
    permission: Arc<dyn PermissionProvider>,
    worker: WorkerHandle,
    settings: SchedulerSettings,
    now_provider: NowProvider,
    prompted: AtomicBool,
}

impl NotificationScheduler {
    pub fn new(
        permission: Arc<dyn PermissionProvider>,
        worker: WorkerHandle,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            permission,
            worker,
            settings,
            now_provider: Arc::new(Utc::now),
            prompted: AtomicBool::new(false),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Checks permission (prompting at most once per session) and worker
    /// reachability. Never errors: `false` means notification delivery is
    /// disabled for this session.
    pub async fn initialize(&self) -> bool {
        let granted = match self.permission.status().await {
            PermissionStatus::Granted => true,
            PermissionStatus::Denied => false,
            PermissionStatus::Undetermined => {
                if self.prompted.swap(true, Ordering::SeqCst) {
                    false
                } else {
                    self.permission.request().await == PermissionStatus::Granted
                }
            }
        };
        if !granted {
            info!("notification permission unavailable; delivery disabled");
            return false;
        }
        if !self.worker.is_reachable() {
            warn!("notification worker unavailable");
            return false;
        }
        true
    }

    /// Computes the trigger instant and hands the reminder to the worker.
    /// Returns `false` (logged, never thrown) when the reminder is invalid,
    /// the worker never becomes reachable within the bound, or the send
    /// fails.
    pub async fn schedule(&self, reminder: &Reminder, options: NotificationOptions) -> bool {
        match self.try_schedule(reminder, options).await {
            Ok(()) => true,
            Err(error) => {
                warn!("failed to schedule reminder '{}': {error}", reminder.id);
                false
            }
        }
    }

    async fn try_schedule(
        &self,
        reminder: &Reminder,
        options: NotificationOptions,
    ) -> Result<(), InfraError> {
        reminder.validate().map_err(InfraError::InvalidReminder)?;

        match self.worker.wait_ready(self.settings.ready_timeout).await {
            WorkerReadiness::Ready => {}
            WorkerReadiness::TimedOut => {
                return Err(InfraError::ControllerNotReady(
                    self.settings.ready_timeout.as_millis() as u64,
                ))
            }
            WorkerReadiness::Closed => return Err(InfraError::WorkerUnavailable),
        }

        let now = (self.now_provider)().with_timezone(&self.settings.timezone);
        let trigger = next_trigger(reminder, now)?.with_timezone(&Utc);
        debug!("scheduling '{}' for {trigger}", reminder.id);

        self.worker.send(WorkerCommand::Schedule {
            reminder: reminder.clone(),
            trigger,
            options,
        })
    }

    /// Best-effort: a cancel for an unknown id or an unreachable worker is
    /// a no-op, not an error.
    pub fn cancel(&self, reminder_id: &str) {
        let command = WorkerCommand::Cancel {
            reminder_id: reminder_id.to_string(),
        };
        if self.worker.send(command).is_err() {
            debug!("cancel for '{reminder_id}' dropped: worker unavailable");
        }
    }

    /// Schedules every active, uncompleted reminder, spacing the sends so a
    /// large list does not burst into the worker at once. Individual
    /// results are not aggregated; the return value is the number of
    /// schedule calls issued.
    pub async fn schedule_all(&self, reminders: &[Reminder]) -> usize {
        let mut issued = 0;
        for reminder in reminders
            .iter()
            .filter(|reminder| reminder.active && !reminder.completed)
        {
            if issued > 0 {
                tokio::time::sleep(self.settings.stagger_delay).await;
            }
            self.schedule(reminder, self.settings.default_options).await;
            issued += 1;
        }
        issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{RecurrencePattern, ReminderCategory};
    use chrono::{DateTime, TimeZone};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{mpsc, watch};

    struct FakePermission {
        status: PermissionStatus,
        request_result: PermissionStatus,
        request_calls: AtomicUsize,
    }

    impl FakePermission {
        fn new(status: PermissionStatus, request_result: PermissionStatus) -> Arc<Self> {
            Arc::new(Self {
                status,
                request_result,
                request_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl PermissionProvider for FakePermission {
        async fn status(&self) -> PermissionStatus {
            self.status
        }

        async fn request(&self) -> PermissionStatus {
            self.request_calls.fetch_add(1, Ordering::SeqCst);
            self.request_result
        }
    }

    struct WorkerEnd {
        commands: mpsc::UnboundedReceiver<WorkerCommand>,
        ready: watch::Sender<bool>,
    }

    fn fake_worker(ready_now: bool) -> (WorkerHandle, WorkerEnd) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(ready_now);
        (
            WorkerHandle::new(commands_tx, ready_rx),
            WorkerEnd {
                commands: commands_rx,
                ready: ready_tx,
            },
        )
    }

    fn fixed_now(value: &str) -> NowProvider {
        let instant: DateTime<Utc> = DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc);
        Arc::new(move || instant)
    }

    fn one_time_reminder(id: &str, date: &str, time: &str) -> Reminder {
        Reminder {
            id: id.to_string(),
            title: "Clinic visit".to_string(),
            category: ReminderCategory::Appointment,
            time: time.to_string(),
            date: Some(date.to_string()),
            notes: None,
            recurring: false,
            recurrence_pattern: None,
            recurring_days: None,
            active: true,
            completed: false,
            completed_dates: Vec::new(),
        }
    }

    fn short_timeout_settings() -> SchedulerSettings {
        SchedulerSettings {
            ready_timeout: Duration::from_millis(50),
            stagger_delay: Duration::from_millis(10),
            ..SchedulerSettings::default()
        }
    }

    #[tokio::test]
    async fn initialize_is_true_when_granted_and_reachable() {
        let permission = FakePermission::new(PermissionStatus::Granted, PermissionStatus::Granted);
        let (handle, _end) = fake_worker(true);
        let scheduler = NotificationScheduler::new(
            Arc::clone(&permission) as Arc<dyn PermissionProvider>,
            handle,
            SchedulerSettings::default(),
        );

        assert!(scheduler.initialize().await);
        assert_eq!(permission.request_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn initialize_is_false_when_denied_without_prompting() {
        let permission = FakePermission::new(PermissionStatus::Denied, PermissionStatus::Granted);
        let (handle, _end) = fake_worker(true);
        let scheduler = NotificationScheduler::new(
            Arc::clone(&permission) as Arc<dyn PermissionProvider>,
            handle,
            SchedulerSettings::default(),
        );

        assert!(!scheduler.initialize().await);
        assert_eq!(permission.request_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undetermined_permission_prompts_exactly_once() {
        let permission =
            FakePermission::new(PermissionStatus::Undetermined, PermissionStatus::Denied);
        let (handle, _end) = fake_worker(true);
        let scheduler = NotificationScheduler::new(
            Arc::clone(&permission) as Arc<dyn PermissionProvider>,
            handle,
            SchedulerSettings::default(),
        );

        assert!(!scheduler.initialize().await);
        assert!(!scheduler.initialize().await);
        assert_eq!(permission.request_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn initialize_is_false_when_worker_channel_is_closed() {
        let permission = FakePermission::new(PermissionStatus::Granted, PermissionStatus::Granted);
        let (handle, end) = fake_worker(true);
        drop(end);
        let scheduler = NotificationScheduler::new(
            permission as Arc<dyn PermissionProvider>,
            handle,
            SchedulerSettings::default(),
        );

        assert!(!scheduler.initialize().await);
    }

    #[tokio::test]
    async fn schedule_sends_command_with_computed_trigger() {
        let permission = FakePermission::new(PermissionStatus::Granted, PermissionStatus::Granted);
        let (handle, mut end) = fake_worker(true);
        let scheduler = NotificationScheduler::new(
            permission as Arc<dyn PermissionProvider>,
            handle,
            SchedulerSettings::default(),
        )
        .with_now_provider(fixed_now("2024-06-01T07:00:00Z"));

        let reminder = one_time_reminder("rem-1", "2024-06-01", "08:00");
        assert!(scheduler.schedule(&reminder, NotificationOptions::default()).await);

        let command = end.commands.try_recv().expect("command sent");
        match command {
            WorkerCommand::Schedule { reminder, trigger, .. } => {
                assert_eq!(reminder.id, "rem-1");
                assert_eq!(
                    trigger,
                    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).single().expect("valid")
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_waits_for_late_readiness() {
        let permission = FakePermission::new(PermissionStatus::Granted, PermissionStatus::Granted);
        let (handle, mut end) = fake_worker(false);
        let scheduler = Arc::new(
            NotificationScheduler::new(
                permission as Arc<dyn PermissionProvider>,
                handle,
                SchedulerSettings::default(),
            )
            .with_now_provider(fixed_now("2024-06-01T07:00:00Z")),
        );

        let task = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move {
                let reminder = one_time_reminder("rem-1", "2024-06-01", "08:00");
                scheduler.schedule(&reminder, NotificationOptions::default()).await
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = end.ready.send(true);

        assert!(task.await.expect("schedule task"));
        assert!(end.commands.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_fails_without_side_effects_when_never_ready() {
        let permission = FakePermission::new(PermissionStatus::Granted, PermissionStatus::Granted);
        let (handle, mut end) = fake_worker(false);
        let scheduler = NotificationScheduler::new(
            permission as Arc<dyn PermissionProvider>,
            handle,
            short_timeout_settings(),
        );

        let reminder = one_time_reminder("rem-1", "2024-06-01", "08:00");
        assert!(!scheduler.schedule(&reminder, NotificationOptions::default()).await);
        assert!(end.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_reminder_is_rejected_before_any_send() {
        let permission = FakePermission::new(PermissionStatus::Granted, PermissionStatus::Granted);
        let (handle, mut end) = fake_worker(true);
        let scheduler = NotificationScheduler::new(
            permission as Arc<dyn PermissionProvider>,
            handle,
            SchedulerSettings::default(),
        );

        let mut reminder = one_time_reminder("rem-1", "2024-06-01", "08:00");
        reminder.recurring = true;
        reminder.recurrence_pattern = Some(RecurrencePattern::Weekly);
        reminder.recurring_days = Some(Vec::new());

        assert!(!scheduler.schedule(&reminder, NotificationOptions::default()).await);
        assert!(end.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_survives_a_dropped_worker() {
        let permission = FakePermission::new(PermissionStatus::Granted, PermissionStatus::Granted);
        let (handle, end) = fake_worker(true);
        drop(end);
        let scheduler = NotificationScheduler::new(
            permission as Arc<dyn PermissionProvider>,
            handle,
            SchedulerSettings::default(),
        );

        scheduler.cancel("rem-1");
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_all_filters_inactive_and_completed() {
        let permission = FakePermission::new(PermissionStatus::Granted, PermissionStatus::Granted);
        let (handle, mut end) = fake_worker(true);
        let scheduler = NotificationScheduler::new(
            permission as Arc<dyn PermissionProvider>,
            handle,
            short_timeout_settings(),
        )
        .with_now_provider(fixed_now("2024-06-01T07:00:00Z"));

        let mut inactive = one_time_reminder("rem-2", "2024-06-02", "08:00");
        inactive.active = false;
        let mut completed = one_time_reminder("rem-3", "2024-06-03", "08:00");
        completed.completed = true;
        let reminders = vec![
            one_time_reminder("rem-1", "2024-06-01", "08:00"),
            inactive,
            completed,
            one_time_reminder("rem-4", "2024-06-04", "08:00"),
        ];

        assert_eq!(scheduler.schedule_all(&reminders).await, 2);

        let mut scheduled_ids = Vec::new();
        while let Ok(command) = end.commands.try_recv() {
            if let WorkerCommand::Schedule { reminder, .. } = command {
                scheduled_ids.push(reminder.id);
            }
        }
        assert_eq!(scheduled_ids, vec!["rem-1".to_string(), "rem-4".to_string()]);
    }
}
