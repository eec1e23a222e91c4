mod application;
mod domain;
mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    cancel_reminder_impl, drain_reminder_events_impl, initialize_notifications_impl,
    notification_action_impl, schedule_all_reminders_impl, schedule_reminder_impl, AppState,
    RuntimeParts,
};
use application::permission::AlwaysGrantedPermission;
use domain::models::Reminder;
use infrastructure::presenter::{NotificationPresenter, NotifyRustPresenter};
use infrastructure::protocol::ReminderEvent;
use infrastructure::surface::TauriClientSurface;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    config_dir: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        config_dir: result.config_dir.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

fn production_parts(app: tauri::AppHandle) -> RuntimeParts {
    RuntimeParts {
        permission: Arc::new(AlwaysGrantedPermission),
        surface: Arc::new(TauriClientSurface::new(app)),
        presenter_factory: Box::new(|interactions| {
            Arc::new(NotifyRustPresenter::new(interactions)) as Arc<dyn NotificationPresenter>
        }),
    }
}

#[tauri::command]
async fn initialize_notifications(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
) -> Result<bool, String> {
    initialize_notifications_impl(state.inner(), production_parts(app))
        .await
        .map_err(|error| state.command_error("initialize_notifications", &error))
}

#[tauri::command]
async fn schedule_reminder(
    state: tauri::State<'_, AppState>,
    reminder: Reminder,
    sound: Option<bool>,
    vibrate: Option<bool>,
) -> Result<bool, String> {
    schedule_reminder_impl(state.inner(), reminder, sound, vibrate)
        .await
        .map_err(|error| state.command_error("schedule_reminder", &error))
}

#[tauri::command]
fn cancel_reminder(state: tauri::State<'_, AppState>, reminder_id: String) -> Result<(), String> {
    cancel_reminder_impl(state.inner(), &reminder_id)
        .map_err(|error| state.command_error("cancel_reminder", &error))
}

#[tauri::command]
async fn schedule_all_reminders(
    state: tauri::State<'_, AppState>,
    reminders: Vec<Reminder>,
) -> Result<usize, String> {
    schedule_all_reminders_impl(state.inner(), reminders)
        .await
        .map_err(|error| state.command_error("schedule_all_reminders", &error))
}

#[tauri::command]
fn notification_action(
    state: tauri::State<'_, AppState>,
    reminder_id: String,
    action: Option<String>,
) -> Result<(), String> {
    notification_action_impl(state.inner(), &reminder_id, action.as_deref())
        .map_err(|error| state.command_error("notification_action", &error))
}

#[tauri::command]
fn drain_reminder_events(state: tauri::State<'_, AppState>) -> Result<Vec<ReminderEvent>, String> {
    Ok(drain_reminder_events_impl(state.inner()))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            initialize_notifications,
            schedule_reminder,
            cancel_reminder,
            schedule_all_reminders,
            notification_action,
            drain_reminder_events
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
