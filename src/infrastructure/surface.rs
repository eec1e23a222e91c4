use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use tauri::Manager;

/// The worker host's view of open foreground clients: find one showing the
/// reminders view and focus it, or open a new one.
#[async_trait]
pub trait ClientSurface: Send + Sync {
    /// Returns `true` when an existing view was focused, `false` when a new
    /// one had to be opened.
    async fn focus_reminders_view(&self) -> Result<bool, InfraError>;
}

pub struct TauriClientSurface {
    app: tauri::AppHandle,
    window_label: String,
    reminders_url: String,
}

impl TauriClientSurface {
    pub fn new(app: tauri::AppHandle) -> Self {
        Self {
            app,
            window_label: "main".to_string(),
            reminders_url: "index.html".to_string(),
        }
    }
}

#[async_trait]
impl ClientSurface for TauriClientSurface {
    async fn focus_reminders_view(&self) -> Result<bool, InfraError> {
        if let Some(window) = self.app.get_webview_window(&self.window_label) {
            window
                .set_focus()
                .map_err(|error| InfraError::Notification(error.to_string()))?;
            return Ok(true);
        }

        tauri::WebviewWindowBuilder::new(
            &self.app,
            &self.window_label,
            tauri::WebviewUrl::App(self.reminders_url.clone().into()),
        )
        .title("MemoCare")
        .build()
        .map_err(|error| InfraError::Notification(error.to_string()))?;
        Ok(false)
    }
}
