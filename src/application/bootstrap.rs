use crate::infrastructure::config::{ensure_default_configs, load_notification_settings};
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let logs_dir = workspace_root.join("logs");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    let _ = load_notification_settings(&config_dir)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_dirs_and_default_configs() {
        let root = std::env::temp_dir().join(format!(
            "memocare-bootstrap-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);

        let result = bootstrap_workspace(&root).expect("bootstrap");
        assert!(result.config_dir.join("notifications.json").exists());
        assert!(result.config_dir.join("app.json").exists());
        assert!(result.logs_dir.exists());

        // Idempotent on a second run.
        bootstrap_workspace(&root).expect("second bootstrap");
        let _ = fs::remove_dir_all(&root);
    }
}
