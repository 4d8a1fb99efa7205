//! # Uninstall Command Module / 卸载命令模块
//!
//! Implements `uninstall`: removes an app from every device listed in a
//! device/language file (boot, uninstall, shutdown per device).
//!
//! 实现 `uninstall` 命令：从设备/语言文件中列出的每个设备上移除应用。

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::config::{DeviceId, Timeouts, default_error_log_dir, load_test_matrix};
use crate::core::session::{DeviceControl, SessionController, Simctl};
use crate::infra::command::{CommandRunner, ProcessExecutor};
use crate::infra::t;

/// Uninstalls `app_id` from every device of `lang_dev_file`.
pub async fn execute(app_id: &str, lang_dev_file: &Path) -> Result<()> {
    let matrix = load_test_matrix(lang_dev_file)
        .with_context(|| t!("run.matrix_invalid", path = lang_dev_file.display()))?;

    let executor = Arc::new(ProcessExecutor::new(CancellationToken::new()));
    let runner = Arc::new(CommandRunner::new(executor, default_error_log_dir()));
    let control: Arc<dyn DeviceControl> = Arc::new(Simctl::new(runner.clone(), Timeouts::default().device()));

    let failed = uninstall_everywhere(app_id, &matrix.devices, control, runner).await;
    if failed > 0 {
        anyhow::bail!("{}", t!("uninstall.failed", count = failed, app = app_id));
    }
    println!("{}", t!("uninstall.done", count = matrix.devices.len(), app = app_id).green());
    Ok(())
}

/// Removes `app_id` from each device in turn and returns how many failed.
/// A failure on one device does not stop the others.
pub async fn uninstall_everywhere(
    app_id: &str,
    devices: &[DeviceId],
    control: Arc<dyn DeviceControl>,
    runner: Arc<CommandRunner>,
) -> usize {
    let mut failed = 0;
    for device in devices {
        let mut session = SessionController::new(device.clone(), control.clone(), runner.clone());
        let result = async {
            session.boot().await?;
            session.uninstall(app_id).await
        }
        .await;
        if let Err(e) = result {
            eprintln!("{}", e.to_string().red());
            failed += 1;
        }
        if let Err(e) = session.shutdown().await {
            log::warn!("shutdown of '{device}' after uninstall failed: {e}");
        }
    }
    failed
}
