//! # Device Session Controller Module / 设备会话控制模块
//!
//! Wraps the simulator lifecycle primitives (boot, shutdown, install,
//! uninstall) into idempotent operations with defined pre/post conditions.
//! [`DeviceControl`] is the narrow adapter over the control tool; [`Simctl`]
//! drives `xcrun simctl`. [`SessionController`] owns the [`SessionState`] of
//! the one device currently being processed.
//!
//! 将模拟器生命周期原语（启动、关闭、安装、卸载）包装为具有明确前置/后置条件的幂等操作。

use async_trait::async_trait;
use colored::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{DeviceId, LocaleId};
use crate::core::error::{MatrixError, MatrixResult};
use crate::core::models::SessionState;
use crate::infra::command::{CommandLine, CommandOutput, CommandRunner};
use crate::infra::t;

/// simctl's message when shutting down a device that is already off.
const ALREADY_SHUTDOWN: &str = "current state: Shutdown";
/// simctl's message when booting a device that is already up.
const ALREADY_BOOTED: &str = "current state: Booted";

/// Device-lifecycle primitives of a device-control backend.
///
/// Implementations only issue the command; tolerance and state tracking live
/// in [`SessionController`].
///
/// 设备控制后端的生命周期原语。实现只负责发出命令；容错和状态跟踪由 [`SessionController`] 负责。
#[async_trait]
pub trait DeviceControl: Send + Sync {
    async fn shutdown(&self, device: &DeviceId) -> MatrixResult<CommandOutput>;
    async fn boot(&self, device: &DeviceId) -> MatrixResult<CommandOutput>;
    async fn install(&self, device: &DeviceId, bundle: &Path) -> MatrixResult<CommandOutput>;
    async fn uninstall(&self, device: &DeviceId, app_id: &str) -> MatrixResult<CommandOutput>;
    /// Closes the simulator GUI, if the backend has one.
    async fn quit_simulator_app(&self) -> MatrixResult<CommandOutput>;

    /// Shutdown issued as cleanup after a timeout or an interrupt. It must run
    /// even when the run has been cancelled.
    async fn cleanup_shutdown(&self, device: &DeviceId) -> MatrixResult<CommandOutput> {
        self.shutdown(device).await
    }
}

/// `xcrun simctl` backend.
pub struct Simctl {
    runner: Arc<CommandRunner>,
    timeout: Duration,
}

impl Simctl {
    pub fn new(runner: Arc<CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    fn simctl<'a>(action: &str, rest: impl IntoIterator<Item = &'a str>) -> CommandLine {
        CommandLine::new("xcrun").arg("simctl").arg(action).args(rest)
    }
}

#[async_trait]
impl DeviceControl for Simctl {
    async fn shutdown(&self, device: &DeviceId) -> MatrixResult<CommandOutput> {
        self.runner
            .run(&Self::simctl("shutdown", [device.as_str()]), self.timeout)
            .await
    }

    async fn boot(&self, device: &DeviceId) -> MatrixResult<CommandOutput> {
        self.runner
            .run(&Self::simctl("boot", [device.as_str()]), self.timeout)
            .await
    }

    async fn install(&self, device: &DeviceId, bundle: &Path) -> MatrixResult<CommandOutput> {
        let bundle = bundle.to_string_lossy();
        self.runner
            .run(&Self::simctl("install", [device.as_str(), bundle.as_ref()]), self.timeout)
            .await
    }

    async fn uninstall(&self, device: &DeviceId, app_id: &str) -> MatrixResult<CommandOutput> {
        self.runner
            .run(&Self::simctl("uninstall", [device.as_str(), app_id]), self.timeout)
            .await
    }

    async fn quit_simulator_app(&self) -> MatrixResult<CommandOutput> {
        let quit = CommandLine::new("osascript")
            .arg("-e")
            .arg("tell app \"Simulator\" to quit");
        self.runner.run(&quit, self.timeout).await
    }

    async fn cleanup_shutdown(&self, device: &DeviceId) -> MatrixResult<CommandOutput> {
        self.runner
            .run_uncancelled(&Self::simctl("shutdown", [device.as_str()]), self.timeout)
            .await
    }
}

/// Owns one device's lifecycle for the duration of its processing.
///
/// 在设备处理期间拥有其生命周期。
pub struct SessionController {
    device: DeviceId,
    control: Arc<dyn DeviceControl>,
    runner: Arc<CommandRunner>,
    state: SessionState,
}

impl SessionController {
    pub fn new(device: DeviceId, control: Arc<dyn DeviceControl>, runner: Arc<CommandRunner>) -> Self {
        Self {
            device,
            control,
            runner,
            state: SessionState::Unknown,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn label(&self, action: &str) -> String {
        format!("simctl_{action}_{}", self.device)
    }

    /// Shuts the device down. "Already shut down" counts as success; any other
    /// stderr is persisted and surfaced but not fatal.
    ///
    /// 关闭设备。“已关闭”视为成功；其他 stderr 会被持久化并显示，但不致命。
    pub async fn shutdown(&mut self) -> MatrixResult<()> {
        println!("{}", t!("session.shutdown", device = &self.device).blue());
        let output = self.control.shutdown(&self.device).await?;
        if output.success() || output.stderr.contains(ALREADY_SHUTDOWN) {
            self.state = SessionState::Shutdown;
            return Ok(());
        }
        log::warn!("shutdown of '{}' reported exit {:?}", self.device, output.status);
        self.runner.check_stderr(&self.label("shutdown"), &output, false)?;
        self.state = SessionState::Unknown;
        Ok(())
    }

    /// Boots the device. "Already booted" counts as success; a timeout forces a
    /// shutdown before it propagates.
    pub async fn boot(&mut self) -> MatrixResult<()> {
        println!("{}", t!("session.boot", device = &self.device).blue());
        let output = match self.control.boot(&self.device).await {
            Ok(output) => output,
            Err(e) => return Err(self.fail_with_shutdown(e).await),
        };
        if output.success() || output.stderr.contains(ALREADY_BOOTED) {
            self.state = SessionState::Booted;
            return Ok(());
        }
        log::warn!("boot of '{}' reported exit {:?}", self.device, output.status);
        self.runner.check_stderr(&self.label("boot"), &output, false)?;
        self.state = SessionState::Unknown;
        Ok(())
    }

    /// Installs `bundle` for `locale`.
    ///
    /// The device is always shut down and booted first, because install
    /// semantics are undefined on a device in an unknown state. A non-zero exit
    /// or any stderr from the install is fatal: a broken install poisons every
    /// test that follows on this device and locale.
    ///
    /// 安装前总是先关闭再启动设备。安装的非零退出或任何 stderr 都是致命的。
    pub async fn install(&mut self, bundle: &Path, locale: &LocaleId) -> MatrixResult<()> {
        self.shutdown().await?;
        self.boot().await?;

        println!(
            "{}",
            t!("session.install", device = &self.device, bundle = bundle.display(), lang = locale).blue()
        );
        let output = match self.control.install(&self.device, bundle).await {
            Ok(output) => output,
            Err(e) => return Err(self.fail_with_shutdown(e).await),
        };

        if !output.success() || !output.stderr_is_empty() {
            self.state = SessionState::Unknown;
            let log = self.runner.persist_stderr(&self.label("install"), &output)?;
            let message = if output.stderr_is_empty() {
                format!("exit status {:?}", output.status)
            } else {
                crate::infra::command::tail(&output.stderr, 10)
            };
            return Err(MatrixError::Tool {
                tool: "simctl install".to_string(),
                message,
                log,
            });
        }

        self.state = SessionState::Installed(locale.clone());
        Ok(())
    }

    /// Removes `app_id` from the device. Failures are returned to the caller.
    pub async fn uninstall(&mut self, app_id: &str) -> MatrixResult<()> {
        println!("{}", t!("session.uninstall", device = &self.device, app = app_id).blue());
        let output = self.control.uninstall(&self.device, app_id).await?;
        if output.success() && output.stderr_is_empty() {
            return Ok(());
        }
        let log = self.runner.check_stderr(&self.label("uninstall"), &output, false)?;
        Err(MatrixError::Tool {
            tool: "simctl uninstall".to_string(),
            message: format!("exit status {:?}", output.status),
            log,
        })
    }

    /// Moves an installed device into `TestsRunning`.
    ///
    /// The test runner refuses devices it considers live, so the device is shut
    /// down first; the runner boots it itself.
    ///
    /// 测试运行器拒绝它认为处于活动状态的设备，因此先关闭设备。
    pub async fn begin_tests(&mut self) -> MatrixResult<()> {
        if !matches!(self.state, SessionState::Installed(_)) {
            return Err(MatrixError::Setup(format!(
                "cannot start tests on '{}' in state {}",
                self.device, self.state
            )));
        }
        let installed = self.state.clone();
        self.shutdown().await?;
        if self.state != SessionState::Shutdown {
            log::warn!("'{}' did not confirm shutdown before tests (was {installed})", self.device);
        }
        self.state = SessionState::TestsRunning;
        Ok(())
    }

    pub fn finish_tests(&mut self) {
        self.state = SessionState::TestsComplete;
    }

    /// Best-effort shutdown used after a timeout or cancellation. It is not
    /// itself cancellable. Errors are logged, never returned.
    pub async fn force_shutdown(&mut self) {
        match self.control.cleanup_shutdown(&self.device).await {
            Ok(_) => self.state = SessionState::Shutdown,
            Err(e) => {
                log::warn!("forced shutdown of '{}' failed: {e}", self.device);
                self.state = SessionState::Unknown;
            }
        }
    }

    async fn fail_with_shutdown(&mut self, error: MatrixError) -> MatrixError {
        if error.is_timeout() {
            println!("{}", t!("session.timeout_shutdown", device = &self.device).yellow());
            self.force_shutdown().await;
        }
        error
    }
}
