//! # Matrix Orchestrator Module / 矩阵编排模块
//!
//! Drives one run from start to finish:
//!
//! ```text
//! Init -> BuildPending -> BuildDone
//!      -> for each device { for each locale { install -> run tests -> archive } }
//!      -> Completed
//! ```
//!
//! Every planned combination ends up in the result list exactly once, as
//! passed, failed or skipped. Failures follow the configured
//! [`FailurePolicy`]; a fatal error marks everything not yet attempted as
//! skipped before it is returned. The journal is rewritten after every
//! combination so an interrupted run can still be reconstructed.
//!
//! 从头到尾驱动一次运行。每个计划的组合都会恰好一次出现在结果列表中。
//! 失败遵循配置的 [`FailurePolicy`]；致命错误会在返回前将所有尚未尝试的组合标记为跳过。

use colored::*;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::archiver::{Archiver, ImageRotator, Sips, resolve_collision};
use crate::core::builder::{AppBuilder, BuildTool, XcodebuildBuild};
use crate::core::config::{DeviceId, FailurePolicy, LocaleId, RunConfig};
use crate::core::driver::{TestDriver, TestRunner, XcodebuildTests};
use crate::core::error::{MatrixError, MatrixResult};
use crate::core::models::{ComboOutcome, ComboResult, FailureReason, RunResult, SkipReason, Stage};
use crate::core::planner::ExecutionPlan;
use crate::core::scheme::SchemeEditor;
use crate::core::session::{DeviceControl, SessionController, Simctl};
use crate::infra::command::CommandRunner;
use crate::infra::fs::files_with_extension;
use crate::infra::prompt::Operator;
use crate::infra::t;
use crate::reporting::journal;

/// Where the orchestrator currently is.
/// 编排器当前所处的阶段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Init,
    BuildPending,
    BuildDone,
    Running { device: DeviceId, locale: LocaleId },
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => f.write_str("Init"),
            Phase::BuildPending => f.write_str("BuildPending"),
            Phase::BuildDone => f.write_str("BuildDone"),
            Phase::Running { device, locale } => write!(f, "Running({device} / {locale})"),
            Phase::Completed => f.write_str("Completed"),
        }
    }
}

/// The external tools a run talks to.
pub struct Toolchain {
    pub device: Arc<dyn DeviceControl>,
    pub build: Arc<dyn BuildTool>,
    pub tests: Arc<dyn TestRunner>,
    pub rotator: Arc<dyn ImageRotator>,
}

impl Toolchain {
    /// simctl, xcodebuild and sips, all running through `runner`.
    pub fn xcode(runner: Arc<CommandRunner>, config: &RunConfig) -> Self {
        Self {
            device: Arc::new(Simctl::new(runner.clone(), config.timeouts.device())),
            build: Arc::new(XcodebuildBuild::new(runner.clone(), config)),
            tests: Arc::new(XcodebuildTests::new(runner.clone(), config)),
            rotator: Arc::new(Sips::new(runner, config.timeouts.rotate())),
        }
    }
}

/// A step failure of one combination, before the policy has been applied.
struct StepFailure {
    stage: Stage,
    error: MatrixError,
    run: Option<RunResult>,
}

impl StepFailure {
    fn new(stage: Stage, error: MatrixError) -> Self {
        Self {
            stage,
            error,
            run: None,
        }
    }

    fn reason(&self) -> FailureReason {
        match (&self.error, self.stage) {
            (MatrixError::Timeout { .. }, _) => FailureReason::Timeout,
            (MatrixError::TestFailed { .. }, _) => FailureReason::TestFailed,
            (_, Stage::Archive) => FailureReason::ArchiveError,
            _ => FailureReason::ToolError,
        }
    }

    /// Install and reset failures and errors that are fatal by kind end the
    /// run regardless of the failure policy. While archiving only a collision
    /// (or an interruption) is fatal; copy problems follow the policy.
    fn is_fatal(&self) -> bool {
        match self.stage {
            Stage::Install | Stage::DeviceReset => true,
            Stage::Archive => matches!(
                self.error,
                MatrixError::ArchiveCollision { .. } | MatrixError::Aborted(_)
            ),
            _ => self.error.is_always_fatal() || matches!(self.error, MatrixError::Io(_)),
        }
    }
}

/// Sequences build, device lifecycle, test runs and archiving over a plan.
///
/// 在计划上依次执行构建、设备生命周期、测试运行和归档。
pub struct Orchestrator {
    config: RunConfig,
    toolchain: Toolchain,
    runner: Arc<CommandRunner>,
    operator: Arc<dyn Operator>,
    cancel: CancellationToken,
    phase: Phase,
    results: Vec<ComboResult>,
}

impl Orchestrator {
    pub fn new(
        config: RunConfig,
        toolchain: Toolchain,
        runner: Arc<CommandRunner>,
        operator: Arc<dyn Operator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            toolchain,
            runner,
            operator,
            cancel,
            phase: Phase::Init,
            results: Vec::new(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Results recorded so far, in plan order. Complete after [`run`](Self::run)
    /// returns, whether it succeeded or not.
    pub fn results(&self) -> &[ComboResult] {
        &self.results
    }

    /// Executes `plan`.
    ///
    /// Returns the results when every combination was attempted (some may have
    /// failed under the skip policy). Returns the fatal error otherwise; the
    /// results, with the remaining combinations skipped, stay available through
    /// [`results`](Self::results).
    ///
    /// 执行 `plan`。所有组合都已尝试时返回结果；否则返回致命错误。
    pub async fn run(&mut self, plan: &ExecutionPlan) -> MatrixResult<Vec<ComboResult>> {
        self.results.clear();
        self.phase = Phase::Init;

        let scheme = match self.prepare() {
            Ok(scheme) => scheme,
            Err(e) => return Err(self.finish_fatal(plan, SkipReason::RunAborted, e, None)),
        };

        let outcome = self.execute(plan, scheme.as_ref()).await;
        match outcome {
            Ok(()) => {
                self.restore_scheme(scheme.as_ref());
                self.phase = Phase::Completed;
                self.write_journal();
                println!("{}", t!("run.completed", count = self.results.len()).green().bold());
                Ok(self.results.clone())
            }
            Err(e) => {
                let reason = if self.cancel.is_cancelled() {
                    SkipReason::Cancelled
                } else {
                    SkipReason::RunAborted
                };
                Err(self.finish_fatal(plan, reason, e, scheme.as_ref()))
            }
        }
    }

    /// `Init`: archive root guard and scheme backup.
    fn prepare(&mut self) -> MatrixResult<Option<SchemeEditor>> {
        let root = &self.config.archive_root;
        println!("{}", t!("run.archive_root", path = root.display()).blue());
        resolve_collision(
            root,
            "archive root",
            self.config.collision_policy,
            self.operator.as_ref(),
        )?;

        self.config
            .scheme_file
            .as_deref()
            .map(SchemeEditor::open)
            .transpose()
    }

    async fn execute(&mut self, plan: &ExecutionPlan, scheme: Option<&SchemeEditor>) -> MatrixResult<()> {
        self.quit_simulator_app().await;
        self.phase = Phase::BuildPending;
        let bundle = self.build().await?;
        self.phase = Phase::BuildDone;

        let archiver = Archiver::new(
            self.toolchain.rotator.clone(),
            self.operator.clone(),
            self.config.collision_policy,
        );
        let driver = TestDriver::new(self.toolchain.tests.clone(), self.config.build_dir.clone());

        for device_plan in &plan.devices {
            let mut session = SessionController::new(
                device_plan.device.clone(),
                self.toolchain.device.clone(),
                self.runner.clone(),
            );
            println!("{}", t!("run.device_header", device = &device_plan.device).cyan().bold());

            for locale in &device_plan.locales {
                if self.cancel.is_cancelled() {
                    session.force_shutdown().await;
                    return Err(MatrixError::Aborted(t!("run.cancelled").to_string()));
                }
                self.phase = Phase::Running {
                    device: device_plan.device.clone(),
                    locale: locale.clone(),
                };

                let started = Instant::now();
                let step = self
                    .run_combo(&mut session, &driver, &archiver, scheme, &bundle, locale)
                    .await;
                let proceed = self.record(&device_plan.device, locale, step, started.elapsed());
                self.quit_simulator_app().await;
                self.write_journal();

                if let Err(e) = proceed {
                    session.force_shutdown().await;
                    return Err(e);
                }
            }

            if let Err(e) = session.shutdown().await {
                log::warn!("final shutdown of '{}' failed: {e}", device_plan.device);
            }
        }
        Ok(())
    }

    /// `BuildPending -> BuildDone`. Returns the bundle to install.
    async fn build(&mut self) -> MatrixResult<PathBuf> {
        let builder = AppBuilder::new(self.toolchain.build.clone(), self.runner.clone(), &self.config);
        match builder.build().await {
            Ok(outcome) => Ok(outcome.bundle),
            Err(failure) => {
                let continuable = failure.bundle_present
                    && !failure.error.is_always_fatal()
                    && self.config.failure_policy == FailurePolicy::PromptOperator;
                if !continuable {
                    return Err(failure.error);
                }
                println!("{}", failure.error.to_string().red());
                let question = t!("build.confirm_continue", path = builder.bundle_path().display());
                if self.operator.confirm(&question)? {
                    Ok(builder.bundle_path().to_path_buf())
                } else {
                    Err(failure.error)
                }
            }
        }
    }

    /// Install, run tests and archive one combination.
    async fn run_combo(
        &self,
        session: &mut SessionController,
        driver: &TestDriver,
        archiver: &Archiver,
        scheme: Option<&SchemeEditor>,
        bundle: &Path,
        locale: &LocaleId,
    ) -> Result<ComboOutcome, StepFailure> {
        let device = session.device().clone();

        if self.config.clear_screenshots_before_run {
            clear_screenshots(&self.config.screenshots_dir)
                .map_err(|e| StepFailure::new(Stage::DeviceReset, e))?;
        }
        if let Some(editor) = scheme {
            editor
                .apply(locale)
                .map_err(|e| StepFailure::new(Stage::DeviceReset, e))?;
        }

        session
            .install(bundle, locale)
            .await
            .map_err(|e| StepFailure::new(Stage::Install, e))?;

        let run = driver
            .run_tests(session, locale)
            .await
            .map_err(|e| StepFailure::new(Stage::RunTests, e))?;
        if !run.passed() {
            return Err(StepFailure {
                stage: Stage::RunTests,
                error: MatrixError::TestFailed {
                    device: device.to_string(),
                    locale: locale.to_string(),
                },
                run: Some(run),
            });
        }

        match archiver
            .archive(&self.config.screenshots_dir, &device, locale, &self.config.archive_root)
            .await
        {
            Ok(archive) => Ok(ComboOutcome::Passed { run, archive }),
            Err(error) => Err(StepFailure {
                stage: Stage::Archive,
                error,
                run: Some(run),
            }),
        }
    }

    /// Stores the outcome of a combination and applies the failure policy.
    /// `Err` means the run must stop.
    fn record(
        &mut self,
        device: &DeviceId,
        locale: &LocaleId,
        step: Result<ComboOutcome, StepFailure>,
        duration: Duration,
    ) -> MatrixResult<()> {
        let failure = match step {
            Ok(outcome) => {
                self.results.push(ComboResult {
                    device: device.clone(),
                    locale: locale.clone(),
                    outcome,
                    duration,
                });
                return Ok(());
            }
            Err(failure) => failure,
        };

        let fatal = failure.is_fatal();
        let reason = failure.reason();
        let StepFailure { stage, error, run } = failure;
        println!(
            "{}",
            t!("run.combo_failed", device = device, lang = locale, stage = stage, error = &error).red()
        );
        self.results.push(ComboResult {
            device: device.clone(),
            locale: locale.clone(),
            outcome: ComboOutcome::Failed {
                stage,
                reason,
                message: error.to_string(),
                run,
            },
            duration,
        });

        if fatal || self.cancel.is_cancelled() {
            return Err(error);
        }
        match self.config.failure_policy {
            FailurePolicy::AbortOnFailure => Err(error),
            FailurePolicy::SkipAndContinue => {
                println!("{}", t!("run.skipping").yellow());
                Ok(())
            }
            FailurePolicy::PromptOperator => {
                if self.operator.confirm(&t!("run.confirm_continue", device = device, lang = locale))? {
                    Ok(())
                } else {
                    Err(MatrixError::Aborted(t!("run.operator_declined").to_string()))
                }
            }
        }
    }

    /// Skips what was not attempted, restores the scheme and writes the
    /// journal, then hands the error back.
    fn finish_fatal(
        &mut self,
        plan: &ExecutionPlan,
        reason: SkipReason,
        error: MatrixError,
        scheme: Option<&SchemeEditor>,
    ) -> MatrixError {
        let attempted = self.results.len();
        let remaining: Vec<ComboResult> = plan
            .iterations()
            .skip(attempted)
            .map(|(device, locale)| ComboResult::skipped(device.clone(), locale.clone(), reason))
            .collect();
        self.results.extend(remaining);

        self.restore_scheme(scheme);
        self.write_journal();
        log::error!("run stopped in phase {}: {error}", self.phase);
        error
    }

    fn restore_scheme(&self, scheme: Option<&SchemeEditor>) {
        let Some(editor) = scheme else {
            return;
        };
        if let Err(e) = editor.restore() {
            println!(
                "{}",
                t!("scheme.restore_failed", path = editor.backup_path().display(), error = e).red()
            );
        }
    }

    fn write_journal(&self) {
        let Some(path) = &self.config.journal else {
            return;
        };
        if let Err(e) = journal::write_journal(path, &self.config.app_name, &self.results) {
            log::warn!("could not write journal '{}': {e:#}", path.display());
        }
    }

    async fn quit_simulator_app(&self) {
        match self.toolchain.device.quit_simulator_app().await {
            Ok(output) if !output.success() => {
                log::debug!("Simulator app quit reported {:?}", output.status)
            }
            Ok(_) => {}
            Err(e) => log::warn!("could not quit the Simulator app: {e}"),
        }
    }
}

/// Removes PNG files left in `dir` by an earlier run. A missing directory is fine.
fn clear_screenshots(dir: &Path) -> MatrixResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let stale = files_with_extension(dir, "png")?;
    if !stale.is_empty() {
        log::debug!("removing {} stale screenshot(s) from {}", stale.len(), dir.display());
    }
    for file in stale {
        fs::remove_file(file)?;
    }
    Ok(())
}
