//! # Test Execution Driver Module / 测试执行驱动模块
//!
//! Builds the test-runner invocation for one (device, locale) pair, runs it,
//! saves its output next to the build products and classifies the report.
//!
//! 为单个 (设备, 语言) 组合构建测试运行器调用，执行它，
//! 将其输出保存到构建产物旁，并对报告进行分类。

use async_trait::async_trait;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::config::{DeviceId, LocaleId, RunConfig};
use crate::core::error::MatrixResult;
use crate::core::models::RunResult;
use crate::core::report::{Verdict, parse_report};
use crate::core::session::SessionController;
use crate::infra::command::{CommandLine, CommandOutput, CommandRunner};
use crate::infra::fs::{sanitize_path, write_text};
use crate::infra::t;

/// Runs the UI test target against one device and locale.
/// 针对单个设备和语言运行 UI 测试目标。
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_ui_tests(
        &self,
        device: &DeviceId,
        locale: &LocaleId,
        output_dir: &Path,
    ) -> MatrixResult<CommandOutput>;
}

/// `xcodebuild test` backend.
pub struct XcodebuildTests {
    runner: Arc<CommandRunner>,
    project_root: PathBuf,
    app_name: String,
    test_target: String,
    os_version: String,
    timeout: Duration,
}

impl XcodebuildTests {
    pub fn new(runner: Arc<CommandRunner>, config: &RunConfig) -> Self {
        Self {
            runner,
            project_root: config.project_root.clone(),
            app_name: config.app_name.clone(),
            test_target: config.test_target(),
            os_version: config.os_version.clone(),
            timeout: config.timeouts.test(),
        }
    }

    /// The full `xcodebuild test` command line for one combination.
    ///
    /// The locale is bound through `-testLanguage`/`-testRegion` in addition to
    /// any scheme rewrite, so the test host starts in the wanted language.
    pub fn command_line(&self, device: &DeviceId, locale: &LocaleId, output_dir: &Path) -> CommandLine {
        let mut cmd = CommandLine::new("xcodebuild")
            .arg("test")
            .args(["-target", &self.test_target])
            .arg("-derivedDataPath")
            .arg(output_dir.to_string_lossy())
            .args(["-scheme", &self.app_name])
            .args(["-sdk", "iphonesimulator"])
            .arg("-destination")
            .arg(format!("platform=iOS Simulator,OS={},name={}", self.os_version, device));

        match locale.region() {
            Some(region) => {
                cmd = cmd
                    .args(["-testLanguage", locale.language()])
                    .args(["-testRegion", region]);
            }
            None => cmd = cmd.args(["-testLanguage", locale.as_str()]),
        }

        cmd.current_dir(&self.project_root)
    }
}

#[async_trait]
impl TestRunner for XcodebuildTests {
    async fn run_ui_tests(
        &self,
        device: &DeviceId,
        locale: &LocaleId,
        output_dir: &Path,
    ) -> MatrixResult<CommandOutput> {
        let cmd = self.command_line(device, locale, output_dir);
        self.runner.run(&cmd, self.timeout).await
    }
}

/// Runs tests for a combination and turns the output into a [`RunResult`].
///
/// 为组合运行测试并将输出转换为 [`RunResult`]。
pub struct TestDriver {
    tests: Arc<dyn TestRunner>,
    output_dir: PathBuf,
}

impl TestDriver {
    pub fn new(tests: Arc<dyn TestRunner>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tests,
            output_dir: output_dir.into(),
        }
    }

    /// `UITest_StdOUT__<dev>_<lang>` / `UITest_StdERR__<dev>_<lang>` under the output dir.
    pub fn log_path(&self, stream: &str, device: &DeviceId, locale: &LocaleId) -> PathBuf {
        self.output_dir.join(format!(
            "UITest_Std{stream}__{}_{}",
            sanitize_path(device.as_str()),
            sanitize_path(locale.as_str())
        ))
    }

    /// Shuts the device down, runs the tests and parses the report.
    ///
    /// A timed-out run forces the device down before the error propagates.
    /// stdout is always saved; stderr is saved when the verdict is FAIL.
    ///
    /// 关闭设备，运行测试并解析报告。超时的运行会在错误传播前强制关闭设备。
    pub async fn run_tests(&self, session: &mut SessionController, locale: &LocaleId) -> MatrixResult<RunResult> {
        session.begin_tests().await?;
        let device = session.device().clone();

        println!(
            "{}",
            t!("run.running_tests", device = &device, lang = locale).blue()
        );
        let started = Instant::now();
        let output = match self.tests.run_ui_tests(&device, locale, &self.output_dir).await {
            Ok(output) => output,
            Err(e) => {
                if e.is_timeout() {
                    println!("{}", t!("session.timeout_shutdown", device = &device).yellow());
                }
                session.force_shutdown().await;
                return Err(e);
            }
        };
        let duration = started.elapsed();
        session.finish_tests();

        let stdout_log = self.log_path("OUT", &device, locale);
        write_text(&stdout_log, &output.stdout)?;
        println!("{}", t!("run.stdout_saved", path = stdout_log.display()).dimmed());

        let outcome = parse_report(&output.stdout);
        let stderr_log = if outcome.verdict == Verdict::Fail && !output.stderr_is_empty() {
            let path = self.log_path("ERR", &device, locale);
            write_text(&path, &output.stderr)?;
            println!("{}", t!("run.stderr_saved", path = path.display()).yellow());
            Some(path)
        } else {
            None
        };

        match (&outcome.verdict, &outcome.summary) {
            (Verdict::Pass, Some(summary)) => println!(
                "{}",
                t!(
                    "run.tests_passed",
                    device = &device,
                    lang = locale,
                    executed = summary.executed,
                    seconds = &summary.seconds
                )
                .green()
            ),
            _ => println!("{}", t!("run.tests_failed", device = &device, lang = locale).red()),
        }

        Ok(RunResult {
            verdict: outcome.verdict,
            summary: outcome.summary,
            stdout: output.stdout,
            stderr: output.stderr,
            stdout_log: Some(stdout_log),
            stderr_log,
            duration,
        })
    }
}
