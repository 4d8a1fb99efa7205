//! # Data Models Module / 数据模型模块
//!
//! This module defines the data structures that flow between the core
//! components: the per-device session state, the result of one test run, and
//! the recorded outcome of every (device, locale) combination.
//!
//! 此模块定义了在核心组件之间流转的数据结构：每个设备的会话状态、
//! 单次测试运行的结果，以及每个 (设备, 语言) 组合的记录结果。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::config::{DeviceId, LocaleId};
use crate::core::report::{SuiteSummary, Verdict};
use crate::infra::t;

/// Lifecycle of one simulated device while it is being processed.
/// 处理期间单个模拟设备的生命周期状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Unknown,
    Shutdown,
    Booted,
    Installed(LocaleId),
    TestsRunning,
    TestsComplete,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unknown => f.write_str("Unknown"),
            SessionState::Shutdown => f.write_str("Shutdown"),
            SessionState::Booted => f.write_str("Booted"),
            SessionState::Installed(locale) => write!(f, "Installed({locale})"),
            SessionState::TestsRunning => f.write_str("TestsRunning"),
            SessionState::TestsComplete => f.write_str("TestsComplete"),
        }
    }
}

/// Outcome of one test-runner invocation.
/// 一次测试运行器调用的结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub verdict: Verdict,
    pub summary: Option<SuiteSummary>,
    #[serde(skip)]
    pub stdout: String,
    #[serde(skip)]
    pub stderr: String,
    /// Where the full stdout was saved.
    pub stdout_log: Option<PathBuf>,
    /// Where stderr was saved (failed runs only).
    pub stderr_log: Option<PathBuf>,
    pub duration: Duration,
}

impl RunResult {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Files copied into one archive directory.
/// 复制到某个归档目录中的文件统计。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReport {
    pub target: PathBuf,
    pub copied: usize,
    pub rotated: usize,
}

/// The step of a combination in which a failure occurred.
/// 组合中发生失败的步骤。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    DeviceReset,
    Install,
    RunTests,
    Archive,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DeviceReset => "device reset",
            Stage::Install => "install",
            Stage::RunTests => "run tests",
            Stage::Archive => "archive",
        };
        f.write_str(name)
    }
}

/// Why a combination failed.
/// 组合失败的原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum FailureReason {
    /// The report did not show a clean pass.
    TestFailed,
    /// An external tool exceeded its bounded wait.
    Timeout,
    /// An external tool reported an error.
    ToolError,
    /// Copying or rotating screenshots failed.
    ArchiveError,
}

/// Why a combination was not attempted.
/// 组合未被执行的原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum SkipReason {
    /// An earlier fatal error ended the run.
    RunAborted,
    /// The operator interrupted the run (Ctrl-C).
    Cancelled,
}

/// The recorded outcome of one (device, locale) combination.
/// 一个 (设备, 语言) 组合的记录结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ComboOutcome {
    Passed {
        run: RunResult,
        archive: ArchiveReport,
    },
    Failed {
        stage: Stage,
        reason: FailureReason,
        message: String,
        run: Option<RunResult>,
    },
    Skipped {
        reason: SkipReason,
    },
}

/// One row of the matrix report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboResult {
    pub device: DeviceId,
    pub locale: LocaleId,
    #[serde(flatten)]
    pub outcome: ComboOutcome,
    pub duration: Duration,
}

impl ComboResult {
    pub fn skipped(device: DeviceId, locale: LocaleId, reason: SkipReason) -> Self {
        Self {
            device,
            locale,
            outcome: ComboOutcome::Skipped { reason },
            duration: Duration::ZERO,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self.outcome, ComboOutcome::Passed { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ComboOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ComboOutcome::Skipped { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.outcome,
            ComboOutcome::Failed {
                reason: FailureReason::Timeout,
                ..
            }
        )
    }

    /// `device / locale`, for tables and logs.
    /// 用于表格和日志的 `设备 / 语言` 标签。
    pub fn label(&self) -> String {
        format!("{} / {}", self.device, self.locale)
    }

    /// Gets the CSS class for the status column of the HTML report.
    pub fn get_status_class(&self) -> &'static str {
        match &self.outcome {
            ComboOutcome::Passed { .. } => "status-Passed",
            ComboOutcome::Failed { .. } if self.is_timeout() => "status-Timeout",
            ComboOutcome::Failed { .. } => "status-Failed",
            ComboOutcome::Skipped { .. } => "status-Skipped",
        }
    }

    /// Gets the status of the result as a localized string for display.
    /// 以本地化字符串形式获取结果状态以供显示。
    pub fn get_status_str(&self, locale: &str) -> String {
        match &self.outcome {
            ComboOutcome::Passed { .. } => t!("report.status_passed", locale = locale).to_string(),
            ComboOutcome::Failed { .. } if self.is_timeout() => {
                t!("report.status_timeout", locale = locale).to_string()
            }
            ComboOutcome::Failed { stage, .. } => {
                t!("report.status_failed", locale = locale, stage = stage).to_string()
            }
            ComboOutcome::Skipped { .. } => t!("report.status_skipped", locale = locale).to_string(),
        }
    }

    /// The failure message, or an empty string.
    pub fn get_message(&self) -> &str {
        match &self.outcome {
            ComboOutcome::Failed { message, .. } => message,
            _ => "",
        }
    }

    /// Screenshots archived for this combination.
    pub fn get_copied(&self) -> Option<usize> {
        match &self.outcome {
            ComboOutcome::Passed { archive, .. } => Some(archive.copied),
            _ => None,
        }
    }

    /// Gets the duration. Returns None for skipped combinations.
    pub fn get_duration(&self) -> Option<Duration> {
        match self.outcome {
            ComboOutcome::Skipped { .. } => None,
            _ => Some(self.duration),
        }
    }

    /// Captured test-runner output, if a test run happened.
    pub fn get_run(&self) -> Option<&RunResult> {
        match &self.outcome {
            ComboOutcome::Passed { run, .. } => Some(run),
            ComboOutcome::Failed { run, .. } => run.as_ref(),
            ComboOutcome::Skipped { .. } => None,
        }
    }
}

/// Counts over a list of results.
/// 结果列表的统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn of(results: &[ComboResult]) -> Self {
        Self {
            total: results.len(),
            passed: results.iter().filter(|r| r.is_passed()).count(),
            failed: results.iter().filter(|r| r.is_failure()).count(),
            skipped: results.iter().filter(|r| r.is_skipped()).count(),
        }
    }
}
