//! # Error Taxonomy Module / 错误分类模块
//!
//! Every failure the orchestrator can meet is one variant of [`MatrixError`].
//! Configuration errors are raised before any device is touched; tool, test and
//! archive errors carry enough context (and the path of the persisted log, when
//! one was written) to reconstruct what happened from the console alone.
//!
//! 编排器可能遇到的每种失败都是 [`MatrixError`] 的一个变体。

use std::path::PathBuf;
use thiserror::Error;

/// The error type shared by all core components.
/// 所有核心组件共享的错误类型。
#[derive(Debug, Error)]
pub enum MatrixError {
    /// A malformed line in the device/language file (or another config source).
    /// 设备/语言文件中的格式错误行。
    #[error("{}: line {line}: {message}", path.display())]
    Config {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A locale identifier that is neither `<lang>_<REGION>` nor `<lang>-<Script>`.
    #[error("invalid locale identifier '{0}': expected <language>_<REGION> or <language>-<Script>")]
    InvalidLocale(String),

    /// Preconditions of the run are not met (missing scheme pattern, unreadable file, ...).
    /// 运行的前置条件不满足。
    #[error("{0}")]
    Setup(String),

    /// An external tool reported an error through its exit status or stderr.
    /// 外部工具通过退出状态或 stderr 报告了错误。
    #[error("{tool} failed: {message}{}", log.as_ref().map(|p| format!(" (log: {})", p.display())).unwrap_or_default())]
    Tool {
        tool: String,
        message: String,
        log: Option<PathBuf>,
    },

    /// The build finished but the expected `.app` bundle is absent.
    #[error("build artifact not found at {}", .0.display())]
    MissingArtifact(PathBuf),

    /// The UI test report did not signal a clean pass.
    #[error("UI tests failed for {device} / {locale}")]
    TestFailed { device: String, locale: String },

    /// The archive directory already holds artifacts and reuse was not confirmed.
    /// 归档目录已有内容且未确认复用。
    #[error("archive directory '{}' already contains {entries} entries; existing artifacts were left untouched", path.display())]
    ArchiveCollision { path: PathBuf, entries: usize },

    /// An external command exceeded its bounded wait.
    #[error("'{command}' did not finish within {secs}s")]
    Timeout { command: String, secs: u64 },

    /// The operator declined to continue, or the run was interrupted.
    /// 操作员拒绝继续，或运行被中断。
    #[error("run aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MatrixError {
    /// Shorthand for a tool error without a persisted log.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        MatrixError::Tool {
            tool: tool.into(),
            message: message.into(),
            log: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, MatrixError::Timeout { .. })
    }

    /// Errors that must never be downgraded by a skip/prompt policy.
    /// 不能被跳过/提示策略降级的错误。
    pub fn is_always_fatal(&self) -> bool {
        matches!(
            self,
            MatrixError::Config { .. }
                | MatrixError::InvalidLocale(_)
                | MatrixError::Setup(_)
                | MatrixError::ArchiveCollision { .. }
                | MatrixError::Aborted(_)
        )
    }
}

pub type MatrixResult<T> = std::result::Result<T, MatrixError>;
