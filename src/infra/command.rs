//! # Command Execution Module / 命令执行模块
//!
//! The Command Runner: spawns an external command, captures stdout and stderr
//! separately, and bounds the wait. A non-zero exit is never an error here; the
//! caller inspects [`CommandOutput`]. Only a failed spawn, an expired timeout
//! or an interruption surface as [`MatrixError`].
//!
//! 命令运行器：派生外部命令，分别捕获 stdout 和 stderr，并限制等待时间。
//! 非零退出码在此不视为错误；由调用方检查 [`CommandOutput`]。

use async_trait::async_trait;
use chrono::Local;
use colored::*;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::error::{MatrixError, MatrixResult};
use crate::infra::t;

/// A program, its arguments and an optional working directory.
/// 程序、参数和可选的工作目录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// `true` if any argument equals `needle`.
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// The value following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandLine {
    /// Shell-quoted, so the logged line can be pasted into a terminal.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        match shlex::try_join(parts) {
            Ok(joined) => f.write_str(&joined),
            Err(_) => write!(f, "{} {}", self.program, self.args.join(" ")),
        }
    }
}

/// Captured result of one command execution.
/// 一次命令执行的捕获结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was terminated by a signal.
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn new(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            status: Some(status),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stderr_is_empty(&self) -> bool {
        is_blank(&self.stderr)
    }
}

/// Output counts as empty when nothing but whitespace remains after trimming.
/// 去除空白后没有剩余内容即视为空输出。
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// The last `count` non-empty lines of `text`, joined with newlines.
pub fn tail(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

/// Executes command lines. The production implementation spawns processes;
/// tests substitute a scripted one.
///
/// 执行命令行。生产实现派生进程；测试使用脚本化实现替代。
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &CommandLine, timeout: Duration) -> MatrixResult<CommandOutput>;

    /// Like [`execute`](Self::execute) but not subject to run cancellation.
    /// Used for cleanup that must still happen after an interrupt; the timeout
    /// still applies.
    ///
    /// 与 `execute` 相同但不受运行取消的影响，用于中断后仍需执行的清理；超时仍然生效。
    async fn execute_uncancelled(&self, command: &CommandLine, timeout: Duration) -> MatrixResult<CommandOutput> {
        self.execute(command, timeout).await
    }
}

/// Spawns real processes with `tokio::process`.
///
/// The child is killed when its future is dropped, so both an expired timeout
/// and a cancelled run leave no orphaned tool behind.
pub struct ProcessExecutor {
    cancel: CancellationToken,
}

impl ProcessExecutor {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    fn spawn(command: &CommandLine) -> MatrixResult<tokio::process::Child> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        cmd.spawn().map_err(|e| {
            MatrixError::tool(command.program.clone(), format!("could not start '{command}': {e}"))
        })
    }

    async fn wait(
        child: tokio::process::Child,
        command: &CommandLine,
        timeout: Duration,
    ) -> MatrixResult<CommandOutput> {
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                status: output.status.code(),
            }),
            Ok(Err(e)) => Err(MatrixError::tool(
                command.program.clone(),
                format!("failed while waiting for '{command}': {e}"),
            )),
            Err(_) => Err(MatrixError::Timeout {
                command: command.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, command: &CommandLine, timeout: Duration) -> MatrixResult<CommandOutput> {
        let child = Self::spawn(command)?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(MatrixError::Aborted(t!("command.interrupted", command = command).to_string()))
            }
            waited = Self::wait(child, command, timeout) => waited,
        }
    }

    async fn execute_uncancelled(&self, command: &CommandLine, timeout: Duration) -> MatrixResult<CommandOutput> {
        Self::wait(Self::spawn(command)?, command, timeout).await
    }
}

/// Writes captured output to uniquely named files under the error-log directory.
/// 将捕获的输出写入错误日志目录下唯一命名的文件。
#[derive(Debug)]
pub struct ErrorLog {
    dir: PathBuf,
    seq: AtomicUsize,
}

impl ErrorLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seq: AtomicUsize::new(0),
        }
    }

    /// Persists `text` as `ErrorFrom_<label>_<timestamp>_<seq>.log`.
    pub fn persist(&self, label: &str, text: &str) -> MatrixResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let label = crate::infra::fs::sanitize_path(label).replace('/', "_");
        let path = self.dir.join(format!("ErrorFrom_{label}_{stamp}_{seq:03}.log"));
        fs::write(&path, text)?;
        Ok(path)
    }
}

/// The shared Command Runner: an executor plus the error log it reports into.
///
/// 共享的命令运行器：执行器及其报告所用的错误日志。
pub struct CommandRunner {
    executor: Arc<dyn CommandExecutor>,
    error_log: ErrorLog,
}

impl CommandRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>, error_log_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            error_log: ErrorLog::new(error_log_dir),
        }
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Runs `command` and returns whatever it produced.
    pub async fn run(&self, command: &CommandLine, timeout: Duration) -> MatrixResult<CommandOutput> {
        log::debug!("Running: {command} (timeout {}s)", timeout.as_secs());
        let output = self.executor.execute(command, timeout).await?;
        log::debug!(
            "'{}' exited with {:?} ({} bytes stdout, {} bytes stderr)",
            command.program,
            output.status,
            output.stdout.len(),
            output.stderr.len()
        );
        Ok(output)
    }

    /// Runs a cleanup `command` that must complete even after the run was
    /// cancelled.
    pub async fn run_uncancelled(&self, command: &CommandLine, timeout: Duration) -> MatrixResult<CommandOutput> {
        log::debug!("Running (uncancellable): {command} (timeout {}s)", timeout.as_secs());
        self.executor.execute_uncancelled(command, timeout).await
    }

    /// Persists the stderr of `output` if it is non-empty and returns the log path.
    pub fn persist_stderr(&self, label: &str, output: &CommandOutput) -> MatrixResult<Option<PathBuf>> {
        if output.stderr_is_empty() {
            return Ok(None);
        }
        self.error_log.persist(label, &output.stderr).map(Some)
    }

    /// Surfaces a non-empty stderr: prints its tail, persists it, and, when
    /// `abort_on_error` is set, turns it into a fatal [`MatrixError::Tool`].
    ///
    /// 显示非空的 stderr：打印其末尾、持久化，并在设置 `abort_on_error` 时将其转换为致命错误。
    pub fn check_stderr(
        &self,
        label: &str,
        output: &CommandOutput,
        abort_on_error: bool,
    ) -> MatrixResult<Option<PathBuf>> {
        if output.stderr_is_empty() {
            return Ok(None);
        }

        let total = output.stderr.lines().count();
        println!(
            "{}",
            t!("command.stderr_tail", label = label, shown = total.min(10), total = total).yellow()
        );
        println!("{}", tail(&output.stderr, 10).dimmed());

        let path = self.error_log.persist(label, &output.stderr)?;
        println!("{}", t!("command.stderr_saved", path = path.display()).yellow());

        if abort_on_error {
            return Err(MatrixError::Tool {
                tool: label.to_string(),
                message: tail(&output.stderr, 1),
                log: Some(path),
            });
        }
        Ok(Some(path))
    }
}
