//! # App Build Module / 应用构建模块
//!
//! Builds the app bundle once per run into the configured build directory and
//! checks that `<build_dir>/<App>.app` exists afterwards. A failed build prints
//! a digest of the compiler errors instead of the whole log.
//!
//! 每次运行将应用包构建到配置的构建目录一次，并检查 `<build_dir>/<App>.app` 是否存在。
//! 构建失败时打印编译错误摘要而不是整个日志。

use async_trait::async_trait;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::config::RunConfig;
use crate::core::error::{MatrixError, MatrixResult};
use crate::core::issues::{self, IssueKind};
use crate::infra::command::{CommandLine, CommandOutput, CommandRunner, tail};
use crate::infra::fs::write_text;
use crate::infra::t;

/// Produces the app bundle.
#[async_trait]
pub trait BuildTool: Send + Sync {
    async fn build(&self) -> MatrixResult<CommandOutput>;
}

/// `xcodebuild ... build` backend.
pub struct XcodebuildBuild {
    runner: Arc<CommandRunner>,
    project_root: PathBuf,
    app_name: String,
    build_dir: PathBuf,
    clean: bool,
    timeout: Duration,
}

impl XcodebuildBuild {
    pub fn new(runner: Arc<CommandRunner>, config: &RunConfig) -> Self {
        Self {
            runner,
            project_root: config.project_root.clone(),
            app_name: config.app_name.clone(),
            build_dir: config.build_dir.clone(),
            clean: config.clean,
            timeout: config.timeouts.build(),
        }
    }

    pub fn command_line(&self) -> CommandLine {
        let mut cmd = CommandLine::new("xcodebuild")
            .args(["-sdk", "iphonesimulator"])
            .args(["-scheme", &self.app_name])
            .arg(format!("CONFIGURATION_BUILD_DIR={}", self.build_dir.display()));
        if self.clean {
            cmd = cmd.arg("clean");
        }
        cmd.arg("build").current_dir(&self.project_root)
    }
}

#[async_trait]
impl BuildTool for XcodebuildBuild {
    async fn build(&self) -> MatrixResult<CommandOutput> {
        if let Some(workspace) = find_workspace(&self.project_root)? {
            return Err(MatrixError::Setup(format!(
                "'{}' is a workspace project; only plain .xcodeproj builds are supported",
                workspace.display()
            )));
        }
        self.runner.run(&self.command_line(), self.timeout).await
    }
}

fn find_workspace(project_root: &Path) -> MatrixResult<Option<PathBuf>> {
    if !project_root.is_dir() {
        return Err(MatrixError::Setup(format!(
            "project root '{}' is not a directory",
            project_root.display()
        )));
    }
    Ok(fs::read_dir(project_root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|ext| ext == "xcworkspace")))
}

/// What the build step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub bundle: PathBuf,
    pub stdout_log: PathBuf,
    /// The build reported an error but a fresh bundle was accepted.
    pub tolerated: bool,
}

/// A build failure: the error plus whether the bundle could still be used if
/// the operator chooses to go on.
#[derive(Debug)]
pub struct BuildFailure {
    pub error: MatrixError,
    pub bundle_present: bool,
}

/// Runs the build and checks its product.
///
/// 运行构建并检查其产物。
pub struct AppBuilder {
    tool: Arc<dyn BuildTool>,
    runner: Arc<CommandRunner>,
    bundle: PathBuf,
    build_dir: PathBuf,
    freshness: Option<Duration>,
}

impl AppBuilder {
    pub fn new(tool: Arc<dyn BuildTool>, runner: Arc<CommandRunner>, config: &RunConfig) -> Self {
        Self {
            tool,
            runner,
            bundle: config.bundle_path(),
            build_dir: config.build_dir.clone(),
            freshness: config.build_freshness,
        }
    }

    pub fn bundle_path(&self) -> &Path {
        &self.bundle
    }

    /// Builds the bundle.
    ///
    /// - exit 0 with stderr: warned about, accepted
    /// - non-zero exit: accepted only when a freshness window is configured and
    ///   the bundle was written within it; otherwise a [`BuildFailure`]
    /// - no bundle afterwards: [`MatrixError::MissingArtifact`], always fatal
    pub async fn build(&self) -> Result<BuildOutcome, BuildFailure> {
        println!("{}", t!("build.start", path = self.build_dir.display()).blue());
        let output = self.tool.build().await.map_err(|error| BuildFailure {
            error,
            bundle_present: false,
        })?;
        let fatal = |error: MatrixError| BuildFailure {
            error,
            bundle_present: false,
        };

        let stdout_log = self.build_dir.join("Build_StdOUT.log");
        write_text(&stdout_log, &output.stdout).map_err(|e| fatal(e.into()))?;
        println!("{}", t!("build.stdout_saved", path = stdout_log.display()).dimmed());

        let mut tolerated = false;
        if output.success() {
            self.runner
                .check_stderr("xcodebuild_build", &output, false)
                .map_err(fatal)?;
        } else {
            print_digest(&output.stdout);
            let log = self.runner.persist_stderr("xcodebuild_build", &output).map_err(fatal)?;
            let error = MatrixError::Tool {
                tool: "xcodebuild build".to_string(),
                message: build_failure_message(&output),
                log,
            };

            if self.bundle_is_fresh() {
                println!("{}", t!("build.tolerated", path = self.bundle.display()).yellow());
                log::warn!("tolerating failed build: {error}");
                tolerated = true;
            } else {
                return Err(BuildFailure {
                    error,
                    bundle_present: self.bundle.is_dir(),
                });
            }
        }

        if !self.bundle.is_dir() {
            return Err(fatal(MatrixError::MissingArtifact(self.bundle.clone())));
        }
        println!("{}", t!("build.done", path = self.bundle.display()).green());

        Ok(BuildOutcome {
            bundle: self.bundle.clone(),
            stdout_log,
            tolerated,
        })
    }

    /// `true` when a freshness window is set and the bundle was modified within it.
    pub fn bundle_is_fresh(&self) -> bool {
        let Some(window) = self.freshness else {
            return false;
        };
        fs::metadata(&self.bundle)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age <= window)
    }
}

fn build_failure_message(output: &CommandOutput) -> String {
    let errors = issues::count(&issues::parse_issues(&output.stdout), IssueKind::Error);
    let last = if output.stderr_is_empty() {
        tail(&output.stdout, 1)
    } else {
        tail(&output.stderr, 1)
    };
    format!("exit status {:?}, {errors} compiler error(s): {last}", output.status)
}

fn print_digest(stdout: &str) {
    let found = issues::parse_issues(stdout);
    if found.is_empty() {
        return;
    }
    println!(
        "{}",
        t!(
            "build.issues",
            errors = issues::count(&found, IssueKind::Error),
            warnings = issues::count(&found, IssueKind::Warning)
        )
        .red()
    );
    print!("{}", issues::render(&found, false));
}
