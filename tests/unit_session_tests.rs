//! # Device Session and Test Driver Unit Tests / 设备会话与测试驱动单元测试
//!
//! Runs the simctl and xcodebuild backends against a scripted executor, so
//! the exact commands and their tolerance rules can be checked without a
//! simulator.
//!
//! 在脚本化执行器上运行 simctl 和 xcodebuild 后端，无需模拟器即可检查命令及其容错规则。

mod common;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{FAIL_REPORT, PASS_REPORT, ScriptedExecutor, file_names, runner_with, timeout_error};
use tempfile::tempdir;
use ui_matrix_runner::cli::commands::uninstall::uninstall_everywhere;
use ui_matrix_runner::config::{DeviceId, LocaleId, RunConfig};
use ui_matrix_runner::core::driver::{TestDriver, XcodebuildTests};
use ui_matrix_runner::core::error::{MatrixError, MatrixResult};
use ui_matrix_runner::core::session::{DeviceControl, SessionController, Simctl};
use ui_matrix_runner::infra::command::{CommandExecutor, CommandLine, CommandOutput, CommandRunner};
use ui_matrix_runner::models::SessionState;

fn iphone() -> DeviceId {
    DeviceId::new("iPhone 11")
}

fn german() -> LocaleId {
    LocaleId::parse("de_DE").unwrap()
}

fn session_over(executor: Arc<ScriptedExecutor>, logs: &Path) -> (SessionController, Arc<CommandRunner>) {
    let runner = runner_with(executor, logs);
    let control: Arc<dyn DeviceControl> = Arc::new(Simctl::new(runner.clone(), Duration::from_secs(5)));
    (SessionController::new(iphone(), control, runner.clone()), runner)
}

fn config(project_root: &Path) -> RunConfig {
    RunConfig::new("MyApp", project_root.to_path_buf(), project_root.join("Screenshots"))
}

/// Acts like the process executor once Ctrl-C was pressed: ordinary commands
/// are interrupted, cleanup commands still run.
#[derive(Default)]
struct InterruptedExecutor {
    cleanup: Mutex<Vec<CommandLine>>,
}

#[async_trait]
impl CommandExecutor for InterruptedExecutor {
    async fn execute(&self, command: &CommandLine, _timeout: Duration) -> MatrixResult<CommandOutput> {
        Err(MatrixError::Aborted(format!("interrupted while running {command}")))
    }

    async fn execute_uncancelled(&self, command: &CommandLine, _timeout: Duration) -> MatrixResult<CommandOutput> {
        self.cleanup.lock().unwrap().push(command.clone());
        Ok(CommandOutput::new(0, "", ""))
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_install_resets_the_device_first() {
        let logs = tempdir().unwrap();
        let executor = ScriptedExecutor::succeeding();
        let (mut session, _) = session_over(executor.clone(), logs.path());

        session.install(Path::new("/build/MyApp.app"), &german()).await.unwrap();

        assert_eq!(executor.simctl_actions(), vec!["shutdown", "boot", "install"]);
        assert_eq!(session.state(), &SessionState::Installed(german()));
        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls[2].args, vec!["simctl", "install", "iPhone 11", "/build/MyApp.app"]);
    }

    #[tokio::test]
    async fn test_already_shut_down_counts_as_success() {
        let logs = tempdir().unwrap();
        let executor = ScriptedExecutor::new(|cmd| {
            if cmd.has_arg("shutdown") {
                Ok(CommandOutput::new(
                    149,
                    "",
                    "Unable to shutdown device in current state: Shutdown",
                ))
            } else {
                Ok(CommandOutput::new(0, "", ""))
            }
        });
        let (mut session, _) = session_over(executor, logs.path());

        session.shutdown().await.unwrap();
        assert_eq!(session.state(), &SessionState::Shutdown);
        assert!(file_names(logs.path()).is_empty());
    }

    #[tokio::test]
    async fn test_already_booted_counts_as_success() {
        let logs = tempdir().unwrap();
        let executor = ScriptedExecutor::new(|cmd| {
            if cmd.has_arg("boot") {
                Ok(CommandOutput::new(149, "", "Unable to boot device in current state: Booted"))
            } else {
                Ok(CommandOutput::new(0, "", ""))
            }
        });
        let (mut session, _) = session_over(executor, logs.path());

        session.boot().await.unwrap();
        assert_eq!(session.state(), &SessionState::Booted);
    }

    #[tokio::test]
    async fn test_install_stderr_is_fatal_and_persisted() {
        let logs = tempdir().unwrap();
        let executor = ScriptedExecutor::new(|cmd| {
            if cmd.has_arg("install") {
                Ok(CommandOutput::new(0, "", "An error was encountered processing the command"))
            } else {
                Ok(CommandOutput::new(0, "", ""))
            }
        });
        let (mut session, _) = session_over(executor, logs.path());

        let err = session.install(Path::new("/build/MyApp.app"), &german()).await.unwrap_err();
        let MatrixError::Tool { tool, log, .. } = err else {
            panic!("expected a tool error");
        };
        assert_eq!(tool, "simctl install");
        assert!(log.unwrap().exists());
        assert_eq!(session.state(), &SessionState::Unknown);
    }

    #[tokio::test]
    async fn test_boot_timeout_forces_a_shutdown() {
        let logs = tempdir().unwrap();
        let executor = ScriptedExecutor::new(|cmd| {
            if cmd.has_arg("boot") {
                Err(timeout_error(cmd))
            } else {
                Ok(CommandOutput::new(0, "", ""))
            }
        });
        let (mut session, _) = session_over(executor.clone(), logs.path());

        let err = session.boot().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(executor.simctl_actions(), vec!["boot", "shutdown"]);
        assert_eq!(session.state(), &SessionState::Shutdown);
    }

    #[tokio::test]
    async fn test_forced_shutdown_still_runs_after_an_interrupt() {
        let logs = tempdir().unwrap();
        let executor = Arc::new(InterruptedExecutor::default());
        let runner = Arc::new(CommandRunner::new(executor.clone(), logs.path()));
        let control: Arc<dyn DeviceControl> = Arc::new(Simctl::new(runner.clone(), Duration::from_secs(5)));
        let mut session = SessionController::new(iphone(), control, runner);

        assert!(matches!(session.boot().await, Err(MatrixError::Aborted(_))));
        session.force_shutdown().await;

        let cleanup = executor.cleanup.lock().unwrap();
        assert_eq!(cleanup.len(), 1);
        assert_eq!(cleanup[0].args, vec!["simctl", "shutdown", "iPhone 11"]);
        assert_eq!(session.state(), &SessionState::Shutdown);
    }

    #[tokio::test]
    async fn test_tests_need_an_installed_app() {
        let logs = tempdir().unwrap();
        let (mut session, _) = session_over(ScriptedExecutor::succeeding(), logs.path());

        let err = session.begin_tests().await.unwrap_err();
        assert!(matches!(err, MatrixError::Setup(_)));
    }

    #[tokio::test]
    async fn test_uninstall_continues_past_failing_devices() {
        let logs = tempdir().unwrap();
        let executor = ScriptedExecutor::new(|cmd| {
            if cmd.has_arg("uninstall") && cmd.has_arg("iPhone 8") {
                Ok(CommandOutput::new(1, "", "No devices are booted."))
            } else {
                Ok(CommandOutput::new(0, "", ""))
            }
        });
        let runner = runner_with(executor.clone(), logs.path());
        let control: Arc<dyn DeviceControl> = Arc::new(Simctl::new(runner.clone(), Duration::from_secs(5)));
        let devices = vec![DeviceId::new("iPhone 8"), DeviceId::new("iPad Air 2")];

        let failed = uninstall_everywhere("com.example.MyApp", &devices, control, runner).await;

        assert_eq!(failed, 1);
        assert_eq!(
            executor.simctl_actions(),
            vec!["boot", "uninstall", "shutdown", "boot", "uninstall", "shutdown"]
        );
    }
}

#[cfg(test)]
mod driver_tests {
    use super::*;

    #[test]
    fn test_region_locale_sets_language_and_region() {
        let root = tempdir().unwrap();
        let tests = XcodebuildTests::new(Arc::new(CommandRunner::new(ScriptedExecutor::succeeding(), root.path())), &config(root.path()));

        let cmd = tests.command_line(&iphone(), &german(), Path::new("/tmp/out"));
        assert_eq!(cmd.program, "xcodebuild");
        assert_eq!(cmd.args[0], "test");
        assert_eq!(cmd.value_of("-target"), Some("MyAppTests"));
        assert_eq!(cmd.value_of("-scheme"), Some("MyApp"));
        assert_eq!(cmd.value_of("-derivedDataPath"), Some("/tmp/out"));
        assert_eq!(
            cmd.value_of("-destination"),
            Some("platform=iOS Simulator,OS=latest,name=iPhone 11")
        );
        assert_eq!(cmd.value_of("-testLanguage"), Some("de"));
        assert_eq!(cmd.value_of("-testRegion"), Some("DE"));
        assert_eq!(cmd.cwd.as_deref(), Some(root.path()));
    }

    #[test]
    fn test_script_locale_is_passed_whole() {
        let root = tempdir().unwrap();
        let tests = XcodebuildTests::new(Arc::new(CommandRunner::new(ScriptedExecutor::succeeding(), root.path())), &config(root.path()));

        let cmd = tests.command_line(&iphone(), &LocaleId::parse("zh-Hans").unwrap(), Path::new("/tmp/out"));
        assert_eq!(cmd.value_of("-testLanguage"), Some("zh-Hans"));
        assert!(!cmd.has_arg("-testRegion"));
    }

    async fn run_once(
        report: &'static str,
        stderr: &'static str,
        out: &Path,
    ) -> (ui_matrix_runner::core::error::MatrixResult<ui_matrix_runner::models::RunResult>, SessionController) {
        let executor = ScriptedExecutor::new(move |cmd| {
            if cmd.program == "xcodebuild" {
                Ok(CommandOutput::new(0, report, stderr))
            } else {
                Ok(CommandOutput::new(0, "", ""))
            }
        });
        let (mut session, runner) = session_over(executor, out);
        session.install(Path::new("/build/MyApp.app"), &german()).await.unwrap();

        let driver = TestDriver::new(Arc::new(XcodebuildTests::new(runner, &config(out))), out);
        let result = driver.run_tests(&mut session, &german()).await;
        (result, session)
    }

    #[tokio::test]
    async fn test_passing_run_saves_stdout() {
        let out = tempdir().unwrap();
        let (result, session) = run_once(PASS_REPORT, "", out.path()).await;
        let run = result.unwrap();

        assert!(run.passed());
        assert_eq!(run.summary.as_ref().unwrap().executed, 3);
        assert_eq!(run.stdout_log, Some(out.path().join("UITest_StdOUT__iPhone_11_de_DE")));
        assert_eq!(std::fs::read_to_string(run.stdout_log.unwrap()).unwrap(), PASS_REPORT);
        assert!(run.stderr_log.is_none());
        assert_eq!(session.state(), &SessionState::TestsComplete);
    }

    #[tokio::test]
    async fn test_failing_run_also_saves_stderr() {
        let out = tempdir().unwrap();
        let (result, _) = run_once(FAIL_REPORT, "Testing failed:\n\tassertion failed\n", out.path()).await;
        let run = result.unwrap();

        assert!(!run.passed());
        let stderr_log: PathBuf = run.stderr_log.unwrap();
        assert_eq!(stderr_log, out.path().join("UITest_StdERR__iPhone_11_de_DE"));
        assert!(stderr_log.is_file());
    }

    #[tokio::test]
    async fn test_timed_out_run_shuts_the_device_down() {
        let out = tempdir().unwrap();
        let executor = ScriptedExecutor::new(|cmd| {
            if cmd.program == "xcodebuild" {
                Err(timeout_error(cmd))
            } else {
                Ok(CommandOutput::new(0, "", ""))
            }
        });
        let (mut session, runner) = session_over(executor.clone(), out.path());
        session.install(Path::new("/build/MyApp.app"), &german()).await.unwrap();
        let driver = TestDriver::new(Arc::new(XcodebuildTests::new(runner, &config(out.path()))), out.path());

        let err = driver.run_tests(&mut session, &german()).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(executor.simctl_actions().last().map(String::as_str), Some("shutdown"));
        assert_eq!(session.state(), &SessionState::Shutdown);
    }
}
