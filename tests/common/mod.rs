// Shared test helpers for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ui_matrix_runner::core::error::{MatrixError, MatrixResult};
use ui_matrix_runner::infra::command::{CommandExecutor, CommandLine, CommandOutput, CommandRunner};
use ui_matrix_runner::infra::prompt::Operator;

/// A test-runner stdout that parses as a clean pass.
pub const PASS_REPORT: &str = "Test Suite 'All tests' started at 2017-02-18 18:12:33.101\n\
Test Suite 'All tests' passed at 2017-02-18 18:12:45.605.\n\
\t Executed 3 tests, with 0 failures (0 unexpected) in 12.504 (12.507) seconds\n";

/// A test-runner stdout with one failing test.
pub const FAIL_REPORT: &str = "Test Suite 'All tests' started at 2017-02-18 18:12:33.101\n\
Test Suite 'All tests' failed at 2017-02-18 18:12:45.605.\n\
\t Executed 3 tests, with 1 failure (0 unexpected) in 12.504 (12.507) seconds\n";

type Script = dyn Fn(&CommandLine) -> MatrixResult<CommandOutput> + Send + Sync;

/// Answers every command through a closure and remembers what was asked.
pub struct ScriptedExecutor {
    script: Box<Script>,
    pub calls: Mutex<Vec<CommandLine>>,
}

impl ScriptedExecutor {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&CommandLine) -> MatrixResult<CommandOutput> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every command succeeds with empty output.
    pub fn succeeding() -> Arc<Self> {
        Self::new(|_| Ok(CommandOutput::new(0, "", "")))
    }

    /// The recorded commands, rendered as shell lines.
    pub fn lines(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.to_string()).collect()
    }

    /// The simctl actions issued so far (`boot`, `shutdown`, ...), in order.
    pub fn simctl_actions(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program == "xcrun")
            .filter_map(|c| c.args.get(1).cloned())
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, command: &CommandLine, _timeout: Duration) -> MatrixResult<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());
        (self.script)(command)
    }
}

/// A runner over `executor` that persists error logs into `log_dir`.
pub fn runner_with(executor: Arc<ScriptedExecutor>, log_dir: &Path) -> Arc<CommandRunner> {
    Arc::new(CommandRunner::new(executor, log_dir))
}

/// Gives the same answer to every question and remembers the questions.
pub struct ScriptedOperator {
    answer: bool,
    pub questions: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    pub fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            questions: Mutex::new(Vec::new()),
        })
    }

    pub fn asked(&self) -> usize {
        self.questions.lock().unwrap().len()
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&self, question: &str) -> MatrixResult<bool> {
        self.questions.lock().unwrap().push(question.to_string());
        Ok(self.answer)
    }
}

/// A timeout error as the process executor reports it.
pub fn timeout_error(command: &CommandLine) -> MatrixError {
    MatrixError::Timeout {
        command: command.to_string(),
        secs: 1,
    }
}

/// Writes PNG placeholders named `names` into `dir`.
pub fn write_pngs(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), b"\x89PNG").unwrap();
    }
}

/// Sorted file names inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
