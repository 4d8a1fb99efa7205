//! # Configuration Module / 配置模块
//!
//! Parses the line-oriented device/language file into a [`TestMatrix`], loads the
//! optional `UiMatrix.toml` settings file, and holds [`RunConfig`], the single
//! configuration object built at startup and handed to every component.
//!
//! 解析面向行的设备/语言文件为 [`TestMatrix`]，加载可选的 `UiMatrix.toml`
//! 设置文件，并持有 [`RunConfig`]：启动时构建一次并传递给每个组件的配置对象。

use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{MatrixError, MatrixResult};

/// Two lowercase letters, `_` or `-`, then a region or script designator.
static LOCALE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}[_-][A-Za-z]+$").expect("locale pattern is valid"));

const FIELD_SEPARATOR: char = ':';
const DEVICE_KEY: &str = "dev";
const LANGUAGE_KEY: &str = "lang";

/// An opaque simulated-device profile name, e.g. `iPad Air 2`.
/// 不透明的模拟设备名称。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated locale identifier (`en_US`, `zh-Hans`).
/// 经过验证的语言区域标识符。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocaleId(String);

impl LocaleId {
    /// Validates `raw` against the accepted locale shapes.
    pub fn parse(raw: &str) -> MatrixResult<Self> {
        if LOCALE_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(MatrixError::InvalidLocale(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two-letter language part.
    pub fn language(&self) -> &str {
        &self.0[..2]
    }

    /// The region for `<lang>_<REGION>` identifiers; `None` for script identifiers.
    pub fn region(&self) -> Option<&str> {
        self.0.split_once('_').map(|(_, region)| region)
    }
}

impl fmt::Display for LocaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LocaleId {
    type Error = MatrixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LocaleId::parse(&value)
    }
}

impl From<LocaleId> for String {
    fn from(value: LocaleId) -> Self {
        value.0
    }
}

/// The ordered, duplicate-free device and locale sets to cross.
/// 要交叉组合的有序、无重复的设备和语言集合。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestMatrix {
    pub devices: Vec<DeviceId>,
    pub locales: Vec<LocaleId>,
}

impl TestMatrix {
    /// Number of (device, locale) combinations.
    pub fn len(&self) -> usize {
        self.devices.len() * self.locales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses the `dev:<value>` / `lang:<value>` format.
///
/// Blank lines and lines starting with `#` are ignored. Any other line must
/// split into exactly two fields with a known key; a value repeated within its
/// category is rejected. `path` is only used for error messages.
///
/// 解析 `dev:<value>` / `lang:<value>` 格式。空行和以 `#` 开头的行被忽略。
pub fn parse_matrix(content: &str, path: &Path) -> MatrixResult<TestMatrix> {
    let mut matrix = TestMatrix::default();
    let config_error = |line: usize, message: String| MatrixError::Config {
        path: path.to_path_buf(),
        line,
        message,
    };

    for (index, raw_line) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() != 2 {
            return Err(config_error(
                line_no,
                format!(
                    "expected exactly 2 fields separated by '{FIELD_SEPARATOR}', found {}",
                    fields.len()
                ),
            ));
        }

        let (key, value) = (fields[0], fields[1]);
        if key != key.trim() || value != value.trim() {
            return Err(config_error(
                line_no,
                format!("whitespace around '{FIELD_SEPARATOR}' is not permitted in '{line}'"),
            ));
        }
        if value.is_empty() {
            return Err(config_error(line_no, format!("empty value for key '{key}'")));
        }

        match key {
            DEVICE_KEY => {
                let device = DeviceId::new(value);
                if matrix.devices.contains(&device) {
                    return Err(config_error(
                        line_no,
                        format!("device '{value}' is listed again; duplicates are not permitted"),
                    ));
                }
                matrix.devices.push(device);
            }
            LANGUAGE_KEY => {
                let locale = LocaleId::parse(value)
                    .map_err(|e| config_error(line_no, e.to_string()))?;
                if matrix.locales.contains(&locale) {
                    return Err(config_error(
                        line_no,
                        format!("language '{value}' is listed again; duplicates are not permitted"),
                    ));
                }
                matrix.locales.push(locale);
            }
            other => {
                return Err(config_error(
                    line_no,
                    format!("unknown key '{other}', expected '{DEVICE_KEY}' or '{LANGUAGE_KEY}'"),
                ));
            }
        }
    }

    Ok(matrix)
}

/// Reads and parses a device/language file from disk.
/// 从磁盘读取并解析设备/语言文件。
pub fn load_test_matrix(path: &Path) -> MatrixResult<TestMatrix> {
    let content = fs::read_to_string(path).map_err(|e| {
        MatrixError::Setup(format!("could not read '{}': {e}", path.display()))
    })?;
    parse_matrix(&content, path)
}

/// What to do when a (device, locale) combination fails.
/// 当某个 (设备, 语言) 组合失败时的处理策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run at the first failure.
    #[default]
    #[value(name = "abort")]
    #[serde(rename = "abort")]
    AbortOnFailure,
    /// Record the failure and move on to the next combination.
    #[value(name = "skip")]
    #[serde(rename = "skip")]
    SkipAndContinue,
    /// Ask the operator whether to continue.
    #[value(name = "prompt")]
    #[serde(rename = "prompt")]
    PromptOperator,
}

/// What to do when an archive directory already holds files.
/// 当归档目录已包含文件时的处理策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Refuse and leave the existing artifacts alone.
    #[default]
    Abort,
    /// Clear the directory and reuse it.
    Overwrite,
    /// Ask the operator before clearing.
    Prompt,
}

/// Bounded waits per tool category, in seconds.
/// 每类工具的超时上限（秒）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub device_secs: u64,
    pub build_secs: u64,
    pub test_secs: u64,
    pub rotate_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            device_secs: 120,
            build_secs: 1800,
            test_secs: 1800,
            rotate_secs: 30,
        }
    }
}

impl Timeouts {
    pub fn device(&self) -> Duration {
        Duration::from_secs(self.device_secs)
    }

    pub fn build(&self) -> Duration {
        Duration::from_secs(self.build_secs)
    }

    pub fn test(&self) -> Duration {
        Duration::from_secs(self.test_secs)
    }

    pub fn rotate(&self) -> Duration {
        Duration::from_secs(self.rotate_secs)
    }
}

/// Optional settings file (`UiMatrix.toml`). Command-line flags win over it.
///
/// 可选的设置文件（`UiMatrix.toml`）。命令行参数优先于它。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Language for the runner's own messages (`en`, `zh-CN`).
    pub language: String,
    pub failure_policy: FailurePolicy,
    pub collision_policy: CollisionPolicy,
    /// Simulator runtime used in the test destination, e.g. `17.5` or `latest`.
    pub os_version: String,
    pub timeouts: Timeouts,
    /// Tolerate a failed build whose bundle was written within this many seconds.
    /// Unset by default.
    pub build_freshness_secs: Option<u64>,
    /// Directory the UI tests write their PNG captures into.
    pub screenshots_dir: Option<String>,
    pub error_log_dir: Option<String>,
    /// Remove stale PNGs from `screenshots_dir` before every test run.
    pub clear_screenshots_before_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            failure_policy: FailurePolicy::default(),
            collision_policy: CollisionPolicy::default(),
            os_version: "latest".to_string(),
            timeouts: Timeouts::default(),
            build_freshness_secs: None,
            screenshots_dir: None,
            error_log_dir: None,
            clear_screenshots_before_run: true,
        }
    }
}

/// Loads a settings file. A missing file is an error; callers decide whether
/// the file is optional.
pub fn load_settings(path: &Path) -> MatrixResult<Settings> {
    let content = fs::read_to_string(path).map_err(|e| {
        MatrixError::Setup(format!("could not read settings '{}': {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|e| {
        MatrixError::Setup(format!("could not parse settings '{}': {e}", path.display()))
    })
}

/// Root under which build and test output lands when `--build-dir` is not given.
pub const DEFAULT_BUILD_ROOT: &str = "/tmp/UITestAutomationOutput";

/// `/tmp/UITestAutomationOutput/<app>`.
pub fn default_build_dir(app_name: &str) -> PathBuf {
    Path::new(DEFAULT_BUILD_ROOT).join(app_name)
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~/Desktop/TestAuto_screenshots`.
pub fn default_archive_root() -> PathBuf {
    home_dir().join("Desktop").join("TestAuto_screenshots")
}

/// `~/UITestAutomation_ErrorLogs`.
pub fn default_error_log_dir() -> PathBuf {
    home_dir().join("UITestAutomation_ErrorLogs")
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_path(raw: &str) -> MatrixResult<PathBuf> {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| MatrixError::Setup(format!("could not expand path '{raw}': {e}")))
}

/// The resolved configuration of one orchestration run.
///
/// Built once by the `run` command from flags and settings, then passed by
/// reference into every component.
///
/// 一次编排运行的最终配置。由 `run` 命令根据参数和设置构建一次，然后以引用方式传递给每个组件。
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub app_name: String,
    pub project_root: PathBuf,
    pub build_dir: PathBuf,
    pub archive_root: PathBuf,
    pub screenshots_dir: PathBuf,
    pub scheme_file: Option<PathBuf>,
    pub clean: bool,
    pub failure_policy: FailurePolicy,
    pub collision_policy: CollisionPolicy,
    pub os_version: String,
    pub timeouts: Timeouts,
    pub build_freshness: Option<Duration>,
    pub error_log_dir: PathBuf,
    pub clear_screenshots_before_run: bool,
    pub journal: Option<PathBuf>,
}

impl RunConfig {
    /// A configuration with the documented defaults for everything but the
    /// app name and the locations that have no sensible default.
    pub fn new(app_name: impl Into<String>, project_root: PathBuf, screenshots_dir: PathBuf) -> Self {
        let app_name = app_name.into();
        Self {
            build_dir: default_build_dir(&app_name),
            app_name,
            project_root,
            archive_root: default_archive_root(),
            screenshots_dir,
            scheme_file: None,
            clean: false,
            failure_policy: FailurePolicy::default(),
            collision_policy: CollisionPolicy::default(),
            os_version: "latest".to_string(),
            timeouts: Timeouts::default(),
            build_freshness: None,
            error_log_dir: default_error_log_dir(),
            clear_screenshots_before_run: true,
            journal: None,
        }
    }

    /// `<build_dir>/<app>.app`, the bundle the build must produce.
    pub fn bundle_path(&self) -> PathBuf {
        self.build_dir.join(format!("{}.app", self.app_name))
    }

    /// The UI test target, `<app>Tests`.
    pub fn test_target(&self) -> String {
        format!("{}Tests", self.app_name)
    }
}
