//! # Init Command Module / 初始化命令模块
//!
//! Implements `init`: writes a commented `UiMatrix.toml` and a sample
//! device/language file into a directory.
//!
//! 实现 `init` 命令：在目录中写入带注释的 `UiMatrix.toml` 和示例设备/语言文件。

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

use crate::cli::commands::run::DEFAULT_SETTINGS_FILE;
use crate::infra::t;

/// File name of the sample device/language list.
pub const SAMPLE_MATRIX_FILE: &str = "langDevices.txt";

const DEFAULT_SETTINGS: &str = r#"# ui-matrix-runner settings / 设置
# Command-line flags take precedence over this file.
# 命令行参数优先于此文件。

# Language of the runner's own messages: "en" or "zh-CN" / 运行器消息语言
language = "en"

# What to do when a (device, locale) combination fails: "abort", "skip" or "prompt"
# 组合失败时的处理策略
failure_policy = "abort"

# What to do when an archive directory already has content: "abort", "overwrite" or "prompt"
# 归档目录已有内容时的处理策略
collision_policy = "abort"

# Simulator runtime used in the test destination / 测试目标使用的模拟器运行时
os_version = "latest"

# Directory the UI tests write their PNG captures into / UI 测试写入截图的目录
# screenshots_dir = "~/Temp/Screenshots"

# Where stderr of failed tool calls is saved / 失败工具调用的 stderr 保存位置
# error_log_dir = "~/UITestAutomation_ErrorLogs"

# Remove stale PNGs from screenshots_dir before every test run
# 每次测试运行前删除 screenshots_dir 中的旧截图
clear_screenshots_before_run = true

# Accept a failed build if the app bundle was written within this many seconds.
# Off unless set. / 若应用包在此秒数内写入，则接受失败的构建。默认关闭。
# build_freshness_secs = 60

[timeouts]
device_secs = 120
build_secs = 1800
test_secs = 1800
rotate_secs = 30
"#;

const SAMPLE_MATRIX: &str = r#"# Devices and languages to test. One entry per line.
# dev:<simulator name>   lang:<language>_<REGION> or <language>-<Script>
dev:iPhone 11
dev:iPad Air 2
lang:en_US
lang:de_DE
"#;

/// Writes both files into `dir`. Existing files are kept unless `force` is set.
pub fn execute(dir: &Path, force: bool) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| t!("init.create_dir_failed", path = dir.display()))?;

    let mut written = 0;
    for (name, content) in [(DEFAULT_SETTINGS_FILE, DEFAULT_SETTINGS), (SAMPLE_MATRIX_FILE, SAMPLE_MATRIX)] {
        let path = dir.join(name);
        if path.exists() && !force {
            println!("{}", t!("init.file_exists", path = path.display()).yellow());
            continue;
        }
        fs::write(&path, content).with_context(|| t!("init.write_failed", path = path.display()))?;
        println!("{}", t!("init.success", path = path.display()).green());
        written += 1;
    }

    if written == 0 {
        println!("{}", t!("init.use_force").yellow());
    } else {
        println!("{}", t!("init.next_steps"));
    }
    Ok(())
}
