//! # UI Matrix Runner Library / UI Matrix Runner 库
//!
//! Runs a mobile app's UI test suite across a matrix of simulated devices and
//! locales and archives the screenshots of every combination.
//!
//! 在模拟设备和语言的矩阵上运行移动应用的 UI 测试套件，并归档每个组合的截图。
//!
//! ## Modules / 模块
//!
//! - `core` - Matrix parsing, device sessions, test driver, archiver and orchestrator
//! - `infra` - Command execution, file system helpers and operator prompts
//! - `reporting` - Console summary, HTML report and run journal
//! - `cli` - Command-line interface and subcommands
//!
//! - `core` - 矩阵解析、设备会话、测试驱动、归档器和编排器
//! - `infra` - 命令执行、文件系统辅助函数和操作员提示
//! - `reporting` - 控制台摘要、HTML 报告和运行日志
//! - `cli` - 命令行接口和子命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::models;
pub use core::orchestrator;

/// Sets the UI language from the system locale.
///
/// Tries the full locale (e.g. "zh-CN"), then the language part (e.g. "en"),
/// then falls back to "en".
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    let available_locales = rust_i18n::available_locales!();

    let lang = if available_locales.contains(&locale.as_str()) {
        &locale
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
    };

    rust_i18n::set_locale(lang);
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
