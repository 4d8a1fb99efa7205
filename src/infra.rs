//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for the runner: command
//! execution, file system helpers, operator prompts, and i18n support.
//!
//! 此模块为运行器提供基础设施服务：命令执行、文件系统辅助、操作员提示和国际化支持。

pub mod command;
pub mod fs;
pub mod prompt;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
