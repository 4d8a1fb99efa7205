//! # Issues Command Module / 编译问题命令模块
//!
//! Implements `issues`: prints the compiler errors (and optionally warnings)
//! found in a saved build log.
//!
//! 实现 `issues` 命令：打印已保存构建日志中的编译错误（以及可选的警告）。

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

use crate::core::issues::{IssueKind, count, parse_issues, render};
use crate::infra::t;

pub fn execute(log: &Path, warnings: bool) -> Result<()> {
    let content = fs::read_to_string(log)
        .with_context(|| t!("issues.read_failed", path = log.display()))?;
    let issues = parse_issues(&content);

    print!("{}", render(&issues, warnings));
    println!(
        "{}",
        t!(
            "build.issues",
            errors = count(&issues, IssueKind::Error),
            warnings = count(&issues, IssueKind::Warning)
        )
        .bold()
    );
    Ok(())
}
