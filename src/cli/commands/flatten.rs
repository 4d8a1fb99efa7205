//! # Flatten Command Module / 扁平化命令模块
//!
//! Implements `flatten`: gathers an archive tree into one directory so the
//! screenshots of all devices and languages can be reviewed side by side.
//!
//! 实现 `flatten` 命令：将归档树汇集到一个目录中，便于并排查看所有设备和语言的截图。

use anyhow::{Context, Result};
use colored::*;
use std::path::{Path, PathBuf};

use crate::infra::fs::{absolute_path, count_entries, flatten_tree, resolve_path};
use crate::infra::t;

/// Default target: `<root>_flat` next to the archive root.
pub fn default_output(root: &Path) -> PathBuf {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    root.with_file_name(format!("{name}_flat"))
}

pub fn execute(root: &Path, output: Option<&Path>) -> Result<()> {
    let root = absolute_path(root)?;
    let target = match output {
        Some(path) => resolve_path(path)?,
        None => default_output(&root),
    };
    if target.starts_with(&root) {
        anyhow::bail!("{}", t!("flatten.inside_root", path = target.display()));
    }
    if count_entries(&target)? > 0 {
        anyhow::bail!("{}", t!("flatten.target_not_empty", path = target.display()));
    }

    let copied = flatten_tree(&root, &target)
        .with_context(|| t!("flatten.failed", path = root.display()))?;
    println!(
        "{}",
        t!("flatten.done", count = copied, path = target.display()).green()
    );
    Ok(())
}
