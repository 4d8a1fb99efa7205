//! # Run Journal Module / 运行日志模块
//!
//! A JSON record of the run with one entry per (device, locale) combination.
//! It is rewritten after every combination, so the file on disk always shows
//! which pairs passed, failed or were skipped so far.
//!
//! 运行的 JSON 记录，每个 (设备, 语言) 组合一个条目。每个组合结束后都会重写。

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::models::{ComboResult, Tally};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub app: String,
    pub written_at: String,
    pub tally: Tally,
    pub results: Vec<ComboResult>,
}

/// Writes the journal to `path` atomically (temp file, then rename).
pub fn write_journal(path: &Path, app: &str, results: &[ComboResult]) -> Result<()> {
    let journal = Journal {
        app: app.to_string(),
        written_at: Local::now().to_rfc3339(),
        tally: Tally::of(results),
        results: results.to_vec(),
    };
    let json = serde_json::to_string_pretty(&journal).context("Failed to serialize run journal")?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("Failed to create '{}'", dir.display()))?;
    let staged = tempfile::NamedTempFile::new_in(dir)?;
    fs::write(staged.path(), json)?;
    staged
        .persist(path)
        .with_context(|| format!("Failed to write journal '{}'", path.display()))?;
    Ok(())
}

pub fn read_journal(path: &Path) -> Result<Journal> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse '{}'", path.display()))
}
