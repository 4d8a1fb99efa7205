//! # File System Operations Module / 文件系统操作模块
//!
//! Small file system helpers shared by the archiver, the driver and the
//! `flatten` command: path sanitizing, directory inspection and copying.
//!
//! 归档器、驱动和 `flatten` 命令共享的文件系统辅助函数：路径清理、目录检查和复制。

use anyhow::{Context, Result};
use fs_extra::file::{copy as copy_file_with, CopyOptions};
use std::fs;
use std::path::{Path, PathBuf};

/// Replaces parentheses and spaces with underscores, one for one.
///
/// Device names such as `iPad Air (2)` break later path and shell handling.
/// The function is idempotent.
///
/// 将括号和空格逐一替换为下划线。此函数是幂等的。
pub fn sanitize_path(raw: &str) -> String {
    raw.chars()
        .map(|c| if matches!(c, '(' | ')' | ' ') { '_' } else { c })
        .collect()
}

/// Number of entries directly inside `dir`; `0` if it does not exist.
pub fn count_entries(dir: &Path) -> std::io::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    Ok(fs::read_dir(dir)?.count())
}

/// Up to `limit` entry names of `dir`, sorted, for operator-facing messages.
pub fn sample_entries(dir: &Path, limit: usize) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names.truncate(limit);
    names
}

/// Removes `dir` with everything inside it and recreates it empty.
pub fn recreate_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Files in `dir` (not recursive) whose extension is `ext`, case-insensitive,
/// sorted by file name.
///
/// 返回 `dir` 中扩展名为 `ext` 的文件（不递归），按文件名排序。
pub fn files_with_extension(dir: &Path, ext: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Copies `file` into `target_dir`, keeping its file name and overwriting an
/// existing copy. Returns the destination path.
pub fn copy_into(file: &Path, target_dir: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .with_context(|| format!("'{}' has no file name", file.display()))?;
    let destination = target_dir.join(name);
    let mut options = CopyOptions::new();
    options.overwrite = true;
    copy_file_with(file, &destination, &options).with_context(|| {
        format!("Failed to copy '{}' to '{}'", file.display(), destination.display())
    })?;
    Ok(destination)
}

/// Writes `text` to `path`, creating parent directories as needed.
pub fn write_text(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}

/// Copies every file below `root` into `target` as `<subdir>__<file name>`,
/// where `<subdir>` is the file's directory relative to `root` with separators
/// turned into `_` (`iPad_Air_2/de_DE/home.png` becomes `iPad_Air_2_de_DE__home.png`).
///
/// Used to gather an archive tree into one directory for side-by-side review.
/// Returns the number of files copied.
///
/// 将 `root` 下的所有文件以 `<子目录>__<文件名>` 的形式复制到 `target`。
pub fn flatten_tree(root: &Path, target: &Path) -> Result<usize> {
    fs::create_dir_all(target)
        .with_context(|| format!("Failed to create '{}'", target.display()))?;
    let mut copied = 0;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to read '{}'", dir.display()))?;
        let prefix = dir
            .strip_prefix(root)
            .unwrap_or(&dir)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("_");

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let flat_name = if prefix.is_empty() {
                file_name
            } else {
                format!("{prefix}__{file_name}")
            };
            let destination = target.join(flat_name);
            fs::copy(&path, &destination).with_context(|| {
                format!("Failed to copy '{}' to '{}'", path.display(), destination.display())
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Resolves a path to its absolute, canonical form.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("Failed to resolve path: {}", path.display()))
}

/// Resolves `path` against the working directory, canonicalizing the part
/// that already exists. Unlike [`absolute_path`] the path itself need not exist.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve path: {}", path.display()))?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
    let mut resolved = absolute_path(existing)?;
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}
