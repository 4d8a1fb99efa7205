//! # Artifact Archiver Module / 产物归档模块
//!
//! Copies the PNG captures of one (device, locale) combination into the
//! archive tree `<root>/<device>/<locale>`, rotating landscape captures on the
//! way. Existing archive content is never overwritten silently; the
//! [`CollisionPolicy`] decides.
//!
//! 将一个 (设备, 语言) 组合的 PNG 截图复制到归档树 `<root>/<device>/<locale>`，
//! 并在复制前旋转横屏截图。已有归档内容绝不会被静默覆盖。

use async_trait::async_trait;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{CollisionPolicy, DeviceId, LocaleId};
use crate::core::error::{MatrixError, MatrixResult};
use crate::core::models::ArchiveReport;
use crate::infra::command::{CommandLine, CommandRunner};
use crate::infra::fs::{copy_into, count_entries, files_with_extension, recreate_dir, sample_entries, sanitize_path};
use crate::infra::prompt::Operator;
use crate::infra::t;

/// File-name marker of captures taken in landscape orientation.
const LANDSCAPE_MARKER: &str = "landscape";
/// Tool name reported for copy and listing failures while archiving.
const ARCHIVE_TOOL: &str = "archive";

/// Rotates an image file in place.
#[async_trait]
pub trait ImageRotator: Send + Sync {
    async fn rotate(&self, image: &Path) -> MatrixResult<()>;
}

/// `sips -r -90 <file>` backend.
pub struct Sips {
    runner: Arc<CommandRunner>,
    timeout: Duration,
}

impl Sips {
    pub fn new(runner: Arc<CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }
}

#[async_trait]
impl ImageRotator for Sips {
    async fn rotate(&self, image: &Path) -> MatrixResult<()> {
        let cmd = CommandLine::new("sips")
            .args(["-r", "-90"])
            .arg(image.to_string_lossy());
        let output = self.runner.run(&cmd, self.timeout).await?;
        if output.success() {
            return Ok(());
        }
        let log = self.runner.persist_stderr("sips", &output)?;
        Err(MatrixError::Tool {
            tool: "sips".to_string(),
            message: format!("could not rotate '{}' (exit status {:?})", image.display(), output.status),
            log,
        })
    }
}

/// Moves captures from the test output into the archive tree.
///
/// 将截图从测试输出移动到归档树。
pub struct Archiver {
    rotator: Arc<dyn ImageRotator>,
    operator: Arc<dyn Operator>,
    collision: CollisionPolicy,
}

impl Archiver {
    pub fn new(rotator: Arc<dyn ImageRotator>, operator: Arc<dyn Operator>, collision: CollisionPolicy) -> Self {
        Self {
            rotator,
            operator,
            collision,
        }
    }

    /// `<root>/<sanitized device>/<sanitized locale>`.
    pub fn target_dir(root: &Path, device: &DeviceId, locale: &LocaleId) -> PathBuf {
        root.join(sanitize_path(device.as_str()))
            .join(sanitize_path(locale.as_str()))
    }

    /// Makes sure `dir` exists and is empty, applying the collision policy
    /// when it already holds entries.
    ///
    /// 确保 `dir` 存在且为空；若已有内容则应用冲突策略。
    pub fn prepare_dir(&self, dir: &Path, purpose: &str) -> MatrixResult<()> {
        resolve_collision(dir, purpose, self.collision, self.operator.as_ref())
    }

    /// Archives every PNG in `source` for one combination.
    ///
    /// Files whose name contains `landscape` are rotated exactly once, in the
    /// source directory, before they are copied. A missing `source` directory
    /// archives nothing.
    ///
    /// 归档 `source` 中的每个 PNG。文件名包含 `landscape` 的文件在复制前恰好旋转一次。
    pub async fn archive(
        &self,
        source: &Path,
        device: &DeviceId,
        locale: &LocaleId,
        root: &Path,
    ) -> MatrixResult<ArchiveReport> {
        let target = Self::target_dir(root, device, locale);
        self.prepare_dir(&target, "screenshot archive")?;

        if !source.is_dir() {
            println!("{}", t!("archive.no_source", path = source.display()).yellow());
            return Ok(ArchiveReport {
                target,
                copied: 0,
                rotated: 0,
            });
        }

        let mut copied = 0;
        let mut rotated = 0;
        let images = files_with_extension(source, "png")
            .map_err(|e| MatrixError::tool(ARCHIVE_TOOL, format!("cannot list '{}': {e}", source.display())))?;
        for image in images {
            let is_landscape = image
                .file_name()
                .is_some_and(|name| name.to_string_lossy().contains(LANDSCAPE_MARKER));
            if is_landscape {
                log::debug!("rotating {}", image.display());
                self.rotator.rotate(&image).await?;
                rotated += 1;
            }
            copy_into(&image, &target).map_err(|e| MatrixError::tool(ARCHIVE_TOOL, format!("{e:#}")))?;
            copied += 1;
        }

        println!(
            "{}",
            t!(
                "archive.done",
                copied = copied,
                rotated = rotated,
                path = target.display()
            )
            .green()
        );
        Ok(ArchiveReport {
            target,
            copied,
            rotated,
        })
    }
}

/// Applies `policy` to `dir`.
///
/// - missing or empty: created, nothing else happens
/// - `Abort`: [`MatrixError::ArchiveCollision`], `dir` left untouched
/// - `Overwrite`: emptied and reused
/// - `Prompt`: emptied after the operator agrees, otherwise a collision error
pub fn resolve_collision(
    dir: &Path,
    purpose: &str,
    policy: CollisionPolicy,
    operator: &dyn Operator,
) -> MatrixResult<()> {
    let entries = count_entries(dir)?;
    if entries == 0 {
        fs::create_dir_all(dir)?;
        return Ok(());
    }

    let collision = || MatrixError::ArchiveCollision {
        path: dir.to_path_buf(),
        entries,
    };

    match policy {
        CollisionPolicy::Abort => Err(collision()),
        CollisionPolicy::Overwrite => {
            log::info!("clearing {} ({entries} entries)", dir.display());
            recreate_dir(dir)?;
            Ok(())
        }
        CollisionPolicy::Prompt => {
            let sample = sample_entries(dir, 5).join(", ");
            let question = t!(
                "archive.confirm_clear",
                purpose = purpose,
                path = dir.display(),
                count = entries,
                sample = sample
            );
            if operator.confirm(&question)? {
                recreate_dir(dir)?;
                Ok(())
            } else {
                Err(collision())
            }
        }
    }
}
