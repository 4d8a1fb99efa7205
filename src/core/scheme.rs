//! # Scheme Locale Module / Scheme 语言注入模块
//!
//! The UI tests read their target language from the `TARGET_LANG` environment
//! variable declared in the Xcode scheme. [`SchemeEditor`] rewrites that value
//! before each test run and puts the original file back when the run ends.
//!
//! UI 测试从 Xcode scheme 中声明的 `TARGET_LANG` 环境变量读取目标语言。
//! [`SchemeEditor`] 在每次测试运行前重写该值，并在运行结束时恢复原始文件。

use colored::*;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::LocaleId;
use crate::core::error::{MatrixError, MatrixResult};
use crate::infra::t;

/// `<EnvironmentVariable key = "TARGET_LANG" value = "xx_YY"`; group 1 is
/// everything before the quoted value.
static TARGET_LANG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(<EnvironmentVariable\s+key\s*=\s*"TARGET_LANG"\s+value\s*=\s*)"[a-z]{2}[_-][A-Za-z]+""#)
        .expect("TARGET_LANG pattern is valid")
});

/// Whether [`SchemeEditor::apply`] changed the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeChange {
    Rewritten,
    AlreadySet,
}

/// Holds the original scheme content for the lifetime of a run.
///
/// 在运行期间持有原始 scheme 内容。
#[derive(Debug)]
pub struct SchemeEditor {
    path: PathBuf,
    original: String,
    backup: PathBuf,
}

impl SchemeEditor {
    /// Reads the scheme and saves a backup copy next to the system temp files.
    ///
    /// Fails when the file cannot be read or declares no `TARGET_LANG`.
    pub fn open(path: &Path) -> MatrixResult<Self> {
        let original = fs::read_to_string(path).map_err(|e| {
            MatrixError::Setup(format!("could not read scheme file '{}': {e}", path.display()))
        })?;
        if !TARGET_LANG.is_match(&original) {
            return Err(MatrixError::Setup(format!(
                "scheme file '{}' declares no TARGET_LANG environment variable matching '{}'",
                path.display(),
                TARGET_LANG.as_str()
            )));
        }

        let backup = tempfile::Builder::new()
            .prefix("scheme-backup-")
            .suffix(".xcscheme")
            .tempfile()?;
        fs::write(backup.path(), &original)?;
        let (_, backup) = backup.keep().map_err(|e| MatrixError::Io(e.error))?;
        log::info!("scheme '{}' backed up to '{}'", path.display(), backup.display());

        Ok(Self {
            path: path.to_path_buf(),
            original,
            backup,
        })
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Rewrites the first `TARGET_LANG` value to `locale`.
    ///
    /// 将第一个 `TARGET_LANG` 值重写为 `locale`。
    pub fn apply(&self, locale: &LocaleId) -> MatrixResult<SchemeChange> {
        let current = fs::read_to_string(&self.path)?;
        let Some(caps) = TARGET_LANG.captures(&current) else {
            return Err(MatrixError::Setup(format!(
                "TARGET_LANG disappeared from scheme file '{}'",
                self.path.display()
            )));
        };
        let replacement = format!("{}\"{}\"", &caps[1], locale);
        let updated = TARGET_LANG.replacen(&current, 1, NoExpand(&replacement));

        if updated == current {
            println!("{}", t!("scheme.unchanged", lang = locale).dimmed());
            return Ok(SchemeChange::AlreadySet);
        }
        fs::write(&self.path, updated.as_ref())?;
        println!("{}", t!("scheme.applied", lang = locale, path = self.path.display()).blue());
        Ok(SchemeChange::Rewritten)
    }

    /// Writes the original content back.
    pub fn restore(&self) -> MatrixResult<()> {
        fs::write(&self.path, &self.original)?;
        println!("{}", t!("scheme.restored", path = self.path.display()).dimmed());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SCHEME: &str = r#"<LaunchAction>
   <EnvironmentVariables>
      <EnvironmentVariable
         key = "TARGET_LANG"
         value = "en_US"
         isEnabled = "YES">
      </EnvironmentVariable>
   </EnvironmentVariables>
</LaunchAction>
"#;

    #[test]
    fn apply_then_restore() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("App.xcscheme");
        fs::write(&path, SCHEME).unwrap();

        let editor = SchemeEditor::open(&path).unwrap();
        let de = LocaleId::parse("de_DE").unwrap();
        assert_eq!(editor.apply(&de).unwrap(), SchemeChange::Rewritten);
        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains(r#"value = "de_DE""#));
        assert_eq!(editor.apply(&de).unwrap(), SchemeChange::AlreadySet);

        editor.restore().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), SCHEME);
        assert_eq!(fs::read_to_string(editor.backup_path()).unwrap(), SCHEME);
    }

    #[test]
    fn scheme_without_target_lang_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("App.xcscheme");
        fs::write(&path, "<Scheme/>").unwrap();
        assert!(matches!(SchemeEditor::open(&path), Err(MatrixError::Setup(_))));
    }
}
