//! # Compile Issues Module / 编译问题模块
//!
//! Extracts compiler diagnostics from a build log. The build output of a real
//! project runs to thousands of lines; this module keeps only the
//! `file:line:col: error:` and `warning:` blocks, each with its source line,
//! its caret line and an optional `note:` reference.
//!
//! 从构建日志中提取编译器诊断信息，只保留 error 和 warning 块，
//! 以及它们的源代码行、指示符行和可选的 `note:` 引用。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt::Write;

static ERROR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+:\d+: error:").expect("error pattern is valid"));
static WARNING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+:\d+: warning:").expect("warning pattern is valid"));
static NOTE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+:\d+: note:").expect("note pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    Error,
    Warning,
}

/// One diagnostic block.
///
/// ```text
/// /src/Root.swift:49:14: error: use of unresolved identifier 'mountainPin'
///         for pin in mountainPin {          <- source_line
///                    ^~~~~~~~~~~            <- pointer
/// /src/Global.swift:4:5: note: did you mean 'mountainPins'?
/// var mountainPins = [MyPin]()              <- reference_line
///     ^                                     <- reference_pointer
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileIssue {
    pub kind: IssueKind,
    pub message: String,
    pub source_line: String,
    pub pointer: String,
    pub note: Option<String>,
    pub reference_line: Option<String>,
    pub reference_pointer: Option<String>,
}

impl CompileIssue {
    fn new(kind: IssueKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
            source_line: String::new(),
            pointer: String::new(),
            note: None,
            reference_line: None,
            reference_pointer: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Header,
    SourceLine,
    Pointer,
    Note,
    ReferenceLine,
    ReferencePointer,
}

fn header_kind(line: &str) -> Option<IssueKind> {
    if ERROR_LINE.is_match(line) {
        Some(IssueKind::Error)
    } else if WARNING_LINE.is_match(line) {
        Some(IssueKind::Warning)
    } else {
        None
    }
}

/// Scans `log` and returns the diagnostics in the order they appear.
///
/// 扫描 `log` 并按出现顺序返回诊断信息。
pub fn parse_issues(log: &str) -> Vec<CompileIssue> {
    let mut issues: Vec<CompileIssue> = Vec::new();
    let mut state = Expect::Header;

    for line in log.lines() {
        // A line that is not a note may already open the next issue.
        if state == Expect::Note && !NOTE_LINE.is_match(line) {
            state = Expect::Header;
        }

        let current = match (state, issues.last_mut()) {
            (Expect::Header, _) | (_, None) => None,
            (_, Some(issue)) => Some(issue),
        };
        let Some(issue) = current else {
            if let Some(kind) = header_kind(line) {
                issues.push(CompileIssue::new(kind, line));
                state = Expect::SourceLine;
            }
            continue;
        };

        state = match state {
            Expect::SourceLine => {
                issue.source_line = line.to_string();
                Expect::Pointer
            }
            Expect::Pointer => {
                issue.pointer = line.to_string();
                Expect::Note
            }
            Expect::Note => {
                issue.note = Some(line.to_string());
                Expect::ReferenceLine
            }
            Expect::ReferenceLine => {
                issue.reference_line = Some(line.to_string());
                Expect::ReferencePointer
            }
            Expect::ReferencePointer | Expect::Header => {
                issue.reference_pointer = Some(line.to_string());
                Expect::Header
            }
        };
    }

    issues
}

/// Renders issues for the console: warnings first (only when asked for), then
/// errors, each block headed by its position in the log.
pub fn render(issues: &[CompileIssue], include_warnings: bool) -> String {
    let mut out = String::new();
    let mut block = |index: usize, label: &str, issue: &CompileIssue| {
        let _ = writeln!(out, "----  {label} issue no. {index}");
        let _ = writeln!(out, "{}", issue.message);
        let _ = writeln!(out, "{}", issue.source_line);
        let _ = writeln!(out, "{}", issue.pointer);
        if let Some(note) = &issue.note {
            let _ = writeln!(out, "{note}");
        }
        if let Some(reference) = issue.reference_line.as_ref().filter(|r| !r.is_empty()) {
            let _ = writeln!(out, "{reference}");
        }
    };

    if include_warnings {
        for (index, issue) in issues.iter().enumerate().filter(|(_, i)| i.kind == IssueKind::Warning) {
            block(index, "WARNING", issue);
        }
    }
    for (index, issue) in issues.iter().enumerate().filter(|(_, i)| i.kind == IssueKind::Error) {
        block(index, "ERROR", issue);
    }
    out
}

pub fn count(issues: &[CompileIssue], kind: IssueKind) -> usize {
    issues.iter().filter(|i| i.kind == kind).count()
}
