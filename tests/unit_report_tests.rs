//! # Report Parsing Unit Tests / 报告解析单元测试

mod common;

use common::{FAIL_REPORT, PASS_REPORT};
use ui_matrix_runner::core::issues::{IssueKind, count, parse_issues};
use ui_matrix_runner::core::report::{Verdict, parse_report};

#[test]
fn test_clean_pass_is_pass() {
    let outcome = parse_report(PASS_REPORT);
    assert_eq!(outcome.verdict, Verdict::Pass);

    let summary = outcome.summary.unwrap();
    assert_eq!(summary.executed, 3);
    assert_eq!(summary.failures, 0);
    assert_eq!(summary.seconds, "12.504");
    assert_eq!(summary.finished_at, "2017-02-18 18:12:45.605");
}

#[test]
fn test_failed_suite_is_fail() {
    let outcome = parse_report(FAIL_REPORT);
    assert_eq!(outcome.verdict, Verdict::Fail);
    assert_eq!(outcome.summary.unwrap().failures, 1);
}

#[test]
fn test_missing_summary_is_fail() {
    let stdout = "Test Suite 'All tests' started at 2017-02-18 18:12:33.101\n\
                  ** TEST INTERRUPTED **\n";
    let outcome = parse_report(stdout);
    assert_eq!(outcome.verdict, Verdict::Fail);
    assert!(outcome.summary.is_none());
}

#[test]
fn test_passed_wording_with_failures_is_fail() {
    let stdout = "Test Suite 'All tests' passed at 2017-02-18 18:12:45.605.\n\
                  \tExecuted 1 test, with 2 failures (2 unexpected) in 0.5 seconds\n";
    assert_eq!(parse_report(stdout).verdict, Verdict::Fail);
}

#[test]
fn test_empty_stdout_is_fail() {
    assert_eq!(parse_report("").verdict, Verdict::Fail);
}

#[test]
fn test_build_log_without_diagnostics_has_no_issues() {
    let log = "CompileSwift normal x86_64 /src/AppDelegate.swift\n** BUILD SUCCEEDED **\n";
    assert!(parse_issues(log).is_empty());
}

#[test]
fn test_issue_counts_by_kind() {
    let log = "\
/src/A.swift:3:1: warning: unused result
_ = foo()
^
/src/B.swift:9:5: error: cannot find 'bar' in scope
    bar()
    ^~~
";
    let issues = parse_issues(log);
    assert_eq!(count(&issues, IssueKind::Warning), 1);
    assert_eq!(count(&issues, IssueKind::Error), 1);
    assert_eq!(issues[1].pointer.trim(), "^~~");
}
