//! # Test Report Parsing Module / 测试报告解析模块
//!
//! The test runner's only machine-readable signal is its text report. This
//! module is the single place that scrapes it, so a structured result format
//! can replace it later without touching the orchestrator.
//!
//! 测试运行器唯一可机读的信号是其文本报告。此模块是唯一解析它的地方。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `Test Suite 'All tests' passed at <ts>.` followed by
/// `Executed <N> test(s), with <F> failure(s) (<U> unexpected) in <secs> [(<wall>)] seconds`.
static SUITE_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Test Suite 'All tests' (passed|failed) at (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d+)\.\s+Executed (\d+) tests?, with (\d+) failures? \((\d+) unexpected\) in ([\d.]+)(?: \([\d.]+\))? seconds",
    )
    .expect("suite summary pattern is valid")
});

/// Pass/fail classification of one test run.
/// 一次测试运行的通过/失败分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail,
}

/// The numbers scraped from the suite summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub finished_at: String,
    pub executed: u32,
    pub failures: u32,
    pub unexpected: u32,
    pub seconds: String,
}

/// The parsed report: a verdict and, if the summary was found, its numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub verdict: Verdict,
    pub summary: Option<SuiteSummary>,
}

/// Classifies test-runner stdout.
///
/// PASS only when the `'All tests' passed` summary is present and reports
/// zero failures. A summary with failures, a `failed` suite, or no summary at
/// all is FAIL. When the summary appears several times the last one counts.
///
/// 仅当存在 `'All tests' passed` 摘要且报告 0 个失败时才判定为 PASS。
pub fn parse_report(stdout: &str) -> ReportOutcome {
    let Some(caps) = SUITE_SUMMARY.captures_iter(stdout).last() else {
        return ReportOutcome {
            verdict: Verdict::Fail,
            summary: None,
        };
    };

    let number = |i: usize| caps[i].parse::<u32>().unwrap_or(u32::MAX);
    let summary = SuiteSummary {
        finished_at: caps[2].to_string(),
        executed: number(3),
        failures: number(4),
        unexpected: number(5),
        seconds: caps[6].to_string(),
    };

    let verdict = if &caps[1] == "passed" && summary.failures == 0 {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    ReportOutcome {
        verdict,
        summary: Some(summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_suffix_is_accepted() {
        let stdout = "Test Suite 'All tests' passed at 2017-02-18 18:12:45.605.\n\
                      \tExecuted 3 tests, with 0 failures (0 unexpected) in 12.504 (12.507) seconds\n";
        let outcome = parse_report(stdout);
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert_eq!(outcome.summary.unwrap().executed, 3);
    }

    #[test]
    fn last_summary_wins() {
        let stdout = "Test Suite 'All tests' passed at 2017-02-18 18:12:45.605.\n\
                      Executed 1 test, with 0 failures (0 unexpected) in 1.0 seconds\n\
                      Test Suite 'All tests' failed at 2017-02-18 18:13:45.605.\n\
                      Executed 2 tests, with 1 failure (0 unexpected) in 2.0 seconds\n";
        assert_eq!(parse_report(stdout).verdict, Verdict::Fail);
    }
}
