//! # Console Reporting Module / 控制台报告模块
//!
//! Prints the end-of-run summary table and the details of every failed
//! combination, with the text taken from the active locale.
//!
//! 打印运行结束时的摘要表以及每个失败组合的详细信息，文本取自当前语言。

use colored::*;

use crate::core::models::{ComboOutcome, ComboResult, Tally};
use crate::infra::command::tail;
use crate::infra::t;

/// Prints one line per combination plus the totals.
///
/// ```text
/// --- Matrix Summary ---
///   - Passed           | iPhone_11 / en_US                        |    95.31s  12 screenshots
///   - Failed (run tests)| iPhone_11 / de_DE                       |    88.02s
///   - Skipped          | iPad_Air_2 / en_US                       |       N/A
/// ```
pub fn print_summary(results: &[ComboResult], locale: &str) {
    println!("\n{}", t!("report.summary_banner", locale = locale).bold());

    for result in results {
        let status_str = result.get_status_str(locale);
        let duration_str = result
            .get_duration()
            .map(|d| format!("{:.2}s", d.as_secs_f64()))
            .unwrap_or_else(|| "N/A".to_string());
        let copied_str = result
            .get_copied()
            .map(|n| t!("report.screenshots", locale = locale, count = n).to_string())
            .unwrap_or_default();

        let status_colored = match &result.outcome {
            ComboOutcome::Passed { .. } => status_str.green(),
            ComboOutcome::Failed { .. } => status_str.red(),
            ComboOutcome::Skipped { .. } => status_str.dimmed(),
        };

        println!(
            "  - {:<18} | {:<40} | {:>10}  {}",
            status_colored,
            result.label(),
            duration_str,
            copied_str
        );
    }

    let tally = Tally::of(results);
    println!(
        "\n{}",
        t!(
            "report.totals",
            locale = locale,
            total = tally.total,
            passed = tally.passed,
            failed = tally.failed,
            skipped = tally.skipped
        )
        .bold()
    );
}

/// Prints message, saved logs and the tail of the test output for each
/// failed combination. Does nothing when there are none.
///
/// 为每个失败的组合打印消息、已保存的日志和测试输出的末尾。
pub fn print_failure_details(results: &[ComboResult], locale: &str) {
    let failures: Vec<&ComboResult> = results.iter().filter(|r| r.is_failure()).collect();
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("report.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}'",
            i + 1,
            failures.len(),
            t!("report.failure_header", locale = locale).red(),
            result.label().cyan()
        );
        println!("{}", result.get_message());

        if let Some(run) = result.get_run() {
            if let Some(path) = &run.stdout_log {
                println!("  stdout: {}", path.display());
            }
            if let Some(path) = &run.stderr_log {
                println!("  stderr: {}", path.display());
            }
            let last_lines = tail(&run.stdout, 15);
            if !last_lines.is_empty() {
                println!("\n--- {} ---\n", t!("report.test_log", locale = locale).yellow());
                println!("{}", last_lines.dimmed());
            }
        }
        println!("\n{}", "-".repeat(80));
    }
}
