//! # HTML Reporting Module / HTML 报告模块
//!
//! Renders the run results as one self-contained HTML page: totals, a table
//! with one row per (device, locale) and collapsible failure details.
//!
//! 将运行结果渲染为一个独立的 HTML 页面：统计、每个 (设备, 语言) 一行的表格以及可折叠的失败详情。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, html};
use std::path::Path;

use crate::core::models::{ComboResult, Tally};
use crate::infra::command::tail;
use crate::infra::fs::write_text;
use crate::infra::t;

const HTML_STYLE: &str = r#"
body { font-family: -apple-system, Helvetica, Arial, sans-serif; margin: 2em; color: #222; }
h1 { font-weight: 600; }
.summary-container { display: flex; gap: 1.5em; margin-bottom: 1.5em; }
.summary-item { display: flex; flex-direction: column; align-items: center; padding: 0.8em 1.4em; border-radius: 6px; background: #f4f4f4; }
.summary-item .count { font-size: 1.8em; font-weight: 700; }
.passed-text { color: #2e7d32; } .failed-text { color: #c62828; } .skipped-text { color: #777; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: 0.45em 0.8em; border-bottom: 1px solid #e0e0e0; }
.status-cell { display: inline-block; padding: 0.1em 0.6em; border-radius: 4px; font-weight: 600; }
.status-Passed { background: #e8f5e9; color: #2e7d32; }
.status-Failed { background: #ffebee; color: #c62828; }
.status-Timeout { background: #fff3e0; color: #e65100; }
.status-Skipped { background: #eeeeee; color: #616161; }
.output-toggle { cursor: pointer; color: #1565c0; font-size: 0.85em; margin-top: 0.3em; }
.output-content { white-space: pre-wrap; background: #fafafa; padding: 1em; font-size: 0.85em; }
.duration-cell, .count-cell { text-align: right; }
"#;

const HTML_SCRIPT: &str = r#"
function toggleOutput(id) {
  var row = document.getElementById(id);
  row.style.display = row.style.display === 'none' ? '' : 'none';
}
"#;

/// Renders the report page.
pub fn render_html_report(app: &str, results: &[ComboResult], locale: &str) -> Markup {
    let tally = Tally::of(results);
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale, app = app)) }
                style { (maud::PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale, app = app)) }
                div class="summary-container" {
                    (summary_item(tally.total, "", &t!("html_report.summary.total", locale = locale)))
                    (summary_item(tally.passed, "passed-text", &t!("html_report.summary.passed", locale = locale)))
                    (summary_item(tally.failed, "failed-text", &t!("html_report.summary.failed", locale = locale)))
                    (summary_item(tally.skipped, "skipped-text", &t!("html_report.summary.skipped", locale = locale)))
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.device", locale = locale)) }
                            th { (t!("html_report.table.locale", locale = locale)) }
                            th { (t!("html_report.table.status", locale = locale)) }
                            th class="duration-cell" { (t!("html_report.table.duration", locale = locale)) }
                            th class="count-cell" { (t!("html_report.table.screenshots", locale = locale)) }
                        }
                    }
                    tbody {
                        @for (i, result) in results.iter().enumerate() {
                            (result_rows(i, result, locale))
                        }
                    }
                }
                script { (maud::PreEscaped(HTML_SCRIPT)) }
            }
        }
    }
}

fn summary_item(count: usize, class: &str, label: &str) -> Markup {
    html! {
        div class="summary-item" {
            span class={ "count " (class) } { (count) }
            span class="label" { (label) }
        }
    }
}

fn result_rows(index: usize, result: &ComboResult, locale: &str) -> Markup {
    let output_id = format!("output-{index}");
    let duration = result
        .get_duration()
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "N/A".to_string());
    let details = result.is_failure().then(|| {
        let mut text = result.get_message().to_string();
        if let Some(run) = result.get_run() {
            text.push_str("\n\n");
            text.push_str(&tail(&run.stdout, 40));
        }
        text
    });

    html! {
        tr {
            td { (result.device.as_str()) }
            td { (result.locale.as_str()) }
            td {
                div class={ "status-cell " (result.get_status_class()) } { (result.get_status_str(locale)) }
                @if details.is_some() {
                    div class="output-toggle" onclick={ "toggleOutput('" (output_id) "')" } {
                        (t!("html_report.toggle_output", locale = locale))
                    }
                }
            }
            td class="duration-cell" { (duration) }
            td class="count-cell" {
                @if let Some(copied) = result.get_copied() { (copied) }
            }
        }
        @if let Some(text) = details {
            tr id=(output_id) style="display:none;" {
                td colspan="5" { pre class="output-content" { (text) } }
            }
        }
    }
}

/// Writes the HTML report for `results` to `output_path`.
///
/// 将 `results` 的 HTML 报告写入 `output_path`。
pub fn generate_html_report(app: &str, results: &[ComboResult], output_path: &Path, locale: &str) -> Result<()> {
    let page = render_html_report(app, results, locale);
    write_text(output_path, &page.into_string())
        .with_context(|| format!("Failed to write HTML report '{}'", output_path.display()))
}
