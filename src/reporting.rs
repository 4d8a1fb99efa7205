//! # Reporting Module / 报告模块
//!
//! Turns the recorded combination results into output for people and tools:
//! a console summary, an HTML page and the JSON run journal.
//!
//! 将记录的组合结果转换为面向人和工具的输出：控制台摘要、HTML 页面和 JSON 运行日志。

pub mod console;
pub mod html;
pub mod journal;

pub use console::{print_failure_details, print_summary};
pub use html::generate_html_report;
pub use journal::{read_journal, write_journal};
