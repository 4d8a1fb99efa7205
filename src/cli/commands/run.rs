//! # Run Command Module / 运行命令模块
//!
//! Implements `run`: resolves the configuration from flags, the optional
//! settings file and defaults, plans the matrix, drives the orchestrator and
//! prints the reports.
//!
//! 实现 `run` 命令：根据参数、可选设置文件和默认值解析配置，规划矩阵，驱动编排器并打印报告。

use anyhow::{Context, Result};
use colored::*;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::cli::RunArgs;
use crate::core::config::{
    RunConfig, Settings, default_archive_root, default_build_dir, default_error_log_dir, expand_path,
    load_settings, load_test_matrix,
};
use crate::core::models::Tally;
use crate::core::orchestrator::{Orchestrator, Toolchain};
use crate::core::planner::{PlanFilter, plan_execution};
use crate::infra::command::{CommandRunner, ProcessExecutor};
use crate::infra::prompt::ConsoleOperator;
use crate::infra::t;
use crate::reporting::{generate_html_report, print_failure_details, print_summary};

/// Settings file picked up from the working directory when `--settings` is absent.
pub const DEFAULT_SETTINGS_FILE: &str = "UiMatrix.toml";

/// Executes the run command.
pub async fn execute(args: RunArgs, language: &str) -> Result<()> {
    let settings = load_run_settings(args.settings.as_deref())?;
    let language = if language_given_on_command_line() {
        language.to_string()
    } else {
        settings.language.clone()
    };
    rust_i18n::set_locale(&language);

    let config = resolve_config(&args, &settings)?;

    println!(
        "{}",
        t!("run.loading_matrix", path = args.lang_dev_file.display())
    );
    let matrix = load_test_matrix(&args.lang_dev_file)
        .with_context(|| t!("run.matrix_invalid", path = args.lang_dev_file.display()))?;
    let filter = PlanFilter {
        devices: args.only_devices.clone(),
        locales: args.only_locales.clone(),
    };
    let plan = plan_execution(&matrix, &filter)?;

    println!(
        "{}",
        t!(
            "run.plan",
            devices = plan.devices.len(),
            combos = plan.len(),
            app = &config.app_name
        )
        .cyan()
    );
    if plan.filtered_count > 0 {
        println!("{}", t!("run.filtered", count = plan.filtered_count).cyan());
    }
    if plan.is_empty() {
        println!("{}", t!("run.nothing_to_do").green());
        return Ok(());
    }

    let cancel = setup_signal_handler();
    countdown(args.countdown, &cancel).await?;

    let executor = Arc::new(ProcessExecutor::new(cancel.clone()));
    let runner = Arc::new(CommandRunner::new(executor, config.error_log_dir.clone()));
    let toolchain = Toolchain::xcode(runner.clone(), &config);
    let mut orchestrator = Orchestrator::new(
        config.clone(),
        toolchain,
        runner,
        Arc::new(ConsoleOperator),
        cancel,
    );

    let outcome = orchestrator.run(&plan).await;
    let results = orchestrator.results();

    print_summary(results, &language);
    print_failure_details(results, &language);

    if let Some(report_path) = &args.html {
        println!("\n{}", t!("run.html_report", path = report_path.display()));
        if let Err(e) = generate_html_report(&config.app_name, results, report_path, &language) {
            eprintln!("{} {e:#}", t!("run.html_failed").red());
        }
    }
    if let Some(journal) = &config.journal {
        println!("{}", t!("run.journal_written", path = journal.display()).dimmed());
    }

    if let Err(e) = outcome {
        return Err(anyhow::Error::new(e).context(t!("run.fatal").to_string()));
    }

    let tally = Tally::of(results);
    if tally.failed > 0 {
        anyhow::bail!("{}", t!("run.failures_recorded", count = tally.failed));
    }
    println!("\n{}", t!("run.all_passed").green().bold());
    Ok(())
}

fn language_given_on_command_line() -> bool {
    env::args().any(|arg| arg == "--lang" || arg.starts_with("--lang="))
}

/// Loads `--settings`, or `UiMatrix.toml` from the working directory when it
/// exists, or the defaults.
pub fn load_run_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return Ok(load_settings(path)?);
    }
    let implicit = Path::new(DEFAULT_SETTINGS_FILE);
    if implicit.is_file() {
        log::info!("using settings from {}", implicit.display());
        return Ok(load_settings(implicit)?);
    }
    Ok(Settings::default())
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(expand_path(&path.to_string_lossy())?)
}

/// Merges flags over settings over defaults.
///
/// 合并优先级：命令行参数 > 设置文件 > 默认值。
pub fn resolve_config(args: &RunArgs, settings: &Settings) -> Result<RunConfig> {
    if args.app_name.trim().is_empty() {
        anyhow::bail!("{}", t!("run.app_name_missing"));
    }
    let project_root = expand(&args.project_root)?;
    let build_dir = match &args.build_dir {
        Some(dir) => expand(dir)?,
        None => default_build_dir(&args.app_name),
    };
    let screenshots_dir = match (&args.screenshots_dir, &settings.screenshots_dir) {
        (Some(dir), _) => expand(dir)?,
        (None, Some(dir)) => expand_path(dir)?,
        (None, None) => build_dir.join("Screenshots"),
    };

    let mut config = RunConfig::new(args.app_name.clone(), project_root.clone(), screenshots_dir);
    config.build_dir = build_dir;
    config.archive_root = match &args.archive_root {
        Some(dir) => expand(dir)?,
        None => default_archive_root(),
    };
    config.scheme_file = args.scheme_file.as_ref().map(|file| project_root.join(file));
    config.clean = args.clean;
    config.failure_policy = args.on_failure.unwrap_or(settings.failure_policy);
    config.collision_policy = args.on_collision.unwrap_or(settings.collision_policy);
    config.os_version = args
        .os_version
        .clone()
        .unwrap_or_else(|| settings.os_version.clone());
    config.timeouts = settings.timeouts;
    config.build_freshness = settings.build_freshness_secs.map(Duration::from_secs);
    config.error_log_dir = match &settings.error_log_dir {
        Some(dir) => expand_path(dir)?,
        None => default_error_log_dir(),
    };
    config.clear_screenshots_before_run = settings.clear_screenshots_before_run;
    config.journal = args.journal.as_deref().map(expand).transpose()?;
    Ok(config)
}

/// Gives the operator `secs` seconds to interrupt before devices are touched.
async fn countdown(secs: u64, cancel: &CancellationToken) -> Result<()> {
    for remaining in (1..=secs).rev() {
        println!("{}", t!("run.countdown", secs = remaining).yellow());
        tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("{}", t!("run.cancelled")),
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
    Ok(())
}

/// Cancels the returned token on Ctrl-C.
fn setup_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("\n{}", t!("run.shutdown_signal").yellow());
                token_clone.cancel();
            }
            Err(e) => log::warn!("could not listen for Ctrl-C: {e}"),
        }
    });

    token
}
