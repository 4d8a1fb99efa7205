//! # Command Line Interface Module / 命令行接口模块
//!
//! Builds the `clap` command tree with translated help, turns the matches into
//! typed arguments and dispatches to the subcommand implementations in
//! [`commands`].
//!
//! 构建带有翻译帮助文本的 `clap` 命令树，将匹配结果转换为类型化参数，并分派给 [`commands`] 中的子命令实现。

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::core::config::{CollisionPolicy, FailurePolicy};
use crate::infra::t;

pub mod commands;

/// Arguments of `run`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub app_name: String,
    pub build_dir: Option<PathBuf>,
    pub project_root: PathBuf,
    pub archive_root: Option<PathBuf>,
    pub clean: bool,
    pub lang_dev_file: PathBuf,
    pub scheme_file: Option<PathBuf>,
    pub screenshots_dir: Option<PathBuf>,
    pub on_failure: Option<FailurePolicy>,
    pub on_collision: Option<CollisionPolicy>,
    pub os_version: Option<String>,
    pub settings: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub journal: Option<PathBuf>,
    pub countdown: u64,
    pub only_devices: Vec<String>,
    pub only_locales: Vec<String>,
}

/// The parsed subcommand.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Run(RunArgs),
    Uninstall {
        app_id: String,
        lang_dev_file: PathBuf,
    },
    Flatten {
        root: PathBuf,
        output: Option<PathBuf>,
    },
    Issues {
        log: PathBuf,
        warnings: bool,
    },
    Init {
        dir: PathBuf,
        force: bool,
    },
}

/// Parsed command line: the UI language and the subcommand to run.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub language: String,
    pub command: CliCommand,
}

/// Finds `--lang <VALUE>` before the full parse, so help text is already
/// translated. Falls back to the system locale.
fn pre_parse_language(args: &[OsString]) -> String {
    let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--lang") {
        if let Some(lang) = args.get(pos + 1) {
            return lang.clone();
        }
    }
    if let Some(lang) = args.iter().find_map(|arg| arg.strip_prefix("--lang=")) {
        return lang.to_string();
    }
    sys_locale::get_locale().unwrap_or_else(|| "en".to_string())
}

fn path_arg(name: &'static str, value_name: &'static str, help: String) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .value_name(value_name)
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn lang_dev_file_arg(locale: &str) -> Arg {
    path_arg("lang-dev-file", "FILE", t!("cli.arg_lang_dev_file", locale = locale).to_string()).required(true)
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("ui-matrix-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.arg_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cli.cmd_run", locale = locale).to_string())
                .arg(
                    Arg::new("app-name")
                        .short('a')
                        .long("app-name")
                        .help(t!("cli.arg_app_name", locale = locale).to_string())
                        .value_name("APP")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    path_arg("build-dir", "DIR", t!("cli.arg_build_dir", locale = locale).to_string())
                        .short('o'),
                )
                .arg(
                    path_arg("project-root", "DIR", t!("cli.arg_project_root", locale = locale).to_string())
                        .short('p')
                        .default_value(".."),
                )
                .arg(
                    path_arg("archive-root", "DIR", t!("cli.arg_archive_root", locale = locale).to_string())
                        .short('s'),
                )
                .arg(
                    Arg::new("clean")
                        .short('C')
                        .long("clean")
                        .help(t!("cli.arg_clean", locale = locale).to_string())
                        .action(ArgAction::SetTrue)
                        .conflicts_with("no-clean"),
                )
                .arg(
                    Arg::new("no-clean")
                        .short('c')
                        .long("no-clean")
                        .help(t!("cli.arg_no_clean", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(lang_dev_file_arg(locale))
                .arg(path_arg("scheme-file", "FILE", t!("cli.arg_scheme_file", locale = locale).to_string()))
                .arg(path_arg(
                    "screenshots-dir",
                    "DIR",
                    t!("cli.arg_screenshots_dir", locale = locale).to_string(),
                ))
                .arg(
                    Arg::new("on-failure")
                        .long("on-failure")
                        .help(t!("cli.arg_on_failure", locale = locale).to_string())
                        .value_name("POLICY")
                        .value_parser(clap::value_parser!(FailurePolicy))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("on-collision")
                        .long("on-collision")
                        .help(t!("cli.arg_on_collision", locale = locale).to_string())
                        .value_name("POLICY")
                        .value_parser(clap::value_parser!(CollisionPolicy))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("os-version")
                        .long("os-version")
                        .help(t!("cli.arg_os_version", locale = locale).to_string())
                        .value_name("VERSION")
                        .action(ArgAction::Set),
                )
                .arg(path_arg("settings", "FILE", t!("cli.arg_settings", locale = locale).to_string()))
                .arg(path_arg("html", "FILE", t!("cli.arg_html", locale = locale).to_string()))
                .arg(path_arg("journal", "FILE", t!("cli.arg_journal", locale = locale).to_string()))
                .arg(
                    Arg::new("countdown")
                        .long("countdown")
                        .help(t!("cli.arg_countdown", locale = locale).to_string())
                        .value_name("SECS")
                        .default_value("0")
                        .value_parser(clap::value_parser!(u64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("only-device")
                        .long("only-device")
                        .help(t!("cli.arg_only_device", locale = locale).to_string())
                        .value_name("DEVICE")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("only-locale")
                        .long("only-locale")
                        .help(t!("cli.arg_only_locale", locale = locale).to_string())
                        .value_name("LOCALE")
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("uninstall")
                .about(t!("cli.cmd_uninstall", locale = locale).to_string())
                .arg(
                    Arg::new("app-id")
                        .short('a')
                        .long("app-id")
                        .help(t!("cli.arg_app_id", locale = locale).to_string())
                        .value_name("BUNDLE_ID")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(lang_dev_file_arg(locale)),
        )
        .subcommand(
            Command::new("flatten")
                .about(t!("cli.cmd_flatten", locale = locale).to_string())
                .arg(
                    path_arg("root", "DIR", t!("cli.arg_flatten_root", locale = locale).to_string())
                        .short('r')
                        .required(true),
                )
                .arg(
                    path_arg("output", "DIR", t!("cli.arg_flatten_output", locale = locale).to_string())
                        .short('o'),
                ),
        )
        .subcommand(
            Command::new("issues")
                .about(t!("cli.cmd_issues", locale = locale).to_string())
                .arg(
                    Arg::new("log")
                        .help(t!("cli.arg_issues_log", locale = locale).to_string())
                        .value_name("LOG")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("warnings")
                        .short('w')
                        .long("warnings")
                        .help(t!("cli.arg_issues_warnings", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cli.cmd_init", locale = locale).to_string())
                .arg(
                    path_arg("dir", "DIR", t!("cli.arg_init_dir", locale = locale).to_string())
                        .default_value("."),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help(t!("cli.arg_init_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn path(matches: &ArgMatches, name: &str) -> Option<PathBuf> {
    matches.get_one::<PathBuf>(name).cloned()
}

fn strings(matches: &ArgMatches, name: &str) -> Vec<String> {
    matches
        .get_many::<String>(name)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn run_args(matches: &ArgMatches) -> RunArgs {
    RunArgs {
        app_name: matches.get_one::<String>("app-name").cloned().unwrap_or_default(),
        build_dir: path(matches, "build-dir"),
        project_root: path(matches, "project-root").unwrap_or_else(|| PathBuf::from("..")),
        archive_root: path(matches, "archive-root"),
        clean: matches.get_flag("clean"),
        lang_dev_file: path(matches, "lang-dev-file").unwrap_or_default(),
        scheme_file: path(matches, "scheme-file"),
        screenshots_dir: path(matches, "screenshots-dir"),
        on_failure: matches.get_one::<FailurePolicy>("on-failure").copied(),
        on_collision: matches.get_one::<CollisionPolicy>("on-collision").copied(),
        os_version: matches.get_one::<String>("os-version").cloned(),
        settings: path(matches, "settings"),
        html: path(matches, "html"),
        journal: path(matches, "journal"),
        countdown: matches.get_one::<u64>("countdown").copied().unwrap_or(0),
        only_devices: strings(matches, "only-device"),
        only_locales: strings(matches, "only-locale"),
    }
}

/// Parses `args` (including the program name).
pub fn try_parse_args_from<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let detected = pre_parse_language(&args);
    let matches = build_cli(&detected).try_get_matches_from(&args)?;
    let language = matches.get_one::<String>("lang").cloned().unwrap_or(detected);

    let command = match matches.subcommand() {
        Some(("run", sub)) => CliCommand::Run(run_args(sub)),
        Some(("uninstall", sub)) => CliCommand::Uninstall {
            app_id: sub.get_one::<String>("app-id").cloned().unwrap_or_default(),
            lang_dev_file: path(sub, "lang-dev-file").unwrap_or_default(),
        },
        Some(("flatten", sub)) => CliCommand::Flatten {
            root: path(sub, "root").unwrap_or_default(),
            output: path(sub, "output"),
        },
        Some(("issues", sub)) => CliCommand::Issues {
            log: path(sub, "log").unwrap_or_default(),
            warnings: sub.get_flag("warnings"),
        },
        Some(("init", sub)) => CliCommand::Init {
            dir: path(sub, "dir").unwrap_or_else(|| PathBuf::from(".")),
            force: sub.get_flag("force"),
        },
        _ => {
            return Err(build_cli(&language).error(
                clap::error::ErrorKind::MissingSubcommand,
                t!("cli.missing_subcommand", locale = &language),
            ));
        }
    };

    Ok(CliArgs { language, command })
}

/// Parses the process arguments; prints help or the usage error and exits on
/// failure, like `clap` does.
pub fn parse_args() -> CliArgs {
    try_parse_args_from(env::args_os()).unwrap_or_else(|e| e.exit())
}

/// Sets the UI language and runs the chosen subcommand.
pub async fn process_command(args: CliArgs) -> Result<()> {
    rust_i18n::set_locale(&args.language);
    match args.command {
        CliCommand::Run(run) => commands::run::execute(run, &args.language).await,
        CliCommand::Uninstall {
            app_id,
            lang_dev_file,
        } => commands::uninstall::execute(&app_id, &lang_dev_file).await,
        CliCommand::Flatten { root, output } => commands::flatten::execute(&root, output.as_deref()),
        CliCommand::Issues { log, warnings } => commands::issues::execute(&log, warnings),
        CliCommand::Init { dir, force } => commands::init::execute(&dir, force),
    }
}
