use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;
use ui_matrix_runner::cli::{CliCommand, try_parse_args_from};
use ui_matrix_runner::config::FailurePolicy;

fn runner() -> Command {
    let mut cmd = Command::cargo_bin("ui-matrix-runner").unwrap();
    cmd.arg("--lang").arg("en");
    cmd
}

/// A malformed device/language file stops `run` before anything is built,
/// and the error names the offending line.
///
/// 格式错误的设备/语言文件会在构建之前终止 `run`，错误信息指出出错的行。
#[test]
fn test_invalid_matrix_file_reports_line() {
    let dir = tempdir().unwrap();
    let matrix = dir.path().join("langDevices.txt");
    fs::write(&matrix, "dev:iPhone 8\nlang:english\n").unwrap();

    runner()
        .current_dir(dir.path())
        .args(["run", "-a", "MyApp", "--lang-dev-file"])
        .arg(&matrix)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("english"));
}

/// A matrix without languages has nothing to run and exits cleanly.
#[test]
fn test_empty_plan_exits_successfully() {
    let dir = tempdir().unwrap();
    let matrix = dir.path().join("langDevices.txt");
    fs::write(&matrix, "# no languages yet\ndev:iPhone 8\n").unwrap();

    runner()
        .current_dir(dir.path())
        .args(["run", "-a", "MyApp", "--lang-dev-file"])
        .arg(&matrix)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to run."));
}

#[test]
fn test_unknown_device_filter_is_rejected() {
    let dir = tempdir().unwrap();
    let matrix = dir.path().join("langDevices.txt");
    fs::write(&matrix, "dev:iPhone 8\nlang:en_US\n").unwrap();

    runner()
        .current_dir(dir.path())
        .args(["run", "-a", "MyApp", "--only-device", "iPhone 99", "--lang-dev-file"])
        .arg(&matrix)
        .assert()
        .failure()
        .stderr(predicate::str::contains("'iPhone 99' is not part of the matrix"));
}

#[test]
fn test_issues_lists_errors_and_warnings() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("Build_StdOUT.log");
    fs::write(
        &log,
        "/src/A.swift:3:1: warning: unused result\n_ = foo()\n^\n\
         /src/B.swift:9:5: error: cannot find 'bar' in scope\n    bar()\n    ^~~\n** BUILD FAILED **\n",
    )
    .unwrap();

    runner()
        .arg("issues")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("ERROR issue no. 1"))
        .stdout(predicate::str::contains("WARNING").not())
        .stdout(predicate::str::contains("1 error(s), 1 warning(s)"));

    runner()
        .args(["issues", "-w"])
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("WARNING issue no. 0"));
}

#[test]
fn test_flatten_gathers_the_archive_tree() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("TestAuto_screenshots");
    let nested = root.join("iPhone_11").join("de_DE");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("home.png"), b"png").unwrap();

    runner()
        .args(["flatten", "-r"])
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Copied 1 file(s)"));

    let flat = dir.path().join("TestAuto_screenshots_flat");
    assert!(flat.join("iPhone_11_de_DE__home.png").is_file());

    // A second pass would mix two runs together.
    runner()
        .args(["flatten", "-r"])
        .arg(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already has content"));
}

#[test]
fn test_flatten_refuses_a_target_inside_the_root() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("archive")).unwrap();

    runner()
        .args(["flatten", "-r"])
        .arg(dir.path().join("archive"))
        .arg("-o")
        .arg(dir.path().join("archive").join("flat"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be inside"));
}

/// Relative paths are resolved before the check, so the output can never
/// land inside the tree it is gathered from.
#[test]
fn test_flatten_refuses_a_relative_target_inside_the_root() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("archive").join("iPhone_11").join("en_US");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("home.png"), b"png").unwrap();

    runner()
        .current_dir(dir.path())
        .args(["flatten", "-r", "archive", "-o", "archive/flat"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be inside"));

    assert!(!dir.path().join("archive").join("flat").exists());
}

#[test]
fn test_init_writes_settings_and_sample_matrix() {
    let dir = tempdir().unwrap();

    runner()
        .args(["init", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    let settings = fs::read_to_string(dir.path().join("UiMatrix.toml")).unwrap();
    assert!(settings.contains("failure_policy = \"abort\""));
    let matrix = fs::read_to_string(dir.path().join("langDevices.txt")).unwrap();
    assert!(matrix.contains("lang:en_US"));

    runner()
        .args(["init", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));
}

/// The generated settings file must load as-is.
#[test]
fn test_init_output_is_a_valid_settings_file() {
    let dir = tempdir().unwrap();
    runner().args(["init", "--dir"]).arg(dir.path()).assert().success();

    let settings = ui_matrix_runner::config::load_settings(&dir.path().join("UiMatrix.toml")).unwrap();
    assert_eq!(settings.failure_policy, FailurePolicy::AbortOnFailure);
    assert!(settings.clear_screenshots_before_run);
}

#[test]
fn test_help_follows_the_lang_flag() {
    Command::cargo_bin("ui-matrix-runner")
        .unwrap()
        .args(["--lang", "zh-CN", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("归档截图"));
}

#[test]
fn test_subcommand_is_required() {
    runner().assert().failure();
}

#[test]
fn test_clean_flags_conflict() {
    let result = try_parse_args_from([
        "ui-matrix-runner",
        "run",
        "-a",
        "MyApp",
        "--lang-dev-file",
        "langDevices.txt",
        "-C",
        "-c",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_policies_and_filters_are_parsed() {
    let args = try_parse_args_from([
        "ui-matrix-runner",
        "--lang",
        "en",
        "run",
        "-a",
        "MyApp",
        "--lang-dev-file",
        "langDevices.txt",
        "--on-failure",
        "prompt",
        "--only-locale",
        "de_DE",
        "--only-locale",
        "en_US",
    ])
    .unwrap();

    assert_eq!(args.language, "en");
    let CliCommand::Run(run) = args.command else {
        panic!("expected the run command");
    };
    assert_eq!(run.on_failure, Some(FailurePolicy::PromptOperator));
    assert_eq!(run.only_locales, vec!["de_DE", "en_US"]);
    assert!(run.only_devices.is_empty());
}
