//! End-to-end tests driving the `toolbox-watchdog` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use toolbox_watchdog::inspect::{EnvironmentInspector, InstalledPackage, SystemInfo};
use toolbox_watchdog::{Failure, Reporter, Watchdog};

use super::test_helpers::{records, test_config, ScriptedInspector};

const CHILD_ENV: &str = "TOOLBOX_WATCHDOG_CHILD_PROCESS";

fn run_cli(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_toolbox-watchdog"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn toolbox-watchdog")
}

/// The single diagnostic record on stderr. Stderr must hold nothing but
/// JSON records.
fn only_record(stderr: &[u8]) -> serde_json::Value {
    let mut recs = records(stderr);
    assert_eq!(recs.len(), 1, "stderr: {}", String::from_utf8_lossy(stderr));
    recs.remove(0)
}

#[test]
fn validate_config_accepts_good_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("watchdog.toml");
    std::fs::write(&path, "version = \"1.2.3\"\ncrash_log = \"dump.log\"\n").expect("write");

    let output = run_cli(temp.path(), &["validate-config", path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ok (crash log: dump.log, version: 1.2.3)"));
}

#[test]
fn missing_config_file_is_expected_failure() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = run_cli(temp.path(), &["validate-config", "absent.toml"]);

    assert_eq!(output.status.code(), Some(1));
    let record = only_record(&output.stderr);
    assert_eq!(record["code"], "E_CONFIG");
    assert_eq!(record["class"], "ConfigError");
    assert!(!temp.path().join("crash.log").exists());
}

#[test]
fn missing_program_is_unexpected_failure_with_crash_log() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = run_cli(temp.path(), &["exec", "toolbox-no-such-program-3f9a"]);

    assert_eq!(output.status.code(), Some(2));
    let record = only_record(&output.stderr);
    assert_eq!(record["class"], "std::io::error::Error");
    assert!(record.get("code").is_none());

    let dump = std::fs::read_to_string(temp.path().join("crash.log")).expect("crash log");
    assert!(dump.starts_with("Crashlog created at "));
    assert!(dump.contains("===== MESSAGE:\n\nstd::io::error::Error: "));
    assert!(dump.contains("===== LOAD PATHS:"));
}

#[cfg(unix)]
#[test]
fn non_zero_exit_is_expected_failure() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = run_cli(temp.path(), &["exec", "sh", "-c", "exit 3"]);

    assert_eq!(output.status.code(), Some(1));
    let record = only_record(&output.stderr);
    assert_eq!(record["code"], "E_EXIT_3");
    assert_eq!(record["class"], "RemoteError");
    assert!(!temp.path().join("crash.log").exists());
}

#[cfg(unix)]
#[test]
fn successful_program_exits_zero() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = run_cli(temp.path(), &["exec", "true"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stderr.is_empty());
}

#[test]
fn configured_crash_log_path_is_used() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("watchdog.toml");
    std::fs::write(&config, "crash_log = \"custom-crash.log\"\n").expect("write");

    let output = run_cli(
        temp.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "exec",
            "toolbox-no-such-program-3f9a",
        ],
    );

    assert_eq!(output.status.code(), Some(2));
    assert!(temp.path().join("custom-crash.log").exists());
    assert!(!temp.path().join("crash.log").exists());
}

#[test]
fn inspect_prints_environment_report() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = run_cli(temp.path(), &["inspect"]);

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("report JSON on stdout");
    assert!(report["system"]["sysname"].is_string());
    assert!(report["packages"].is_array());
    assert!(report["search_paths"].is_array());
}

#[test]
fn unwritable_crash_log_keeps_stderr_pure_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("watchdog.toml");
    std::fs::write(&config, "crash_log = \"no-such-dir/crash.log\"\n").expect("write");

    let output = run_cli(
        temp.path(),
        &["--config", config.to_str().unwrap(), "exec", "toolbox-no-such-program-3f9a"],
    );

    assert_eq!(output.status.code(), Some(2));
    let record = only_record(&output.stderr);
    assert_eq!(record["class"], "std::io::error::Error");
}

#[test]
fn warnings_go_to_configured_log_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("watchdog.toml");
    std::fs::write(
        &config,
        "crash_log = \"no-such-dir/crash.log\"\nlog_file = \"watchdog.log\"\n",
    )
    .expect("write");

    let output = run_cli(
        temp.path(),
        &["--config", config.to_str().unwrap(), "exec", "toolbox-no-such-program-3f9a"],
    );

    assert_eq!(output.status.code(), Some(2));
    only_record(&output.stderr);
    assert!(output.stdout.is_empty());
    let log = std::fs::read_to_string(temp.path().join("watchdog.log")).expect("log file");
    assert!(log.contains("failed to write crash log"), "log: {log}");
    assert!(!log.contains('\x1b'));
}

struct PanickingPackages;

impl EnvironmentInspector for PanickingPackages {
    fn system_info(&self) -> toolbox_watchdog::Result<SystemInfo> {
        ScriptedInspector::default().system_info()
    }

    fn installed_packages(&self) -> toolbox_watchdog::Result<Vec<InstalledPackage>> {
        panic!("gem index exploded")
    }

    fn search_paths(&self) -> toolbox_watchdog::Result<Vec<PathBuf>> {
        ScriptedInspector::default().search_paths()
    }
}

/// Body of `panicking_inspector_keeps_stderr_pure_json`, run in a child
/// process so its stderr can be inspected. Does nothing otherwise.
#[test]
fn panicking_inspector_child_process() {
    if std::env::var_os(CHILD_ENV).is_none() {
        return;
    }
    let dir = std::env::current_dir().expect("cwd");
    let reporter = Reporter::stderr(&test_config(&dir)).with_inspector(PanickingPackages);
    let outcome = Watchdog::new(reporter).run(|| -> Result<(), Failure> { panic!("boom") });
    assert_eq!(outcome.exit_code(), 2);
}

#[test]
fn panicking_inspector_keeps_stderr_pure_json() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = Command::new(std::env::current_exe().expect("test binary"))
        .args([
            "--exact",
            "integration::cli_tests::panicking_inspector_child_process",
            "--nocapture",
            "--test-threads=1",
        ])
        .current_dir(temp.path())
        .env(CHILD_ENV, "1")
        .env_remove("RUST_BACKTRACE")
        .output()
        .expect("spawn child test");

    assert!(output.status.success(), "child failed: {output:?}");
    let record = only_record(&output.stderr);
    assert_eq!(record["class"], "panic");
    assert_eq!(record["message"], "boom");

    let dump = std::fs::read_to_string(temp.path().join("crash.log")).expect("crash log");
    assert!(dump.contains("===== INSTALLED GEMS:\n\n  (unavailable: source panicked)\n"));
    assert!(dump.contains("===== LOAD PATHS:\n\n  0. /opt/toolbox/bin\n"));
}
