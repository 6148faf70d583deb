//! CLI end-to-end tests that invoke the compiled `ksync` binary.
//!
//! Every run points at a local port nothing listens on, so no test needs a
//! live knowledge API.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use tempfile::TempDir;

const ENV_VARS: [&str; 7] = [
    "KNOWLEDGE_DIR",
    "OPEN_WEBUI_URL",
    "OPEN_WEBUI_API_KEY",
    "CACHE_FILE",
    "QDRANT_URI",
    "QDRANT_API_KEY",
    "PATH_PREFIX_MAP",
];

/// Returns the path to the compiled `ksync` binary.
fn ksync_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ksync"))
}

fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// A knowledge root with one definition referencing one source file.
struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("knowledge")).unwrap();
        fs::write(temp.path().join("intro.md"), "# Intro").unwrap();
        fs::write(
            temp.path().join("knowledge").join("handbook.md"),
            format!("# Handbook\n{}\n", temp.path().join("intro.md").display()),
        )
        .unwrap();
        Self { temp }
    }

    fn knowledge_dir(&self) -> PathBuf {
        self.temp.path().join("knowledge")
    }

    fn cache_file(&self) -> PathBuf {
        self.temp.path().join("state").join("cache.json")
    }

    fn command(&self, url: &str) -> Command {
        self.command_in(&self.knowledge_dir(), url)
    }

    fn command_in(&self, knowledge_dir: &Path, url: &str) -> Command {
        let mut command = Command::new(ksync_bin());
        for var in ENV_VARS {
            command.env_remove(var);
        }
        command
            .env("RUST_LOG", "off")
            .env("NO_COLOR", "1")
            .arg("--dir")
            .arg(knowledge_dir)
            .arg("--cache-file")
            .arg(self.cache_file())
            .arg("--url")
            .arg(url)
            .arg("--vector-store-url")
            .arg(url)
            .current_dir(self.temp.path());
        command
    }

    fn run(&self, url: &str, args: &[&str]) -> Output {
        self.command(url)
            .args(args)
            .output()
            .expect("failed to execute ksync binary")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_exits_zero() {
    let out = Command::new(ksync_bin())
        .arg("--help")
        .output()
        .expect("failed to run ksync --help");

    assert!(out.status.success(), "ksync --help should exit 0");
    let text = stdout(&out);
    assert!(text.contains("--watch"), "help should mention --watch, got:\n{}", text);
    assert!(text.contains("--dry-run"), "help should mention --dry-run, got:\n{}", text);
}

#[test]
fn test_version_flag() {
    AssertCommand::new(ksync_bin())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ksync"));
}

#[test]
fn test_missing_api_key_fails_before_any_sync() {
    let ws = Workspace::new();

    let out = ws.run(&closed_port_url(), &[]);

    assert!(!out.status.success());
    assert!(stderr(&out).contains("API key"), "stderr:\n{}", stderr(&out));
    assert!(!ws.cache_file().exists());
}

#[test]
fn test_missing_knowledge_dir_is_configuration_error() {
    let ws = Workspace::new();
    let missing = ws.temp.path().join("nowhere");

    let out = ws
        .command_in(&missing, &closed_port_url())
        .arg("--api-key")
        .arg("sk-test")
        .output()
        .unwrap();

    assert!(!out.status.success());
    assert!(stderr(&out).contains("Configuration error"), "stderr:\n{}", stderr(&out));
}

#[test]
fn test_unreachable_remote_fails_bootstrap_without_touching_cache() {
    let ws = Workspace::new();

    let out = ws.run(&closed_port_url(), &["--api-key", "sk-test", "--dry-run"]);

    assert!(!out.status.success(), "bootstrap failure should exit non-zero");
    let text = stdout(&out);
    assert!(text.contains("FAILED"), "stdout:\n{}", text);
    assert!(
        text.contains("[DRY RUN] Summary: 0 added, 0 updated, 0 removed"),
        "stdout:\n{}",
        text
    );
    assert!(!ws.cache_file().exists());
}

#[test]
fn test_unresolvable_definition_never_contacts_remote() {
    let ws = Workspace::new();
    fs::write(ws.knowledge_dir().join("handbook.md"), "# mount not ready\nmissing.md\n").unwrap();

    let out = ws.run(&closed_port_url(), &["--api-key", "sk-test"]);

    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("SKIPPED"), "stdout:\n{}", text);
    assert!(text.contains("Summary: 0 added, 0 updated, 0 removed"));
}

#[test]
fn test_json_report_is_machine_readable() {
    let ws = Workspace::new();

    let out = ws.run(&closed_port_url(), &["--api-key", "sk-test", "--dry-run", "--json"]);

    let report: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout should be a JSON report");
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["collections"][0]["collection"], "handbook");
    assert_eq!(report["collections"][0]["status"], "aborted");
}

#[test]
fn test_settings_file_supplies_api_key() {
    let ws = Workspace::new();
    fs::write(ws.knowledge_dir().join("handbook.md"), "missing.md\n").unwrap();
    let settings = ws.temp.path().join("ksync.toml");
    fs::write(&settings, "api_key = \"sk-from-file\"\n").unwrap();

    let out = ws.run(&closed_port_url(), &["--settings", settings.to_str().unwrap()]);

    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
}

#[test]
fn test_malformed_settings_file_is_rejected() {
    let ws = Workspace::new();
    let settings = ws.temp.path().join("ksync.toml");
    fs::write(&settings, "jobs = \"many\"\n").unwrap();

    AssertCommand::from_std(ws.command(&closed_port_url()))
        .arg("--settings")
        .arg(&settings)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid settings file"));
}
