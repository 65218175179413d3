//! CLI integration tests.
//!
//! Every test runs the `resync` binary against a throwaway config file and
//! database, so nothing touches the user's real store and no network access
//! is needed.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        Self { dir }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn database(&self) -> PathBuf {
        self.dir.path().join("engine.db")
    }

    fn run(&self, args: &[&str]) -> Output {
        run_with(&self.config(), &self.database(), args)
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "resync {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}

fn run_with(config: &Path, database: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_resync"))
        .arg("--config")
        .arg(config)
        .arg("--database")
        .arg(database)
        .arg("--no-color")
        .args(args)
        .env_remove("RESYNC_CONFIG")
        .env_remove("RESYNC_DATABASE")
        .output()
        .expect("Failed to run resync binary")
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_resync"))
        .arg("--help")
        .output()
        .expect("Failed to run resync binary");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["status", "queue", "cache", "probe", "config"] {
        assert!(stdout.contains(command), "help should list {command}");
    }
}

#[test]
fn test_missing_explicit_config_fails() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["queue", "list"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load config"));
}

#[test]
fn test_config_init_show_and_path() {
    let sandbox = Sandbox::new();

    let stdout = sandbox.run_ok(&["config", "path"]);
    assert_eq!(stdout.trim(), sandbox.config().display().to_string());

    sandbox.run_ok(&["config", "init"]);
    assert!(sandbox.config().exists());

    let shown = sandbox.run_ok(&["config", "show"]);
    assert!(shown.contains("[queue]"));
    assert!(shown.contains("batch_size = 5"));

    // A second init refuses to overwrite.
    let output = sandbox.run(&["config", "init"]);
    assert!(!output.status.success());
    sandbox.run_ok(&["config", "init", "--force"]);
}

#[test]
fn test_config_validate_reports_bad_values() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.config(), "[queue]\nbatch_size = 0\n").unwrap();

    let output = sandbox.run(&["config", "validate"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("queue.batch_size"));
}

#[test]
fn test_cache_round_trip() {
    let sandbox = Sandbox::new();
    sandbox.run_ok(&["config", "init"]);

    sandbox.run_ok(&[
        "cache",
        "put",
        "profile",
        r#"{"name":"ada","tags":["a","b"]}"#,
        "--priority",
        "high",
    ]);

    let stdout = sandbox.run_ok(&["cache", "get", "profile"]);
    let value: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["name"], "ada");
    assert_eq!(value["tags"][1], "b");

    let keys = sandbox.run_ok(&["cache", "list"]);
    assert!(keys.contains("profile"));

    sandbox.run_ok(&["cache", "remove", "profile"]);
    let output = sandbox.run(&["cache", "get", "profile"]);
    assert!(!output.status.success());
}

#[test]
fn test_cache_put_rejects_invalid_json() {
    let sandbox = Sandbox::new();
    sandbox.run_ok(&["config", "init"]);

    let output = sandbox.run(&["cache", "put", "k", "{not json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid JSON"));
}

#[test]
fn test_queue_add_list_drop() {
    let sandbox = Sandbox::new();
    sandbox.run_ok(&["config", "init"]);

    let low = sandbox.run_ok(&["queue", "add", "syncProfile", "{}", "-p", "low"]);
    let critical = sandbox.run_ok(&[
        "queue",
        "add",
        "placeBet",
        r#"{"amount":10}"#,
        "-p",
        "critical",
        "--max-retries",
        "5",
    ]);
    let low = low.trim().to_string();
    let critical = critical.trim().to_string();

    let listed: Value = serde_json::from_str(&sandbox.run_ok(&["queue", "list", "--json"])).unwrap();
    let actions = listed.as_array().unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0]["id"], critical.as_str());
    assert_eq!(actions[0]["max_retries"], 5);
    assert_eq!(actions[1]["id"], low.as_str());
    assert_eq!(actions[1]["retry_count"], 0);

    sandbox.run_ok(&["queue", "drop", &low]);
    let listed: Value = serde_json::from_str(&sandbox.run_ok(&["queue", "list", "--json"])).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let output = sandbox.run(&["queue", "drop", &low]);
    assert!(!output.status.success());

    sandbox.run_ok(&["queue", "clear"]);
    let text = sandbox.run_ok(&["queue", "list"]);
    assert!(text.contains("Queue is empty"));
}

#[test]
fn test_status_json() {
    let sandbox = Sandbox::new();
    sandbox.run_ok(&["config", "init"]);
    sandbox.run_ok(&["queue", "add", "placeBet", "{}", "-p", "high"]);
    sandbox.run_ok(&["cache", "put", "greeting", r#""hello""#]);

    let status: Value = serde_json::from_str(&sandbox.run_ok(&["status", "--json"])).unwrap();
    assert_eq!(status["queue"]["total"], 1);
    assert_eq!(status["queue"]["by_priority"]["high"], 1);
    assert_eq!(status["storage"]["total_items"], 2);
    assert!(status.get("network").is_none());
}
