//! End-to-end tests for mpmigrate select
//!
//! These tests run the binary against temporary source trees and queues:
//! - Routing by membership
//! - At most one transfer per invocation
//! - Backpressure from busy queues
//! - Configuration errors and exit codes
//! - JSON output

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Layout {
    root: TempDir,
    source: PathBuf,
    members: PathBuf,
    dest_in: PathBuf,
    dest_out: PathBuf,
}

impl Layout {
    fn new(members: &str) -> Self {
        let root = TempDir::new().unwrap();
        let source = root.path().join("source");
        let dest_in = root.path().join("queue-in");
        let dest_out = root.path().join("queue-out");
        for dir in [&source, &dest_in, &dest_out] {
            fs::create_dir(dir).unwrap();
        }
        let members_path = root.path().join("members.txt");
        fs::write(&members_path, members).unwrap();
        Self {
            root,
            source,
            members: members_path,
            dest_in,
            dest_out,
        }
    }

    fn item(&self, id: &str) -> PathBuf {
        let dir = self.source.join(id);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(format!("{id}.zip")), id).unwrap();
        dir
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("mpmigrate").unwrap();
        cmd.env("XDG_CONFIG_HOME", self.root.path().join("config"))
            .env("XDG_RUNTIME_DIR", self.root.path())
            .env("NO_COLOR", "1")
            .arg("select")
            .arg(&self.source)
            .arg(&self.members)
            .arg(&self.dest_in)
            .arg(&self.dest_out);
        cmd
    }
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn test_select_routes_member_and_marks_it() {
    let layout = Layout::new("A note-ignored\n");
    let a = layout.item("A");
    let b = layout.item("B");
    fs::write(b.join("ingested"), "").unwrap();

    layout
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Transferred A"));

    assert_eq!(entries(&layout.dest_in), vec!["A.zip"]);
    assert!(entries(&layout.dest_out).is_empty());
    assert!(a.join("ingested").is_file());
    assert!(b.join("B.zip").is_file());
}

#[test]
fn test_select_moves_one_item_per_run() {
    let layout = Layout::new("");
    layout.item("A");
    layout.item("B");

    layout.cmd().assert().success();
    layout
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("waiting for their destination queue"));

    assert_eq!(entries(&layout.dest_out), vec!["A.zip"]);

    fs::remove_file(layout.dest_out.join("A.zip")).unwrap();
    layout.cmd().assert().success();
    assert_eq!(entries(&layout.dest_out), vec!["B.zip"]);

    fs::remove_file(layout.dest_out.join("B.zip")).unwrap();
    layout
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending items"));
}

#[test]
fn test_select_both_queues_busy() {
    let layout = Layout::new("");
    let a = layout.item("A");
    fs::write(layout.dest_in.join("X.zip"), "x").unwrap();
    fs::write(layout.dest_out.join("Y.zip"), "y").unwrap();

    layout
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Both destination queues are busy"));
    assert!(a.join("A.zip").is_file());
    assert!(!a.join("ingested").exists());
}

#[test]
fn test_select_missing_source_is_configuration_error() {
    let layout = Layout::new("");
    fs::remove_dir(&layout.source).unwrap();

    layout
        .cmd()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid source directory"));
}

#[test]
fn test_select_failed_transfer_exits_nonzero() {
    let layout = Layout::new("");
    fs::create_dir(layout.source.join("A")).unwrap();

    layout
        .cmd()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("not found"));
    assert!(!layout.source.join("A/failed").exists());
}

#[test]
fn test_select_json_output() {
    let layout = Layout::new("");
    layout.item("A");

    let output = layout.cmd().arg("--format").arg("json").output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "transferred");
    assert_eq!(report["id"], "A");
    assert_eq!(report["queue"], "not-in-membership-list");
    assert_eq!(report["failures"].as_array().unwrap().len(), 0);
}

#[test]
fn test_select_copy_mode_keeps_source() {
    let layout = Layout::new("");
    let a = layout.item("A");

    layout
        .cmd()
        .arg("--transfer-mode")
        .arg("copy")
        .assert()
        .success();

    assert!(a.join("A.zip").is_file());
    assert_eq!(entries(&layout.dest_out), vec!["A.zip"]);
}

#[test]
fn test_missing_subcommand_is_usage_error() {
    Command::cargo_bin("mpmigrate").unwrap().assert().code(2);
}

fn log_text(dir: &Path) -> String {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
        .collect()
}

#[test]
fn test_log_file_keeps_errors_of_failing_runs() {
    let layout = Layout::new("");
    fs::create_dir(layout.source.join("A")).unwrap();
    let logs = layout.root.path().join("logs");

    layout
        .cmd()
        .env_remove("LOG_OUTPUT")
        .env_remove("LOG_LEVEL")
        .env_remove("RUST_LOG")
        .arg("--log-dir")
        .arg(&logs)
        .assert()
        .code(1);
    assert!(log_text(&logs).contains("Transfer failed"));

    fs::remove_dir_all(&layout.source).unwrap();
    let logs = layout.root.path().join("logs-config");
    layout
        .cmd()
        .env_remove("LOG_OUTPUT")
        .env_remove("LOG_LEVEL")
        .env_remove("RUST_LOG")
        .arg("--log-dir")
        .arg(&logs)
        .assert()
        .code(1);

    let text = log_text(&logs);
    assert!(text.contains("Command failed"));
    assert!(text.contains("Invalid source directory"));
}
