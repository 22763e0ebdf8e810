//! E2E CLI lifecycle tests.
//!
//! Each test runs the `cairn` binary as a subprocess in an isolated temp
//! directory and drives the loop the way an agent would:
//! init -> spec -> add -> next -> done -> accept/reject, plus issues,
//! decomposition, and the JSON error contract.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the cairn binary, rooted in `dir`.
fn cairn(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cairn"));
    cmd.current_dir(dir);
    // Keep tracing output off stderr so error JSON parses cleanly.
    cmd.env("CAIRN_LOG", "error");
    cmd
}

fn json_of(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("cairn should not crash");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

fn error_json_of(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("cairn should not crash");
    assert!(!output.status.success(), "command unexpectedly succeeded");
    serde_json::from_slice(&output.stderr).expect("errors in --json mode are JSON on stderr")
}

fn init_project(dir: &Path) {
    cairn(dir).args(["init", "--spec", "spec.md"]).assert().success();
}

fn add_task(dir: &Path, name: &str, extra: &[&str]) -> String {
    let mut cmd = cairn(dir);
    cmd.args([
        "add",
        "--name",
        name,
        "--notes",
        "see src/foo.py lines 10-20, change the loop bound",
        "--accept",
        "pytest tests/test_foo.py passes",
        "--json",
    ])
    .args(extra);
    json_of(&mut cmd)["id"]
        .as_str()
        .expect("add output should have 'id' field")
        .to_string()
}

fn stage(dir: &Path) -> String {
    json_of(cairn(dir).args(["stage", "--json"]))["stage"]
        .as_str()
        .expect("stage field")
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn commands_before_init_fail_with_not_initialized() {
    let tmp = TempDir::new().unwrap();
    let err = error_json_of(cairn(tmp.path()).args(["status", "--json"]));
    assert_eq!(err["error"]["error_code"], "E1001");
    assert!(err["error"]["suggestion"].as_str().unwrap().contains("cairn init"));
}

#[test]
fn init_creates_ledger_and_config() {
    let tmp = TempDir::new().unwrap();
    cairn(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));
    assert!(tmp.path().join(".cairn/ledger.jsonl").is_file());
    assert!(tmp.path().join(".cairn/config.toml").is_file());

    cairn(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
    assert_eq!(stage(tmp.path()), "PLAN");
}

#[test]
fn build_verify_complete_loop() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    init_project(dir);
    assert_eq!(stage(dir), "COMPLETE");

    let a = add_task(dir, "Fix loop bound", &[]);
    let b = add_task(dir, "Cover empty input", &["--dep", a.as_str()]);
    assert_eq!(stage(dir), "BUILD");

    let next = json_of(cairn(dir).args(["next", "--json"]));
    assert_eq!(next["id"], a.as_str());

    cairn(dir).arg("done").assert().success();
    assert_eq!(stage(dir), "BUILD");
    cairn(dir).arg("accept").assert().success();

    cairn(dir).args(["done", b.as_str()]).assert().success();
    assert_eq!(stage(dir), "VERIFY");
    cairn(dir)
        .args(["accept", b.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Accepted {b}")));
    assert_eq!(stage(dir), "COMPLETE");

    let status = json_of(cairn(dir).args(["status", "--history", "--json"]));
    assert_eq!(status["counts"]["accepted"], 2);
    assert_eq!(status["accepted"].as_array().unwrap().len(), 2);
}

#[test]
fn validation_failure_lists_every_violation() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());

    let err = error_json_of(cairn(tmp.path()).args([
        "add", "--name", "Fix", "--notes", "fix bug", "--accept", "works", "--json",
    ]));
    assert_eq!(err["error"]["error_code"], "E2001");
    let codes: Vec<&str> = err["error"]["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["code"].as_str().unwrap())
        .collect();
    assert!(codes.contains(&"NAME_TOO_SHORT"));
    assert!(codes.contains(&"NOTES_TOO_SHORT"));
    assert!(codes.contains(&"ACCEPT_VAGUE"));

    // Nothing was recorded.
    let tasks = json_of(cairn(tmp.path()).args(["list", "--json"]));
    assert!(tasks.as_array().unwrap().is_empty());
}

#[test]
fn check_is_a_dry_run() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());

    cairn(tmp.path())
        .args([
            "check",
            "--name",
            "Fix loop bound",
            "--notes",
            "see src/foo.py lines 10-20, change the loop bound",
            "--accept",
            "pytest tests/test_foo.py passes",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("would be accepted"));

    cairn(tmp.path())
        .args(["check", "--name", "Fix loop bound", "--notes", "fix bug", "--accept", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NOTES_TOO_SHORT"));

    let tasks = json_of(cairn(tmp.path()).args(["list", "--json"]));
    assert!(tasks.as_array().unwrap().is_empty());
}

#[test]
fn reject_returns_task_to_build_with_reason() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    init_project(dir);
    let id = add_task(dir, "Fix loop bound", &[]);
    cairn(dir).arg("done").assert().success();

    let rejected = json_of(cairn(dir).args([
        "reject",
        "--reason",
        "pytest tests/test_foo.py fails on empty input",
        "--json",
    ]));
    assert_eq!(rejected["id"], id.as_str());
    assert_eq!(rejected["reject_count"], 1);
    assert_eq!(rejected["escalated"], false);

    let next = json_of(cairn(dir).args(["next", "--json"]));
    assert_eq!(next["reject_reason"], "pytest tests/test_foo.py fails on empty input");
    assert_eq!(stage(dir), "BUILD");
}

#[test]
fn accept_on_pending_task_is_an_invalid_transition() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let id = add_task(tmp.path(), "Fix loop bound", &[]);

    let err = error_json_of(cairn(tmp.path()).args(["accept", id.as_str(), "--json"]));
    assert_eq!(err["error"]["error_code"], "E2003");
}

#[test]
fn cycles_and_dangling_deps_are_refused() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());

    let mut cmd = cairn(tmp.path());
    cmd.args([
        "add",
        "--name",
        "Fix loop bound",
        "--notes",
        "see src/foo.py lines 10-20, change the loop bound",
        "--accept",
        "pytest tests/test_foo.py passes",
        "--dep",
        "t-deadbeef",
        "--json",
    ]);
    assert_eq!(error_json_of(&mut cmd)["error"]["error_code"], "E2004");
}

#[test]
fn issue_drives_investigate_until_resolved() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    init_project(dir);
    add_task(dir, "Fix loop bound", &[]);

    let issue = json_of(cairn(dir).args([
        "issue",
        "add",
        "--desc",
        "pytest crashes on import after the loop change",
        "--priority",
        "high",
        "--json",
    ]));
    let issue_id = issue["id"].as_str().unwrap().to_string();
    assert!(issue_id.starts_with("i-"));
    assert_eq!(stage(dir), "INVESTIGATE");

    add_task(dir, "Fix import crash", &["--from-issue", issue_id.as_str()]);
    let resolved = json_of(cairn(dir).args(["issue", "resolve", "--json"]));
    assert_eq!(resolved["resolved"], 1);
    assert_eq!(stage(dir), "BUILD");
}

#[test]
fn kill_then_decompose_from_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    init_project(dir);
    let big = add_task(dir, "Rewrite the parser", &[]);

    cairn(dir)
        .args(["kill", big.as_str(), "--reason", "context limit"])
        .assert()
        .success();
    assert_eq!(stage(dir), "DECOMPOSE");

    let kids = dir.join("kids.json");
    std::fs::write(
        &kids,
        r#"[{"name":"Split lexer","notes":"lexer half","accept":"cargo test lexer"},
            {"name":"Split grammar","notes":"grammar half","accept":"cargo test grammar"}]"#,
    )
    .unwrap();
    let out = json_of(cairn(dir).args(["decompose", big.as_str(), "--from", "kids.json", "--json"]));
    assert_eq!(out["children"].as_array().unwrap().len(), 2);
    assert_eq!(stage(dir), "BUILD");

    let tasks = json_of(cairn(dir).args(["list", "--json"]));
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t["parent"] == big.as_str()));
    assert!(tasks.iter().all(|t| t["decompose_depth"] == 1));
}

#[test]
fn config_set_is_recorded_in_the_ledger() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    cairn(tmp.path())
        .args(["config", "set", "max_rejections", "5"])
        .assert()
        .success();

    let shown = json_of(cairn(tmp.path()).args(["config", "show", "--json"]));
    assert_eq!(shown["max_rejections"], 5);

    let log = json_of(cairn(tmp.path()).args(["log", "--tail", "1", "--json"]));
    assert_eq!(log["records"][0]["event"]["t"], "config");
}

#[test]
fn config_set_refuses_unknown_keys() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    let before = json_of(cairn(tmp.path()).args(["log", "--json"]));

    let err = error_json_of(cairn(tmp.path()).args(["config", "set", "max_rejectons", "5", "--json"]));
    assert_eq!(err["error"]["error_code"], "E1002");
    assert!(err["error"]["message"].as_str().unwrap().contains("max_rejections"));

    let after = json_of(cairn(tmp.path()).args(["log", "--json"]));
    assert_eq!(before["records"], after["records"]);
}

#[test]
fn dir_flag_targets_another_root() {
    let tmp = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let root = elsewhere.path().to_str().unwrap();

    cairn(tmp.path())
        .args(["--dir", root, "init", "--spec", "spec.md"])
        .assert()
        .success();
    assert!(elsewhere.path().join(".cairn/ledger.jsonl").is_file());
    assert!(!tmp.path().join(".cairn").exists());

    let out = json_of(cairn(tmp.path()).args(["stage", "--dir", root, "--json"]));
    assert_eq!(out["stage"], "COMPLETE");
}

#[test]
fn watch_reports_current_stage_once() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path());
    cairn(tmp.path())
        .args(["watch", "--interval", "10", "--count", "1", "--json"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stage\":\"COMPLETE\""));
}
