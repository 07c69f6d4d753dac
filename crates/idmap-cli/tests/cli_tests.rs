//! CLI integration tests
//!
//! Drive the `idmap` binary against a temporary database file.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn db_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("cli.db")
}

fn idmap(temp_dir: &TempDir, args: &[&str]) -> Output {
    let cli_bin = env!("CARGO_BIN_EXE_idmap");
    let db = db_path(temp_dir);
    Command::new(cli_bin)
        .current_dir(temp_dir.path())
        .env_remove("IDMAP_DATABASE_PATH")
        .args(["--db", db.to_str().unwrap()])
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_cli_runs_every_scenario() {
    let temp_dir = TempDir::new().unwrap();

    let output = idmap(&temp_dir, &["scenario", "all"]);

    assert!(
        output.status.success(),
        "scenarios should pass. Stdout: {} Stderr: {}",
        stdout(&output),
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    for name in [
        "stale-read",
        "no-tracking",
        "new-session",
        "overwrite",
        "reload",
        "refresh",
        "detach",
        "database-values",
    ] {
        assert!(text.contains(name), "missing scenario {} in output", name);
    }
    assert!(!text.contains("[FAIL]"));
}

#[test]
fn test_cli_scenario_json_output() {
    let temp_dir = TempDir::new().unwrap();

    let output = idmap(&temp_dir, &["--json", "scenario", "stale-read"]);
    assert!(output.status.success());

    let observations: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let observations = observations.as_array().unwrap();
    assert!(!observations.is_empty());
    assert!(observations
        .iter()
        .all(|o| o["scenario"] == "stale-read" && o["passed"] == true));
    assert!(observations
        .iter()
        .any(|o| o["check"] == "cached read after external rename" && o["actual"] == "Sue"));
}

#[test]
fn test_cli_customer_add_list_delete() {
    let temp_dir = TempDir::new().unwrap();

    let added = idmap(&temp_dir, &["customer", "add", "Sue", "--state", "VA"]);
    assert!(added.status.success());
    let id = stdout(&added).trim().to_string();
    assert!(id.parse::<i64>().is_ok());

    idmap(&temp_dir, &["customer", "add", "Jim"]);

    let listed = idmap(&temp_dir, &["customer", "list", "--state", "VA"]);
    let text = stdout(&listed);
    assert!(text.contains("Sue"));
    assert!(!text.contains("Jim"));

    let deleted = idmap(&temp_dir, &["customer", "delete", &id]);
    assert!(deleted.status.success());

    let again = idmap(&temp_dir, &["customer", "delete", &id]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("ERR_NOT_FOUND"));
}

#[test]
fn test_cli_customer_list_json() {
    let temp_dir = TempDir::new().unwrap();
    idmap(&temp_dir, &["customer", "add", "Ann"]);

    let listed = idmap(&temp_dir, &["--json", "customer", "list", "--no-state"]);
    let customers: serde_json::Value = serde_json::from_str(&stdout(&listed)).unwrap();
    assert_eq!(customers[0]["name"], "Ann");
    assert!(customers[0]["state"].is_null());
}

#[test]
fn test_cli_rejects_invalid_customer() {
    let temp_dir = TempDir::new().unwrap();
    let output = idmap(&temp_dir, &["customer", "add", ""]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERR_VALIDATION"));
}
