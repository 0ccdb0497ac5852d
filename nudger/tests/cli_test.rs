//! CLI tests for the nudger binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Temp home with a config pointing storage into it
struct CliEnv {
    dir: TempDir,
    config: PathBuf,
}

impl CliEnv {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let data_dir = dir.path().join("data");
        let config = dir.path().join("nudger.yml");
        fs::write(
            &config,
            format!(
                "storage:\n  data-dir: {}\nhealth:\n  socket-path: {}\n",
                data_dir.display(),
                dir.path().join("nudger.sock").display()
            ),
        )
        .expect("Failed to write config");
        Self { dir, config }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("nudger").expect("binary should build");
        cmd.env("HOME", self.dir.path())
            .env("XDG_DATA_HOME", self.dir.path().join("share"))
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .arg("-c")
            .arg(&self.config);
        cmd
    }
}

#[test]
fn test_help_lists_commands() {
    let env = CliEnv::new();
    env.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("schedule"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_schedule_show_defaults() {
    let env = CliEnv::new();
    env.cmd()
        .args(["schedule", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Morning planning"))
        .stdout(predicate::str::contains("07:00"))
        .stdout(predicate::str::contains("21:00"));
}

#[test]
fn test_schedule_set_persists_override() {
    let env = CliEnv::new();
    env.cmd()
        .args(["schedule", "set", "midday", "12:30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("12:30"));

    env.cmd()
        .args(["schedule"])
        .assert()
        .success()
        .stdout(predicate::str::contains("12:30"));
}

#[test]
fn test_schedule_set_out_of_order_fails() {
    let env = CliEnv::new();
    env.cmd().args(["schedule", "set", "midday", "06:00"]).assert().failure();

    env.cmd()
        .args(["schedule", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("13:00"));
}

#[test]
fn test_schedule_remind_on_and_off() {
    let env = CliEnv::new();
    env.cmd()
        .args(["schedule", "remind", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reminders 30 min before each check-in"));

    env.cmd()
        .args(["schedule", "remind", "--off"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reminders").not());
}

#[test]
fn test_status_without_saved_state() {
    let env = CliEnv::new();
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved state yet"));
}

#[test]
fn test_health_when_not_running() {
    let env = CliEnv::new();
    env.cmd()
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn test_plan_without_state() {
    let env = CliEnv::new();
    env.cmd()
        .args(["plan", "--history", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plan yet today"))
        .stdout(predicate::str::contains("No past plans yet"));
}
