//! End-to-end checks of the `actorvm` binary: exit codes and what lands
//! on stdout and stderr for each subcommand.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[allow(deprecated)]
fn actorvm() -> Command {
    Command::cargo_bin("actorvm").unwrap()
}

/// Sample programs live in `tests/programs` at the repository root.
fn test_program(name: &str) -> PathBuf {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).parent().unwrap();
    root.join("tests/programs").join(name)
}

fn write_temp(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Assemble a text program, returning the path to the image.
fn assemble_to_temp(dir: &TempDir, text: &str) -> PathBuf {
    let input = write_temp(dir, "test.avm", text);
    let output = dir.path().join("test.avmb");
    actorvm()
        .args(["assemble", input.to_str().unwrap(), "-o", output.to_str().unwrap()])
        .assert()
        .success();
    output
}

// ---- Usage ----

#[test]
fn help_lists_commands() {
    actorvm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("assemble").and(predicate::str::contains("run")));
}

#[test]
fn unknown_command_is_a_usage_error() {
    actorvm()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("frobnicate"));
}

// ---- Assemble ----

#[test]
fn assemble_writes_image() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("guard.avmb");
    actorvm()
        .args([
            "assemble",
            test_program("guard.avm").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("assembled 39 words"));
    let bytes = fs::read(&output).unwrap();
    assert_eq!(&bytes[..4], b"AVM1");
}

#[test]
fn assemble_default_output_path() {
    let dir = TempDir::new().unwrap();
    let input = write_temp(&dir, "tiny.avm", ".actor 1 tick 0\n    enda\n");
    actorvm().args(["assemble", input.to_str().unwrap()]).assert().success();
    assert!(dir.path().join("tiny.avmb").exists());
}

#[test]
fn assemble_error_exits_1() {
    let dir = TempDir::new().unwrap();
    let input = write_temp(&dir, "bad.avm", "    jump 4\n");
    actorvm()
        .args(["assemble", input.to_str().unwrap()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("line 1: unknown opcode 'jump'"));
}

#[test]
fn assemble_missing_file_exits_1() {
    actorvm()
        .args(["assemble", "/nonexistent/guard.avm"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

// ---- Verify ----

#[test]
fn verify_text_program() {
    actorvm()
        .args(["verify", test_program("guard.avm").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK:"))
        .stdout(predicate::str::contains("39 words, 1 actor kinds, 1 events"))
        .stdout(predicate::str::contains("digest: "));
}

#[test]
fn verify_image() {
    let dir = TempDir::new().unwrap();
    let text = fs::read_to_string(test_program("beacon.avm")).unwrap();
    let image = assemble_to_temp(&dir, &text);
    actorvm()
        .args(["verify", image.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK:"));
}

#[test]
fn verify_failure_exits_2() {
    let dir = TempDir::new().unwrap();
    let image = assemble_to_temp(&dir, ".actor 1 tick 0\n    else 99\n");
    actorvm()
        .args(["verify", image.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn corrupt_image_exits_1() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.avmb");
    fs::write(&path, b"AVM1\x01\x00").unwrap();
    actorvm()
        .args(["verify", path.to_str().unwrap()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot decode"));
}

// ---- Disassemble ----

#[test]
fn disassemble_image() {
    let dir = TempDir::new().unwrap();
    let text = fs::read_to_string(test_program("guard.avm")).unwrap();
    let image = assemble_to_temp(&dir, &text);
    actorvm()
        .args(["disassemble", image.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains(".var hp actor default 3"))
        .stdout(predicate::str::contains("    addvar alarms 1"));
}

#[test]
fn disassembly_reassembles() {
    let dir = TempDir::new().unwrap();
    let text = fs::read_to_string(test_program("guard.avm")).unwrap();
    let image = assemble_to_temp(&dir, &text);
    let out = actorvm()
        .args(["disassemble", image.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    let again = assemble_to_temp(&dir, &String::from_utf8(out.stdout).unwrap());
    assert_eq!(fs::read(&image).unwrap(), fs::read(&again).unwrap());
}

// ---- Run ----

#[test]
fn run_guard_one_tick() {
    actorvm()
        .args(["run", test_program("guard.avm").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("load: 1 frames, 0 deleted"))
        .stdout(predicate::str::contains("tick 1: 1 frames, 0 deleted"))
        .stdout(predicate::str::contains("alarms = 1"))
        .stdout(predicate::str::contains("hp = 3"))
        .stdout(predicate::str::contains("Sound { id: 4 }"));
}

#[test]
fn run_beacon_with_events() {
    actorvm()
        .args([
            "run",
            test_program("beacon.avm").to_str().unwrap(),
            "--ticks",
            "4",
            "--event",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("ticks = 4"))
        .stdout(predicate::str::contains("alerts = 4"))
        .stdout(predicate::str::contains("effects: 2"));
}

#[test]
fn run_several_entities_of_a_kind() {
    actorvm()
        .args([
            "run",
            test_program("beacon.avm").to_str().unwrap(),
            "--kind",
            "20",
            "--count",
            "3",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("tick 1: 3 frames, 0 deleted"))
        .stdout(predicate::str::contains("ticks = 3"));
}

#[test]
fn run_json_report() {
    let out = actorvm()
        .args([
            "run",
            test_program("beacon.avm").to_str().unwrap(),
            "--ticks",
            "2",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["globals"]["ticks"], 2);
    assert_eq!(report["steps"].as_array().unwrap().len(), 3);
    assert_eq!(report["entities"][0]["kind"], 20);
}

#[test]
fn run_with_step_budget_config() {
    let dir = TempDir::new().unwrap();
    let config = write_temp(&dir, "config.json", r#"{ "max_steps": 1 }"#);
    actorvm()
        .args([
            "run",
            test_program("guard.avm").to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("load: 1 frames, 1 deleted"))
        .stdout(predicate::str::contains("tick 1: 0 frames, 0 deleted"));
}

#[test]
fn run_with_invalid_config_exits_1() {
    let dir = TempDir::new().unwrap();
    let config = write_temp(&dir, "config.json", r#"{ "max_steps": "lots" }"#);
    actorvm()
        .args([
            "run",
            test_program("guard.avm").to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn run_unverifiable_program_exits_2() {
    let dir = TempDir::new().unwrap();
    let input = write_temp(&dir, "bad.avm", ".actor 1 tick 0\n    setvar 4 1\n    enda\n");
    actorvm()
        .args(["run", input.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn runtime_error_exits_3() {
    let dir = TempDir::new().unwrap();
    let input = write_temp(
        &dir,
        "div.avm",
        ".var x global default 8\n.actor 1 tick 0\n    divvar x 0\n    enda\n",
    );
    actorvm()
        .args(["run", input.to_str().unwrap()])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("runtime error"));
}
