//! End-to-end CLI checks: the binary analyzes real files and emits JSON.

use assert_cmd::Command;
use std::fs;

const GUARD_ONCE: &str = r#"let greeted = false;

function greetOnce(name) {
  if (greeted) {
    return;
  }
  greeted = true;
  console.log("hello " + name);
}

greetOnce("ada");
greetOnce("grace");
"#;

fn encap() -> Command {
    Command::cargo_bin("encap").expect("binary builds")
}

#[test]
fn analyze_emits_a_json_report() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.js"), GUARD_ONCE).unwrap();

    let output = encap()
        .arg("analyze")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tool"], "encap");
    let matches = &json["report"]["analyzed"][0]["matches"];
    assert_eq!(matches[0]["kind"], "guard-once");
}

#[test]
fn analyze_fails_on_empty_directories() {
    let dir = tempfile::tempdir().unwrap();
    encap().arg("analyze").arg(dir.path()).assert().failure();
}

#[test]
fn apply_with_write_rewrites_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("app.js");
    fs::write(&file, GUARD_ONCE).unwrap();

    encap()
        .arg("apply")
        .arg(&file)
        .arg("--write")
        .assert()
        .success();

    let rewritten = fs::read_to_string(&file).unwrap();
    assert!(rewritten.contains("function createGreeted()"));
    assert!(rewritten.contains("greetedState.greetOnce(\"ada\");"));
}

#[test]
fn plan_reports_blocked_outcomes_for_exports() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("api.js");
    fs::write(
        &file,
        r#"let warned = false;

export function warnOnce() {
  if (warned) {
    return;
  }
  warned = true;
  console.warn("deprecated entry point");
}

warnOnce();
warnOnce();
"#,
    )
    .unwrap();

    let output = encap().arg("plan").arg(&file).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["report"][0]["outcome"], "blocked");
}

#[test]
fn init_writes_a_default_config() {
    let dir = tempfile::tempdir().unwrap();
    encap()
        .arg("init")
        .current_dir(dir.path())
        .assert()
        .success();

    let config = fs::read_to_string(dir.path().join(".encap.toml")).unwrap();
    assert!(config.contains("[catalog]"));
    assert!(config.contains("guard-once"));

    // refuses to clobber without --force
    encap()
        .arg("init")
        .current_dir(dir.path())
        .assert()
        .failure();
}
