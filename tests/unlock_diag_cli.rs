use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_unlock-diag"))
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout utf8");
    serde_json::from_str(&stdout).unwrap_or_else(|err| panic!("invalid JSON ({err}): {stdout}"))
}

#[test]
fn simulate_fans_callers_into_one_attempt() {
    let output = cli()
        .args(["simulate", "--callers", "5"])
        .output()
        .expect("simulate command");

    assert!(
        output.status.success(),
        "simulate exited with {:?}",
        output.status.code()
    );
    let report = stdout_json(&output);
    assert_eq!(report["callers"], 5);
    assert_eq!(report["final_state"], "initialized");
    assert_eq!(report["platform_calls"]["resume"], 1);
    assert_eq!(report["attempts"].as_array().map(Vec::len), Some(1));

    let outcomes = report["outcomes"].as_array().expect("outcomes array");
    assert_eq!(outcomes.len(), 5);
    assert!(outcomes.iter().all(|outcome| outcome["ok"] == true));
}

#[test]
fn simulate_reports_failure_with_exit_code() {
    let output = cli()
        .args(["simulate", "--callers", "2", "--failures", "3"])
        .output()
        .expect("simulate command");

    assert_eq!(output.status.code(), Some(2));
    let report = stdout_json(&output);
    assert_eq!(report["final_state"], "failed");
    assert_eq!(report["attempts"][0]["error_code"], 5001);

    let outcomes = report["outcomes"].as_array().expect("outcomes array");
    assert!(outcomes
        .iter()
        .all(|outcome| outcome["ok"] == false && outcome["error_code"] == 5001));
}

#[test]
fn simulate_ignored_resume_falls_back_to_primer() {
    let output = cli()
        .args(["simulate", "--callers", "3", "--ignore-resume"])
        .output()
        .expect("simulate command");

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["final_state"], "initialized");
    assert_eq!(report["platform_calls"]["primer"], 1);
}

#[test]
fn config_prints_defaults_for_missing_file() {
    let missing = std::env::temp_dir().join(format!("unlock-diag-missing-{}.json", std::process::id()));

    let output = cli()
        .args(["config", "--path", missing.to_str().unwrap()])
        .output()
        .expect("config command");

    assert!(output.status.success());
    let config = stdout_json(&output);
    assert_eq!(config["coordinator"]["debounce_ms"], 1000);
    assert_eq!(config["coordinator"]["grace_ms"], 750);
    assert_eq!(config["executor"]["strategies"][2], "silent_primer");
}

#[test]
fn config_reads_overrides_from_file() {
    let path = std::env::temp_dir().join(format!("unlock-diag-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "coordinator": { "debounce_ms": 250 } }"#).expect("write config");

    let output = cli()
        .args(["config", "--path", path.to_str().unwrap()])
        .output()
        .expect("config command");
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success());
    let config = stdout_json(&output);
    assert_eq!(config["coordinator"]["debounce_ms"], 250);
    assert_eq!(config["coordinator"]["warmup_ms"], 3000);
}

#[test]
fn unknown_subcommand_fails() {
    let output = cli().arg("explode").output().expect("cli runs");
    assert!(!output.status.success());
}
