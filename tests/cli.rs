use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_fixture(dir: &Path) {
    let responses = dir.join("responses");
    fs::create_dir_all(&responses).unwrap();

    fs::write(
        responses.join("sleep.json"),
        r#"{
  "sleep_recommendations": {"target_hours": 8, "bedtime": "22:30", "wake_time": "06:30"},
  "recovery_status": "poor",
  "confidence": 0.85,
  "reasoning": "Short nights all week"
}"#,
    )
    .unwrap();

    fs::write(
        responses.join("fitness.json"),
        r#"{
  "workout_plan": {
    "intensity": "high",
    "sessions": [
      {"day": "Monday", "type": "Intervals", "duration_minutes": 45},
      {"day": "Thursday", "type": "Tempo run", "duration_minutes": 40}
    ]
  },
  "energy_demand": "high",
  "confidence": 0.9,
  "reasoning": "Build aerobic capacity"
}"#,
    )
    .unwrap();

    let config = format!(
        r#"timeout_sec: 5
session_deadline_sec: 30
report_dir: {reports}
retry:
  max_attempts: 1
  backoff_base_ms: 1
providers:
  scripted:
    responses_dir: {responses}
domains:
  sleep: {{provider: scripted}}
  nutrition: {{provider: scripted}}
  fitness: {{provider: scripted}}
  mental_wellness: {{provider: scripted}}
store:
  dir: {store}
"#,
        reports = dir.join("reports").display(),
        responses = responses.display(),
        store = dir.join("store").display(),
    );
    fs::write(dir.join("wellsync.yaml"), config).unwrap();

    fs::write(
        dir.join("user.yaml"),
        r#"user_profile:
  user_id: u-42
  age: 34
  goals: [endurance]
recent_data:
  sleep_hours: [6.5, 6.0, 7.0]
  stress_level: 4
"#,
    )
    .unwrap();
}

fn session_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("session: "))
        .unwrap()
        .trim()
        .to_string()
}

#[test]
fn test_cli_help() {
    let mut cmd = cargo_bin_cmd!("wellsync");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("replay"))
        .stdout(predicate::str::contains("schema"));
}

#[test]
fn test_schema_describes_config() {
    let mut cmd = cargo_bin_cmd!("wellsync");
    cmd.arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("session_deadline_sec"))
        .stdout(predicate::str::contains("circuit_breaker"));
}

#[test]
fn test_schema_written_to_file() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("nested").join("wellsync.schema.json");

    let mut cmd = cargo_bin_cmd!("wellsync");
    cmd.args(["schema", "--output"]).arg(&target).assert().success();

    let schema: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
    assert!(schema["properties"]["store"].is_object());
}

#[test]
fn test_dry_run_lists_domains_and_constraints() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());

    let mut cmd = cargo_bin_cmd!("wellsync");
    cmd.args(["run", "--dry-run", "--config"])
        .arg(dir.path().join("wellsync.yaml"))
        .arg("--input")
        .arg(dir.path().join("user.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution Plan"))
        .stdout(predicate::str::contains("mental_wellness (scripted)"))
        .stdout(predicate::str::contains("calorie_bounds"));

    assert!(!dir.path().join("store").exists());
}

#[test]
fn test_run_commits_and_replays() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());

    let mut cmd = cargo_bin_cmd!("wellsync");
    let output = cmd
        .arg("run")
        .arg("--config")
        .arg(dir.path().join("wellsync.yaml"))
        .arg("--input")
        .arg(dir.path().join("user.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("state: COMMITTED"))
        .stdout(predicate::str::contains("trade-offs"))
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let id = session_id(&stdout);

    let session_dir = dir.path().join("reports").join(&id);
    let plan: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(session_dir.join("plan.json")).unwrap()).unwrap();
    assert_eq!(
        plan["per_domain_content"]["fitness"]["workout_plan"]["intensity"],
        "moderate"
    );
    let trade_offs = plan["trade_offs"].as_array().unwrap();
    assert!(trade_offs
        .iter()
        .any(|t| t["constraint_violated"] == "overtraining_safety"));
    assert_eq!(plan["safety_validated"], true);

    let report = fs::read_to_string(session_dir.join("plan.md")).unwrap();
    assert!(report.contains("overtraining_safety"));
    assert!(session_dir.join("summary.json").exists());

    let mut cmd = cargo_bin_cmd!("wellsync");
    cmd.arg("replay")
        .arg("--store")
        .arg(dir.path().join("store"))
        .arg(&id)
        .assert()
        .success()
        .stdout(predicate::str::contains("snapshot"))
        .stdout(predicate::str::contains("SAFETY_CHECKED -> COMMITTED"))
        .stdout(predicate::str::contains("fitness rewritten"));
}

#[test]
fn test_replay_unknown_session_fails() {
    let dir = TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("wellsync");
    cmd.arg("replay")
        .arg("--store")
        .arg(dir.path())
        .arg("00000000-0000-0000-0000-000000000000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No records"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    fs::write(dir.path().join("bad.yaml"), "fallback_confidence: 2.0\n").unwrap();

    let mut cmd = cargo_bin_cmd!("wellsync");
    cmd.arg("run")
        .arg("--config")
        .arg(dir.path().join("bad.yaml"))
        .arg("--input")
        .arg(dir.path().join("user.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("fallback_confidence"));
}
