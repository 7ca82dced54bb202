#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn acceptance(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("acceptance").unwrap();
    cmd.current_dir(dir.path())
        .env("ACCEPTANCE_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Hybrid logging and no retry backoff so failing runs stay fast.
fn fast_config(dir: &TempDir) {
    write(
        dir,
        ".acceptance/config.yaml",
        "skill: crud-scaffold\ntransport:\n  mode: hybrid\nexecutor:\n  retry_backoff_ms: 0\n  max_attempts: 2\n",
    );
}

fn relay_lines(dir: &TempDir) -> Vec<serde_json::Value> {
    std::fs::read_to_string(dir.path().join(".acceptance/logs/relay.jsonl"))
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// init / config
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_starter_plan() {
    let dir = TempDir::new().unwrap();
    acceptance(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .acceptance/plan.yaml"));

    assert!(dir.path().join(".acceptance/config.yaml").exists());
    assert!(dir.path().join(".acceptance/plan.yaml").exists());
    assert!(dir.path().join(".acceptance/logs").is_dir());
    assert!(dir.path().join(".acceptance/reports").is_dir());
}

#[test]
fn init_is_idempotent_and_keeps_edits() {
    let dir = TempDir::new().unwrap();
    acceptance(&dir).arg("init").assert().success();
    write(&dir, ".acceptance/plan.yaml", "suites: []\n");
    acceptance(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .acceptance/plan.yaml"));
    let plan = std::fs::read_to_string(dir.path().join(".acceptance/plan.yaml")).unwrap();
    assert_eq!(plan, "suites: []\n");
}

#[test]
fn config_validate_default_is_clean() {
    let dir = TempDir::new().unwrap();
    acceptance(&dir).arg("init").assert().success();
    acceptance(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_validate_rejects_bad_threshold() {
    let dir = TempDir::new().unwrap();
    write(&dir, ".acceptance/config.yaml", "gate:\n  pass_rate_threshold: 1.5\n");
    acceptance(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] gate.pass_rate_threshold"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn config_validate_without_init_fails() {
    let dir = TempDir::new().unwrap();
    acceptance(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn config_show_json_accepts_camel_case_fallback_key() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        ".acceptance/config.yaml",
        "transport:\n  mode: json\n  fallbackToRealtimeOnJsonError: true\n",
    );
    let out = acceptance(&dir)
        .args(["--json", "config", "show"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["transport"]["mode"], "json");
    assert_eq!(v["transport"]["fallback_to_realtime_on_json_error"], true);
    assert_eq!(v["executor"]["max_attempts"], 5);
}

// ---------------------------------------------------------------------------
// preflight
// ---------------------------------------------------------------------------

#[test]
fn preflight_reports_missing_file_and_exits_nonzero() {
    let mut server = mockito::Server::new();
    let _health = server.mock("GET", "/health").with_status(200).create();

    let dir = TempDir::new().unwrap();
    write(
        &dir,
        ".acceptance/config.yaml",
        &format!(
            "preflight:\n  required_files: [frontend/package.json]\n  required_endpoints: [\"{}/health\"]\n",
            server.url()
        ),
    );
    acceptance(&dir)
        .arg("preflight")
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing file:  frontend/package.json"))
        .stderr(predicate::str::contains("preflight failed with 1 issue(s)"));

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(".acceptance/reports/preflight.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["pass"], false);
    assert_eq!(report["missing_files"][0], "frontend/package.json");
    assert_eq!(report["endpoint_issues"].as_array().unwrap().len(), 0);
}

#[test]
fn preflight_passes_when_everything_is_present() {
    let dir = TempDir::new().unwrap();
    write(&dir, "frontend/package.json", "{}");
    write(
        &dir,
        ".acceptance/config.yaml",
        "preflight:\n  required_files: [frontend/package.json]\n",
    );
    acceptance(&dir)
        .arg("preflight")
        .assert()
        .success()
        .stdout(predicate::str::contains("Preflight passed."));
}

// ---------------------------------------------------------------------------
// run / report / log
// ---------------------------------------------------------------------------

fn http_plan() -> &'static str {
    r#"
base_url: http://localhost:1
documents:
  requirements: docs/requirements.md
suites:
  - name: auth
    groups:
      - name: login
        test_points:
          - id: API-AUTH-002-login-valid
            covers: [AC-001-01]
            action:
              type: http
              method: POST
              path: /api/auth/login
              body: { username: admin, password: admin123 }
              expect_code: 0
              save: { token: /data/token }
          - id: API-USER-001-list
            covers: [AC-002-01]
            action:
              type: http
              path: /api/users
              headers: { Authorization: "Bearer ${token}" }
              expect_code: 0
"#
}

fn mock_backend(server: &mut mockito::Server) -> Vec<mockito::Mock> {
    vec![
        server
            .mock("POST", "/api/auth/login")
            .with_status(200)
            .with_body(r#"{"code":0,"message":"ok","data":{"token":"t1"}}"#)
            .create(),
        server
            .mock("GET", "/api/users")
            .match_header("authorization", "Bearer t1")
            .with_status(200)
            .with_body(r#"{"code":0,"message":"ok","data":[]}"#)
            .create(),
    ]
}

#[test]
fn run_against_healthy_backend_passes() {
    let mut server = mockito::Server::new();
    let _mocks = mock_backend(&mut server);

    let dir = TempDir::new().unwrap();
    fast_config(&dir);
    write(&dir, ".acceptance/plan.yaml", http_plan());
    write(&dir, "docs/requirements.md", "- AC-001-01 login\n- AC-002-01 list users\n");

    acceptance(&dir)
        .args(["run", "--base-url", &server.url(), "--change-id", "chg-42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS: 100.00%"));

    assert!(dir.path().join(".acceptance/reports/summary.json").exists());
    assert!(dir.path().join(".acceptance/reports/suites/auth.json").exists());
    let md = std::fs::read_to_string(dir.path().join(".acceptance/reports/summary.md")).unwrap();
    assert!(md.contains("**Verdict:** PASS"));

    let records = relay_lines(&dir);
    assert!(records.iter().all(|r| r["changeId"] == "chg-42"));
    assert!(records.iter().all(|r| r["skill"] == "crud-scaffold"));
    let text = std::fs::read_to_string(dir.path().join(".acceptance/logs/acceptance.log")).unwrap();
    assert_eq!(text.lines().count(), records.len());

    acceptance(&dir)
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("API-USER-001-list"))
        .stdout(predicate::str::contains("all items included=yes"));
}

#[test]
fn run_with_unmapped_requirement_fails_the_gate() {
    let mut server = mockito::Server::new();
    let _mocks = mock_backend(&mut server);

    let dir = TempDir::new().unwrap();
    fast_config(&dir);
    write(&dir, ".acceptance/plan.yaml", http_plan());
    write(&dir, "docs/requirements.md", "AC-001-01 AC-002-01 AC-003-01\n");

    acceptance(&dir)
        .args(["run", "--base-url", &server.url()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("verdict FAIL (pass rate 1"));

    acceptance(&dir)
        .arg("coverage")
        .assert()
        .failure()
        .stdout(predicate::str::contains("no test point assigned"));
}

#[test]
fn run_against_dead_backend_exhausts_retries() {
    let dir = TempDir::new().unwrap();
    fast_config(&dir);
    write(&dir, ".acceptance/plan.yaml", http_plan());
    write(&dir, "docs/requirements.md", "AC-001-01\n");

    acceptance(&dir)
        .args(["run", "--base-url", "http://127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("verdict FAIL"));

    let out = acceptance(&dir)
        .args(["--json", "log", "--status", "skip"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let skips: Vec<serde_json::Value> = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(skips.len(), 2);
    assert!(skips[0]["message"]
        .as_str()
        .unwrap()
        .starts_with("max attempts exceeded"));
    assert_eq!(skips[0]["maxAttempts"], 2);

    acceptance(&dir)
        .args(["log", "--test-point", "SUITE-AUTH"])
        .assert()
        .success()
        .stdout(predicate::str::contains("begin suite auth"))
        .stdout(predicate::str::contains("end suite auth"));
}

#[test]
fn run_aborts_on_failed_preflight() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        ".acceptance/config.yaml",
        "transport:\n  mode: json\npreflight:\n  required_files: [backend/app.py]\n",
    );
    write(&dir, ".acceptance/plan.yaml", http_plan());

    acceptance(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("run aborted"));
    assert!(!dir.path().join(".acceptance/reports/summary.json").exists());

    let records = relay_lines(&dir);
    assert!(records
        .iter()
        .any(|r| r["phase"] == "preflight" && r["level"] == "ERROR"));
}

#[test]
fn run_with_missing_plan_fails() {
    let dir = TempDir::new().unwrap();
    acceptance(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("test plan not found"));
}

#[test]
fn run_rejects_plan_with_duplicate_ids() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        ".acceptance/plan.yaml",
        r#"
suites:
  - name: s
    groups:
      - name: g
        test_points:
          - id: TP
            action: { type: shell, command: "true" }
          - id: TP
            action: { type: shell, command: "true" }
"#,
    );
    acceptance(&dir)
        .args(["run", "--skip-preflight"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("duplicate test point id 'TP'"))
        .stderr(predicate::str::contains("has errors"));
}

#[test]
fn report_without_a_run_fails() {
    let dir = TempDir::new().unwrap();
    acceptance(&dir)
        .arg("report")
        .assert()
        .failure()
        .stderr(predicate::str::contains("summary not found"));
}

#[test]
fn log_rejects_unknown_status() {
    let dir = TempDir::new().unwrap();
    acceptance(&dir)
        .args(["log", "--status", "MAYBE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown status 'MAYBE'"));
}
