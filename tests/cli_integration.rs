//! Integration tests for the devpulse CLI
//!
//! These tests exercise the full CLI workflow using a temporary database.
//! They verify that commands work end-to-end without mocking.

use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

/// Helper to run devpulse CLI with a specific database path
fn run_devpulse(args: &[&str], db_path: &PathBuf) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_devpulse"))
        .args(args)
        .env("DEVPULSE_DB_PATH", db_path)
        .output()
        .expect("Failed to execute devpulse")
}

/// Helper to get stdout as string
fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Helper to get stderr as string
fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Write a payload file and ingest it, asserting success.
fn ingest(dir: &TempDir, db_path: &PathBuf, name: &str, payload: &str) {
    let path = dir.path().join(name);
    std::fs::write(&path, payload).expect("write payload");
    let output = run_devpulse(&["ingest", path.to_str().unwrap()], db_path);
    assert!(
        output.status.success(),
        "ingest {} failed: {}",
        name,
        stderr(&output)
    );
}

fn seed_commits(dir: &TempDir, db_path: &PathBuf) {
    ingest(
        dir,
        db_path,
        "c1.json",
        r#"{
            "commit_id": "c1",
            "message": "Fix(login): resolve crash",
            "developer_name": "ada",
            "developer_email": "ada@example.com",
            "team_name": "core",
            "type": "develop",
            "evaluation": {"total": 10.0, "complexity": 3.0, "volume": 3.0, "thinking": 2.0, "others": 2.0},
            "lines_added": 120,
            "lines_deleted": 30,
            "work_hours": 4.0,
            "ai_driven_minutes": 80,
            "agent_hash": "hash-a"
        }"#,
    );
    ingest(
        dir,
        db_path,
        "c2.json",
        r#"{
            "commit_id": "c2",
            "message": "feat: weekly rollups",
            "developer_name": "ada",
            "developer_email": "ada@example.com",
            "team_name": "infra",
            "type": "develop",
            "evaluation": {"total": 6.0, "complexity": 2.0, "volume": 2.0, "thinking": 1.0, "others": 1.0},
            "lines_added": 40,
            "lines_deleted": 5,
            "work_hours": 2.0,
            "ai_driven_minutes": 40,
            "agent_hash": "hash-a"
        }"#,
    );
    ingest(
        dir,
        db_path,
        "c3.json",
        r#"{
            "commit_id": "c3",
            "message": "sprint planning",
            "developer_name": "bob",
            "team_name": "core",
            "type": "meeting",
            "work_hours": 1.5
        }"#,
    );
    // No type field: reads as develop
    ingest(
        dir,
        db_path,
        "c4.json",
        r#"{
            "commit_id": "c4",
            "message": "docs: architecture notes",
            "developer_name": "bob",
            "team_name": "core",
            "work_hours": 1.0,
            "agent_hash": "hash-b"
        }"#,
    );
}

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_devpulse"))
        .arg("--help")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("devpulse"));
    assert!(out.contains("productivity"));
}

#[test]
fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_devpulse"))
        .arg("--version")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("devpulse"));
}

// =============================================================================
// Shell Completion Tests
// =============================================================================

#[test]
fn test_completion_zsh() {
    let output = Command::new(env!("CARGO_BIN_EXE_devpulse"))
        .args(["completion", "zsh"])
        .output()
        .expect("Failed to execute");

    assert!(
        output.status.success(),
        "completion zsh failed: {}",
        stderr(&output)
    );
    assert!(
        stdout(&output).contains("#compdef devpulse"),
        "zsh completion should contain #compdef"
    );
}

#[test]
fn test_completion_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_devpulse"))
        .args(["completion", "bash"])
        .output()
        .expect("Failed to execute");

    assert!(
        output.status.success(),
        "completion bash failed: {}",
        stderr(&output)
    );
    assert!(
        stdout(&output).contains("_devpulse"),
        "bash completion should contain _devpulse function"
    );
}

// =============================================================================
// Ingestion Tests
// =============================================================================

#[test]
fn test_ingest_and_summary_json() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");
    seed_commits(&dir, &db_path);

    let output = run_devpulse(&["summary", "--json"], &db_path);
    assert!(output.status.success(), "summary failed: {}", stderr(&output));
    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();

    let stats = &summary["stats"];
    assert_eq!(stats["total_commits"], 4);
    assert_eq!(stats["commits_by_type"]["develop"], 3);
    assert_eq!(stats["commits_by_type"]["meeting"], 1);
    assert_eq!(stats["commits_by_type"]["chore"], 0);

    // develop hours 4+2+1=7, ai minutes 80+40=120: (7*60/120)*100 = 350
    assert!((stats["productivity"].as_f64().unwrap() - 350.0).abs() < 1e-6);

    // lines from the develop partition only
    assert_eq!(stats["total_lines_added"], 160);
    assert_eq!(stats["total_lines_deleted"], 35);

    // all commits landed today, so one distinct day
    assert_eq!(summary["day_count"], 1);

    // prefix buckets: Fix( + feat: + docs: over develop commits
    assert_eq!(stats["prefix_counts"]["fix"], 1);
    assert_eq!(stats["prefix_counts"]["feat"], 1);
    assert_eq!(stats["prefix_counts"]["docs"], 1);
}

#[test]
fn test_duplicate_commit_id_fails_second_time() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");

    let payload = r#"{
        "commit_id": "dup-1",
        "message": "update",
        "developer_name": "ada",
        "team_name": "core"
    }"#;
    let path = dir.path().join("dup.json");
    std::fs::write(&path, payload).unwrap();

    let first = run_devpulse(&["ingest", path.to_str().unwrap()], &db_path);
    assert!(first.status.success(), "first insert: {}", stderr(&first));

    let second = run_devpulse(&["ingest", path.to_str().unwrap()], &db_path);
    assert!(!second.status.success(), "second insert should fail");
    assert!(
        stderr(&second).to_lowercase().contains("duplicate"),
        "expected constraint violation, got: {}",
        stderr(&second)
    );

    // Exactly one row survives
    let output = run_devpulse(&["summary", "--json"], &db_path);
    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["stats"]["total_commits"], 1);
}

#[test]
fn test_ingest_rejects_missing_required_fields() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");

    let payload = r#"{
        "commit_id": "x1",
        "message": "update",
        "developer_name": "ada"
    }"#;
    let path = dir.path().join("bad.json");
    std::fs::write(&path, payload).unwrap();

    let output = run_devpulse(&["ingest", path.to_str().unwrap()], &db_path);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("team_name"));

    // Rejected before any write
    let output = run_devpulse(&["summary", "--json"], &db_path);
    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["stats"]["total_commits"], 0);
}

// =============================================================================
// View Tests
// =============================================================================

#[test]
fn test_developers_json_rolls_up_across_teams() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");
    seed_commits(&dir, &db_path);

    let output = run_devpulse(&["developers", "--json"], &db_path);
    assert!(output.status.success());
    let developers: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();

    let ada = developers
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["name"] == "ada")
        .expect("ada present");
    // ada committed under both core and infra; the roll-up spans both
    assert_eq!(ada["stats"]["total_commits"], 2);
    assert_eq!(ada["stats"]["ai_driven_minutes"], 120);
}

#[test]
fn test_teams_json_groups_by_commit_team() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");
    seed_commits(&dir, &db_path);

    let output = run_devpulse(&["teams", "--json"], &db_path);
    assert!(output.status.success());
    let teams: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let teams = teams.as_array().unwrap();

    let core = teams.iter().find(|t| t["name"] == "core").unwrap();
    let infra = teams.iter().find(|t| t["name"] == "infra").unwrap();

    // ada's default team is core, but c2 was committed under infra
    assert_eq!(core["stats"]["total_commits"], 3);
    assert_eq!(infra["stats"]["total_commits"], 1);

    // Team-scoped entry for ada under infra covers only that subset
    let ada_infra = infra["developers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["name"] == "ada")
        .unwrap();
    assert_eq!(ada_infra["stats"]["total_commits"], 1);
}

#[test]
fn test_anomalies_json_majority_vote() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");
    seed_commits(&dir, &db_path);

    let output = run_devpulse(&["anomalies", "--json"], &db_path);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();

    // hash-a:2, hash-b:1 (the meeting commit is untagged)
    assert_eq!(report["total_commits"], 3);
    assert_eq!(report["expected_hash"], "hash-a");
    assert_eq!(report["normal_count"], 2);
    assert_eq!(report["anomaly_count"], 1);
}

#[test]
fn test_anomalies_json_with_no_tagged_commits() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");
    ingest(
        &dir,
        &db_path,
        "plain.json",
        r#"{"commit_id": "p1", "message": "update", "developer_name": "ada", "team_name": "core"}"#,
    );

    let output = run_devpulse(&["anomalies", "--json"], &db_path);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["total_commits"], 0);
    assert!(report["hashes"].as_array().unwrap().is_empty());
}

// =============================================================================
// HTTP Endpoint Tests
// =============================================================================

/// Kills the spawned server when a test ends.
struct ServerGuard {
    child: Child,
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("local addr")
        .port()
}

/// Spawn `devpulse serve` on a free port and wait for the listener.
fn start_server(dir: &TempDir, db_path: &PathBuf, api_key: Option<&str>) -> (ServerGuard, u16) {
    let port = free_port();
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_devpulse"));
    cmd.args(["serve", "--port", &port.to_string()])
        .env("DEVPULSE_DB_PATH", db_path)
        // Run from the temp dir so no config.toml is picked up by the
        // upward walk; the key comes in via the env override
        .current_dir(dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    match api_key {
        Some(key) => {
            cmd.env("DEVPULSE_API_KEY", key);
        }
        None => {
            cmd.env_remove("DEVPULSE_API_KEY");
        }
    }
    let child = cmd.spawn().expect("spawn devpulse serve");
    let guard = ServerGuard { child };

    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return (guard, port);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("server did not start on port {}", port);
}

fn post_commit(
    port: u16,
    api_key: Option<&str>,
    body: &str,
) -> Result<ureq::Response, ureq::Error> {
    let url = format!("http://127.0.0.1:{}/api/commits", port);
    let mut request = ureq::post(&url);
    if let Some(key) = api_key {
        request = request.set("X-Api-Key", key);
    }
    request.send_string(body)
}

fn get_json(port: u16, path: &str) -> serde_json::Value {
    let url = format!("http://127.0.0.1:{}{}", port, path);
    let body = ureq::get(&url)
        .call()
        .expect("GET should succeed")
        .into_string()
        .expect("read body");
    serde_json::from_str(&body).expect("valid JSON")
}

fn status_of(err: ureq::Error) -> u16 {
    match err {
        ureq::Error::Status(code, _) => code,
        other => panic!("expected an HTTP status error, got: {}", other),
    }
}

#[test]
fn test_http_ingest_api_key_guard() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");
    let (_server, port) = start_server(&dir, &db_path, Some("k-test-1"));

    let ada = r#"{"commit_id": "h1", "message": "feat: endpoint", "developer_name": "ada", "team_name": "core"}"#;

    // Missing and wrong keys are rejected with 401
    let err = post_commit(port, None, ada).expect_err("missing key must be rejected");
    assert_eq!(status_of(err), 401);
    let err = post_commit(port, Some("wrong-key"), ada).expect_err("wrong key must be rejected");
    assert_eq!(status_of(err), 401);

    // Rejected before any write: the store is still empty
    let output = run_devpulse(&["summary", "--json"], &db_path);
    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["stats"]["total_commits"], 0);

    // Exact key match lands the row
    let response = post_commit(port, Some("k-test-1"), ada).expect("correct key accepted");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value =
        serde_json::from_str(&response.into_string().unwrap()).unwrap();
    assert_eq!(body["ok"], true);

    // Same commit_id again over HTTP: constraint violation surfaces as 409
    let err = post_commit(port, Some("k-test-1"), ada).expect_err("duplicate must be rejected");
    assert_eq!(status_of(err), 409);

    let summary = get_json(port, "/api/summary");
    assert_eq!(summary["ok"], true);
    assert_eq!(summary["data"]["stats"]["total_commits"], 1);
}

#[test]
fn test_http_developers_order_matches_cli() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");
    let (_server, port) = start_server(&dir, &db_path, Some("k-test-2"));

    for (id, dev) in [("o1", "bob"), ("o2", "ada"), ("o3", "ada")] {
        let payload = format!(
            r#"{{"commit_id": "{}", "message": "update", "developer_name": "{}", "team_name": "core"}}"#,
            id, dev
        );
        post_commit(port, Some("k-test-2"), &payload).expect("accepted");
    }

    // Busiest first on both surfaces
    let developers = get_json(port, "/api/developers");
    let data = developers["data"].as_array().unwrap();
    assert_eq!(data[0]["name"], "ada");
    assert_eq!(data[1]["name"], "bob");

    let output = run_devpulse(&["developers", "--json"], &db_path);
    let cli: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(cli[0]["name"], "ada");
    assert_eq!(cli[1]["name"], "bob");
}

#[test]
fn test_http_ingest_disabled_without_api_key() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");
    let (_server, port) = start_server(&dir, &db_path, None);

    let payload = r#"{"commit_id": "n1", "message": "update", "developer_name": "ada", "team_name": "core"}"#;
    let err = post_commit(port, Some("any-key"), payload)
        .expect_err("ingestion must be disabled with no key configured");
    assert_eq!(status_of(err), 503);
}

// =============================================================================
// Date Window Tests
// =============================================================================

#[test]
fn test_future_window_filters_everything_out() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");
    seed_commits(&dir, &db_path);

    let output = run_devpulse(
        &["summary", "--start", "2099-01-01", "--end", "2099-01-31", "--json"],
        &db_path,
    );
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["stats"]["total_commits"], 0);
    // The day-count floor keeps daily averages defined on an empty window
    assert_eq!(summary["day_count"], 1);
    assert_eq!(summary["stats"]["productivity"], 0.0);
}

#[test]
fn test_malformed_date_is_a_clean_error() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("devpulse.db");

    let output = run_devpulse(&["summary", "--start", "last-tuesday"], &db_path);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("YYYY-MM-DD"));
}
