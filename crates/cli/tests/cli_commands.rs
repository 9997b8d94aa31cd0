use std::path::{Path, PathBuf};
use std::process::Command;

use chairside_protocol::{Cookie, SessionFile};
use chrono::Utc;
use serde_json::Value;

fn chairside_binary() -> PathBuf {
	let mut path = std::env::current_exe().unwrap();
	path.pop();
	path.pop();
	path.push("chairside");
	path
}

fn run_json(dir: &Path, args: &[&str]) -> (bool, Value, String) {
	let config = dir.join("chairside.json");
	let snapshot = dir.join("cookies.json");
	let output = Command::new(chairside_binary())
		.args(["-f", "json", "-c"])
		.arg(&config)
		.arg("--snapshot")
		.arg(&snapshot)
		.args(args)
		.env_remove("CHAIRSIDE_USERNAME")
		.env_remove("CHAIRSIDE_PASSWORD")
		.output()
		.expect("Failed to execute chairside");
	let stdout = String::from_utf8_lossy(&output.stdout).to_string();
	let stderr = String::from_utf8_lossy(&output.stderr).to_string();
	let json = serde_json::from_str(stdout.trim()).unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {stdout}\nstderr: {stderr}"));
	(output.status.success(), json, stderr)
}

fn write_snapshot(dir: &Path, captured_ms: u64, sequence: u64) {
	let file = SessionFile::new(
		vec![
			Cookie::new("ASP.NET_SessionId", "abc", ".denticon.com"),
			Cookie::new("AuthToken", "def", ".denticon.com"),
		],
		captured_ms,
		sequence,
	);
	std::fs::write(dir.join("cookies.json"), serde_json::to_string_pretty(&file).unwrap()).unwrap();
}

fn now_ms() -> u64 {
	Utc::now().timestamp_millis() as u64
}

#[test]
fn status_without_snapshot() {
	let dir = tempfile::tempdir().unwrap();
	let (success, json, stderr) = run_json(dir.path(), &["status"]);

	assert!(success, "status failed: {stderr}");
	assert_eq!(json["ok"], true);
	assert_eq!(json["command"], "status");
	assert_eq!(json["data"]["exists"], false);
	assert_eq!(json["data"]["fresh"], false);
	assert_eq!(json["data"]["cookieCount"], 0);
}

#[test]
fn status_reports_fresh_snapshot() {
	let dir = tempfile::tempdir().unwrap();
	write_snapshot(dir.path(), now_ms() - 10 * 60_000, 4);

	let (success, json, stderr) = run_json(dir.path(), &["status"]);
	assert!(success, "status failed: {stderr}");
	assert_eq!(json["data"]["exists"], true);
	assert_eq!(json["data"]["fresh"], true);
	assert_eq!(json["data"]["sequence"], 4);
	assert_eq!(json["data"]["cookieCount"], 2);
	assert!(json["data"]["ageMinutes"].as_u64().is_some_and(|m| (9..=11).contains(&m)));
	assert!(json.get("diagnostics").is_none());
}

#[test]
fn status_flags_expired_snapshot() {
	let dir = tempfile::tempdir().unwrap();
	write_snapshot(dir.path(), now_ms() - 3 * 60 * 60_000, 2);

	let (success, json, _) = run_json(dir.path(), &["status"]);
	assert!(success);
	assert_eq!(json["data"]["fresh"], false);
	assert_eq!(json["diagnostics"][0]["level"], "warning");
}

#[test]
fn status_rejects_corrupt_snapshot() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("cookies.json"), "{ not json").unwrap();

	let (success, json, _) = run_json(dir.path(), &["status"]);
	assert!(!success);
	assert_eq!(json["ok"], false);
	assert_eq!(json["error"]["code"], "SESSION_ERROR");
}

#[test]
fn session_clear_removes_snapshot() {
	let dir = tempfile::tempdir().unwrap();
	write_snapshot(dir.path(), now_ms(), 1);

	let (success, json, stderr) = run_json(dir.path(), &["session", "clear"]);
	assert!(success, "session clear failed: {stderr}");
	assert_eq!(json["command"], "session.clear");
	assert_eq!(json["data"]["removed"], true);
	assert!(!dir.path().join("cookies.json").exists());

	let (success, json, _) = run_json(dir.path(), &["session", "clear"]);
	assert!(success);
	assert_eq!(json["data"]["removed"], false);
}

#[test]
fn lookup_with_blank_name_is_invalid_input() {
	let dir = tempfile::tempdir().unwrap();
	let (success, json, _) = run_json(dir.path(), &[
		"lookup",
		"--branch",
		"Modesto",
		"--dob",
		"01/02/1980",
		"--first-name",
		" ",
		"--last-name",
		"Doe",
	]);

	assert!(!success);
	assert_eq!(json["command"], "lookup");
	assert_eq!(json["error"]["code"], "INVALID_INPUT");
	assert_eq!(json["error"]["message"], "Please provide branch, firstName, lastName, and dob");
}

#[test]
fn malformed_config_fails_before_any_command() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("chairside.json"), "[1, 2").unwrap();

	let (success, json, _) = run_json(dir.path(), &["status"]);
	assert!(!success);
	assert_eq!(json["command"], "status");
	assert_eq!(json["error"]["code"], "INVALID_INPUT");
}
