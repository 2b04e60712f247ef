//! End-to-end CLI tests. Each test spawns the real binary against the dev
//! data directory (POMATO_ENV=dev) so production counters stay untouched.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "--quiet", "-p", "pomato-cli", "--"])
        .args(args)
        .env("POMATO_ENV", "dev")
        .output()
        .expect("failed to run CLI");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

#[test]
fn test_help_lists_commands() {
    let (stdout, _stderr, code) = run_cli(&["--help"]);
    assert_eq!(code, 0);
    for command in ["run", "harvest", "config", "completions"] {
        assert!(stdout.contains(command), "help is missing `{command}`");
    }
}

#[test]
fn test_config_set_then_get_roundtrip() {
    let (_stdout, stderr, code) = run_cli(&["config", "set", "timer.break_minutes", "4.5"]);
    assert_eq!(code, 0, "set failed: {stderr}");

    let (stdout, _stderr, code) = run_cli(&["config", "get", "timer.break_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "4.5");

    let (_stdout, _stderr, code) = run_cli(&["config", "set", "timer.break_minutes", "5"]);
    assert_eq!(code, 0);
}

#[test]
fn test_config_rejects_bad_values() {
    let (_stdout, stderr, code) = run_cli(&["config", "set", "timer.work_minutes", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error"));

    let (_stdout, _stderr, code) = run_cli(&["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_list_shows_sections() {
    let (stdout, _stderr, code) = run_cli(&["config", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("timer"));
    assert!(stdout.contains("notifications"));
}

#[test]
fn test_harvest_today_runs() {
    let (stdout, _stderr, code) = run_cli(&["harvest", "today"]);
    assert_eq!(code, 0);
    assert!(!stdout.trim().is_empty());
}

#[test]
fn test_harvest_show_empty_past_day() {
    // A date no test ever harvests on, so the count is stably zero.
    let (stdout, _stderr, code) = run_cli(&["harvest", "show", "--date", "1999-01-02", "--json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(stdout.trim()).expect("valid JSON");
    assert_eq!(parsed["date"], "1999-01-02");
    assert_eq!(parsed["count"], 0);
}

#[test]
fn test_harvest_show_rejects_garbage_date() {
    let (_stdout, _stderr, code) = run_cli(&["harvest", "show", "--date", "not-a-date"]);
    assert_ne!(code, 0);
}

#[test]
fn test_run_completes_one_cycle_and_harvests() {
    // 1.2 s work period; stdin is closed so the countdown just runs out.
    let (stdout, stderr, code) = run_cli(&[
        "run",
        "--work",
        "0.02",
        "--break",
        "0.01",
        "--cycles",
        "1",
        "--no-notify",
    ]);
    assert_eq!(code, 0, "run failed: {stderr}");
    assert!(stdout.contains("Pomodoro complete!"), "stdout: {stdout}");

    let (stdout, _stderr, code) = run_cli(&["harvest", "today", "--json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(stdout.trim()).expect("valid JSON");
    // Other runs may harvest on the same dev database; at least ours landed.
    assert!(parsed["count"].as_u64().unwrap_or(0) >= 1);
}

#[test]
fn test_run_json_emits_event_stream() {
    let (stdout, stderr, code) = run_cli(&[
        "run",
        "--work",
        "0.02",
        "--break",
        "0.01",
        "--cycles",
        "1",
        "--no-notify",
        "--json",
    ]);
    assert_eq!(code, 0, "run failed: {stderr}");

    // Every stdout line is one tagged event; the stream opens with Started
    // and carries the completion that ended the run.
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is one JSON event"))
        .collect();
    assert_eq!(events.first().map(|e| e["type"].clone()), Some("Started".into()));
    assert!(events.iter().any(|e| e["type"] == "WorkCompleted"));
    assert!(events.iter().all(|e| e["at"].is_string()));
}

#[test]
fn test_run_exits_while_stdin_stays_open() {
    // Interactive shape: stdin is a pipe that stays open and never sends a
    // line. Completing the cycle must still end the process.
    let mut child = Command::new("cargo")
        .args(["run", "--quiet", "-p", "pomato-cli", "--"])
        .args(["run", "--work", "0.02", "--break", "0.01", "--cycles", "1", "--no-notify"])
        .env("POMATO_ENV", "dev")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn CLI");
    let stdin = child.stdin.take();

    // The deadline covers a cold cargo build ahead of the 1.2 s countdown.
    let started = Instant::now();
    let status = loop {
        match child.try_wait().expect("failed to poll CLI") {
            Some(status) => break status,
            None if started.elapsed() > Duration::from_secs(60) => {
                let _ = child.kill();
                let _ = child.wait();
                panic!("run --cycles lingered after the cycle completed");
            }
            None => std::thread::sleep(Duration::from_millis(200)),
        }
    };
    drop(stdin);
    assert!(status.success());
}

#[test]
fn test_run_rejects_nonpositive_duration() {
    let (_stdout, stderr, code) = run_cli(&["run", "--work", "0", "--cycles", "1"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error"));
}

#[test]
fn test_run_rejects_oversized_duration() {
    // Durations cap at one day; a huge value is refused up front instead of
    // feeding the clock arithmetic.
    let (_stdout, stderr, code) = run_cli(&["run", "--work", "1e15", "--cycles", "1"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error"));
}

#[test]
fn test_completions_emit_bash_script() {
    let (stdout, _stderr, code) = run_cli(&["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("pomato"));
}
