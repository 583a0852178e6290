#![cfg(not(windows))]

use predicates::str::contains;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const SESSION_ID: &str = "a1b2c3d4-e5f6-7890-abcd-ef1234567890";

fn write_fake_claude(bin_path: &Path, body: &str) {
    let script = format!("#!/usr/bin/env bash\ncat > /dev/null\n{body}\n");
    fs::write(bin_path, script).expect("write fake claude");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(bin_path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(bin_path, perms).expect("chmod");
    }
}

fn good_summary_body() -> String {
    let filler = "The worker kept every path and command verbatim. ".repeat(12);
    format!(
        "cat <<'EOF'\n## Session Summary\nRefactored the lock module.\n\n## Technical Context\n{filler}\n\n## Knowledge Extractions\nLEARNED: stale locks need reaping\n\n## Next Steps\n1. Ship it\n\n## Active Context\nbranch main\nEOF"
    )
}

fn write_transcript(dir: &Path) -> PathBuf {
    let path = dir.join(format!("{SESSION_ID}.jsonl"));
    let lines = [
        r#"{"type":"user","message":{"role":"user","content":"please fix the lock"}}"#,
        r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"Looking at lock.rs now."}]}}"#,
        r#"{"type":"user","message":{"role":"user","content":"thanks, ship it"}}"#,
    ];
    fs::write(&path, format!("{}\n", lines.join("\n"))).expect("write transcript");
    path
}

struct Env {
    _tmp: tempfile::TempDir,
    data_dir: PathBuf,
    projects_dir: PathBuf,
    claude_bin: PathBuf,
    home: PathBuf,
}

fn setup(claude_body: &str) -> Env {
    let tmp = tempdir().expect("tempdir");
    let data_dir = tmp.path().join("data");
    let projects_dir = tmp.path().join("projects");
    let home = tmp.path().join("home");
    fs::create_dir_all(&projects_dir).expect("mkdir projects");
    fs::create_dir_all(&home).expect("mkdir home");
    let claude_bin = tmp.path().join("claude");
    write_fake_claude(&claude_bin, claude_body);
    Env {
        data_dir,
        projects_dir,
        claude_bin,
        home,
        _tmp: tmp,
    }
}

fn seamless(env: &Env) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("seamless");
    cmd.env("HOME", &env.home)
        .env("SEAMLESS_DATA_DIR", &env.data_dir)
        .env("SEAMLESS_PROJECTS_DIR", &env.projects_dir)
        .env("SEAMLESS_CLAUDE_BIN", &env.claude_bin)
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("SEAMLESS_CONFIG_PATH");
    cmd
}

fn hold_lock(env: &Env, token: &str) -> PathBuf {
    let lock = env.data_dir.join("sessions").join(format!("{SESSION_ID}.lock"));
    fs::create_dir_all(lock.parent().expect("parent")).expect("mkdir sessions");
    fs::write(
        &lock,
        format!(r#"{{"pid":1,"acquired_at_epoch_ms":1,"token":"{token}"}}"#),
    )
    .expect("held lock");
    lock
}

#[test]
fn compact_writes_summary_with_header_and_releases_lock() {
    let env = setup(&good_summary_body());
    let transcript = write_transcript(&env.projects_dir);

    seamless(&env)
        .arg("compact")
        .arg(SESSION_ID)
        .arg(&transcript)
        .assert()
        .success()
        .stdout(contains("command: compact"))
        .stdout(contains("entries=3"));

    let sessions = env.data_dir.join("sessions");
    let summary = fs::read_to_string(sessions.join(format!("{SESSION_ID}.md"))).expect("summary");
    assert!(summary.starts_with(&format!("<!-- seamless: {SESSION_ID} -->\n")));
    assert!(summary.contains("<!-- entries: 3 -->"));
    assert!(summary.contains("## Session Summary"));

    let metadata: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(sessions.join(format!("{SESSION_ID}.json"))).expect("metadata"),
    )
    .expect("metadata json");
    assert_eq!(metadata["session_id"], SESSION_ID);
    assert_eq!(
        metadata["transcript_byte_offset"].as_u64(),
        Some(fs::metadata(&transcript).expect("stat").len())
    );
    assert!(!sessions.join(format!("{SESSION_ID}.lock")).exists());
}

#[test]
fn compact_rejects_short_summaries_after_two_attempts() {
    let env = setup("echo 'too short'");
    let transcript = write_transcript(&env.projects_dir);
    let lock = hold_lock(&env, "tok-failing");

    seamless(&env)
        .arg("compact")
        .arg(SESSION_ID)
        .arg(&transcript)
        .arg("--lock-token")
        .arg("tok-failing")
        .assert()
        .code(1)
        .stderr(contains("distillation failed"));

    let sessions = env.data_dir.join("sessions");
    assert!(!sessions.join(format!("{SESSION_ID}.md")).exists());
    assert!(!lock.exists(), "lock must be released on failure");
    let log = fs::read_to_string(sessions.join(format!("{SESSION_ID}.log"))).expect("job log");
    assert!(log.contains("attempt 1 failed"));
    assert!(log.contains("attempt 2 failed"));
}

#[test]
fn compact_rejects_path_like_session_ids() {
    let env = setup(&good_summary_body());
    let transcript = write_transcript(&env.projects_dir);

    seamless(&env)
        .arg("compact")
        .arg("../../etc/passwd")
        .arg(&transcript)
        .assert()
        .code(1)
        .stderr(contains("error:"));

    assert!(!env.data_dir.join("sessions").exists());
}

#[test]
fn summarise_distills_a_historical_session_by_prefix() {
    let env = setup(&good_summary_body());
    let project = env.projects_dir.join("-Users-me-projects-active-widget");
    fs::create_dir_all(&project).expect("mkdir project");
    write_transcript(&project);

    seamless(&env)
        .arg("summarise")
        .arg("a1b2c3")
        .assert()
        .success()
        .stdout(contains("command: summarise"));

    assert!(env
        .data_dir
        .join("sessions")
        .join(format!("{SESSION_ID}.md"))
        .exists());

    seamless(&env)
        .arg("summarise")
        .arg("--list")
        .assert()
        .success()
        .stdout(contains("Found 1 session(s)"))
        .stdout(contains("widget [done]"));
}

#[test]
fn compact_runs_under_the_launchers_lock() {
    let env = setup(&good_summary_body());
    let transcript = write_transcript(&env.projects_dir);
    let lock = hold_lock(&env, "tok-1");

    seamless(&env)
        .arg("compact")
        .arg(SESSION_ID)
        .arg(&transcript)
        .arg("--lock-token")
        .arg("tok-1")
        .assert()
        .success();

    assert!(env
        .data_dir
        .join("sessions")
        .join(format!("{SESSION_ID}.md"))
        .exists());
    assert!(!lock.exists());
}

#[test]
fn compact_refuses_a_lock_held_by_another_job() {
    let marker = "summarizer-ran";
    let env = setup(&format!("touch \"$(dirname \"$0\")/{marker}\"\n{}", good_summary_body()));
    let transcript = write_transcript(&env.projects_dir);
    let lock = hold_lock(&env, "tok-other");

    seamless(&env)
        .arg("compact")
        .arg(SESSION_ID)
        .arg(&transcript)
        .arg("--lock-token")
        .arg("tok-mine")
        .assert()
        .code(1)
        .stderr(contains("not ours"));

    let sessions = env.data_dir.join("sessions");
    let on_disk = fs::read_to_string(&lock).expect("lock untouched");
    assert!(on_disk.contains("tok-other"));
    assert!(!sessions.join(format!("{SESSION_ID}.md")).exists());
    assert!(!env.claude_bin.with_file_name(marker).exists());
    let log = fs::read_to_string(sessions.join(format!("{SESSION_ID}.log"))).expect("job log");
    assert!(log.contains("refused"));
}

#[test]
fn compact_with_a_token_but_no_lock_is_refused() {
    let env = setup(&good_summary_body());
    let transcript = write_transcript(&env.projects_dir);

    seamless(&env)
        .arg("compact")
        .arg(SESSION_ID)
        .arg(&transcript)
        .arg("--lock-token")
        .arg("tok-gone")
        .assert()
        .code(1)
        .stderr(contains("no lock is held"));

    assert!(!env
        .data_dir
        .join("sessions")
        .join(format!("{SESSION_ID}.md"))
        .exists());
}

#[test]
fn manual_compact_waits_for_a_running_job() {
    let env = setup(&good_summary_body());
    let transcript = write_transcript(&env.projects_dir);
    let lock = hold_lock(&env, "tok-running");

    seamless(&env)
        .arg("compact")
        .arg(SESSION_ID)
        .arg(&transcript)
        .assert()
        .code(1)
        .stderr(contains("already running"));

    assert!(fs::read_to_string(&lock).expect("lock").contains("tok-running"));
}
