//! End-to-end lifecycle tests.
//!
//! Most termination paths only materialize at process exit, so each
//! scenario runs a probe binary inside a scratch git repository and
//! inspects the experiment artifacts it leaves behind.

#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but works fine

use std::path::{Path, PathBuf};
use std::process::Output;

use assert_cmd::Command;
use chrono::NaiveDateTime;
use serde_json::Value;
use tempfile::TempDir;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

struct Fixture {
    _repo_dir: TempDir,
    repo: PathBuf,
    _root_dir: TempDir,
    root: PathBuf,
    head_sha: String,
}

fn fixture() -> Fixture {
    let repo_dir = tempfile::tempdir().unwrap();
    let repo = git2::Repository::init(repo_dir.path()).unwrap();
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();

    std::fs::write(repo_dir.path().join("train.py"), "print('train')\n").unwrap();
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("Test User", "test@example.com").unwrap();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, "initial commit\n", &tree, &[])
        .unwrap();
    drop(tree);

    let root_dir = tempfile::tempdir().unwrap();
    Fixture {
        repo: repo_dir.path().to_path_buf(),
        _repo_dir: repo_dir,
        root: root_dir.path().to_path_buf(),
        _root_dir: root_dir,
        head_sha: oid.to_string(),
    }
}

fn run(fixture: &Fixture, bin: &str, extra_args: &[&str]) -> Output {
    let root = fixture.root.to_str().unwrap();
    Command::cargo_bin(bin)
        .unwrap()
        .current_dir(&fixture.repo)
        // Keep any developer-global labrec config out of the picture.
        .env("XDG_CONFIG_HOME", fixture.repo.join(".xdg"))
        .args(["--dry-run", "--epochs", "1", "--experiments-directory", root])
        .args(extra_args)
        .output()
        .unwrap()
}

fn status_lines(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("STATUS"))
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

fn metadata(dir: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(dir.join("metadata.json")).unwrap()).unwrap()
}

fn end_time(dir: &Path) -> NaiveDateTime {
    let meta = metadata(dir);
    NaiveDateTime::parse_from_str(meta["end-time"].as_str().unwrap(), TIMESTAMP_FORMAT).unwrap()
}

fn file_lines(dir: &Path, name: &str) -> Vec<String> {
    std::fs::read_to_string(dir.join(name))
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

#[test]
fn test_success_path() {
    let f = fixture();
    let output = run(&f, "probe-success", &[]);
    assert!(output.status.success());

    let dir = f.root.join("1");
    assert_eq!(status_lines(&dir)[0], "SUCCESS");

    let meta = metadata(&dir);
    let start =
        NaiveDateTime::parse_from_str(meta["start-time"].as_str().unwrap(), TIMESTAMP_FORMAT)
            .unwrap();
    assert!(end_time(&dir) >= start);
}

#[test]
fn test_forced_exit_records_error() {
    let f = fixture();
    let output = run(&f, "probe-exit", &[]);
    assert_eq!(output.status.code(), Some(1));

    let dir = f.root.join("1");
    assert_eq!(status_lines(&dir), vec!["ERROR"]);
    assert!(metadata(&dir).get("end-time").is_some());
}

#[test]
fn test_unhandled_panic_records_traceback() {
    let f = fixture();
    let output = run(&f, "probe-panic", &[]);
    assert!(!output.status.success());

    let dir = f.root.join("1");
    let lines = status_lines(&dir);
    assert_eq!(lines[0], "ERROR");
    assert_eq!(lines[1], "Traceback (most recent call last):");
    assert!(metadata(&dir).get("end-time").is_some());
}

#[test]
fn test_scoped_explicit_and_lingering_all_succeed() {
    let f = fixture();
    let output = run(&f, "probe-scoped", &[]);
    assert!(output.status.success());

    for id in ["1", "2", "3"] {
        let dir = f.root.join(id);
        assert_eq!(status_lines(&dir)[0], "SUCCESS", "experiment {id}");
        assert!(metadata(&dir).get("end-time").is_some(), "experiment {id}");
    }

    // 1 and 2 finish back to back; 3 only finishes after the delay, at
    // process exit.
    let e1 = end_time(&f.root.join("1"));
    let e2 = end_time(&f.root.join("2"));
    let e3 = end_time(&f.root.join("3"));
    assert!(e2 - e1 < chrono::Duration::seconds(1));
    assert!(e3 - e2 >= chrono::Duration::seconds(1));
}

#[test]
fn test_caught_panic_finalizes_only_its_scope() {
    let f = fixture();
    let output = run(&f, "probe-scoped-panic", &[]);
    assert!(!output.status.success());

    let first = status_lines(&f.root.join("1"));
    let second = status_lines(&f.root.join("2"));
    assert_eq!(first[0], "ERROR");
    assert_eq!(first[1], "Traceback (most recent call last):");
    assert_eq!(second[0], first[0]);
    assert_eq!(second[1], first[1]);

    // The scoped experiment dies at the caught panic, the lingering one
    // two seconds later with the process.
    let e1 = end_time(&f.root.join("1"));
    let e2 = end_time(&f.root.join("2"));
    assert!(e2 - e1 >= chrono::Duration::seconds(1));
}

#[test]
fn test_nested_capture() {
    let f = fixture();
    let output = run(&f, "probe-nested", &[]);
    assert!(output.status.success());

    let outer = f.root.join("1");
    let inner = f.root.join("2");
    assert_eq!(file_lines(&outer, "stdout"), vec!["a", "b", "c"]);
    assert_eq!(file_lines(&outer, "stderr"), vec!["x", "y", "z"]);
    assert_eq!(file_lines(&inner, "stdout"), vec!["b"]);
    assert_eq!(file_lines(&inner, "stderr"), vec!["y"]);
}

#[test]
fn test_metadata_records_repository_state() {
    let f = fixture();
    let output = run(&f, "probe-success", &["--description", "smoke test"]);
    assert!(output.status.success());

    let meta = metadata(&f.root.join("1"));
    assert_eq!(meta["githead-sha"].as_str().unwrap(), f.head_sha);
    assert_eq!(meta["githead-message"].as_str().unwrap(), "initial commit\n");
    assert_eq!(meta["description"].as_str().unwrap(), "smoke test");
    assert!(meta["command"].as_str().unwrap().contains("--dry-run"));
    assert!(meta.get("start-time").is_some());
}

#[test]
fn test_recorded_args() {
    let f = fixture();
    let output = run(&f, "probe-success", &["--seed", "234"]);
    assert!(output.status.success());

    let dir = f.root.join("1");
    let args: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("args.json")).unwrap()).unwrap();
    assert_eq!(args["seed"], serde_json::json!(234));
    assert_eq!(args["epochs"], serde_json::json!(1));
    assert_eq!(args["dry-run"], serde_json::json!(true));
    assert!(args.get("experiments-directory").is_none());

    let defaults: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("default_args.json")).unwrap())
            .unwrap();
    assert_eq!(defaults["seed"], serde_json::json!(1));
    assert_eq!(defaults["epochs"], serde_json::json!(14));
    assert_eq!(defaults["dry-run"], serde_json::json!(false));
}

#[test]
fn test_resume_succeeds_with_identical_args() {
    let f = fixture();
    let first = run(&f, "probe-success", &["--experiment-id", "2", "--seed", "234"]);
    assert!(first.status.success());
    let second = run(&f, "probe-success", &["--experiment-id", "2", "--seed", "234"]);
    assert!(second.status.success());

    assert_eq!(status_lines(&f.root.join("2"))[0], "SUCCESS");
}

#[test]
fn test_resume_with_changed_args_fails() {
    let f = fixture();
    let first = run(&f, "probe-success", &["--experiment-id", "2", "--seed", "234"]);
    assert!(first.status.success());

    let second = run(&f, "probe-success", &["--experiment-id", "2", "--seed", "235"]);
    assert!(!second.status.success());
    let stderr = String::from_utf8_lossy(&second.stderr);
    assert!(
        stderr.contains("Arguments do not match"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn test_non_integer_id_coexists_with_auto_allocation() {
    let f = fixture();
    let first = run(&f, "probe-success", &["--experiment-id", "a"]);
    assert!(first.status.success());
    let second = run(&f, "probe-success", &[]);
    assert!(second.status.success());

    assert!(f.root.join("a").is_dir());
    assert!(f.root.join("1").is_dir());
}

#[test]
fn test_dirty_repo_refused() {
    let f = fixture();
    std::fs::write(f.repo.join("train.py"), "print('made dirty')\n").unwrap();

    let output = run(&f, "probe-success", &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dirty"), "unexpected stderr: {stderr}");
    assert!(!f.root.join("1").exists());
}
