//! End-to-end tests against the built binary.
//!
//! Each test points `MNEMO_HOME` at its own temp directory and pre-writes a
//! config selecting the mock embedding provider, so nothing touches the
//! network or the user's real store.

use assert_cmd::Command;
use std::path::Path;

fn write_mock_config(home: &Path) {
    let memory = home.join("memory");
    std::fs::create_dir_all(&memory).unwrap();
    std::fs::write(
        memory.join("config.json"),
        r#"{"embedding": {"provider": "mock"}}"#,
    )
    .unwrap();
}

fn mnemo(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mnemo").unwrap();
    cmd.env("MNEMO_HOME", home);
    cmd.env_remove("MNEMO_DB");
    cmd
}

#[test]
fn status_before_init_exits_uninitialized() {
    let tmp = tempfile::tempdir().unwrap();
    write_mock_config(tmp.path());

    mnemo(tmp.path())
        .arg("status")
        .assert()
        .failure()
        .code(1)
        .stderr(predicates::str::contains("not initialized"));
}

#[test]
fn init_then_status_reports_empty_store() {
    let tmp = tempfile::tempdir().unwrap();
    write_mock_config(tmp.path());

    mnemo(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicates::str::contains("Initialized memory store"));

    assert!(tmp.path().join("memory/memory.db").exists());

    mnemo(tmp.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"total_sessions\":0"))
        .stdout(predicates::str::contains("\"vec_available\":true"))
        .stdout(predicates::str::contains("\"embedding_provider\":\"mock\""));
}

#[test]
fn unknown_session_exits_with_argument_code() {
    let tmp = tempfile::tempdir().unwrap();
    write_mock_config(tmp.path());
    mnemo(tmp.path()).arg("init").assert().success();

    mnemo(tmp.path())
        .args(["session", "missing-id"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("Session not found: missing-id"));
}

#[test]
fn recall_without_query_or_context_is_an_argument_error() {
    let tmp = tempfile::tempdir().unwrap();
    write_mock_config(tmp.path());
    mnemo(tmp.path()).arg("init").assert().success();

    mnemo(tmp.path())
        .arg("recall")
        .write_stdin("")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn import_then_recall_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    write_mock_config(tmp.path());
    mnemo(tmp.path()).arg("init").assert().success();

    let session_dir = tmp.path().join("sessions/abcd1234/sess-e2e");
    std::fs::create_dir_all(&session_dir).unwrap();
    std::fs::write(
        session_dir.join("log.wire"),
        concat!(
            r#"{"type": "metadata", "version": 1}"#,
            "\n",
            r#"{"timestamp": 1700000000, "message": {"type": "turn_begin", "user_input": "postgres index tuning tips"}}"#,
            "\n",
            r#"{"timestamp": 1700000005, "message": {"type": "text", "text": "Use pg_stat_statements."}}"#,
        ),
    )
    .unwrap();

    mnemo(tmp.path())
        .arg("import")
        .assert()
        .success()
        .stdout(predicates::str::contains("Imported: 1"));

    mnemo(tmp.path())
        .args(["session", "sess-e2e"])
        .assert()
        .success()
        .stdout(predicates::str::contains("postgres index tuning tips"));

    mnemo(tmp.path())
        .args(["recall", "postgres tuning"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Found 1 related conversation"))
        .stdout(predicates::str::contains("postgres index tuning tips"));

    // The recall cached its results; apply re-emits the context block.
    mnemo(tmp.path())
        .args(["recall-apply", "1"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Related conversation #1"));
}

#[test]
fn import_dry_run_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    write_mock_config(tmp.path());
    mnemo(tmp.path()).arg("init").assert().success();

    let session_dir = tmp.path().join("sessions/abcd1234/sess-dry");
    std::fs::create_dir_all(&session_dir).unwrap();
    std::fs::write(
        session_dir.join("log.wire"),
        r#"{"timestamp": 1, "message": {"type": "turn_begin", "user_input": "hello"}}"#,
    )
    .unwrap();

    mnemo(tmp.path())
        .args(["import", "--dry-run"])
        .assert()
        .success()
        .stdout(predicates::str::contains("dry run"));

    mnemo(tmp.path())
        .args(["session", "sess-dry"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn config_prints_effective_document() {
    let tmp = tempfile::tempdir().unwrap();
    write_mock_config(tmp.path());

    mnemo(tmp.path())
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"provider\":\"mock\""))
        .stdout(predicates::str::contains("\"backend\":\"sqlite\""));
}
