//! Integration tests for the build session event contract.
//!
//! A stub build command stands in for `pio run`; the tests assert the event
//! channel ordering guarantees: zero or more messages, then exactly one
//! terminal event, on every path.

#![cfg(unix)]

use std::fs;
use std::sync::mpsc::channel;
use tasmoforge::compile::{BuildEvent, BuildOutcome, BuildSession};
use tasmoforge::config::{BuildRequest, RepoPaths};
use tasmoforge::git::BranchSwitcher;

struct NoopSwitcher;

impl BranchSwitcher for NoopSwitcher {
    fn switch_to(&self, _version: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

struct FailingSwitcher;

impl BranchSwitcher for FailingSwitcher {
    fn switch_to(&self, version: &str) -> anyhow::Result<()> {
        anyhow::bail!("no such version: {version}")
    }
}

fn fake_checkout() -> (tempfile::TempDir, RepoPaths) {
    let repo = tempfile::tempdir().expect("Failed to create temp checkout");
    let paths = RepoPaths::new(repo.path());
    fs::create_dir(paths.source_dir()).expect("Failed to create tasmota/");
    (repo, paths)
}

fn minimal_request() -> BuildRequest {
    serde_json::from_str(
        r#"{
            "network": {},
            "features": { "USE_MQTT_TLS": true },
            "version": { "tasmotaVersion": "v14.1.0" },
            "customParams": ""
        }"#,
    )
    .unwrap()
}

fn run_session(
    paths: &RepoPaths,
    switcher: &dyn BranchSwitcher,
    command: Option<&[&str]>,
) -> Vec<BuildEvent> {
    let (tx, rx) = channel();
    let mut session = BuildSession::new(paths, switcher, tx);
    if let Some(command) = command {
        session = session.with_command(command.iter().copied());
    }
    session.run(&minimal_request());
    rx.try_iter().collect()
}

fn terminal_events(events: &[BuildEvent]) -> Vec<&BuildOutcome> {
    events
        .iter()
        .filter_map(|e| match e {
            BuildEvent::Finished(outcome) => Some(outcome),
            BuildEvent::Message(_) => None,
        })
        .collect()
}

#[test]
fn test_successful_build_session() {
    let (_repo, paths) = fake_checkout();
    let events = run_session(&paths, &NoopSwitcher, Some(&["sh", "-c", "echo compiling"]));

    let terminals = terminal_events(&events);
    assert_eq!(terminals, vec![&BuildOutcome::Completed { ok: true }]);
    assert!(matches!(events.last(), Some(BuildEvent::Finished(_))));

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            BuildEvent::Message(m) => Some(m.as_str()),
            _ => None,
        })
        .collect();
    assert!(text.contains("compiling"));
    assert!(text.contains("Finished. Exit code: 0.\n"));

    // the generated files were written before launch
    assert!(paths.config_override().exists());
    assert!(paths.platformio_override().exists());
}

#[test]
fn test_nonzero_exit_reported_via_ok_flag() {
    let (_repo, paths) = fake_checkout();
    let events = run_session(
        &paths,
        &NoopSwitcher,
        Some(&["sh", "-c", "echo boom >&2; exit 3"]),
    );

    let terminals = terminal_events(&events);
    assert_eq!(terminals, vec![&BuildOutcome::Completed { ok: false }]);

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            BuildEvent::Message(m) => Some(m.as_str()),
            _ => None,
        })
        .collect();
    // stderr is captured into the same stream, and the code is human-readable
    assert!(text.contains("boom"));
    assert!(text.contains("Finished. Exit code: 3.\n"));
}

#[test]
fn test_branch_switch_failure_never_spawns() {
    let (_repo, paths) = fake_checkout();
    let events = run_session(&paths, &FailingSwitcher, Some(&["sh", "-c", "touch spawned"]));

    assert_eq!(events.len(), 2);
    match &events[0] {
        BuildEvent::Message(text) => {
            assert!(text.contains("no such version: v14.1.0"));
        }
        other => panic!("expected a message first, got {other:?}"),
    }
    assert_eq!(
        events[1],
        BuildEvent::Finished(BuildOutcome::Completed { ok: false })
    );

    // the stub command never ran, and no files were generated
    assert!(!paths.root().join("spawned").exists());
    assert!(!paths.config_override().exists());
}

#[test]
fn test_write_failure_is_a_prepare_failure() {
    // no checkout at all: the override write fails, no subprocess launches
    let repo = tempfile::tempdir().unwrap();
    let missing = RepoPaths::new(repo.path().join("gone"));

    let (tx, rx) = channel();
    BuildSession::new(&missing, &NoopSwitcher, tx).run(&minimal_request());
    let events: Vec<BuildEvent> = rx.try_iter().collect();

    assert_eq!(events.len(), 2);
    match &events[0] {
        BuildEvent::Message(text) => assert!(text.starts_with("Cannot write to")),
        other => panic!("expected a message first, got {other:?}"),
    }
    assert_eq!(
        events[1],
        BuildEvent::Finished(BuildOutcome::Completed { ok: false })
    );
}

#[test]
fn test_unspawnable_command_aborts() {
    let (_repo, paths) = fake_checkout();
    let events = run_session(
        &paths,
        &NoopSwitcher,
        Some(&["/nonexistent/definitely-not-pio"]),
    );

    let terminals = terminal_events(&events);
    assert_eq!(terminals.len(), 1);
    match terminals[0] {
        BuildOutcome::Aborted { status, message } => {
            assert_eq!(*status, 1);
            assert!(message.contains("Cannot start"));
        }
        other => panic!("expected an abort, got {other:?}"),
    }
    assert!(matches!(events.last(), Some(BuildEvent::Finished(_))));
}

#[test]
fn test_large_output_is_batched_not_dropped() {
    let (_repo, paths) = fake_checkout();
    // many writes through a pipe arrive as an unpredictable number of
    // chunks; the contract is that every byte survives batching
    let script = "for i in $(seq 1 200); do echo line$i; done";
    let events = run_session(&paths, &NoopSwitcher, Some(&["sh", "-c", script]));

    let terminals = terminal_events(&events);
    assert_eq!(terminals, vec![&BuildOutcome::Completed { ok: true }]);

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            BuildEvent::Message(m) => Some(m.as_str()),
            _ => None,
        })
        .collect();
    assert!(text.contains("line1\n"));
    assert!(text.contains("line200\n"));
}
