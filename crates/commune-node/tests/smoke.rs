//! End-to-end smoke test for commune-node.
//!
//! Starts the real binary with stdin closed, so it joins the room, sees EOF on
//! its input and leaves. Asserts on the history file and on stdout.
//!
//! Run with:
//!   cargo test -p commune-node --test smoke

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use commune_core::ChatEnvelope;
use commune_history::HistoryStore;

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_node(history: &Path, extra: &[&str]) -> NodeGuard {
    let node_bin = env!("CARGO_BIN_EXE_commune-node");
    let child = Command::new(node_bin)
        .args([
            "--no-banner",
            "--user", "smoke",
            "--room", "smoke-test",
            "--p2p-listen", "/ip4/127.0.0.1/tcp/0",
            "--history-path", history.to_str().unwrap(),
        ])
        .args(extra)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn commune-node");
    NodeGuard { child }
}

/// Wait for the node to exit on its own and return its stdout.
fn wait_for_exit(guard: &mut NodeGuard, timeout: Duration) -> String {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = guard.child.try_wait().unwrap() {
            assert!(status.success(), "commune-node exited with {status}");
            break;
        }
        assert!(Instant::now() < deadline, "commune-node did not exit after stdin EOF");
        std::thread::sleep(Duration::from_millis(100));
    }
    let mut out = String::new();
    guard.child.stdout.take().unwrap().read_to_string(&mut out).unwrap();
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn fresh_history_resets_file_and_node_exits_on_eof() {
    let dir = tempfile::tempdir().unwrap();
    let history = dir.path().join("chat").join("messages.json");
    let store = HistoryStore::with_default_capacity(&history);
    store
        .append(&ChatEnvelope { body: "stale".into(), ..ChatEnvelope::default() })
        .unwrap();

    let mut node = spawn_node(&history, &["--fresh-history"]);
    let stdout = wait_for_exit(&mut node, Duration::from_secs(20));

    assert!(store.load().unwrap().is_empty());
    assert!(stdout.contains("Joined the 'smoke-test' chatroom as 'smoke'"), "stdout: {stdout}");
}

#[test]
fn replay_prints_stored_messages() {
    let dir = tempfile::tempdir().unwrap();
    let history = dir.path().join("messages.json");
    let store = HistoryStore::with_default_capacity(&history);
    for body in ["first stored", "second stored"] {
        store
            .append(&ChatEnvelope {
                body: body.into(),
                sender_id: "peer-x".into(),
                origin_ip: "10.9.8.7".into(),
                origin_port: "4321".into(),
                ..ChatEnvelope::default()
            })
            .unwrap();
    }

    let mut node = spawn_node(&history, &["--replay"]);
    let stdout = wait_for_exit(&mut node, Duration::from_secs(20));

    assert!(stdout.contains("2 stored message(s)"), "stdout: {stdout}");
    let first = stdout.find("first stored").expect("first message replayed");
    let second = stdout.find("second stored").expect("second message replayed");
    assert!(first < second, "replay must be oldest first");
    assert!(stdout.contains("IP: 10.9.8.7  Port: 4321"));
    assert_eq!(store.load().unwrap().len(), 2);
}
