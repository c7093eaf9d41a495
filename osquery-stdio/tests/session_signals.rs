//! Signal handling across a session's lifetime.
//!
//! Signals are process-wide, so each scenario runs in a child copy of this
//! test binary selected through `SIGNAL_SCENARIO`.
#![cfg(unix)]

use osquery_stdio::prelude::*;
use signal_hook::consts::SIGTERM;
use signal_hook::low_level::raise;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

const SCENARIO_VAR: &str = "SIGNAL_SCENARIO";
const SURVIVED: &str = "session child survived";

fn sleeper() -> CommandSpec {
    CommandSpec::new("sh").arg("-c").arg("exec sleep 30")
}

/// Run `test_name` in a child process with the scenario enabled.
fn run_in_child(test_name: &str) -> std::process::Output {
    let exe = std::env::current_exe().expect("test binary path");
    Command::new(exe)
        .args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(SCENARIO_VAR, test_name)
        .output()
        .expect("failed to run child test")
}

fn in_child(test_name: &str) -> bool {
    std::env::var(SCENARIO_VAR).is_ok_and(|v| v == test_name)
}

#[test]
fn test_sigterm_after_stop_does_not_exit() {
    const NAME: &str = "test_sigterm_after_stop_does_not_exit";
    if !in_child(NAME) {
        let output = run_in_child(NAME);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success(), "child exited with {:?}", output.status);
        assert!(stdout.contains(SURVIVED), "child output: {stdout}");
        return;
    }

    let mut session = Session::start(&mut PtyLauncher::new(), &sleeper(), &SessionConfig::remote())
        .expect("session should start");
    let handle = session.stop_handle();
    session.handle_signals();

    raise(SIGTERM).expect("raise SIGTERM");
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.is_running() {
        assert!(Instant::now() < deadline, "SIGTERM never stopped the session");
        thread::sleep(Duration::from_millis(10));
    }

    session.stop();

    // Both would have been a forced exit while the handlers were registered.
    raise(SIGTERM).expect("raise SIGTERM");
    raise(SIGTERM).expect("raise SIGTERM");
    thread::sleep(Duration::from_millis(200));
    println!("{SURVIVED}");
}
