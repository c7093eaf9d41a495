//! End-to-end test against a real osqueryi and the stdio-relay binary.
//!
//! Needs `osqueryi` and `stdio-relay` on PATH (or `STDIO_RELAY_BIN`):
//! `cargo test --features osquery-tests`
#![cfg(feature = "osquery-tests")]

use osquery_stdio::prelude::*;

#[test]
fn test_select_through_osqueryi() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let socket = dir.path().join("osquery.em");
    let relay = std::env::var("STDIO_RELAY_BIN").unwrap_or_else(|_| "stdio-relay".to_string());
    let command = CommandSpec::new(relay)
        .arg("--socket")
        .arg(socket.display().to_string())
        .arg("--timeout")
        .arg("30");

    let mut launcher = PtyLauncher::new();
    let mut session = Session::start(&mut launcher, &command, &SessionConfig::local(&socket))
        .expect("session should start");

    let result = session
        .send_query("select 1 as one")
        .expect("query should succeed")
        .expect("relay should answer");
    assert_eq!(result.data, serde_json::json!([{"one": "1"}]));

    let err = session.send_query("select * from no_such_table").unwrap_err();
    assert!(matches!(err, Error::QueryFailed { .. }));

    assert!(session.send_query("exit").expect("exit").is_none());
}
