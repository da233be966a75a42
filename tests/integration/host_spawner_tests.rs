//! Automation host spawning: ready line, startup failures, env allowlist.
#![cfg(unix)]

use serde_json::json;
use serial_test::serial;

use rewards_runner::config::HostConfig;
use rewards_runner::host::spawner::spawn_host;
use rewards_runner::AppError;

const SECRET_VAR: &str = "REWARDS_RUNNER_TEST_SECRET";

fn shell_host(script: &str, startup_timeout_seconds: u64) -> HostConfig {
    HostConfig {
        command: "sh".to_owned(),
        args: vec!["-c".to_owned(), script.to_owned()],
        startup_timeout_seconds,
        request_timeout_seconds: 5,
    }
}

/// Prints the ready line, then answers one request with `$SECRET_VAR`
/// (or `clean` when it is not set).
const ECHO_ENV_HOST: &str = r#"echo ready
read -r line
id=$(printf '%s' "$line" | sed 's/.*"id":"\([^"]*\)".*/\1/')
printf '{"id":"%s","result":"%s"}\n' "$id" "${REWARDS_RUNNER_TEST_SECRET:-clean}"
read -r _"#;

#[tokio::test]
#[serial]
async fn host_does_not_inherit_unlisted_variables() {
    std::env::set_var(SECRET_VAR, "leaked");

    let host = spawn_host(&shell_host(ECHO_ENV_HOST, 5)).await;
    std::env::remove_var(SECRET_VAR);
    let host = host.expect("host should start");

    let seen: String = host.client.call("env/probe", json!({})).await.unwrap();
    assert_eq!(seen, "clean");
}

#[tokio::test]
#[serial]
async fn host_that_never_gets_ready_times_out() {
    let err = spawn_host(&shell_host("sleep 5", 1))
        .await
        .expect_err("no ready line");
    assert!(matches!(err, AppError::Host(ref msg) if msg.starts_with("startup timeout")));
}

#[tokio::test]
#[serial]
async fn host_exiting_before_ready_is_an_error() {
    let err = spawn_host(&shell_host("exit 0", 5))
        .await
        .expect_err("host exited");
    assert!(matches!(err, AppError::Host(ref msg) if msg.contains("before ready signal")));
}

#[tokio::test]
#[serial]
async fn missing_host_binary_fails_to_spawn() {
    let config = HostConfig {
        command: "/nonexistent/automation-host".to_owned(),
        args: Vec::new(),
        startup_timeout_seconds: 1,
        request_timeout_seconds: 1,
    };
    let err = spawn_host(&config).await.expect_err("binary missing");
    assert!(matches!(err, AppError::Host(ref msg) if msg.starts_with("failed to spawn host")));
}
