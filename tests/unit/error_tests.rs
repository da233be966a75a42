//! Unit tests for `AppError` display format and conversions.

use rewards_runner::AppError;

#[test]
fn every_variant_uses_a_lowercase_kind_prefix() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Accounts("x".into()), "accounts: x"),
        (AppError::Worker("x".into()), "worker: x"),
        (AppError::Host("x".into()), "host: x"),
        (AppError::Browser("x".into()), "browser: x"),
        (AppError::Auth("x".into()), "auth: x"),
        (AppError::Dashboard("x".into()), "dashboard: x"),
        (AppError::Task("x".into()), "task: x"),
        (AppError::Io("x".into()), "io: x"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn toml_error_converts_to_config() {
    let toml_err = toml::from_str::<toml::Value>("key = ").unwrap_err();
    let err = AppError::from(toml_err);
    assert!(matches!(err, AppError::Config(ref msg) if msg.starts_with("invalid config")));
}

#[test]
fn json_error_converts_to_host() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err = AppError::from(json_err);
    assert!(matches!(err, AppError::Host(ref msg) if msg.starts_with("malformed json")));
}

#[test]
fn io_error_converts_to_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err = AppError::from(io_err);
    assert_eq!(err.to_string(), "io: pipe closed");
}

#[test]
fn app_error_is_a_std_error() {
    fn assert_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}
    assert_error(&AppError::Task("search failed".into()));
}
