// tests/config_loading.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, RetrySectionBuilder};
use crate::common::init_tracing;
use crate::common::tasks::failing_task;
use crate::common::with_timeout;

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use dagflow::config::{load_and_validate, load_from_path, parse_duration};
use dagflow::errors::DagflowError;
use dagflow::types::BackoffKind;
use dagflow::{Backoff, Flow, RetryPolicy};

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn full_config_loads_and_resolves_policies() -> TestResult {
    init_tracing();

    let file = write_config(
        r#"
[config]
concurrency_limit = 3

[default]
max_attempts = 2
backoff = "exponential"
delay = "100ms"
max_delay = "1s"

[task.fetch]
max_attempts = 5

[task.push]
backoff = "none"
"#,
    );

    let cfg = load_and_validate(file.path())?;
    let options = cfg.flow_options();
    assert_eq!(options.concurrency_limit, 3);

    let default = cfg.default_retry().expect("default policy");
    assert_eq!(default.max_attempts(), 2);
    assert_eq!(default.delay_for(1), Duration::from_millis(100));

    // fetch inherits the exponential schedule from [default].
    let fetch = cfg.task_retry("fetch").expect("fetch policy");
    assert_eq!(fetch.max_attempts(), 5);
    assert_eq!(fetch.delay_for(2), Duration::from_millis(200));
    assert_eq!(fetch.delay_for(10), Duration::from_secs(1));

    let push = cfg.task_retry("push").expect("push policy");
    assert_eq!(push.max_attempts(), 2);
    assert_eq!(push.delay_for(1), Duration::ZERO);
    Ok(())
}

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let file = write_config("");
    let cfg = load_and_validate(file.path())?;

    assert!(cfg.default_retry().is_none());
    assert_eq!(
        cfg.flow_options().concurrency_limit,
        dagflow::engine::flow::DEFAULT_CONCURRENCY_LIMIT
    );
    Ok(())
}

#[test]
fn raw_loading_does_not_validate() -> TestResult {
    let file = write_config("[config]\nconcurrency_limit = 0\n");

    let raw = load_from_path(file.path())?;
    assert_eq!(raw.config.concurrency_limit, Some(0));

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, DagflowError::ConfigError(ref m) if m.contains("concurrency_limit")));
    Ok(())
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        ("[default]\nmax_attempts = 0\n", "max_attempts"),
        ("[task.x]\ndelay = \"soon\"\n", "[task.x].delay"),
        ("[default]\nmultiplier = 0.5\n", "multiplier"),
        ("[default]\njitter = 1.5\n", "jitter"),
    ];

    for (toml, needle) in cases {
        let file = write_config(toml);
        match load_and_validate(file.path()) {
            Err(DagflowError::ConfigError(msg)) => {
                assert!(msg.contains(needle), "{msg:?} should mention {needle}")
            }
            other => panic!("expected config error for {toml:?}, got {other:?}"),
        }
    }
}

#[test]
fn oversized_duration_is_a_config_error() {
    let file = write_config("[default]\nmax_attempts = 2\ndelay = \"9999999999999999999h\"\n");
    match load_and_validate(file.path()) {
        Err(DagflowError::ConfigError(msg)) => assert!(msg.contains("too large"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn unknown_keys_and_bad_backoff_fail_to_parse() {
    let file = write_config("[default]\nretries = 3\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(DagflowError::TomlError(_))
    ));

    let file = write_config("[default]\nbackoff = \"sometimes\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(DagflowError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, DagflowError::IoError(_)));
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
    assert!(parse_duration("9999999999999999999h").is_err());
    assert!(parse_duration("99999999999999999999s").is_err());
    assert_eq!(
        parse_duration("18446744073709551615ms"),
        Ok(Duration::from_millis(u64::MAX))
    );
}

#[test]
fn jitter_backoff_gets_a_default_fraction() {
    let cfg = ConfigFileBuilder::new()
        .with_default(
            RetrySectionBuilder::new()
                .max_attempts(3)
                .backoff(BackoffKind::ExponentialJitter)
                .delay("1s")
                .build(),
        )
        .build();

    match cfg.default_retry().map(RetryPolicy::backoff) {
        Some(Backoff::Exponential { jitter, .. }) => assert!(*jitter > 0.0),
        other => panic!("expected exponential backoff, got {other:?}"),
    }
}

#[tokio::test]
async fn flow_uses_config_task_section() {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .with_concurrency_limit(2)
        .with_default(RetrySectionBuilder::new().max_attempts(2).build())
        .with_task("flaky", RetrySectionBuilder::new().max_attempts(4).build())
        .build();

    let (flaky, flaky_calls) = failing_task("flaky", "x");
    let (other, other_calls) = failing_task("other", "y");
    let flow = Flow::new("configured", move |t| {
        let a = t.call(&flaky, []);
        let b = t.call(&other, []);
        dagflow::Binding::list([a, b])
    })
    .with_config(&cfg);

    assert_eq!(flow.options().concurrency_limit, 2);
    let _ = with_timeout(flow.invoke(vec![])).await;

    assert_eq!(flaky_calls.count(), 4);
    assert_eq!(other_calls.count(), 2);
}
