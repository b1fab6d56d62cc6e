// tests/config_loading.rs

mod common;
use crate::common::builders::{constant, LoaderConfigBuilder};
use crate::common::{init_tracing, TestResult};

use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use taskloader::config::{load_and_validate, load_from_path, load_from_str, StrategyConfig};
use taskloader::{Loader, LoaderError, Task};

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let config = load_from_str("")?;

    assert!(config.result_buffer >= 256);
    assert_eq!(config.runtime_threads, 2);
    assert_eq!(config.max_worker_threads, 512);
    assert_eq!(config.shutdown_timeout, Duration::from_millis(5000));
    assert!(config.consumer.is_empty());
    Ok(())
}

#[test]
fn consumers_and_strategies_are_parsed_from_a_file() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("loader.toml");
    fs::write(
        &path,
        r#"
result_buffer = 64
runtime_threads = 1
shutdown_timeout_ms = 250

[consumer.net]
concurrency = 5
strategy = { kind = "per_key", limit = 2 }

[consumer.cpu]
concurrency = 4
strategy = { kind = "max_concurrent", limit = 3 }

[consumer.main]
"#,
    )?;

    let config = load_and_validate(&path)?;

    assert_eq!(config.result_buffer, 64);
    assert_eq!(config.runtime_threads, 1);
    assert_eq!(config.shutdown_timeout, Duration::from_millis(250));

    let net = &config.consumer["net"];
    assert_eq!(net.concurrency, 5);
    assert_eq!(net.strategy, StrategyConfig::PerKey { limit: 2 });
    assert_eq!(
        config.consumer["cpu"].strategy,
        StrategyConfig::MaxConcurrent { limit: 3 }
    );
    assert_eq!(config.consumer["main"].concurrency, 0);
    assert_eq!(config.consumer["main"].strategy, StrategyConfig::AlwaysAccept);
    Ok(())
}

#[test]
fn invalid_settings_are_rejected() {
    let cases = [
        ("result_buffer = 0", "result_buffer"),
        ("runtime_threads = 0", "runtime_threads"),
        (
            "[consumer.net]\nconcurrency = 2\nstrategy = { kind = \"per_key\", limit = 0 }",
            "limit of 0",
        ),
        ("[consumer.\" \"]\nconcurrency = 1", "must not be empty"),
        (
            "max_worker_threads = 4\n[consumer.a]\nconcurrency = 3\n[consumer.b]\nconcurrency = 3",
            "max_worker_threads",
        ),
    ];

    for (toml, expected) in cases {
        match load_from_str(toml) {
            Err(LoaderError::ConfigError(message)) => {
                assert!(message.contains(expected), "{toml:?}: {message}")
            }
            other => panic!("{toml:?}: expected a config error, got {other:?}"),
        }
    }
}

#[test]
fn malformed_toml_and_missing_files_are_reported() -> TestResult {
    assert!(matches!(
        load_from_str("result_buffer = \"many\""),
        Err(LoaderError::TomlError(_))
    ));
    assert!(matches!(
        load_from_str("unknown_setting = 1"),
        Err(LoaderError::TomlError(_))
    ));
    assert!(matches!(
        load_from_str("[consumer.x]\nstrategy = { kind = \"round_robin\" }"),
        Err(LoaderError::TomlError(_))
    ));

    let dir = tempdir()?;
    assert!(matches!(
        load_from_path(dir.path().join("absent.toml")),
        Err(LoaderError::IoError(_))
    ));
    Ok(())
}

#[test]
fn register_consumers_wires_configured_strategies() -> TestResult {
    init_tracing();

    let config = LoaderConfigBuilder::new()
        .with_result_buffer(1)
        .with_runtime_threads(1)
        .with_shutdown_timeout_ms(500)
        .with_consumer("net", 3, StrategyConfig::PerKey { limit: 1 })
        .with_consumer("local", 0, StrategyConfig::AlwaysAccept)
        .build();

    let mut loader: Loader<String> = Loader::with_config(&config);
    let ids = loader.register_consumers(&config)?;
    assert_eq!(ids.keys().collect::<Vec<_>>(), vec!["local", "net"]);

    let net = ids["net"];
    let local = ids["local"];

    let mut tasks: Vec<Task<String>> = (0..6)
        .map(|i| {
            constant(format!("file{i}"))
                .name(format!("file{i}"))
                .consumer(net)
                .info(move || format!("host{}", i % 2))
        })
        .collect();
    tasks.push(
        Task::new(|inputs: Vec<Option<String>>| Ok(inputs.into_iter().flatten().count().to_string()))
            .name("count")
            .keep(true)
            .consumer(local)
            .requires_named((0..6).map(|i| format!("file{i}"))),
    );

    loader.add(tasks)?;
    // A one-slot result channel forces dispatch to buffer completions.
    let progress = loader.load_all()?;

    assert_eq!(progress.completed, 7);
    assert_eq!(loader.result_value("count").map(String::as_str), Some("6"));
    Ok(())
}
