// tests/strategy_accounting.rs

mod common;
use crate::common::builders::constant;
use crate::common::{init_tracing, Call, EventLog, RecordingStrategy, TestResult};

use std::time::Duration;

use taskloader::{AlwaysAccept, Loader, MaxConcurrent, PerKeyLimit, Strategy, Task};

#[test]
fn bundled_strategies_count_admissions() {
    let mut always = AlwaysAccept;
    assert!(Strategy::<String>::start(&mut always, None));

    let mut max = MaxConcurrent::new(2);
    assert!(Strategy::<()>::start(&mut max, None));
    assert!(Strategy::<()>::start(&mut max, None));
    assert!(!Strategy::<()>::start(&mut max, None));
    assert_eq!(max.running(), 2);
    Strategy::<()>::end(&mut max, None);
    assert!(Strategy::<()>::start(&mut max, None));

    let mut per_host = PerKeyLimit::new(1);
    let a = "a".to_string();
    let b = "b".to_string();
    assert!(per_host.start(Some(&a)));
    assert!(!per_host.start(Some(&a)));
    assert!(per_host.start(Some(&b)));
    assert!(per_host.start(None));
    assert_eq!(per_host.running(&a), 1);
    per_host.end(Some(&a));
    assert_eq!(per_host.running(&a), 0);
    assert!(per_host.start(Some(&a)));
}

#[test]
fn max_concurrent_limits_a_wide_parallel_consumer() -> TestResult {
    init_tracing();

    let mut loader: Loader<u32> = Loader::new();
    let (strategy, calls) = RecordingStrategy::new(MaxConcurrent::new(3));
    let pool = loader.new_consumer_with(8, strategy)?;

    let log = EventLog::new();
    let tasks: Vec<Task<u32>> = (0..12)
        .map(|i| {
            log.task(&format!("t{i}"), move |_| {
                std::thread::sleep(Duration::from_millis(10));
                Ok(i)
            })
            .consumer(pool)
        })
        .collect();

    loader.add(tasks)?;
    let progress = loader.load_all()?;

    assert_eq!(progress.completed, 12);
    assert!(calls.peak_total() <= 3, "peak {}", calls.peak_total());
    assert!(log.peak_running() <= 3, "observed {}", log.peak_running());
    assert_eq!(calls.accepted(), 12);
    assert_eq!(calls.ends(), 12);
    assert_eq!(calls.unbalanced(), 0);
    Ok(())
}

#[test]
fn every_end_matches_an_accepted_start_with_the_same_info() -> TestResult {
    init_tracing();

    let mut loader: Loader<String> = Loader::new();
    let (strategy, calls) = RecordingStrategy::new(PerKeyLimit::<String>::new(1));
    let net = loader.new_consumer_with(3, strategy)?;

    let tasks: Vec<Task<String>> = ["h1", "h2", "h1", "h3", "h2", "h1"]
        .into_iter()
        .enumerate()
        .map(|(i, host)| {
            constant(format!("{host}#{i}"))
                .consumer(net)
                .info(move || host.to_string())
        })
        .collect();

    loader.add(tasks)?;
    loader.load_all()?;

    let calls = calls.calls();
    for host in ["h1", "h2", "h3"] {
        let info = Some(host.to_string());
        let accepted = calls
            .iter()
            .filter(|c| matches!(c, Call::Start { info: i, accepted: true } if *i == info))
            .count();
        let ended = calls
            .iter()
            .filter(|c| matches!(c, Call::End { info: i } if *i == info))
            .count();
        assert_eq!(accepted, ended, "host {host}");
    }

    // Replay the calls: a host never has two admitted tasks at once.
    let mut running = std::collections::HashMap::new();
    for call in &calls {
        match call {
            Call::Start { info, accepted: true } => {
                let n = running.entry(info.clone()).or_insert(0);
                *n += 1;
                assert!(*n <= 1, "{info:?} admitted twice");
            }
            Call::End { info } => *running.get_mut(info).unwrap() -= 1,
            Call::Start { accepted: false, .. } => {}
        }
    }
    Ok(())
}

#[test]
fn sequential_consumer_keeps_fifo_order_under_a_strategy() -> TestResult {
    init_tracing();

    let mut loader: Loader<String> = Loader::new();
    let (strategy, calls) = RecordingStrategy::new(PerKeyLimit::<String>::new(1));
    let seq = loader.new_consumer_with(0, strategy)?;

    let log = EventLog::new();
    let tasks: Vec<Task<String>> = ["k", "k", "j"]
        .into_iter()
        .enumerate()
        .map(|(i, key)| {
            log.task(&format!("{key}{i}"), move |_| Ok(format!("{key}{i}")))
                .consumer(seq)
                .info(move || key.to_string())
        })
        .collect();

    loader.add(tasks)?;
    let progress = loader.load_all()?;

    assert_eq!(progress.completed, 3);
    assert_eq!(log.started(), vec!["k0", "k1", "j2"]);
    assert_eq!(calls.accepted(), 3);
    assert_eq!(calls.ends(), 3);
    Ok(())
}

#[test]
fn strategy_that_never_admits_stalls_load_all() -> TestResult {
    init_tracing();

    struct Never;
    impl<I> Strategy<I> for Never {
        fn start(&mut self, _: Option<&I>) -> bool {
            false
        }
        fn end(&mut self, _: Option<&I>) {}
    }

    let mut loader: Loader<String> = Loader::new();
    let blocked = loader.new_consumer_with(0, Never)?;
    loader.add(vec![
        constant("fine".to_string()).name("fine").keep(true),
        constant("never".to_string()).consumer(blocked),
    ])?;

    let err = loader.load_all().unwrap_err();
    assert!(matches!(err, taskloader::LoaderError::Stalled { remaining: 1 }));
    assert_eq!(loader.result_value("fine").map(String::as_str), Some("fine"));

    let progress = loader.load(Duration::from_millis(5))?;
    assert_eq!(progress.remaining, 1);
    assert!(!progress.done);
    Ok(())
}
