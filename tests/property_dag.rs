// tests/property_dag.rs

mod common;
use crate::common::{init_tracing, EventLog};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use petgraph::algo::is_cyclic_directed;
use proptest::prelude::*;
use taskloader::{ConsumerId, Loader, Progress, Task};

/// A random task list: task `i` names earlier tasks as prerequisites, runs
/// on the sequential or the parallel consumer, and may fail.
#[derive(Debug, Clone)]
struct Plan {
    deps: Vec<Vec<usize>>,
    parallel: Vec<bool>,
    failing: Vec<bool>,
}

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn plan_strategy(max_tasks: usize) -> impl Strategy<Value = Plan> {
    (1..=max_tasks).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n),
            proptest::collection::vec(any::<bool>(), n),
            proptest::collection::vec(prop::bool::weighted(0.15), n),
        )
            .prop_map(move |(raw, parallel, failing)| {
                let deps = raw
                    .into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        if i == 0 {
                            return Vec::new();
                        }
                        let unique: BTreeSet<usize> = picks.into_iter().map(|p| p % i).collect();
                        unique.into_iter().collect()
                    })
                    .collect();
                Plan {
                    deps,
                    parallel,
                    failing,
                }
            })
    })
}

struct Run {
    progress: Progress,
    results: Vec<Option<i64>>,
    calls: Vec<usize>,
    log: EventLog,
    input_mismatches: Arc<AtomicUsize>,
    acyclic: bool,
}

/// Each task returns the sum of its present inputs plus its own index, and
/// checks that its inputs arrive in declaration order with `None` for failed
/// prerequisites.
fn run_plan(plan: &Plan, incremental: bool) -> Run {
    let mut loader: Loader<i64> = Loader::new();
    let pool = loader.new_consumer(3, None).unwrap();

    let n = plan.deps.len();
    let calls: Arc<Vec<AtomicUsize>> = Arc::new((0..n).map(|_| AtomicUsize::new(0)).collect());
    let mismatches = Arc::new(AtomicUsize::new(0));
    let log = EventLog::new();
    let want = expected(plan);

    let tasks: Vec<Task<i64>> = (0..n)
        .map(|i| {
            let wanted: Vec<Option<i64>> = plan.deps[i].iter().map(|&d| want[d]).collect();
            let fails = plan.failing[i];
            let calls = Arc::clone(&calls);
            let mismatches = Arc::clone(&mismatches);

            log.task(&format!("t{i}"), move |inputs: Vec<Option<i64>>| {
                calls[i].fetch_add(1, Ordering::SeqCst);
                if inputs != wanted {
                    mismatches.fetch_add(1, Ordering::SeqCst);
                }
                if fails {
                    anyhow::bail!("t{i} fails");
                }
                Ok(inputs.into_iter().flatten().sum::<i64>() + i as i64)
            })
            .name(format!("t{i}"))
            .keep(true)
            .consumer(if plan.parallel[i] { pool } else { ConsumerId::SEQUENTIAL })
            .requires_named(plan.deps[i].iter().map(|d| format!("t{d}")))
        })
        .collect();

    loader.add(tasks).unwrap();
    let acyclic = !is_cyclic_directed(&loader.dag().to_graph());

    let progress = if incremental {
        loop {
            let progress = loader.load(Duration::from_millis(1)).unwrap();
            if progress.done {
                break progress;
            }
        }
    } else {
        loader.load_all().unwrap()
    };

    let results = (0..n)
        .map(|i| loader.result_value(&format!("t{i}")).copied())
        .collect();
    let calls = calls.iter().map(|c| c.load(Ordering::SeqCst)).collect();

    Run {
        progress,
        results,
        calls,
        log,
        input_mismatches: mismatches,
        acyclic,
    }
}

/// What each task should produce, computed without the loader.
fn expected(plan: &Plan) -> Vec<Option<i64>> {
    let mut out: Vec<Option<i64>> = Vec::with_capacity(plan.deps.len());
    for (i, deps) in plan.deps.iter().enumerate() {
        let value = if plan.failing[i] {
            None
        } else {
            Some(deps.iter().filter_map(|&d| out[d]).sum::<i64>() + i as i64)
        };
        out.push(value);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn random_dags_run_every_task_once_in_topological_order(plan in plan_strategy(12)) {
        init_tracing();

        let run = run_plan(&plan, false);
        let n = plan.deps.len();

        prop_assert!(run.acyclic);
        prop_assert_eq!(run.progress.completed, n);
        prop_assert_eq!(run.progress.remaining, 0);
        prop_assert!(run.progress.done);
        prop_assert!(run.calls.iter().all(|&c| c == 1), "calls: {:?}", run.calls);
        prop_assert_eq!(run.input_mismatches.load(Ordering::SeqCst), 0);

        for (i, deps) in plan.deps.iter().enumerate() {
            for d in deps {
                prop_assert!(
                    run.log.ended_before_start(&format!("t{d}"), &format!("t{i}")),
                    "t{} started before t{} ended", i, d
                );
            }
        }

        prop_assert_eq!(run.results, expected(&plan));
    }

    #[test]
    fn incremental_loading_reaches_the_same_results(plan in plan_strategy(8)) {
        init_tracing();

        let all = run_plan(&plan, false);
        let sliced = run_plan(&plan, true);

        prop_assert_eq!(sliced.progress, all.progress);
        prop_assert_eq!(sliced.results, all.results);
        prop_assert!(sliced.calls.iter().all(|&c| c == 1));
    }
}
