// tests/passthroughs.rs

mod common;
use crate::common::builders::{concat, constant};
use crate::common::{init_tracing, TestResult};

use petgraph::algo::is_cyclic_directed;
use taskloader::{Loader, Task};

#[test]
fn plain_passthrough_becomes_a_direct_edge() -> TestResult {
    init_tracing();

    let mut loader: Loader<String> = Loader::new();
    let added = loader.add(vec![
        constant("config".to_string()).name("config"),
        concat("|")
            .name("service")
            .keep(true)
            .subtask(constant("own".to_string()))
            .subtask(Task::named("config")),
    ])?;

    // No node for the passthrough.
    assert_eq!(added, 3);
    assert_eq!(loader.dag().len(), 3);
    assert_eq!(loader.dag().result_requires(1), &[2, 0]);
    assert_eq!(loader.dag().requires(1), &[2, 0]);
    assert_eq!(loader.dag().required_by(0), &[1]);

    loader.load_all()?;
    assert_eq!(loader.result_value("service").map(String::as_str), Some("own|config"));
    Ok(())
}

#[test]
fn named_passthrough_is_materialized_and_forwards_its_input() -> TestResult {
    init_tracing();

    let mut loader: Loader<String> = Loader::new();
    let added = loader.add(vec![
        constant("value".to_string()).name("origin"),
        concat("|")
            .name("holder")
            .subtask(Task::named("origin").name("alias").keep(true)),
    ])?;

    assert_eq!(added, 3);
    let progress = loader.load_all()?;
    assert_eq!(progress.completed, 3);
    assert_eq!(loader.result_value("alias").map(String::as_str), Some("value"));
    Ok(())
}

#[test]
fn top_level_passthrough_adds_nothing() -> TestResult {
    init_tracing();

    let mut loader: Loader<String> = Loader::new();
    let added = loader.add(vec![
        constant("a".to_string()).name("a"),
        Task::named("a"),
    ])?;

    assert_eq!(added, 1);
    assert_eq!(loader.progress().remaining, 1);
    Ok(())
}

#[test]
fn duplicate_requirement_through_passthrough_runs_once() -> TestResult {
    init_tracing();

    let mut loader: Loader<String> = Loader::new();
    loader.add(vec![
        constant("x".to_string()).name("x"),
        concat(",")
            .name("both")
            .keep(true)
            .require("x")
            .subtask(Task::named("x")),
    ])?;

    loader.load_all()?;
    assert_eq!(loader.result_value("both").map(String::as_str), Some("x,x"));
    Ok(())
}

#[test]
fn identify_and_graph_export_describe_the_declaration_tree() -> TestResult {
    init_tracing();

    let mut loader: Loader<String> = Loader::new();
    loader.add(vec![
        constant("r".to_string()).name("root"),
        concat("|")
            .name("outer")
            .subtask(concat("|").subtask(constant("leaf".to_string()).name("leaf")))
            .subtask(Task::named("root")),
    ])?;

    let dag = loader.dag();
    assert_eq!(dag.identify(0), "root");
    assert_eq!(dag.identify(2), "outer.<anonymous #2>");
    assert_eq!(dag.identify(3), "outer.<anonymous #2>.leaf");

    let graph = dag.to_graph();
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 3);
    assert!(!is_cyclic_directed(&graph));

    let dot = loader.graphviz();
    assert!(dot.starts_with("digraph {"), "{dot}");
    assert!(dot.contains("outer"));
    assert!(dot.contains("0 -> 1"));
    Ok(())
}
