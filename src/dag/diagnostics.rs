// src/dag/diagnostics.rs

//! Human-readable views of the DAG for logs, errors and debugging.

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::dag::graph::Dag;

impl<T, I> Dag<T, I> {
    /// Position of a task in its declaration tree, e.g.
    /// `"service.<anonymous #3>.leaf"`.
    ///
    /// The format is for people, not for parsing.
    pub fn identify(&self, idx: usize) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(idx);

        while let Some(current) = cursor {
            segments.push(self.label(current));
            cursor = self.node(current).parent;
        }

        segments.reverse();
        segments.join(".")
    }

    fn label(&self, idx: usize) -> String {
        match self.name(idx) {
            Some(name) => name.to_string(),
            None => format!("<anonymous #{idx}>"),
        }
    }

    /// Export the result edges as a `petgraph` graph, with edges pointing from
    /// prerequisite to dependent. Node `i` of the export is task `i`.
    pub fn to_graph(&self) -> DiGraph<String, ()> {
        let mut graph = DiGraph::with_capacity(self.len(), self.len());

        for idx in 0..self.len() {
            graph.add_node(self.label(idx));
        }

        for idx in 0..self.len() {
            for &dep in self.result_requires(idx) {
                graph.add_edge(NodeIndex::new(dep), NodeIndex::new(idx), ());
            }
        }

        graph
    }

    /// Graphviz rendering of [`Dag::to_graph`].
    pub fn graphviz(&self) -> String {
        let graph = self.to_graph();
        format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}
