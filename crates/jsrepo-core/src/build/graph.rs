//! Item-level dependency graph and cycle detection.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What a build does when items depend on each other in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Report each cycle as a `DEPENDENCY_CYCLE` warning.
    #[default]
    Warn,
    /// Fail the build on the first cycle.
    Error,
}

/// Directed graph from item name to the items it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl ItemGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no edges (if not present).
    pub fn add_node(&mut self, name: impl Into<String>) {
        self.edges.entry(name.into()).or_default();
    }

    /// Add an edge `from -> to`, adding both nodes.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let to = to.into();
        self.edges.entry(to.clone()).or_default();
        self.edges.entry(from.into()).or_default().insert(to);
    }

    /// Nodes `name` depends on directly.
    pub fn dependencies(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(name)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Find cycles by DFS colouring.
    ///
    /// Each cycle is reported once, rotated to start at its smallest name
    /// and closed (`["a", "b", "a"]`). Order is deterministic.
    #[must_use]
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut color: BTreeMap<&str, Color> =
            self.edges.keys().map(|k| (k.as_str(), Color::White)).collect();
        let mut stack: Vec<&str> = Vec::new();
        let mut found: BTreeSet<Vec<String>> = BTreeSet::new();

        for node in self.edges.keys() {
            if color.get(node.as_str()) == Some(&Color::White) {
                self.visit(node, &mut color, &mut stack, &mut found);
            }
        }

        found.into_iter().collect()
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        color: &mut BTreeMap<&'a str, Color>,
        stack: &mut Vec<&'a str>,
        found: &mut BTreeSet<Vec<String>>,
    ) {
        color.insert(node, Color::Gray);
        stack.push(node);

        for dep in self.dependencies(node) {
            match color.get(dep).copied().unwrap_or(Color::White) {
                Color::White => self.visit(dep, color, stack, found),
                Color::Gray => {
                    if let Some(start) = stack.iter().position(|n| *n == dep) {
                        found.insert(canonical_cycle(&stack[start..]));
                    }
                }
                Color::Black => {}
            }
        }

        stack.pop();
        color.insert(node, Color::Black);
    }
}

/// Rotate so the smallest name comes first, then close the loop.
fn canonical_cycle(nodes: &[&str]) -> Vec<String> {
    let min = nodes
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| **n)
        .map_or(0, |(i, _)| i);
    let mut out: Vec<String> = nodes[min..]
        .iter()
        .chain(&nodes[..min])
        .map(|n| (*n).to_string())
        .collect();
    if let Some(first) = out.first().cloned() {
        out.push(first);
    }
    out
}
