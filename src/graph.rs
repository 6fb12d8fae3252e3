//! Dependency graph for cycle detection.
//!
//! The resolution context records every discovered template dependency
//! here. The interface is deliberately narrow: edges go in through
//! [`DependencyGraph::add_edge`] and the only question the graph answers
//! is [`DependencyGraph::would_cycle`], asked before each edge is
//! registered. There is no traversal surface; rejection happens at
//! registration time, naming the offending edge.

use std::collections::HashMap;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::key::TemplateKey;

/// Directed graph of template dependencies, nodes keyed by minimal
/// template keys.
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    graph: DiGraph<TemplateKey, ()>,
    nodes: HashMap<TemplateKey, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_node(&mut self, key: &TemplateKey) -> NodeIndex {
        if let Some(&index) = self.nodes.get(key) {
            index
        } else {
            let index = self.graph.add_node(key.clone());
            self.nodes.insert(key.clone(), index);
            index
        }
    }

    /// Whether registering `dependent -> dependency` would close a cycle.
    ///
    /// True for self-edges and whenever `dependency` already reaches
    /// `dependent` through registered edges.
    pub fn would_cycle(&self, dependent: &TemplateKey, dependency: &TemplateKey) -> bool {
        if dependent == dependency {
            return true;
        }
        let (Some(&from), Some(&to)) = (self.nodes.get(dependency), self.nodes.get(dependent))
        else {
            return false;
        };
        has_path_connecting(&self.graph, from, to, None)
    }

    /// Records `dependent -> dependency`. Duplicate edges collapse.
    ///
    /// Callers check [`Self::would_cycle`] first; the graph itself accepts
    /// any edge.
    pub fn add_edge(&mut self, dependent: &TemplateKey, dependency: &TemplateKey) {
        let from = self.ensure_node(dependent);
        let to = self.ensure_node(dependency);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    #[cfg(test)]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
