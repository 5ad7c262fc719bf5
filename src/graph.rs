//! Reference Graph Diagnostics
//!
//! A petgraph view of the domain object graph reachable from a set of
//! roots. The engine itself never walks the graph (rules pull what they
//! need); this view answers questions about a run after the fact:
//! which objects were reachable, which were never pulled, and which
//! reference cycles exist.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::{is_cyclic_directed, kosaraju_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::handle::Handle;
use crate::model::{DomainObject, ObjectSource, ObjectStore};

/// Directed handle -> handle reference graph
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    graph: DiGraph<Handle, ()>,
    node_indices: HashMap<Handle, NodeIndex>,
    /// Referenced handles with no object in the source
    missing: Vec<Handle>,
}

impl ReferenceGraph {
    /// Breadth-first closure of `roots` through `source`
    pub fn from_roots<O: DomainObject>(roots: &[&O], source: &dyn ObjectSource<O>) -> Self {
        let mut graph = Self::default();
        let mut queue: VecDeque<(Handle, Vec<Handle>)> = VecDeque::new();
        let mut seen = HashSet::new();

        for root in roots {
            let handle = root.handle();
            if seen.insert(handle) {
                graph.node(handle);
                queue.push_back((handle, root.references()));
            }
        }

        while let Some((from, targets)) = queue.pop_front() {
            for target in targets {
                let Some(object) = source.object(target) else {
                    if !graph.missing.contains(&target) {
                        graph.missing.push(target);
                    }
                    continue;
                };
                graph.edge(from, target);
                if seen.insert(target) {
                    queue.push_back((target, object.references()));
                }
            }
        }

        graph
    }

    /// Every object of a store, edges in store order
    pub fn from_store<O: DomainObject>(store: &ObjectStore<O>) -> Self {
        let roots: Vec<&O> = store.iter().collect();
        Self::from_roots(&roots, store)
    }

    fn node(&mut self, handle: Handle) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&handle) {
            return idx;
        }
        let idx = self.graph.add_node(handle);
        self.node_indices.insert(handle, idx);
        idx
    }

    fn edge(&mut self, from: Handle, to: Handle) {
        let a = self.node(from);
        let b = self.node(to);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    /// Reachable handles in discovery order
    pub fn reachable(&self) -> Vec<Handle> {
        self.graph.node_weights().copied().collect()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.node_indices.contains_key(&handle)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Handles referenced but absent from the source
    pub fn missing_targets(&self) -> &[Handle] {
        &self.missing
    }

    /// Direct references of one handle
    pub fn refs_out(&self, handle: Handle) -> Vec<Handle> {
        let Some(&idx) = self.node_indices.get(&handle) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| self.graph.node_weight(e.target()).copied())
            .collect()
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Reference cycles: strongly connected components with more than one
    /// member, plus self-references
    pub fn cycles(&self) -> Vec<Vec<Handle>> {
        kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || self
                        .graph
                        .edges_directed(scc[0], Direction::Outgoing)
                        .any(|e| e.target() == scc[0])
            })
            .map(|scc| {
                let mut members: Vec<Handle> = scc
                    .iter()
                    .filter_map(|idx| self.graph.node_weight(*idx).copied())
                    .collect();
                members.sort();
                members
            })
            .collect()
    }
}
