//! Strict partial order over arbitrary elements, backed by petgraph.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, VisitMap};
use petgraph::Direction;
use thiserror::Error;

use ordo_util::errors::OrdoError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderingError {
    /// Recording `before > after` would close a cycle.
    #[error("placing {before} before {after} violates the strict ordering")]
    Violation { before: String, after: String },
}

impl From<OrderingError> for OrdoError {
    fn from(err: OrderingError) -> Self {
        OrdoError::OrderingViolation {
            message: err.to_string(),
        }
    }
}

/// A directed acyclic "comes before" relation.
///
/// Every accepted relation is kept irreflexive, antisymmetric and transitive:
/// a relation that would make an element (transitively) precede itself is
/// rejected and leaves the structure untouched.
pub struct OrderedStructure<T> {
    graph: DiGraph<T, ()>,
    index: HashMap<T, NodeIndex>,
}

impl<T> OrderedStructure<T>
where
    T: Clone + Eq + Hash + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Register an element without relating it to anything.
    pub fn add_element(&mut self, element: T) {
        self.intern(element);
    }

    /// Record that `before` comes before `after`.
    pub fn add_relation(&mut self, before: T, after: T) -> Result<(), OrderingError> {
        let violation = |before: &T, after: &T| OrderingError::Violation {
            before: format!("{before:?}"),
            after: format!("{after:?}"),
        };
        if before == after {
            return Err(violation(&before, &after));
        }
        if let (Some(&b), Some(&a)) = (self.index.get(&before), self.index.get(&after)) {
            if has_path_connecting(&self.graph, a, b, None) {
                return Err(violation(&before, &after));
            }
        }

        let b = self.intern(before);
        let a = self.intern(after);
        if self.graph.find_edge(b, a).is_none() {
            self.graph.add_edge(b, a, ());
        }
        Ok(())
    }

    /// All elements such that every recorded relation `a > b` places `a`
    /// before `b`.
    ///
    /// Roots are visited in insertion order, so the same sequence of calls
    /// always produces the same order.
    pub fn topological_sort(&self) -> Vec<T> {
        let mut dfs = DfsPostOrder::empty(&self.graph);
        let mut finished = Vec::with_capacity(self.graph.node_count());
        for node in self.graph.node_indices() {
            if dfs.discovered.is_visited(&node) {
                continue;
            }
            dfs.move_to(node);
            while let Some(done) = dfs.next(&self.graph) {
                finished.push(done);
            }
        }
        finished
            .into_iter()
            .rev()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// Rank of `element` in a freshly computed sort.
    pub fn find_position(&self, element: &T) -> Option<usize> {
        if !self.element_exists(element) {
            return None;
        }
        self.topological_sort().iter().position(|e| e == element)
    }

    pub fn element_exists(&self, element: &T) -> bool {
        self.index.contains_key(element)
    }

    /// Elements directly placed after `element`.
    pub fn successors(&self, element: &T) -> Vec<T> {
        let Some(&idx) = self.index.get(element) else {
            return Vec::new();
        };
        let mut out: Vec<T> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect();
        // petgraph yields the newest edge first.
        out.reverse();
        out
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn intern(&mut self, element: T) -> NodeIndex {
        if let Some(&idx) = self.index.get(&element) {
            return idx;
        }
        let idx = self.graph.add_node(element.clone());
        self.index.insert(element, idx);
        idx
    }
}

impl<T> Default for OrderedStructure<T>
where
    T: Clone + Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for OrderedStructure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedStructure")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .finish()
    }
}
