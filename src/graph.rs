//! The contact network: an undirected simple graph over a fixed node set.
//!
//! Each node keeps its neighbors in insertion order (swap-removal may reorder
//! them), which is stable enough to sample from uniformly. Edge removal
//! checks that the degree of both endpoints dropped by exactly one.
use log::trace;
use rand::Rng;

use crate::agent::AgentId;
use crate::error::SirError;
use crate::random::sample_single_from_known_length;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContactGraph {
    adjacency: Vec<Vec<AgentId>>,
    edge_count: usize,
}

impl ContactGraph {
    /// Creates a graph with `nodes` isolated nodes, labelled `0..nodes`.
    #[must_use]
    pub fn new(nodes: usize) -> Self {
        ContactGraph {
            adjacency: vec![Vec::new(); nodes],
            edge_count: 0,
        }
    }

    /// Creates a graph from an explicit edge list. Fails on self-loops,
    /// duplicate edges, or endpoints outside `0..nodes`.
    pub fn from_edges(nodes: usize, edges: &[(usize, usize)]) -> Result<Self, SirError> {
        let mut graph = ContactGraph::new(nodes);
        for &(a, b) in edges {
            graph.add_edge(AgentId::new(a), AgentId::new(b))?;
        }
        Ok(graph)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn nodes(&self) -> impl ExactSizeIterator<Item = AgentId> {
        (0..self.node_count()).map(AgentId::new)
    }

    fn check_node(&self, id: AgentId) -> Result<(), SirError> {
        if id.index() >= self.node_count() {
            return Err(SirError::InvalidOperationError(format!(
                "{id} is not a node of a graph with {} nodes",
                self.node_count()
            )));
        }
        Ok(())
    }

    /// Neighbors of `id`. Out-of-range ids have no neighbors.
    #[must_use]
    pub fn neighbors(&self, id: AgentId) -> &[AgentId] {
        match self.adjacency.get(id.index()) {
            Some(neighbors) => neighbors,
            None => &[],
        }
    }

    #[must_use]
    pub fn degree(&self, id: AgentId) -> usize {
        self.neighbors(id).len()
    }

    #[must_use]
    pub fn has_edge(&self, a: AgentId, b: AgentId) -> bool {
        self.neighbors(a).contains(&b)
    }

    /// Every edge once, as `(low, high)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (AgentId, AgentId)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(a, neighbors)| {
            let a = AgentId::new(a);
            neighbors
                .iter()
                .filter(move |&&b| a < b)
                .map(move |&b| (a, b))
        })
    }

    pub fn add_edge(&mut self, a: AgentId, b: AgentId) -> Result<(), SirError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b {
            return Err(SirError::InvalidOperationError(String::from(
                "Cannot make edge to self",
            )));
        }
        if self.has_edge(a, b) {
            return Err(SirError::InvalidOperationError(format!(
                "Edge {a}-{b} already exists"
            )));
        }

        trace!("adding edge {a}-{b}");
        self.adjacency[a.index()].push(b);
        self.adjacency[b.index()].push(a);
        self.edge_count += 1;
        Ok(())
    }

    /// Removes the edge between `a` and `b`. Fails with `InvalidOperationError`
    /// if the edge is absent, and with `InternalInvariantError` if the degree
    /// of either endpoint did not drop by exactly one.
    pub fn remove_edge(&mut self, a: AgentId, b: AgentId) -> Result<(), SirError> {
        self.check_node(a)?;
        self.check_node(b)?;
        let (degree_a, degree_b) = (self.degree(a), self.degree(b));

        let Some(position) = self.adjacency[a.index()].iter().position(|&n| n == b) else {
            return Err(SirError::InvalidOperationError(format!(
                "Edge {a}-{b} does not exist"
            )));
        };
        self.adjacency[a.index()].swap_remove(position);
        if let Some(position) = self.adjacency[b.index()].iter().position(|&n| n == a) {
            self.adjacency[b.index()].swap_remove(position);
        }

        if self.degree(a) + 1 != degree_a || self.degree(b) + 1 != degree_b {
            return Err(SirError::InternalInvariantError(format!(
                "removing edge {a}-{b} changed degrees {degree_a}->{} and {degree_b}->{}",
                self.degree(a),
                self.degree(b)
            )));
        }

        trace!("removed edge {a}-{b}");
        self.edge_count -= 1;
        Ok(())
    }

    /// Samples a node uniformly from the whole node set.
    pub fn sample_random_node<R: Rng>(&self, rng: &mut R) -> Result<AgentId, SirError> {
        sample_single_from_known_length(rng, self.nodes()).ok_or_else(|| {
            SirError::InvalidOperationError(String::from("Cannot sample a node from an empty graph"))
        })
    }

    /// Samples a node uniformly from every node except `excluded`.
    pub fn sample_other_node<R: Rng>(&self, rng: &mut R, excluded: AgentId) -> Result<AgentId, SirError> {
        self.check_node(excluded)?;
        let candidates = self.node_count() - 1;
        if candidates == 0 {
            return Err(SirError::InvalidOperationError(format!(
                "No node other than {excluded} to sample"
            )));
        }
        let index = rng.random_range(0..candidates);
        let index = if index >= excluded.index() { index + 1 } else { index };
        Ok(AgentId::new(index))
    }

    /// Samples one neighbor of `id` uniformly.
    pub fn sample_neighbor<R: Rng>(&self, rng: &mut R, id: AgentId) -> Result<AgentId, SirError> {
        sample_single_from_known_length(rng, self.neighbors(id).iter().copied()).ok_or_else(|| {
            SirError::InvalidOperationError(format!("{id} has no neighbors to sample"))
        })
    }
}
