//! Initial contact networks.
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::SirError;
use crate::graph::ContactGraph;

/// How to build the starting contact network.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkConfig {
    /// A uniformly random labelled tree.
    RandomTree { nodes: usize },
    /// Each pair is connected independently with `edge_probability`.
    ErdosRenyi { nodes: usize, edge_probability: f64 },
    Complete { nodes: usize },
    Ring { nodes: usize },
    EdgeList { nodes: usize, edges: Vec<(usize, usize)> },
}

impl NetworkConfig {
    #[must_use]
    pub fn nodes(&self) -> usize {
        match self {
            NetworkConfig::RandomTree { nodes }
            | NetworkConfig::ErdosRenyi { nodes, .. }
            | NetworkConfig::Complete { nodes }
            | NetworkConfig::Ring { nodes }
            | NetworkConfig::EdgeList { nodes, .. } => *nodes,
        }
    }

    pub fn build<R: Rng>(&self, rng: &mut R) -> Result<ContactGraph, SirError> {
        match self {
            NetworkConfig::RandomTree { nodes } => random_tree(*nodes, rng),
            NetworkConfig::ErdosRenyi {
                nodes,
                edge_probability,
            } => erdos_renyi(*nodes, *edge_probability, rng),
            NetworkConfig::Complete { nodes } => complete(*nodes),
            NetworkConfig::Ring { nodes } => ring(*nodes),
            NetworkConfig::EdgeList { nodes, edges } => ContactGraph::from_edges(*nodes, edges),
        }
    }
}

/// Decodes a uniformly random Prüfer sequence into a labelled tree.
pub fn random_tree<R: Rng>(nodes: usize, rng: &mut R) -> Result<ContactGraph, SirError> {
    let mut graph = ContactGraph::new(nodes);
    if nodes < 2 {
        return Ok(graph);
    }
    if nodes == 2 {
        graph.add_edge(AgentId::new(0), AgentId::new(1))?;
        return Ok(graph);
    }

    let sequence: Vec<usize> = (0..nodes - 2).map(|_| rng.random_range(0..nodes)).collect();
    let mut degree = vec![1usize; nodes];
    for &node in &sequence {
        degree[node] += 1;
    }
    let mut leaves: BinaryHeap<Reverse<usize>> = (0..nodes)
        .filter(|&node| degree[node] == 1)
        .map(Reverse)
        .collect();

    for &node in &sequence {
        let Some(Reverse(leaf)) = leaves.pop() else {
            return Err(SirError::InternalInvariantError(String::from(
                "Prüfer decoding ran out of leaves",
            )));
        };
        graph.add_edge(AgentId::new(leaf), AgentId::new(node))?;
        degree[node] -= 1;
        if degree[node] == 1 {
            leaves.push(Reverse(node));
        }
    }

    let (Some(Reverse(a)), Some(Reverse(b))) = (leaves.pop(), leaves.pop()) else {
        return Err(SirError::InternalInvariantError(String::from(
            "Prüfer decoding must end with two leaves",
        )));
    };
    graph.add_edge(AgentId::new(a), AgentId::new(b))?;
    Ok(graph)
}

pub fn erdos_renyi<R: Rng>(
    nodes: usize,
    edge_probability: f64,
    rng: &mut R,
) -> Result<ContactGraph, SirError> {
    if !(0.0..=1.0).contains(&edge_probability) {
        return Err(SirError::ConfigurationError(format!(
            "edge_probability must lie in [0, 1], got {edge_probability}"
        )));
    }
    let mut graph = ContactGraph::new(nodes);
    for a in 0..nodes {
        for b in a + 1..nodes {
            if rng.random_bool(edge_probability) {
                graph.add_edge(AgentId::new(a), AgentId::new(b))?;
            }
        }
    }
    Ok(graph)
}

pub fn complete(nodes: usize) -> Result<ContactGraph, SirError> {
    let mut graph = ContactGraph::new(nodes);
    for a in 0..nodes {
        for b in a + 1..nodes {
            graph.add_edge(AgentId::new(a), AgentId::new(b))?;
        }
    }
    Ok(graph)
}

/// A cycle through every node. Two nodes get a single edge.
pub fn ring(nodes: usize) -> Result<ContactGraph, SirError> {
    let mut graph = ContactGraph::new(nodes);
    if nodes == 2 {
        graph.add_edge(AgentId::new(0), AgentId::new(1))?;
    } else if nodes > 2 {
        for a in 0..nodes {
            graph.add_edge(AgentId::new(a), AgentId::new((a + 1) % nodes))?;
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    fn is_connected(graph: &ContactGraph) -> bool {
        if graph.is_empty() {
            return true;
        }
        let mut seen = HashSet::from([AgentId::new(0)]);
        let mut stack = vec![AgentId::new(0)];
        while let Some(node) = stack.pop() {
            for &n in graph.neighbors(node) {
                if seen.insert(n) {
                    stack.push(n);
                }
            }
        }
        seen.len() == graph.node_count()
    }

    #[test]
    fn random_tree_is_a_spanning_tree() {
        let mut rng = SmallRng::seed_from_u64(1991);
        for nodes in [0, 1, 2, 3, 10, 100] {
            let tree = random_tree(nodes, &mut rng).unwrap();
            assert_eq!(tree.node_count(), nodes);
            assert_eq!(tree.edge_count(), nodes.saturating_sub(1));
            assert!(is_connected(&tree));
        }
    }

    #[test]
    fn complete_and_ring_sizes() {
        assert_eq!(complete(5).unwrap().edge_count(), 10);
        assert_eq!(ring(5).unwrap().edge_count(), 5);
        assert_eq!(ring(2).unwrap().edge_count(), 1);
        assert_eq!(ring(1).unwrap().edge_count(), 0);
    }

    #[test]
    fn erdos_renyi_extremes() {
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(erdos_renyi(6, 0.0, &mut rng).unwrap().edge_count(), 0);
        assert_eq!(erdos_renyi(6, 1.0, &mut rng).unwrap().edge_count(), 15);
        assert!(matches!(
            erdos_renyi(6, 2.0, &mut rng),
            Err(SirError::ConfigurationError(_))
        ));
    }

    #[test]
    fn network_config_from_json() {
        let config: NetworkConfig =
            serde_json::from_str(r#"{"kind": "edge_list", "nodes": 3, "edges": [[0, 1], [1, 2]]}"#)
                .unwrap();
        assert_eq!(config.nodes(), 3);
        let mut rng = SmallRng::seed_from_u64(0);
        let graph = config.build(&mut rng).unwrap();
        assert_eq!(graph.edge_count(), 2);
    }
}
