//! Target device coupling map.

use std::collections::VecDeque;

use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};

/// Target device coupling map.
///
/// The coupling map defines which pairs of physical qubits can
/// interact with two-qubit gates. Edges are undirected.
///
/// ## Performance
///
/// On construction, distance and predecessor matrices are precomputed
/// using BFS from each node. This gives O(1) `distance()` lookups and
/// O(distance) path reconstruction during routing and layout scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CouplingMapData", into = "CouplingMapData")]
pub struct CouplingMap {
    /// Normalized `(low, high)` pairs, sorted and deduplicated.
    edges: Vec<(u32, u32)>,
    /// Number of physical qubits.
    num_qubits: u32,
    /// Sorted neighbour lists.
    adjacency: Vec<Vec<u32>>,
    /// `dist_matrix[from][to]`, or `u32::MAX` if unreachable.
    dist_matrix: Vec<Vec<u32>>,
    /// `pred_matrix[from][to]` is the hop before `to` on a shortest path.
    pred_matrix: Vec<Vec<u32>>,
}

/// Serialized form of a [`CouplingMap`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingMapData {
    /// Number of physical qubits; defaults to one past the highest index.
    #[serde(default)]
    pub num_qubits: Option<u32>,
    /// Connected pairs.
    pub edges: Vec<(u32, u32)>,
}

impl From<CouplingMapData> for CouplingMap {
    fn from(data: CouplingMapData) -> Self {
        match data.num_qubits {
            Some(n) => CouplingMap::with_num_qubits(n, &data.edges),
            None => CouplingMap::from_edges(&data.edges),
        }
    }
}

impl From<CouplingMap> for CouplingMapData {
    fn from(map: CouplingMap) -> Self {
        CouplingMapData {
            num_qubits: Some(map.num_qubits),
            edges: map.edges,
        }
    }
}

impl From<Vec<(u32, u32)>> for CouplingMap {
    fn from(edges: Vec<(u32, u32)>) -> Self {
        CouplingMap::from_edges(&edges)
    }
}

impl From<&[(u32, u32)]> for CouplingMap {
    fn from(edges: &[(u32, u32)]) -> Self {
        CouplingMap::from_edges(edges)
    }
}

impl CouplingMap {
    /// Build a map from a pair list; the qubit count is one past the
    /// highest index mentioned.
    pub fn from_edges(edges: &[(u32, u32)]) -> Self {
        let num_qubits = edges
            .iter()
            .map(|&(a, b)| a.max(b) + 1)
            .max()
            .unwrap_or(0);
        Self::with_num_qubits(num_qubits, edges)
    }

    /// Build a map over `num_qubits` qubits, some of which may be isolated.
    ///
    /// Self-loops are dropped; reversed duplicates collapse to one edge.
    pub fn with_num_qubits(num_qubits: u32, edges: &[(u32, u32)]) -> Self {
        let num_qubits = edges
            .iter()
            .map(|&(a, b)| a.max(b) + 1)
            .max()
            .unwrap_or(0)
            .max(num_qubits);
        let mut normalized: Vec<(u32, u32)> = edges
            .iter()
            .filter(|(a, b)| a != b)
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect();
        normalized.sort_unstable();
        normalized.dedup();

        let mut adjacency = vec![Vec::new(); num_qubits as usize];
        for &(a, b) in &normalized {
            adjacency[a as usize].push(b);
            adjacency[b as usize].push(a);
        }
        for list in &mut adjacency {
            list.sort_unstable();
        }

        let mut map = Self {
            edges: normalized,
            num_qubits,
            adjacency,
            dist_matrix: vec![],
            pred_matrix: vec![],
        };
        map.precompute_distances();
        map
    }

    /// Precompute all-pairs shortest paths using BFS from each node.
    fn precompute_distances(&mut self) {
        let n = self.num_qubits as usize;
        self.dist_matrix = vec![vec![u32::MAX; n]; n];
        self.pred_matrix = vec![vec![u32::MAX; n]; n];

        for src in 0..n {
            self.dist_matrix[src][src] = 0;
            let mut queue = VecDeque::new();
            queue.push_back(src);

            while let Some(cur) = queue.pop_front() {
                for &neighbor in &self.adjacency[cur] {
                    let nb = neighbor as usize;
                    if self.dist_matrix[src][nb] == u32::MAX {
                        self.dist_matrix[src][nb] = self.dist_matrix[src][cur] + 1;
                        self.pred_matrix[src][nb] = cur as u32;
                        queue.push_back(nb);
                    }
                }
            }
        }
    }

    /// Check if two qubits are directly connected.
    #[inline]
    pub fn is_connected(&self, q1: u32, q2: u32) -> bool {
        self.adjacency
            .get(q1 as usize)
            .is_some_and(|neighbors| neighbors.binary_search(&q2).is_ok())
    }

    /// Check whether every qubit can reach every other qubit.
    pub fn is_graph_connected(&self) -> bool {
        self.dist_matrix
            .first()
            .is_none_or(|row| row.iter().all(|&d| d != u32::MAX))
    }

    /// Check whether every pair of qubits shares an edge.
    pub fn is_fully_connected(&self) -> bool {
        let n = u64::from(self.num_qubits);
        self.edges.len() as u64 == n * n.saturating_sub(1) / 2
    }

    /// Get the number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Get the coupling edges as normalized `(low, high)` pairs.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Get neighbors of a qubit in ascending order.
    pub fn neighbors(&self, qubit: u32) -> impl Iterator<Item = u32> + '_ {
        self.adjacency
            .get(qubit as usize)
            .map(|v| v.iter().copied())
            .into_iter()
            .flatten()
    }

    /// Number of neighbours of a qubit.
    pub fn degree(&self, qubit: u32) -> usize {
        self.adjacency.get(qubit as usize).map_or(0, Vec::len)
    }

    /// O(1) shortest-path distance lookup.
    pub fn distance(&self, from: u32, to: u32) -> Option<u32> {
        let d = *self.dist_matrix.get(from as usize)?.get(to as usize)?;
        (d != u32::MAX).then_some(d)
    }

    /// Reconstruct the shortest path from→to, both endpoints included.
    pub fn shortest_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        self.distance(from, to)?;
        let row = &self.pred_matrix[from as usize];
        let mut path = vec![to];
        let mut current = to;
        while current != from {
            current = row[current as usize];
            if current == u32::MAX {
                return None;
            }
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Build an undirected petgraph view; node `i` is physical qubit `i`.
    pub fn graph(&self) -> UnGraph<(), ()> {
        let mut graph = UnGraph::with_capacity(self.num_qubits as usize, self.edges.len());
        for _ in 0..self.num_qubits {
            graph.add_node(());
        }
        graph.extend_with_edges(self.edges.iter().copied());
        graph
    }

    /// Create a linear coupling map (0-1-2-3-...).
    pub fn linear(n: u32) -> Self {
        let edges: Vec<_> = (0..n.saturating_sub(1)).map(|i| (i, i + 1)).collect();
        Self::with_num_qubits(n, &edges)
    }

    /// Create a ring coupling map (linear plus the closing edge).
    pub fn ring(n: u32) -> Self {
        let mut edges: Vec<_> = (0..n.saturating_sub(1)).map(|i| (i, i + 1)).collect();
        if n > 2 {
            edges.push((n - 1, 0));
        }
        Self::with_num_qubits(n, &edges)
    }

    /// Create a fully connected coupling map.
    pub fn full(n: u32) -> Self {
        let edges: Vec<_> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        Self::with_num_qubits(n, &edges)
    }

    /// Create a star topology (center qubit connected to all others).
    pub fn star(n: u32) -> Self {
        let edges: Vec<_> = (1..n).map(|i| (0, i)).collect();
        Self::with_num_qubits(n, &edges)
    }

    /// Create a `rows x cols` grid with nearest-neighbour edges.
    pub fn grid(rows: u32, cols: u32) -> Self {
        let mut edges = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let q = r * cols + c;
                if c + 1 < cols {
                    edges.push((q, q + 1));
                }
                if r + 1 < rows {
                    edges.push((q, q + cols));
                }
            }
        }
        Self::with_num_qubits(rows * cols, &edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupling_map_linear() {
        let map = CouplingMap::linear(5);
        assert!(map.is_connected(0, 1));
        assert!(map.is_connected(1, 2));
        assert!(!map.is_connected(0, 2));
        assert_eq!(map.distance(0, 4), Some(4));
        assert_eq!(map.shortest_path(0, 3), Some(vec![0, 1, 2, 3]));
    }

    #[test]
    fn test_coupling_map_star() {
        let map = CouplingMap::star(5);
        assert!(map.is_connected(0, 4));
        assert!(map.is_connected(4, 0));
        assert!(!map.is_connected(1, 2));
        assert_eq!(map.distance(1, 2), Some(2));
        assert_eq!(map.degree(0), 4);
    }

    #[test]
    fn test_pair_list_matches_preset() {
        let from_pairs = CouplingMap::from(vec![(1, 0), (1, 2), (2, 1)]);
        assert_eq!(from_pairs, CouplingMap::linear(3));
    }

    #[test]
    fn test_full_and_disconnected() {
        assert!(CouplingMap::full(4).is_fully_connected());
        assert!(!CouplingMap::ring(4).is_fully_connected());

        let split = CouplingMap::with_num_qubits(4, &[(0, 1), (2, 3)]);
        assert!(!split.is_graph_connected());
        assert_eq!(split.distance(0, 3), None);
        assert_eq!(split.shortest_path(0, 3), None);
    }

    #[test]
    fn test_grid_and_graph_view() {
        let map = CouplingMap::grid(2, 3);
        assert_eq!(map.num_qubits(), 6);
        assert_eq!(map.edges().len(), 7);
        assert_eq!(map.distance(0, 5), Some(3));
        assert_eq!(map.graph().edge_count(), 7);
    }

    #[test]
    fn test_serde_rebuilds_distances() {
        let map = CouplingMap::ring(5);
        let json = serde_json::to_string(&map).unwrap();
        let back: CouplingMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back.distance(0, 3), Some(2));
    }
}
