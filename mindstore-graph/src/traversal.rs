//! `findConnected`: breadth-first traversal over effective links
//! (spec.md §4.7), bounded by `max_depth` (default 2).

use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::indexed_graph::IndexedGraph;

pub const DEFAULT_MAX_DEPTH: u32 = 2;

#[derive(Debug, Clone)]
pub struct ConnectedMemory {
    pub memory_id: i64,
    pub depth: u32,
    /// Memory ids from the origin (exclusive) to this memory (inclusive).
    pub path: Vec<i64>,
}

/// Breadth-first search from `origin`, following edges in either
/// direction, only over links effective at `at`. Visits each memory at
/// most once, at its shortest discovered depth.
pub fn find_connected(
    graph: &IndexedGraph,
    origin: i64,
    max_depth: u32,
    at: chrono::DateTime<chrono::Utc>,
) -> Vec<ConnectedMemory> {
    use std::collections::{HashSet, VecDeque};

    let Some(start) = graph.node_for(origin) else {
        return Vec::new();
    };

    let mut visited = HashSet::new();
    visited.insert(origin);
    let mut queue = VecDeque::new();
    queue.push_back((start, 0u32, vec![origin]));
    let mut results = Vec::new();

    while let Some((idx, depth, path)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for edge in graph.graph.edges_directed(idx, direction) {
                if !edge.weight().is_effective_at(at) {
                    continue;
                }
                let neighbor = if direction == Direction::Outgoing {
                    edge.target()
                } else {
                    edge.source()
                };
                let Some(neighbor_id) = graph.memory_id_for(neighbor) else {
                    continue;
                };
                if !visited.insert(neighbor_id) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(neighbor_id);
                results.push(ConnectedMemory {
                    memory_id: neighbor_id,
                    depth: depth + 1,
                    path: next_path.clone(),
                });
                queue.push_back((neighbor, depth + 1, next_path));
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mindstore_core::model::{MemoryLink, RelationKind};

    fn link(source_id: i64, target_id: i64) -> MemoryLink {
        MemoryLink {
            id: 1,
            source_id,
            target_id,
            relation: RelationKind::Related,
            weight: 1.0,
            valid_from: None,
            valid_until: None,
            llm_enriched: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn bfs_respects_max_depth() {
        let graph = IndexedGraph::from_links(&[link(1, 2), link(2, 3), link(3, 4)]);
        let found = find_connected(&graph, 1, 2, Utc::now());
        let ids: Vec<i64> = found.iter().map(|n| n.memory_id).collect();
        assert!(ids.contains(&2));
        assert!(ids.contains(&3));
        assert!(!ids.contains(&4));
    }

    #[test]
    fn bfs_ignores_invalidated_links() {
        let mut dead = link(1, 2);
        dead.valid_until = Some(Utc::now() - chrono::Duration::seconds(1));
        let graph = IndexedGraph::from_links(&[dead]);
        let found = find_connected(&graph, 1, 2, Utc::now());
        assert!(found.is_empty());
    }

    #[test]
    fn bfs_unknown_origin_returns_empty() {
        let graph = IndexedGraph::from_links(&[link(1, 2)]);
        assert!(find_connected(&graph, 99, 2, Utc::now()).is_empty());
    }
}
