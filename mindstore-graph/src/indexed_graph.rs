//! In-memory petgraph view over a set of [`MemoryLink`] rows, rebuilt on
//! demand from the relational store rather than kept resident: the graph
//! is cheap to rebuild (one `all_links`/`links_for_memory` query) and a
//! resident copy would just be another place for cross-store drift to
//! hide.

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::Directed;

use mindstore_core::model::MemoryLink;

pub struct IndexedGraph {
    pub graph: StableGraph<i64, MemoryLink, Directed>,
    index: HashMap<i64, NodeIndex>,
}

impl IndexedGraph {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build a graph view restricted to the links supplied — callers
    /// decide how far to page (`links_for_memory` for a local view,
    /// `all_links` for the full graph).
    pub fn from_links(links: &[MemoryLink]) -> Self {
        let mut g = Self::new();
        for link in links {
            g.ensure_edge(link);
        }
        g
    }

    pub fn ensure_node(&mut self, memory_id: i64) -> NodeIndex {
        *self
            .index
            .entry(memory_id)
            .or_insert_with(|| self.graph.add_node(memory_id))
    }

    fn ensure_edge(&mut self, link: &MemoryLink) {
        let source = self.ensure_node(link.source_id);
        let target = self.ensure_node(link.target_id);
        self.graph.add_edge(source, target, link.clone());
    }

    pub fn node_for(&self, memory_id: i64) -> Option<NodeIndex> {
        self.index.get(&memory_id).copied()
    }

    pub fn memory_id_for(&self, idx: NodeIndex) -> Option<i64> {
        self.graph.node_weight(idx).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for IndexedGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mindstore_core::model::RelationKind;

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
    fn from_links_dedupes_shared_nodes() {
        let graph = IndexedGraph::from_links(&[link(1, 2), link(2, 3)]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }
}
