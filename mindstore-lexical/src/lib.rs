//! # mindstore-lexical
//!
//! C2: an in-process BM25-family lexical index over four corpora
//! (project code, project docs, project memories, global memories).
//! Guarded by a reader-writer lock per scope — many concurrent searches,
//! one concurrent rebuild — matching the concurrency model spec.md
//! describes for the hybrid search path.
//!
//! Fusion with a dense ranker happens one layer up, in the retrieval
//! crate; this crate only ever returns lexical rankings.

pub mod bm25;
pub mod index;
pub mod scope;

pub use index::ScopeIndex;
pub use scope::Scope;

use std::sync::RwLock;

use mindstore_core::errors::MindstoreResult;

/// The full lexical index: one [`ScopeIndex`] per [`Scope`], each behind
/// its own lock so a rebuild of `project-code` never blocks a search
/// against `global-memories`.
pub struct LexicalIndex {
    project_code: RwLock<ScopeIndex>,
    project_docs: RwLock<ScopeIndex>,
    project_memories: RwLock<ScopeIndex>,
    global_memories: RwLock<ScopeIndex>,
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self {
            project_code: RwLock::new(ScopeIndex::default()),
            project_docs: RwLock::new(ScopeIndex::default()),
            project_memories: RwLock::new(ScopeIndex::default()),
            global_memories: RwLock::new(ScopeIndex::default()),
        }
    }
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, scope: Scope) -> &RwLock<ScopeIndex> {
        match scope {
            Scope::ProjectCode => &self.project_code,
            Scope::ProjectDocs => &self.project_docs,
            Scope::ProjectMemories => &self.project_memories,
            Scope::GlobalMemories => &self.global_memories,
        }
    }

    /// Replace a scope's index wholesale.
    pub fn build(&self, scope: Scope, docs: &[(i64, String)]) {
        let built = ScopeIndex::build(docs, scope.token_variant());
        let mut guard = self.lock(scope).write().expect("lexical index lock poisoned");
        *guard = built;
    }

    pub fn add(&self, scope: Scope, id: i64, text: &str) {
        let mut guard = self.lock(scope).write().expect("lexical index lock poisoned");
        guard.add(id, text, scope.token_variant());
    }

    pub fn remove(&self, scope: Scope, id: i64) {
        let mut guard = self.lock(scope).write().expect("lexical index lock poisoned");
        guard.remove(id);
    }

    /// Mark a scope dirty. The caller (mindstore-dispatch, which holds
    /// both this index and a relational backend) is responsible for
    /// noticing `is_dirty` and calling [`LexicalIndex::build`] with a
    /// fresh read from the store before the next search — this crate
    /// has no storage dependency of its own to rebuild from.
    pub fn invalidate(&self, scope: Scope) {
        let mut guard = self.lock(scope).write().expect("lexical index lock poisoned");
        guard.mark_dirty();
    }

    pub fn is_dirty(&self, scope: Scope) -> bool {
        self.lock(scope).read().expect("lexical index lock poisoned").is_dirty()
    }

    pub fn search(&self, scope: Scope, query: &str, k: usize) -> Vec<(i64, f64)> {
        let guard = self.lock(scope).read().expect("lexical index lock poisoned");
        guard.search(query, k)
    }

    pub fn serialize(&self, scope: Scope) -> MindstoreResult<Vec<u8>> {
        self.lock(scope).read().expect("lexical index lock poisoned").serialize()
    }

    pub fn deserialize_into(&self, scope: Scope, bytes: &[u8]) -> MindstoreResult<()> {
        let restored = ScopeIndex::deserialize(bytes)?;
        let mut guard = self.lock(scope).write().expect("lexical index lock poisoned");
        *guard = restored;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_independent() {
        let index = LexicalIndex::new();
        index.build(
            Scope::ProjectCode,
            &[(1, "fn connectDatabase() {}".to_string())],
        );
        index.build(
            Scope::ProjectDocs,
            &[(2, "connecting the database requires credentials".to_string())],
        );

        assert!(!index.search(Scope::ProjectCode, "connect", 10).is_empty());
        assert!(!index.search(Scope::ProjectDocs, "connect", 10).is_empty());
        assert!(index.search(Scope::ProjectMemories, "connect", 10).is_empty());
    }

    #[test]
    fn invalidate_sets_dirty_flag_only() {
        let index = LexicalIndex::new();
        index.build(Scope::GlobalMemories, &[(1, "hello world".to_string())]);
        assert!(!index.is_dirty(Scope::GlobalMemories));
        index.invalidate(Scope::GlobalMemories);
        assert!(index.is_dirty(Scope::GlobalMemories));
        // Dirty doesn't clear existing results until a rebuild happens.
        assert!(!index.search(Scope::GlobalMemories, "hello", 10).is_empty());
    }

    #[test]
    fn round_trip_through_serialize_deserialize() {
        let index = LexicalIndex::new();
        index.build(
            Scope::ProjectMemories,
            &[(7, "the retry budget was exhausted".to_string())],
        );
        let bytes = index.serialize(Scope::ProjectMemories).unwrap();

        let other = LexicalIndex::new();
        other
            .deserialize_into(Scope::ProjectMemories, &bytes)
            .unwrap();
        assert_eq!(
            index.search(Scope::ProjectMemories, "retry", 10),
            other.search(Scope::ProjectMemories, "retry", 10)
        );
    }
}
