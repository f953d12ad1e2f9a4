//! Restore operations for C9 bulk transfer: insert rows that already carry
//! their own (pre-export) ids, assign them fresh ids, and hand back the
//! `old_id -> new_id` mapping so callers can remap links and centrality.

use std::collections::HashMap;

use rusqlite::{params, Connection};

use mindstore_core::errors::{MindstoreResult, StorageError};
use mindstore_core::model::{Document, Memory, MemoryLink};
use mindstore_core::traits::Scope;

use super::codec::{embedding_to_blob, factors_to_json, fmt_dt_opt, tags_to_json};

fn sql_err(e: impl ToString) -> StorageError {
    StorageError::Sqlite {
        message: e.to_string(),
    }
}

fn tx_err(e: impl ToString) -> StorageError {
    StorageError::TransactionFailed {
        reason: e.to_string(),
    }
}

fn scope_key(scope: &Scope) -> &str {
    match scope {
        Scope::Project(id) => id.as_str(),
        Scope::Global => "",
    }
}

pub fn restore_documents(
    conn: &Connection,
    scope: &Scope,
    docs: &[Document],
    destructive: bool,
) -> MindstoreResult<HashMap<i64, i64>> {
    let tx = conn.unchecked_transaction().map_err(tx_err)?;
    if destructive {
        tx.execute(
            "DELETE FROM documents WHERE project_id = ?1",
            params![scope_key(scope)],
        )
        .map_err(sql_err)?;
    }
    let mut map = HashMap::with_capacity(docs.len());
    for doc in docs {
        let blob = embedding_to_blob(&doc.embedding);
        tx.execute(
            "INSERT INTO documents (project_id, file_path, chunk_index, content, start_line, end_line, embedding, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                scope_key(scope),
                doc.file_path,
                doc.chunk_index,
                doc.content,
                doc.start_line,
                doc.end_line,
                blob,
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        )
        .map_err(sql_err)?;
        map.insert(doc.id, tx.last_insert_rowid());
    }
    tx.commit().map_err(tx_err)?;
    Ok(map)
}

/// `table` is `"memories"` or `"global_memories"`; the global table has no
/// `project_id` column so the insert shape branches on `scope`.
pub fn restore_memories(
    conn: &Connection,
    table: &str,
    scope: &Scope,
    memories: &[Memory],
    destructive: bool,
) -> MindstoreResult<HashMap<i64, i64>> {
    let tx = conn.unchecked_transaction().map_err(tx_err)?;
    let is_global = matches!(scope, Scope::Global);
    if destructive {
        if is_global {
            tx.execute(&format!("DELETE FROM {table}"), []).map_err(sql_err)?;
        } else {
            tx.execute(
                &format!("DELETE FROM {table} WHERE project_id = ?1"),
                params![scope_key(scope)],
            )
            .map_err(sql_err)?;
        }
    }
    let mut map = HashMap::with_capacity(memories.len());
    for m in memories {
        let tags_json = tags_to_json(&m.tags)?;
        let factors_json = factors_to_json(&m.quality_factors)?;
        let blob = embedding_to_blob(&m.embedding);
        if is_global {
            tx.execute(
                &format!(
                    "INSERT INTO {table} (content, tags, source, memory_type, quality_score, quality_factors, \
                     embedding, access_count, last_accessed, valid_from, valid_until, created_at, invalidated_by) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    m.content,
                    tags_json,
                    m.source,
                    m.memory_type.as_str(),
                    m.quality_score,
                    factors_json,
                    blob,
                    m.access_count as i64,
                    m.last_accessed.to_rfc3339(),
                    fmt_dt_opt(m.valid_from),
                    fmt_dt_opt(m.valid_until),
                    m.created_at.to_rfc3339(),
                    m.invalidated_by,
                ],
            )
        } else {
            tx.execute(
                &format!(
                    "INSERT INTO {table} (project_id, content, tags, source, memory_type, quality_score, \
                     quality_factors, embedding, access_count, last_accessed, valid_from, valid_until, \
                     created_at, invalidated_by) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    scope_key(scope),
                    m.content,
                    tags_json,
                    m.source,
                    m.memory_type.as_str(),
                    m.quality_score,
                    factors_json,
                    blob,
                    m.access_count as i64,
                    m.last_accessed.to_rfc3339(),
                    fmt_dt_opt(m.valid_from),
                    fmt_dt_opt(m.valid_until),
                    m.created_at.to_rfc3339(),
                    m.invalidated_by,
                ],
            )
        }
        .map_err(sql_err)?;
        map.insert(m.id, tx.last_insert_rowid());
    }
    tx.commit().map_err(tx_err)?;
    Ok(map)
}

/// Links whose endpoints aren't present in `id_map` are dropped rather
/// than failing the whole restore — a link into a row the caller chose
/// not to restore has nothing left to point at.
pub fn restore_links(
    conn: &Connection,
    links: &[MemoryLink],
    id_map: &HashMap<i64, i64>,
) -> MindstoreResult<()> {
    let tx = conn.unchecked_transaction().map_err(tx_err)?;
    for link in links {
        let (Some(&source_id), Some(&target_id)) =
            (id_map.get(&link.source_id), id_map.get(&link.target_id))
        else {
            continue;
        };
        tx.execute(
            "INSERT INTO memory_links (source_id, target_id, relation, weight, valid_from, valid_until, llm_enriched, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                source_id,
                target_id,
                link.relation.as_str(),
                link.weight,
                fmt_dt_opt(link.valid_from),
                fmt_dt_opt(link.valid_until),
                link.llm_enriched as i64,
                link.created_at.to_rfc3339(),
            ],
        )
        .map_err(sql_err)?;
    }
    tx.commit().map_err(tx_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mindstore_core::model::{MemoryType, RelationKind};
    use std::collections::HashMap as Map;

    fn conn() -> Connection {
        let c = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&c).unwrap();
        c
    }

    fn sample_memory(id: i64) -> Memory {
        Memory {
            id,
            content: "hello".into(),
            tags: vec![],
            source: "test".into(),
            memory_type: MemoryType::Observation,
            quality_score: 0.5,
            quality_factors: Map::new(),
            embedding: None,
            access_count: 0,
            last_accessed: Utc::now(),
            valid_from: None,
            valid_until: None,
            created_at: Utc::now(),
            invalidated_by: None,
        }
    }

    #[test]
    fn restore_memories_reassigns_ids() {
        let c = conn();
        let scope = Scope::Project("proj".into());
        let memories = vec![sample_memory(100), sample_memory(200)];
        let map = restore_memories(&c, "memories", &scope, &memories, false).unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.get(&100).unwrap() != &100);
    }

    #[test]
    fn restore_links_drops_unmapped_endpoints() {
        let c = conn();
        let scope = Scope::Project("proj".into());
        let memories = vec![sample_memory(1), sample_memory(2)];
        let id_map = restore_memories(&c, "memories", &scope, &memories, false).unwrap();
        let link = MemoryLink {
            id: 1,
            source_id: 1,
            target_id: 999,
            relation: RelationKind::Related,
            weight: 1.0,
            valid_from: None,
            valid_until: None,
            llm_enriched: false,
            created_at: Utc::now(),
        };
        restore_links(&c, &[link], &id_map).unwrap();
        let count: i64 = c
            .query_row("SELECT COUNT(*) FROM memory_links", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
