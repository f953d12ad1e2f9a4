use rusqlite::{params, Connection, OptionalExtension};

use mindstore_core::errors::{MindstoreResult, StorageError};
use mindstore_core::model::{Memory, MemoryType};
use mindstore_core::traits::{NewMemory, Scope};

use super::codec::{
    blob_to_embedding, embedding_to_blob, factors_from_json, factors_to_json, fmt_dt_opt,
    parse_dt, parse_dt_opt, tags_from_json, tags_to_json,
};

fn scope_key(scope: &Scope) -> &str {
    match scope {
        Scope::Project(id) => id.as_str(),
        Scope::Global => "",
    }
}

const MEMORY_COLUMNS: &str = "id, content, tags, source, memory_type, quality_score, quality_factors, \
     embedding, access_count, last_accessed, valid_from, valid_until, created_at, invalidated_by";

type MemoryRow = (
    i64,
    String,
    String,
    String,
    String,
    f64,
    String,
    Option<Vec<u8>>,
    i64,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<i64>,
);

fn row_to_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
    ))
}

fn to_memory(raw: MemoryRow) -> MindstoreResult<Memory> {
    let (
        id,
        content,
        tags,
        source,
        memory_type,
        quality_score,
        quality_factors,
        embedding,
        access_count,
        last_accessed,
        valid_from,
        valid_until,
        created_at,
        invalidated_by,
    ) = raw;
    Ok(Memory {
        id,
        content,
        tags: tags_from_json(&tags)?,
        source,
        memory_type: memory_type.parse::<MemoryType>().map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })?,
        quality_score,
        quality_factors: factors_from_json(&quality_factors)?,
        embedding: blob_to_embedding(embedding),
        access_count: access_count as u64,
        last_accessed: parse_dt(&last_accessed)?,
        valid_from: parse_dt_opt(valid_from)?,
        valid_until: parse_dt_opt(valid_until)?,
        created_at: parse_dt(&created_at)?,
        invalidated_by,
    })
}

fn sql_err(e: impl ToString) -> StorageError {
    StorageError::Sqlite {
        message: e.to_string(),
    }
}

pub fn insert_memories(
    conn: &Connection,
    table: &str,
    scope: Option<&Scope>,
    memories: &[NewMemory],
) -> MindstoreResult<Vec<i64>> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| StorageError::TransactionFailed {
            reason: e.to_string(),
        })?;
    let mut ids = Vec::with_capacity(memories.len());
    for m in memories {
        let tags_json = tags_to_json(&m.tags)?;
        let factors_json = factors_to_json(&m.quality_factors)?;
        let blob = embedding_to_blob(&m.embedding);
        if let Some(scope) = scope {
            tx.execute(
                &format!(
                    "INSERT INTO {table} (project_id, content, tags, source, memory_type, quality_score, \
                     quality_factors, embedding, valid_from, valid_until) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
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
                    fmt_dt_opt(m.valid_from),
                    fmt_dt_opt(m.valid_until),
                ],
            )
        } else {
            tx.execute(
                &format!(
                    "INSERT INTO {table} (content, tags, source, memory_type, quality_score, \
                     quality_factors, embedding, valid_from, valid_until) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    m.content,
                    tags_json,
                    m.source,
                    m.memory_type.as_str(),
                    m.quality_score,
                    factors_json,
                    blob,
                    fmt_dt_opt(m.valid_from),
                    fmt_dt_opt(m.valid_until),
                ],
            )
        }
        .map_err(sql_err)?;
        ids.push(tx.last_insert_rowid());
    }
    tx.commit().map_err(|e| StorageError::TransactionFailed {
        reason: e.to_string(),
    })?;
    Ok(ids)
}

pub fn get_memory(conn: &Connection, table: &str, id: i64) -> MindstoreResult<Option<Memory>> {
    let row = conn
        .query_row(
            &format!("SELECT {MEMORY_COLUMNS} FROM {table} WHERE id = ?1"),
            params![id],
            row_to_tuple,
        )
        .optional()
        .map_err(sql_err)?;
    row.map(to_memory).transpose()
}

pub fn get_memories(conn: &Connection, table: &str, ids: &[i64]) -> MindstoreResult<Vec<Memory>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(m) = get_memory(conn, table, *id)? {
            out.push(m);
        }
    }
    Ok(out)
}

pub fn update_memory(conn: &Connection, table: &str, memory: &Memory) -> MindstoreResult<()> {
    let tags_json = tags_to_json(&memory.tags)?;
    let factors_json = factors_to_json(&memory.quality_factors)?;
    let blob = embedding_to_blob(&memory.embedding);
    let rows = conn
        .execute(
            &format!(
                "UPDATE {table} SET content = ?2, tags = ?3, source = ?4, memory_type = ?5, \
                 quality_score = ?6, quality_factors = ?7, embedding = ?8, valid_from = ?9, \
                 valid_until = ?10, invalidated_by = ?11 WHERE id = ?1"
            ),
            params![
                memory.id,
                memory.content,
                tags_json,
                memory.source,
                memory.memory_type.as_str(),
                memory.quality_score,
                factors_json,
                blob,
                fmt_dt_opt(memory.valid_from),
                fmt_dt_opt(memory.valid_until),
                memory.invalidated_by,
            ],
        )
        .map_err(sql_err)?;
    if rows == 0 {
        return Err(StorageError::SchemaMissing {
            name: format!("{table}#{}", memory.id),
        }
        .into());
    }
    Ok(())
}

pub fn delete_memory(conn: &Connection, table: &str, id: i64) -> MindstoreResult<()> {
    conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])
        .map_err(sql_err)?;
    Ok(())
}

pub fn invalidate_memory(conn: &Connection, table: &str, id: i64, superseded_by: i64) -> MindstoreResult<()> {
    conn.execute(
        &format!(
            "UPDATE {table} SET invalidated_by = ?2, valid_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1"
        ),
        params![id, superseded_by],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn restore_memory(conn: &Connection, table: &str, id: i64) -> MindstoreResult<()> {
    conn.execute(
        &format!("UPDATE {table} SET invalidated_by = NULL, valid_until = NULL WHERE id = ?1"),
        params![id],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn bump_access(conn: &Connection, table: &str, id: i64, at: chrono::DateTime<chrono::Utc>) -> MindstoreResult<()> {
    conn.execute(
        &format!("UPDATE {table} SET access_count = access_count + 1, last_accessed = ?2 WHERE id = ?1"),
        params![id, at.to_rfc3339()],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn all_memories(conn: &Connection, table: &str, scope: Option<&Scope>) -> MindstoreResult<Vec<Memory>> {
    let (sql, owned_key);
    if let Some(scope) = scope {
        owned_key = scope_key(scope).to_string();
        sql = format!("SELECT {MEMORY_COLUMNS} FROM {table} WHERE project_id = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
        let rows = stmt.query_map(params![owned_key], row_to_tuple).map_err(sql_err)?;
        return rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?
            .into_iter()
            .map(to_memory)
            .collect();
    }
    sql = format!("SELECT {MEMORY_COLUMNS} FROM {table} ORDER BY id");
    let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
    let rows = stmt.query_map([], row_to_tuple).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(sql_err)?
        .into_iter()
        .map(to_memory)
        .collect()
}

pub fn cosine_search_memories(
    conn: &Connection,
    table: &str,
    scope: Option<&Scope>,
    embedding: &[f32],
    limit: usize,
) -> MindstoreResult<Vec<(Memory, f64)>> {
    let candidates = all_memories(conn, table, scope)?;
    let mut scored: Vec<(Memory, f64)> = candidates
        .into_iter()
        .filter_map(|m| {
            let sim = m.embedding.as_ref().map(|e| cosine_similarity(e, embedding))?;
            Some((m, sim))
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}
