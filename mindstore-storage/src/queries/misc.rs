use rusqlite::{params, Connection, OptionalExtension};

use mindstore_core::errors::{MindstoreResult, StorageError};
use mindstore_core::model::{Centrality, LearningDelta, SkillEntry, TokenFrequency, TokenStat, WebSearchEntry};
use mindstore_core::traits::Scope;

use super::codec::parse_dt;

fn sql_err(e: impl ToString) -> StorageError {
    StorageError::Sqlite {
        message: e.to_string(),
    }
}

pub fn upsert_centrality(conn: &Connection, rows: &[Centrality]) -> MindstoreResult<()> {
    let tx = conn.unchecked_transaction().map_err(sql_err)?;
    for row in rows {
        tx.execute(
            "INSERT INTO centrality (memory_id, degree, normalized_degree) VALUES (?1, ?2, ?3)
             ON CONFLICT (memory_id) DO UPDATE SET degree = excluded.degree, normalized_degree = excluded.normalized_degree",
            params![row.memory_id, row.degree, row.normalized_degree],
        )
        .map_err(sql_err)?;
    }
    tx.commit().map_err(sql_err)?;
    Ok(())
}

pub fn get_centrality(conn: &Connection, memory_id: i64) -> MindstoreResult<Option<Centrality>> {
    conn.query_row(
        "SELECT memory_id, degree, normalized_degree FROM centrality WHERE memory_id = ?1",
        params![memory_id],
        |row| {
            Ok(Centrality {
                memory_id: row.get(0)?,
                degree: row.get(1)?,
                normalized_degree: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(|e| sql_err(e).into())
}

pub fn all_centrality(conn: &Connection) -> MindstoreResult<Vec<Centrality>> {
    let mut stmt = conn
        .prepare("SELECT memory_id, degree, normalized_degree FROM centrality")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Centrality {
                memory_id: row.get(0)?,
                degree: row.get(1)?,
                normalized_degree: row.get(2)?,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|e| sql_err(e).into())
}

pub fn record_token_frequencies(conn: &Connection, rows: &[TokenFrequency]) -> MindstoreResult<()> {
    let tx = conn.unchecked_transaction().map_err(sql_err)?;
    for row in rows {
        tx.execute(
            "INSERT INTO token_frequencies (project_id, token, occurrences) VALUES (?1, ?2, ?3)",
            params![row.project_id, row.token, row.occurrences as i64],
        )
        .map_err(sql_err)?;
    }
    tx.commit().map_err(sql_err)?;
    Ok(())
}

pub fn upsert_token_stats(conn: &Connection, rows: &[TokenStat]) -> MindstoreResult<()> {
    let tx = conn.unchecked_transaction().map_err(sql_err)?;
    for row in rows {
        tx.execute(
            "INSERT INTO token_stats (scope, token, document_frequency, total_documents) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (scope, token) DO UPDATE SET
                document_frequency = excluded.document_frequency, total_documents = excluded.total_documents",
            params![row.scope, row.token, row.document_frequency as i64, row.total_documents as i64],
        )
        .map_err(sql_err)?;
    }
    tx.commit().map_err(sql_err)?;
    Ok(())
}

pub fn all_token_stats(conn: &Connection, scope: &str) -> MindstoreResult<Vec<TokenStat>> {
    let mut stmt = conn
        .prepare("SELECT scope, token, document_frequency, total_documents FROM token_stats WHERE scope = ?1")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![scope], |row| {
            Ok(TokenStat {
                scope: row.get(0)?,
                token: row.get(1)?,
                document_frequency: row.get::<_, i64>(2)? as u64,
                total_documents: row.get::<_, i64>(3)? as u64,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|e| sql_err(e).into())
}

pub fn all_token_frequencies(conn: &Connection) -> MindstoreResult<Vec<TokenFrequency>> {
    let mut stmt = conn
        .prepare("SELECT project_id, token, occurrences FROM token_frequencies")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TokenFrequency {
                project_id: row.get(0)?,
                token: row.get(1)?,
                occurrences: row.get::<_, i64>(2)? as u64,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|e| sql_err(e).into())
}

pub fn all_token_stats_every_scope(conn: &Connection) -> MindstoreResult<Vec<TokenStat>> {
    let mut stmt = conn
        .prepare("SELECT scope, token, document_frequency, total_documents FROM token_stats")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TokenStat {
                scope: row.get(0)?,
                token: row.get(1)?,
                document_frequency: row.get::<_, i64>(2)? as u64,
                total_documents: row.get::<_, i64>(3)? as u64,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|e| sql_err(e).into())
}

pub fn append_learning_delta(conn: &Connection, delta: &LearningDelta) -> MindstoreResult<i64> {
    conn.execute(
        "INSERT INTO learning_deltas (source, memories_added, distinct_types, avg_quality) VALUES (?1, ?2, ?3, ?4)",
        params![delta.source, delta.memories_added as i64, delta.distinct_types, delta.avg_quality],
    )
    .map_err(sql_err)?;
    Ok(conn.last_insert_rowid())
}

fn scope_project_id(scope: &Scope) -> Option<&str> {
    match scope {
        Scope::Project(id) => Some(id.as_str()),
        Scope::Global => None,
    }
}

/// Shared by `web_search_history` and `skills`: both are opaque-JSON rows
/// keyed by an optional project id, so one insert/select pair serves both
/// tables parameterized on `table`.
pub fn record_journal_entry(conn: &Connection, table: &str, scope: &Scope, payload: &serde_json::Value) -> MindstoreResult<i64> {
    let payload_json = serde_json::to_string(payload).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;
    conn.execute(
        &format!("INSERT INTO {table} (project_id, payload) VALUES (?1, ?2)"),
        params![scope_project_id(scope), payload_json],
    )
    .map_err(sql_err)?;
    Ok(conn.last_insert_rowid())
}

fn to_journal_row(id: i64, project_id: Option<String>, payload: String, created_at: String) -> MindstoreResult<(i64, Option<String>, serde_json::Value, String)> {
    let payload: serde_json::Value = serde_json::from_str(&payload).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;
    Ok((id, project_id, payload, created_at))
}

pub fn recent_journal_entries_web_search(conn: &Connection, scope: &Scope, limit: usize) -> MindstoreResult<Vec<WebSearchEntry>> {
    let owned_key = scope_project_id(scope).map(str::to_string);
    let mut stmt = conn
        .prepare("SELECT id, project_id, payload, created_at FROM web_search_history WHERE project_id IS ?1 ORDER BY id DESC LIMIT ?2")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![owned_key, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?))
        })
        .map_err(sql_err)?;
    let mut out = Vec::new();
    for row in rows {
        let (id, project_id, payload, created_at) = row.map_err(sql_err)?;
        let (id, project_id, payload, created_at) = to_journal_row(id, project_id, payload, created_at)?;
        out.push(WebSearchEntry {
            id,
            project_id,
            payload,
            created_at: parse_dt(&created_at)?,
        });
    }
    Ok(out)
}

pub fn all_journal_entries_skills(conn: &Connection, scope: &Scope) -> MindstoreResult<Vec<SkillEntry>> {
    let owned_key = scope_project_id(scope).map(str::to_string);
    let mut stmt = conn
        .prepare("SELECT id, project_id, payload, created_at FROM skills WHERE project_id IS ?1 ORDER BY id")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![owned_key], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?))
        })
        .map_err(sql_err)?;
    let mut out = Vec::new();
    for row in rows {
        let (id, project_id, payload, created_at) = row.map_err(sql_err)?;
        let (id, project_id, payload, created_at) = to_journal_row(id, project_id, payload, created_at)?;
        out.push(SkillEntry {
            id,
            project_id,
            payload,
            created_at: parse_dt(&created_at)?,
        });
    }
    Ok(out)
}

pub fn recent_learning_deltas(conn: &Connection, limit: usize) -> MindstoreResult<Vec<LearningDelta>> {
    let mut stmt = conn
        .prepare("SELECT id, source, memories_added, distinct_types, avg_quality, created_at FROM learning_deltas ORDER BY id DESC LIMIT ?1")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .map_err(sql_err)?;
    let mut out = Vec::new();
    for row in rows {
        let (id, source, memories_added, distinct_types, avg_quality, created_at) = row.map_err(sql_err)?;
        out.push(LearningDelta {
            id,
            source,
            memories_added: memories_added as u64,
            distinct_types,
            avg_quality,
            created_at: parse_dt(&created_at)?,
        });
    }
    Ok(out)
}
