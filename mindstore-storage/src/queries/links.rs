use rusqlite::{params, Connection, OptionalExtension};

use mindstore_core::errors::{MindstoreResult, StorageError};
use mindstore_core::model::{MemoryLink, RelationKind};
use mindstore_core::traits::NewMemoryLink;

use super::codec::{fmt_dt_opt, parse_dt, parse_dt_opt};

fn sql_err(e: impl ToString) -> StorageError {
    StorageError::Sqlite {
        message: e.to_string(),
    }
}

const LINK_COLUMNS: &str =
    "id, source_id, target_id, relation, weight, valid_from, valid_until, llm_enriched, created_at";

type LinkRow = (i64, i64, i64, String, f64, Option<String>, Option<String>, i64, String);

fn row_to_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<LinkRow> {
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
    ))
}

fn to_link(raw: LinkRow) -> MindstoreResult<MemoryLink> {
    let (id, source_id, target_id, relation, weight, valid_from, valid_until, llm_enriched, created_at) = raw;
    Ok(MemoryLink {
        id,
        source_id,
        target_id,
        relation: relation.parse::<RelationKind>().map_err(|e| sql_err(e.to_string()))?,
        weight,
        valid_from: parse_dt_opt(valid_from)?,
        valid_until: parse_dt_opt(valid_until)?,
        llm_enriched: llm_enriched != 0,
        created_at: parse_dt(&created_at)?,
    })
}

/// Insert a link, or bump its weight/refresh it if the
/// `(source_id, target_id, relation)` triple already exists. Returns the
/// link id and whether the row was freshly created.
pub fn upsert_link(conn: &Connection, link: &NewMemoryLink) -> MindstoreResult<(i64, bool)> {
    if link.source_id == link.target_id {
        return Err(mindstore_core::errors::ValidationError::SelfLink { id: link.source_id }.into());
    }
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM memory_links WHERE source_id = ?1 AND target_id = ?2 AND relation = ?3",
            params![link.source_id, link.target_id, link.relation.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(sql_err)?;

    if let Some(id) = existing {
        conn.execute(
            "UPDATE memory_links SET weight = ?2, valid_from = ?3, valid_until = ?4, llm_enriched = ?5 WHERE id = ?1",
            params![
                id,
                link.weight,
                fmt_dt_opt(link.valid_from),
                fmt_dt_opt(link.valid_until),
                link.llm_enriched as i64,
            ],
        )
        .map_err(sql_err)?;
        Ok((id, false))
    } else {
        conn.execute(
            "INSERT INTO memory_links (source_id, target_id, relation, weight, valid_from, valid_until, llm_enriched) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                link.source_id,
                link.target_id,
                link.relation.as_str(),
                link.weight,
                fmt_dt_opt(link.valid_from),
                fmt_dt_opt(link.valid_until),
                link.llm_enriched as i64,
            ],
        )
        .map_err(sql_err)?;
        Ok((conn.last_insert_rowid(), true))
    }
}

pub fn get_link(
    conn: &Connection,
    source_id: i64,
    target_id: i64,
    relation: RelationKind,
) -> MindstoreResult<Option<MemoryLink>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {LINK_COLUMNS} FROM memory_links WHERE source_id = ?1 AND target_id = ?2 AND relation = ?3"
            ),
            params![source_id, target_id, relation.as_str()],
            row_to_tuple,
        )
        .optional()
        .map_err(sql_err)?;
    row.map(to_link).transpose()
}

pub fn links_for_memory(conn: &Connection, memory_id: i64) -> MindstoreResult<Vec<MemoryLink>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {LINK_COLUMNS} FROM memory_links WHERE source_id = ?1 OR target_id = ?1"
        ))
        .map_err(sql_err)?;
    let rows = stmt.query_map(params![memory_id], row_to_tuple).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(sql_err)?
        .into_iter()
        .map(to_link)
        .collect()
}

pub fn invalidate_link(
    conn: &Connection,
    source_id: i64,
    target_id: i64,
    relation: RelationKind,
    at: chrono::DateTime<chrono::Utc>,
) -> MindstoreResult<()> {
    conn.execute(
        "UPDATE memory_links SET valid_until = ?4 WHERE source_id = ?1 AND target_id = ?2 AND relation = ?3",
        params![source_id, target_id, relation.as_str(), at.to_rfc3339()],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn all_links(conn: &Connection) -> MindstoreResult<Vec<MemoryLink>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {LINK_COLUMNS} FROM memory_links ORDER BY id"))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], row_to_tuple).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(sql_err)?
        .into_iter()
        .map(to_link)
        .collect()
}
