use rusqlite::{params, Connection, OptionalExtension};

use mindstore_core::errors::{MindstoreResult, StorageError};
use mindstore_core::model::{Document, FileHash};
use mindstore_core::traits::{NewDocument, Scope};

use super::codec::{blob_to_embedding, embedding_to_blob, parse_dt};

fn scope_key(scope: &Scope) -> &str {
    match scope {
        Scope::Project(id) => id.as_str(),
        Scope::Global => "",
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, u32, String, u32, u32, Option<Vec<u8>>, String, String)> {
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

fn to_document(raw: (i64, String, u32, String, u32, u32, Option<Vec<u8>>, String, String)) -> MindstoreResult<Document> {
    let (id, file_path, chunk_index, content, start_line, end_line, embedding, created_at, updated_at) = raw;
    Ok(Document {
        id,
        file_path,
        chunk_index,
        content,
        start_line,
        end_line,
        embedding: blob_to_embedding(embedding),
        created_at: parse_dt(&created_at)?,
        updated_at: parse_dt(&updated_at)?,
    })
}

pub fn insert_documents(conn: &Connection, scope: &Scope, docs: &[NewDocument]) -> MindstoreResult<Vec<i64>> {
    let tx = conn.unchecked_transaction().map_err(|e| StorageError::TransactionFailed { reason: e.to_string() })?;
    let mut ids = Vec::with_capacity(docs.len());
    for doc in docs {
        let blob = embedding_to_blob(&doc.embedding);
        tx.execute(
            "INSERT INTO documents (project_id, file_path, chunk_index, content, start_line, end_line, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (project_id, file_path, chunk_index) DO UPDATE SET
                content = excluded.content, start_line = excluded.start_line,
                end_line = excluded.end_line, embedding = excluded.embedding,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![scope_key(scope), doc.file_path, doc.chunk_index, doc.content, doc.start_line, doc.end_line, blob],
        )
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
        let id: i64 = tx.query_row(
            "SELECT id FROM documents WHERE project_id = ?1 AND file_path = ?2 AND chunk_index = ?3",
            params![scope_key(scope), doc.file_path, doc.chunk_index],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
        ids.push(id);
    }
    tx.commit().map_err(|e| StorageError::TransactionFailed { reason: e.to_string() })?;
    Ok(ids)
}

pub fn get_document(conn: &Connection, id: i64) -> MindstoreResult<Option<Document>> {
    let row = conn
        .query_row(
            "SELECT id, file_path, chunk_index, content, start_line, end_line, embedding, created_at, updated_at
             FROM documents WHERE id = ?1",
            params![id],
            row_to_document,
        )
        .optional()
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    row.map(to_document).transpose()
}

pub fn get_documents(conn: &Connection, ids: &[i64]) -> MindstoreResult<Vec<Document>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(d) = get_document(conn, *id)? {
            out.push(d);
        }
    }
    Ok(out)
}

pub fn documents_by_path(conn: &Connection, scope: &Scope, file_path: &str) -> MindstoreResult<Vec<Document>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, file_path, chunk_index, content, start_line, end_line, embedding, created_at, updated_at
             FROM documents WHERE project_id = ?1 AND file_path = ?2 ORDER BY chunk_index",
        )
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![scope_key(scope), file_path], row_to_document)
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?
        .into_iter()
        .map(to_document)
        .collect()
}

pub fn delete_documents_by_path(conn: &Connection, scope: &Scope, file_path: &str) -> MindstoreResult<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT id FROM documents WHERE project_id = ?1 AND file_path = ?2")
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    let ids: Vec<i64> = stmt
        .query_map(params![scope_key(scope), file_path], |row| row.get(0))
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    conn.execute(
        "DELETE FROM documents WHERE project_id = ?1 AND file_path = ?2",
        params![scope_key(scope), file_path],
    )
    .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    Ok(ids)
}

pub fn all_documents(conn: &Connection, scope: &Scope) -> MindstoreResult<Vec<Document>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, file_path, chunk_index, content, start_line, end_line, embedding, created_at, updated_at
             FROM documents WHERE project_id = ?1 ORDER BY file_path, chunk_index",
        )
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![scope_key(scope)], row_to_document)
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?
        .into_iter()
        .map(to_document)
        .collect()
}

pub fn clear_documents(conn: &Connection, scope: &Scope) -> MindstoreResult<usize> {
    conn.execute("DELETE FROM documents WHERE project_id = ?1", params![scope_key(scope)])
        .map_err(|e| StorageError::Sqlite { message: e.to_string() }.into())
}

pub fn upsert_file_hash(conn: &Connection, scope: &Scope, hash: &FileHash) -> MindstoreResult<()> {
    conn.execute(
        "INSERT INTO file_hashes (project_id, file_path, content_hash, indexed_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (project_id, file_path) DO UPDATE SET
            content_hash = excluded.content_hash, indexed_at = excluded.indexed_at",
        params![scope_key(scope), hash.file_path, hash.content_hash, hash.indexed_at.to_rfc3339()],
    )
    .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    Ok(())
}

pub fn all_file_hashes(conn: &Connection, scope: &Scope) -> MindstoreResult<Vec<FileHash>> {
    let mut stmt = conn
        .prepare("SELECT file_path, content_hash, indexed_at FROM file_hashes WHERE project_id = ?1")
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![scope_key(scope)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })
        .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    let mut out = Vec::new();
    for row in rows {
        let (file_path, content_hash, indexed_at) = row.map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
        out.push(FileHash {
            file_path,
            content_hash,
            indexed_at: parse_dt(&indexed_at)?,
        });
    }
    Ok(out)
}

pub fn delete_file_hash(conn: &Connection, scope: &Scope, file_path: &str) -> MindstoreResult<()> {
    conn.execute(
        "DELETE FROM file_hashes WHERE project_id = ?1 AND file_path = ?2",
        params![scope_key(scope), file_path],
    )
    .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
    Ok(())
}
