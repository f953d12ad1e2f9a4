//! v001: the full embedded schema — documents, file hashes, memories,
//! global memories, links, centrality, lexical observability tables, and
//! the learning-delta journal.

use rusqlite::Connection;

use mindstore_core::errors::{MindstoreResult, StorageError};

pub fn migrate(conn: &Connection) -> MindstoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id  TEXT NOT NULL,
            file_path   TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content     TEXT NOT NULL,
            start_line  INTEGER NOT NULL,
            end_line    INTEGER NOT NULL,
            embedding   BLOB,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            UNIQUE (project_id, file_path, chunk_index)
        );
        CREATE INDEX IF NOT EXISTS idx_documents_path ON documents(project_id, file_path);

        CREATE TABLE IF NOT EXISTS file_hashes (
            project_id    TEXT NOT NULL,
            file_path     TEXT NOT NULL,
            content_hash  TEXT NOT NULL,
            indexed_at    TEXT NOT NULL,
            PRIMARY KEY (project_id, file_path)
        );

        CREATE TABLE IF NOT EXISTS memories (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id       TEXT NOT NULL,
            content          TEXT NOT NULL,
            tags             TEXT NOT NULL DEFAULT '[]',
            source           TEXT NOT NULL,
            memory_type      TEXT NOT NULL,
            quality_score    REAL NOT NULL DEFAULT 0.0,
            quality_factors  TEXT NOT NULL DEFAULT '{}',
            embedding        BLOB,
            access_count     INTEGER NOT NULL DEFAULT 0,
            last_accessed    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            valid_from       TEXT,
            valid_until      TEXT,
            created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            invalidated_by   INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_memories_project ON memories(project_id);
        CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(project_id, memory_type);

        CREATE TABLE IF NOT EXISTS global_memories (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            content          TEXT NOT NULL,
            tags             TEXT NOT NULL DEFAULT '[]',
            source           TEXT NOT NULL,
            memory_type      TEXT NOT NULL,
            quality_score    REAL NOT NULL DEFAULT 0.0,
            quality_factors  TEXT NOT NULL DEFAULT '{}',
            embedding        BLOB,
            access_count     INTEGER NOT NULL DEFAULT 0,
            last_accessed    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            valid_from       TEXT,
            valid_until      TEXT,
            created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            invalidated_by   INTEGER
        );

        CREATE TABLE IF NOT EXISTS memory_links (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id      INTEGER NOT NULL,
            target_id      INTEGER NOT NULL,
            relation       TEXT NOT NULL,
            weight         REAL NOT NULL DEFAULT 1.0,
            valid_from     TEXT,
            valid_until    TEXT,
            llm_enriched   INTEGER NOT NULL DEFAULT 0,
            created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            UNIQUE (source_id, target_id, relation)
        );
        CREATE INDEX IF NOT EXISTS idx_links_source ON memory_links(source_id);
        CREATE INDEX IF NOT EXISTS idx_links_target ON memory_links(target_id);

        CREATE TABLE IF NOT EXISTS centrality (
            memory_id         INTEGER PRIMARY KEY,
            degree            INTEGER NOT NULL,
            normalized_degree REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS token_stats (
            scope              TEXT NOT NULL,
            token              TEXT NOT NULL,
            document_frequency INTEGER NOT NULL,
            total_documents    INTEGER NOT NULL,
            PRIMARY KEY (scope, token)
        );

        CREATE TABLE IF NOT EXISTS token_frequencies (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id  TEXT,
            token       TEXT NOT NULL,
            occurrences INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_token_freq_project ON token_frequencies(project_id, token);

        CREATE TABLE IF NOT EXISTS learning_deltas (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            source          TEXT NOT NULL,
            memories_added  INTEGER NOT NULL,
            distinct_types  INTEGER NOT NULL,
            avg_quality     REAL NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS web_search_history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id  TEXT,
            payload     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        CREATE INDEX IF NOT EXISTS idx_web_search_history_project ON web_search_history(project_id);

        CREATE TABLE IF NOT EXISTS skills (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id  TEXT,
            payload     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        CREATE INDEX IF NOT EXISTS idx_skills_project ON skills(project_id);
        ",
    )
    .map_err(|e| StorageError::MigrationFailed {
        version: 1,
        reason: e.to_string(),
    })?;
    Ok(())
}
