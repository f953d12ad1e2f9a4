//! C10 freshness detector: compares each indexed file's recorded hash
//! against the file on disk, checking mtime first so an unchanged file
//! never pays the cost of being re-hashed.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use mindstore_core::errors::{MindstoreResult, StorageError};
use mindstore_core::model::FileHash;

#[derive(Debug, Default, Clone)]
pub struct FreshnessReport {
    pub fresh: Vec<String>,
    pub stale: Vec<String>,
    pub deleted: Vec<String>,
}

/// Windows paths land in `file_hashes.file_path` with backslashes when the
/// index was built on Windows; normalize to `/` before joining with the
/// (POSIX-style) project root so lookups work regardless of which OS
/// indexed the project.
fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn check(project_root: &Path, file_hashes: &[FileHash]) -> MindstoreResult<FreshnessReport> {
    let mut report = FreshnessReport::default();
    for fh in file_hashes {
        match classify_one(project_root, fh)? {
            Classification::Fresh => report.fresh.push(fh.file_path.clone()),
            Classification::Stale => report.stale.push(fh.file_path.clone()),
            Classification::Deleted => report.deleted.push(fh.file_path.clone()),
        }
    }
    Ok(report)
}

enum Classification {
    Fresh,
    Stale,
    Deleted,
}

fn classify_one(project_root: &Path, fh: &FileHash) -> MindstoreResult<Classification> {
    let rel = normalize_separators(&fh.file_path);
    let abs = project_root.join(rel);

    let metadata = match fs::metadata(&abs) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Classification::Deleted),
        Err(e) => {
            return Err(StorageError::Io {
                message: format!("stat {}: {e}", abs.display()),
            }
            .into())
        }
    };

    let mtime: DateTime<Utc> = metadata
        .modified()
        .map_err(|e| StorageError::Io {
            message: format!("mtime {}: {e}", abs.display()),
        })?
        .into();

    if mtime <= fh.indexed_at {
        return Ok(Classification::Fresh);
    }

    let content = fs::read(&abs).map_err(|e| StorageError::Io {
        message: format!("read {}: {e}", abs.display()),
    })?;
    let hash = blake3::hash(&content).to_hex().to_string();
    if hash == fh.content_hash {
        Ok(Classification::Fresh)
    } else {
        Ok(Classification::Stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::tempdir;

    fn hash_of(content: &str) -> String {
        blake3::hash(content.as_bytes()).to_hex().to_string()
    }

    #[test]
    fn unchanged_file_is_fresh_without_reading_content() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a.rs");
        std::fs::write(&file_path, b"fn main() {}").unwrap();
        // indexed_at in the future relative to mtime guarantees the mtime
        // short-circuit fires and content is never read.
        let fh = FileHash {
            file_path: "a.rs".into(),
            content_hash: "deliberately-wrong-hash".into(),
            indexed_at: Utc::now() + chrono::Duration::seconds(60),
        };
        let report = check(dir.path(), &[fh]).unwrap();
        assert_eq!(report.fresh, vec!["a.rs".to_string()]);
        assert!(report.stale.is_empty());
    }

    #[test]
    fn changed_content_after_newer_mtime_is_stale() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("b.rs");
        let fh = FileHash {
            file_path: "b.rs".into(),
            content_hash: hash_of("original"),
            indexed_at: Utc::now() - chrono::Duration::seconds(60),
        };
        std::thread::sleep(Duration::from_millis(10));
        let mut f = std::fs::File::create(&file_path).unwrap();
        f.write_all(b"changed").unwrap();
        drop(f);
        let report = check(dir.path(), &[fh]).unwrap();
        assert_eq!(report.stale, vec!["b.rs".to_string()]);
    }

    #[test]
    fn missing_file_is_deleted() {
        let dir = tempdir().unwrap();
        let fh = FileHash {
            file_path: "gone.rs".into(),
            content_hash: hash_of("whatever"),
            indexed_at: Utc::now(),
        };
        let report = check(dir.path(), &[fh]).unwrap();
        assert_eq!(report.deleted, vec!["gone.rs".to_string()]);
    }

    #[test]
    fn windows_separators_are_normalized() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("lib.rs"), b"content").unwrap();
        let fh = FileHash {
            file_path: "src\\lib.rs".into(),
            content_hash: hash_of("content"),
            indexed_at: Utc::now() - chrono::Duration::seconds(1),
        };
        std::thread::sleep(Duration::from_millis(10));
        std::fs::write(dir.path().join("src").join("lib.rs"), b"content").unwrap();
        let report = check(dir.path(), &[fh]).unwrap();
        assert!(report.deleted.is_empty());
    }
}
