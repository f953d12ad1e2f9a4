//! Builds the JSON payload each vector collection carries alongside its
//! embedding (spec.md §4.4). Both the built-in and external vector
//! adapters use the same shape, and so does bulk-transfer backfill, so a
//! point produced by any of the three is interchangeable from the
//! dispatcher's point of view. Lives in the foundation crate (rather than
//! the vector crate that first needed it) so storage's backfill can reuse
//! it without introducing a cycle back through the vector crate.

use crate::model::{Document, Memory};
use crate::traits::vector::Payload;
use crate::traits::Scope;
use serde_json::json;

fn project_id_value(scope: &Scope) -> serde_json::Value {
    match scope {
        Scope::Project(id) => json!(id),
        Scope::Global => serde_json::Value::Null,
    }
}

pub fn document_payload(doc: &Document, scope: &Scope) -> Payload {
    json!({
        "doc_type": if doc.is_code() { "code" } else { "doc" },
        "file_path": doc.bare_path(),
        "content": doc.content,
        "start_line": doc.start_line,
        "end_line": doc.end_line,
        "project_id": project_id_value(scope),
    })
}

pub fn memory_payload(memory: &Memory, scope: &Scope) -> Payload {
    json!({
        "content": memory.content,
        "tags": memory.tags,
        "source": memory.source,
        "type": memory.memory_type.as_str(),
        "project_id": project_id_value(scope),
        "created_at": memory.created_at,
        "valid_from": memory.valid_from,
        "valid_until": memory.valid_until,
        "invalidated_by": memory.invalidated_by,
        "access_count": memory.access_count,
        "last_accessed": memory.last_accessed,
        "quality_score": memory.quality_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MemoryType;
    use chrono::Utc;
    use std::collections::HashMap;

    #[test]
    fn memory_payload_carries_project_id() {
        let memory = Memory {
            id: 1,
            content: "x".into(),
            tags: vec![],
            source: "test".into(),
            memory_type: MemoryType::Observation,
            quality_score: 0.5,
            quality_factors: HashMap::new(),
            embedding: None,
            access_count: 0,
            last_accessed: Utc::now(),
            valid_from: None,
            valid_until: None,
            created_at: Utc::now(),
            invalidated_by: None,
        };
        let scope = Scope::Project("proj".into());
        let payload = memory_payload(&memory, &scope);
        assert_eq!(payload["project_id"], "proj");
        assert_eq!(payload["type"], "observation");
    }

    #[test]
    fn global_scope_payload_has_null_project_id() {
        let memory = Memory {
            id: 1,
            content: "x".into(),
            tags: vec![],
            source: "test".into(),
            memory_type: MemoryType::Observation,
            quality_score: 0.5,
            quality_factors: HashMap::new(),
            embedding: None,
            access_count: 0,
            last_accessed: Utc::now(),
            valid_from: None,
            valid_until: None,
            created_at: Utc::now(),
            invalidated_by: None,
        };
        let payload = memory_payload(&memory, &Scope::Global);
        assert!(payload["project_id"].is_null());
    }
}
