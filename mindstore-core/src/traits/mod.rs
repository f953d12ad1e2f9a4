pub mod embedding;
pub mod filter;
pub mod storage;
pub mod vector;

pub use embedding::{CompletionProvider, EmbeddingProvider};
pub use filter::{Filter, FilterValue};
pub use storage::{NewDocument, NewMemory, NewMemoryLink, RelationalBackend, Scope};
pub use vector::{Collection, Payload, ScoredPoint, VectorIndex, VectorUpsert};
