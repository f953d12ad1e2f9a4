use async_trait::async_trait;

use crate::errors::MindstoreResult;

/// Out-of-scope collaborator (spec.md §6): the embedding provider process
/// (local model or remote endpoint). The engine only calls through this
/// trait object; no concrete network/ONNX implementation ships here.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> MindstoreResult<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> MindstoreResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Fixed at first write; mismatches are a `ValidationError`.
    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// Out-of-scope collaborator: an LLM caller used for analysis, fact
/// extraction, and query-expansion paraphrases (spec.md §4.6 step 3).
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> MindstoreResult<String>;
}
