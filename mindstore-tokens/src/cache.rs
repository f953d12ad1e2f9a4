//! Content-hash-keyed embedding cache sitting in front of an injected
//! [`EmbeddingProvider`]. Mirrors the teacher's `L1MemoryCache`: TinyLFU
//! admission, size-aware eviction, per-entry TTL — but keyed by blake3
//! hash of the source text rather than a hash the caller hands in, since
//! nothing upstream of this crate computes one.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use mindstore_core::errors::MindstoreResult;
use mindstore_core::traits::embedding::EmbeddingProvider;

const IDLE_TTL: Duration = Duration::from_secs(3600);
const MAX_TTL: Duration = Duration::from_secs(86_400);

fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Wraps an [`EmbeddingProvider`] with a bounded in-memory cache keyed by
/// the blake3 hash of the input text. A cache hit never reaches the
/// provider; a miss calls through and writes the result back.
pub struct EmbeddingCache {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Cache<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_idle(IDLE_TTL)
            .time_to_live(MAX_TTL)
            .build();
        Self { provider, cache }
    }

    /// Return the cached embedding for `text`, computing and caching it
    /// on a miss.
    pub async fn embed(&self, text: &str) -> MindstoreResult<Vec<f32>> {
        let key = content_hash(text);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let embedding = self.provider.embed(text).await?;
        self.cache.insert(key, embedding.clone());
        Ok(embedding)
    }

    /// Embed a batch, resolving each element against the cache
    /// individually and only forwarding misses to the provider.
    pub async fn embed_batch(&self, texts: &[String]) -> MindstoreResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> MindstoreResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn hit_avoids_provider_call() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cache = EmbeddingCache::new(provider.clone(), 100);

        let first = cache.embed("hello").await.unwrap();
        let second = cache.embed("hello").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_text_misses_independently() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cache = EmbeddingCache::new(provider.clone(), 100);

        cache.embed("hello").await.unwrap();
        cache.embed("world").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_forces_recompute() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cache = EmbeddingCache::new(provider.clone(), 100);

        cache.embed("hello").await.unwrap();
        cache.clear();
        cache.embed("hello").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
