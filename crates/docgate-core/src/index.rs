//! Brute-force vector index over embedded chunks.
//!
//! [`VectorIndex`] stores one embedding per chunk together with the model
//! name and dimensionality used to produce it. Queries must be embedded by
//! the same model; anything else is rejected with [`Error::ModelMismatch`]
//! instead of returning meaningless similarities.
//!
//! [`SharedIndex`] wraps an index for concurrent use: builds are serialized
//! behind a mutex and swapped in atomically, so readers always see a
//! complete index.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::embedding::{EmbeddingProvider, Metric};
use crate::error::{Error, Result};
use crate::models::{Chunk, RetrievalResult, ScoredChunk};
use crate::retry::{with_retry, RetryPolicy};

/// Embedded chunks plus the model identity they were embedded with.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    dims: usize,
    metric: Metric,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Embed every chunk and build an index.
    ///
    /// # Errors
    ///
    /// [`Error::ProviderUnavailable`] if an embedding call fails after the
    /// policy's retries, or if the provider returns vectors of inconsistent
    /// length.
    pub async fn build(
        provider: &dyn EmbeddingProvider,
        chunks: Vec<Chunk>,
        metric: Metric,
        policy: &RetryPolicy,
    ) -> Result<Self> {
        let model = provider.model_name().to_string();
        let mut dims = provider.dims();
        let mut vectors = Vec::with_capacity(chunks.len());

        for chunk in &chunks {
            let v = with_retry(policy, &model, || provider.embed(&chunk.text)).await?;
            if dims == 0 {
                dims = v.len();
            }
            if v.len() != dims || v.is_empty() {
                return Err(Error::ProviderUnavailable {
                    provider: model,
                    message: format!(
                        "embedding for chunk {} has {} dims, expected {}",
                        chunk.id,
                        v.len(),
                        dims
                    ),
                });
            }
            vectors.push(v);
        }

        info!(model = %model, dims, chunks = chunks.len(), "vector index built");
        Ok(Self {
            model,
            dims,
            metric,
            chunks,
            vectors,
        })
    }

    /// Assemble an index from precomputed vectors (e.g. a cached artifact).
    pub fn from_parts(
        model: impl Into<String>,
        metric: Metric,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::InvalidArgument(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        if vectors.iter().any(|v| v.len() != dims) {
            return Err(Error::InvalidArgument(
                "vectors have inconsistent dimensions".to_string(),
            ));
        }
        Ok(Self {
            model: model.into(),
            dims,
            metric,
            chunks,
            vectors,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embed `query` with `provider` and return the top-`k` chunks.
    pub async fn search(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
        policy: &RetryPolicy,
    ) -> Result<RetrievalResult> {
        let q = query.trim();
        if q.is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".to_string()));
        }
        if self.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let qv = with_retry(policy, provider.model_name(), || provider.embed(q)).await?;
        if provider.model_name() != self.model || qv.len() != self.dims {
            return Err(Error::ModelMismatch {
                index_model: self.model.clone(),
                index_dims: self.dims,
                query_model: provider.model_name().to_string(),
                query_dims: qv.len(),
            });
        }
        Ok(self.search_vector(&qv, k))
    }

    /// Rank chunks against a precomputed query vector.
    ///
    /// Descending similarity; equal scores keep the original chunk order.
    pub fn search_vector(&self, query_vec: &[f32], k: usize) -> RetrievalResult {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, self.metric.score(query_vec, v)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        debug!(k, hits = scored.len(), "vector search");
        RetrievalResult::new(
            scored
                .into_iter()
                .map(|(i, score)| ScoredChunk {
                    chunk: self.chunks[i].clone(),
                    score: score as f64,
                })
                .collect(),
        )
    }
}

/// Single-writer, many-reader handle to the current [`VectorIndex`].
#[derive(Default)]
pub struct SharedIndex {
    current: RwLock<Option<Arc<VectorIndex>>>,
    build_lock: Mutex<()>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a new index and swap it in. Concurrent rebuilds queue up.
    pub async fn rebuild(
        &self,
        provider: &dyn EmbeddingProvider,
        chunks: Vec<Chunk>,
        metric: Metric,
        policy: &RetryPolicy,
    ) -> Result<Arc<VectorIndex>> {
        let _guard = self.build_lock.lock().await;
        let index = Arc::new(VectorIndex::build(provider, chunks, metric, policy).await?);
        *self.current.write().await = Some(index.clone());
        Ok(index)
    }

    /// Install an already built index.
    pub async fn install(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let _guard = self.build_lock.lock().await;
        let index = Arc::new(index);
        *self.current.write().await = Some(index.clone());
        index
    }

    /// The current index, or [`Error::IndexNotReady`] before the first build.
    pub async fn get(&self) -> Result<Arc<VectorIndex>> {
        self.current.read().await.clone().ok_or(Error::IndexNotReady)
    }

    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::time::Duration;

    /// Embeds text as counts of a few marker words.
    struct KeywordEmbedder {
        model: &'static str,
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            self.model
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let t = text.to_lowercase();
            Ok(vec![
                t.matches("ottawa").count() as f32 + 0.01,
                t.matches("paris").count() as f32 + 0.01,
                t.matches("rome").count() as f32 + 0.01,
            ])
        }
    }

    struct FailingEmbedder {
        calls: AtomicU32,
    }

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn model_name(&self) -> &str {
            "down"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            bail!("connection refused")
        }
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new("doc", i, 0, t.chars().count(), t))
            .collect()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(5),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let emb = KeywordEmbedder { model: "kw" };
        let idx = VectorIndex::build(
            &emb,
            chunks(&["Paris is in France.", "Ottawa is the capital of Canada.", "Rome."]),
            Metric::Cosine,
            &policy(),
        )
        .await
        .unwrap();
        let res = idx.search(&emb, "Tell me about Ottawa", 2, &policy()).await.unwrap();
        assert_eq!(res.len(), 2);
        assert!(res.hits[0].chunk.text.contains("Ottawa"));
        assert!(res.hits[0].score >= res.hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_keep_chunk_order() {
        let idx = VectorIndex::from_parts(
            "m",
            Metric::Cosine,
            chunks(&["a", "b", "c"]),
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let res = idx.search_vector(&[1.0, 0.0], 3);
        let ids: Vec<usize> = res.hits.iter().map(|h| h.chunk.index).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_model_mismatch_rejected() {
        let built_with = KeywordEmbedder { model: "kw-v1" };
        let idx = VectorIndex::build(&built_with, chunks(&["Ottawa"]), Metric::Cosine, &policy())
            .await
            .unwrap();
        let other = KeywordEmbedder { model: "kw-v2" };
        let err = idx.search(&other, "Ottawa", 1, &policy()).await.unwrap_err();
        assert!(matches!(err, Error::ModelMismatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_fails_after_two_retries() {
        let emb = FailingEmbedder {
            calls: AtomicU32::new(0),
        };
        let err = VectorIndex::build(&emb, chunks(&["x"]), Metric::Cosine, &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable { .. }));
        assert_eq!(emb.calls.load(AtomicOrdering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shared_index_not_ready_until_built() {
        let shared = SharedIndex::new();
        assert!(matches!(shared.get().await, Err(Error::IndexNotReady)));
        let emb = KeywordEmbedder { model: "kw" };
        shared
            .rebuild(&emb, chunks(&["Rome"]), Metric::Cosine, &policy())
            .await
            .unwrap();
        assert!(shared.is_ready().await);
        assert_eq!(shared.get().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_from_parts_validates_lengths() {
        let err = VectorIndex::from_parts("m", Metric::Cosine, chunks(&["a"]), vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
