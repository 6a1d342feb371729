//! Retrievers and hybrid rank fusion.
//!
//! # Hybrid Scoring Algorithm
//!
//! 1. Fetch the top-`k` lexical candidates (BM25).
//! 2. Fetch the top-`k` vector candidates (cosine or inner product).
//! 3. Normalize both lists to `[0, 1]` using min-max normalization.
//! 4. Deduplicate by chunk id and merge:
//!    `score = w_lexical × lexical + w_vector × vector`, where a chunk
//!    missing from one list gets zero from that side.
//! 5. Sort by fused score (desc), then by the higher-weighted retriever's
//!    native rank, then the other retriever's rank, then chunk order.
//! 6. Truncate to `k`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::SharedIndex;
use crate::lexical::{Bm25Index, LexicalRetriever};
use crate::models::{Chunk, RetrievalResult, ScoredChunk};
use crate::retry::RetryPolicy;

/// Anything that can turn a query into a ranked context set.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult>;
}

/// Adapts a [`LexicalRetriever`] to a [`Retriever`] by resolving chunk ids
/// against the corpus it was built over.
pub struct KeywordRetriever {
    lexical: Arc<dyn LexicalRetriever>,
    chunks: HashMap<String, Chunk>,
}

impl KeywordRetriever {
    /// Fails with [`Error::InvalidArgument`] when two chunks share an id.
    pub fn new(lexical: Arc<dyn LexicalRetriever>, chunks: &[Chunk]) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(chunks.len());
        for chunk in chunks {
            if by_id.insert(chunk.id.clone(), chunk.clone()).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "duplicate chunk id: {}",
                    chunk.id
                )));
            }
        }
        Ok(Self {
            lexical,
            chunks: by_id,
        })
    }

    /// BM25 over `chunks`.
    pub fn bm25(chunks: Vec<Chunk>) -> Result<Self> {
        let lexical = Arc::new(Bm25Index::new(chunks.clone()));
        Self::new(lexical, &chunks)
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        let ranked = self
            .lexical
            .search(query, k)
            .await
            .map_err(|e| Error::ProviderUnavailable {
                provider: "lexical".to_string(),
                message: e.to_string(),
            })?;

        let hits = ranked
            .into_iter()
            .filter_map(|(id, score)| {
                let chunk = self.chunks.get(&id)?;
                Some(ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect();
        Ok(RetrievalResult::new(hits))
    }
}

/// Vector retrieval through a [`SharedIndex`] and the provider that built it.
pub struct VectorRetriever {
    index: Arc<SharedIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
}

impl VectorRetriever {
    pub fn new(
        index: Arc<SharedIndex>,
        provider: Arc<dyn EmbeddingProvider>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            index,
            provider,
            policy,
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        let index = self.index.get().await?;
        index
            .search(self.provider.as_ref(), query, k, &self.policy)
            .await
    }
}

/// Validated fusion weights: non-negative and summing to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    lexical: f64,
    vector: f64,
}

impl FusionWeights {
    pub fn new(lexical: f64, vector: f64) -> Result<Self> {
        if !(lexical.is_finite() && vector.is_finite()) || lexical < 0.0 || vector < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "fusion weights must be non-negative (lexical={lexical}, vector={vector})"
            )));
        }
        if ((lexical + vector) - 1.0).abs() > 1e-6 {
            return Err(Error::InvalidArgument(format!(
                "fusion weights must sum to 1 (lexical={lexical}, vector={vector})"
            )));
        }
        Ok(Self { lexical, vector })
    }

    pub fn lexical(&self) -> f64 {
        self.lexical
    }

    pub fn vector(&self) -> f64 {
        self.vector
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            lexical: 0.5,
            vector: 0.5,
        }
    }
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(hits: &[ScoredChunk]) -> Vec<f64> {
    if hits.is_empty() {
        return Vec::new();
    }

    let s_min = hits.iter().map(|h| h.score).fold(f64::INFINITY, f64::min);
    let s_max = hits.iter().map(|h| h.score).fold(f64::NEG_INFINITY, f64::max);

    hits.iter()
        .map(|h| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (h.score - s_min) / (s_max - s_min)
            }
        })
        .collect()
}

struct Fused<'a> {
    chunk: &'a Chunk,
    lexical: f64,
    vector: f64,
    lexical_rank: usize,
    vector_rank: usize,
}

/// Merge a lexical and a vector result list into one ranking.
pub fn fuse(
    lexical: &RetrievalResult,
    vector: &RetrievalResult,
    weights: FusionWeights,
    k: usize,
) -> RetrievalResult {
    let mut merged: HashMap<&str, Fused<'_>> = HashMap::new();

    for (rank, (hit, norm)) in lexical
        .hits
        .iter()
        .zip(normalize_scores(&lexical.hits))
        .enumerate()
    {
        merged.entry(hit.chunk.id.as_str()).or_insert(Fused {
            chunk: &hit.chunk,
            lexical: norm,
            vector: 0.0,
            lexical_rank: rank,
            vector_rank: usize::MAX,
        });
    }

    for (rank, (hit, norm)) in vector
        .hits
        .iter()
        .zip(normalize_scores(&vector.hits))
        .enumerate()
    {
        let entry = merged.entry(hit.chunk.id.as_str()).or_insert(Fused {
            chunk: &hit.chunk,
            lexical: 0.0,
            vector: 0.0,
            lexical_rank: usize::MAX,
            vector_rank: usize::MAX,
        });
        if entry.vector_rank == usize::MAX {
            entry.vector = norm;
            entry.vector_rank = rank;
        }
    }

    let vector_first = weights.vector >= weights.lexical;
    let mut fused: Vec<(f64, Fused<'_>)> = merged
        .into_values()
        .map(|f| (weights.lexical * f.lexical + weights.vector * f.vector, f))
        .collect();

    fused.sort_by(|(sa, a), (sb, b)| {
        let (a_primary, a_secondary, b_primary, b_secondary) = if vector_first {
            (a.vector_rank, a.lexical_rank, b.vector_rank, b.lexical_rank)
        } else {
            (a.lexical_rank, a.vector_rank, b.lexical_rank, b.vector_rank)
        };
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then(a_primary.cmp(&b_primary))
            .then(a_secondary.cmp(&b_secondary))
            .then(a.chunk.document_id.cmp(&b.chunk.document_id))
            .then(a.chunk.index.cmp(&b.chunk.index))
    });
    fused.truncate(k);

    RetrievalResult::new(
        fused
            .into_iter()
            .map(|(score, f)| ScoredChunk {
                chunk: f.chunk.clone(),
                score,
            })
            .collect(),
    )
}

/// Lexical + vector retrieval merged by weighted rank fusion.
pub struct HybridRetriever {
    lexical: Arc<dyn Retriever>,
    vector: Arc<dyn Retriever>,
    weights: FusionWeights,
}

impl HybridRetriever {
    pub fn new(
        lexical: Arc<dyn Retriever>,
        vector: Arc<dyn Retriever>,
        weights: FusionWeights,
    ) -> Self {
        Self {
            lexical,
            vector,
            weights,
        }
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".to_string()));
        }
        let (lexical, vector) = tokio::join!(
            self.lexical.retrieve(query, k),
            self.vector.retrieve(query, k)
        );
        let (lexical, vector) = (lexical?, vector?);
        debug!(
            lexical = lexical.len(),
            vector = vector.len(),
            "hybrid candidates"
        );
        Ok(fuse(&lexical, &vector, self.weights, k))
    }
}
