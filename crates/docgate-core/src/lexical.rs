//! Keyword retrieval with Okapi BM25.
//!
//! Terms are lower-cased runs of alphanumeric characters. Scores use the
//! non-negative IDF variant `ln(1 + (N - n + 0.5) / (n + 0.5))`, so a term
//! present in every chunk still contributes a small positive weight.
//! Chunks that match no query term are not returned.

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Chunk;

/// Term-frequency saturation.
pub const DEFAULT_K1: f64 = 1.5;
/// Length normalization.
pub const DEFAULT_B: f64 = 0.75;

/// Keyword retriever returning ranked `(chunk_id, score)` pairs.
#[async_trait]
pub trait LexicalRetriever: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<(String, f64)>>;
}

/// Split text into lower-cased alphanumeric terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// In-memory BM25 index over a fixed chunk corpus.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    chunks: Vec<Chunk>,
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avg_len: f64,
    doc_freq: HashMap<String, usize>,
    k1: f64,
    b: f64,
}

impl Bm25Index {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self::with_params(chunks, DEFAULT_K1, DEFAULT_B)
    }

    pub fn with_params(chunks: Vec<Chunk>, k1: f64, b: f64) -> Self {
        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut doc_lens = Vec::with_capacity(chunks.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for chunk in &chunks {
            let terms = tokenize(&chunk.text);
            doc_lens.push(terms.len());
            let mut tf: HashMap<String, usize> = HashMap::new();
            for t in terms {
                *tf.entry(t).or_insert(0) += 1;
            }
            for t in tf.keys() {
                *doc_freq.entry(t.clone()).or_insert(0) += 1;
            }
            term_freqs.push(tf);
        }

        let avg_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<usize>() as f64 / doc_lens.len() as f64
        };

        Self {
            chunks,
            term_freqs,
            doc_lens,
            avg_len,
            doc_freq,
            k1,
            b,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.chunks.len() as f64;
        let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Rank chunk positions for `query`; ties keep corpus order.
    pub fn rank(&self, query: &str, k: usize) -> Vec<(usize, f64)> {
        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();
        if terms.is_empty() || self.chunks.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = Vec::new();
        for (i, tf) in self.term_freqs.iter().enumerate() {
            let len_norm = if self.avg_len > 0.0 {
                self.doc_lens[i] as f64 / self.avg_len
            } else {
                0.0
            };
            let mut score = 0.0;
            let mut matched = false;
            for term in &terms {
                let f = match tf.get(term) {
                    Some(&f) => f as f64,
                    None => continue,
                };
                matched = true;
                score += self.idf(term) * (f * (self.k1 + 1.0))
                    / (f + self.k1 * (1.0 - self.b + self.b * len_norm));
            }
            if matched {
                scored.push((i, score));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }
}

#[async_trait]
impl LexicalRetriever for Bm25Index {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<(String, f64)>> {
        Ok(self
            .rank(query, k)
            .into_iter()
            .map(|(i, s)| (self.chunks[i].id.clone(), s))
            .collect())
    }
}
