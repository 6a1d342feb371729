//! Core data models that flow through the question-answering pipeline.
//!
//! Documents are created once at ingestion and never mutated. Chunks refer to
//! their parent document by id only. Retrieval results, labels, answers and
//! verification reports are produced fresh for each question.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Metadata key holding the document's source identifier.
pub const META_SOURCE_ID: &str = "source_id";
/// Metadata key holding the document's ingestion timestamp (RFC 3339).
pub const META_TIMESTAMP: &str = "timestamp";

/// Immutable text payload plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Create a document with a fresh id, stamping `source_id` and `timestamp`.
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), source_id, text, Utc::now())
    }

    /// Create a document with an explicit id and timestamp.
    pub fn with_id(
        id: impl Into<String>,
        source_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_SOURCE_ID.to_string(), source_id.into());
        metadata.insert(META_TIMESTAMP.to_string(), timestamp.to_rfc3339());
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE_ID).map(String::as_str)
    }
}

/// A contiguous slice of a document's text.
///
/// `start` and `end` are character (Unicode scalar) offsets into the parent
/// document, half-open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Chunk {
    pub fn new(document_id: &str, index: usize, start: usize, end: usize, text: &str) -> Self {
        let hash = format!("{:x}", Sha256::digest(text.as_bytes()));
        Self {
            id: format!("{document_id}:{index}"),
            document_id: document_id.to_string(),
            index,
            start,
            end,
            text: text.to_string(),
            hash,
        }
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// A chunk paired with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Chunks ordered by descending relevance. Order is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self { hits }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// The chunks in ranked order, without scores.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.hits.iter().map(|h| h.chunk.clone()).collect()
    }
}

/// How well a retrieved context set addresses a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelevanceLabel {
    CanAnswer,
    Partial,
    NoMatch,
}

impl RelevanceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelevanceLabel::CanAnswer => "CAN_ANSWER",
            RelevanceLabel::Partial => "PARTIAL",
            RelevanceLabel::NoMatch => "NO_MATCH",
        }
    }
}

impl std::fmt::Display for RelevanceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence attached to a drafted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Normal,
    /// Drafted from a context classified as [`RelevanceLabel::Partial`].
    Low,
}

/// Generated answer text and the context it was conditioned on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub context: Vec<Chunk>,
    pub confidence: Confidence,
}

/// Outcome of checking an answer against its context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub supported: bool,
    pub unsupported_claims: BTreeSet<String>,
    pub contradictions: BTreeSet<String>,
    pub relevant: bool,
}

impl VerificationReport {
    /// An answer is accepted only when it is both supported and relevant.
    pub fn is_acceptable(&self) -> bool {
        self.supported && self.relevant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_metadata_stamped() {
        let doc = Document::new("notes.md", "hello");
        assert_eq!(doc.source_id(), Some("notes.md"));
        assert!(doc.metadata.contains_key(META_TIMESTAMP));
    }

    #[test]
    fn test_chunk_id_and_hash_deterministic() {
        let a = Chunk::new("doc", 2, 10, 15, "hello");
        let b = Chunk::new("doc", 2, 10, 15, "hello");
        assert_eq!(a.id, "doc:2");
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.char_len(), 5);
    }

    #[test]
    fn test_label_serializes_screaming_case() {
        let json = serde_json::to_string(&RelevanceLabel::CanAnswer).unwrap();
        assert_eq!(json, "\"CAN_ANSWER\"");
    }
}
