//! Per-conversation state.
//!
//! A [`Session`] owns the documents a caller uploaded, their chunks, the
//! retrieval indexes built over them, and a [`Pipeline`] wired to the
//! configured providers. Sessions share nothing with each other; the CLI
//! creates one per invocation and the server keeps one per session id.

use anyhow::{Context, Result};
use docgate_core::Error as CoreError;
use std::collections::HashSet;
use chrono::{DateTime, Utc};
use docgate_core::chunk::chunk_document;
use docgate_core::completion::CompletionProvider;
use docgate_core::embedding::EmbeddingProvider;
use docgate_core::index::SharedIndex;
use docgate_core::models::{Chunk, Document};
use docgate_core::pipeline::{Pipeline, PipelineRun};
use docgate_core::search::{HybridRetriever, KeywordRetriever, Retriever, VectorRetriever};
use docgate_core::summarize::Summarizer;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;

/// The model backends a session talks to.
#[derive(Clone)]
pub struct Providers {
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub completion: Arc<dyn CompletionProvider>,
}

impl Providers {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            embedding: crate::embedding::create_provider(&config.embedding)
                .context("Failed to create embedding provider")?,
            completion: crate::completion::create_provider(&config.completion)
                .context("Failed to create completion provider")?,
        })
    }
}

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    pipeline: Pipeline,
    summarizer: Summarizer,
}

impl Session {
    /// Chunk and index `documents`, then wire the pipeline.
    ///
    /// Document ids must be unique: chunk ids are derived from them. Fails
    /// with [`CoreError::NoContext`] when the documents yield no chunks.
    /// With embeddings disabled the session retrieves with BM25 alone.
    pub async fn build(
        config: &Config,
        providers: &Providers,
        documents: Vec<Document>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(CoreError::InvalidArgument(format!(
                    "duplicate document id: {}",
                    doc.id
                ))
                .into());
            }
        }

        let mut chunks = Vec::new();
        for doc in &documents {
            chunks.extend(
                chunk_document(doc, config.chunking.size, config.chunking.overlap)
                    .with_context(|| format!("Failed to chunk document {}", doc.id))?,
            );
        }

        if chunks.is_empty() {
            return Err(CoreError::NoContext.into());
        }

        let keyword: Arc<dyn Retriever> = Arc::new(KeywordRetriever::bm25(chunks.clone())?);
        let retriever: Arc<dyn Retriever> = if config.embedding.is_enabled() {
            let index = Arc::new(SharedIndex::new());
            let policy = config.embedding.retry_policy();
            index
                .rebuild(
                    providers.embedding.as_ref(),
                    chunks.clone(),
                    config.retrieval.metric,
                    &policy,
                )
                .await
                .context("Failed to build vector index")?;
            let vector = Arc::new(VectorRetriever::new(
                index,
                providers.embedding.clone(),
                policy,
            ));
            Arc::new(HybridRetriever::new(
                keyword,
                vector,
                config.retrieval.weights()?,
            ))
        } else {
            keyword
        };

        let options = config.completion.options();
        let pipeline = Pipeline::builder()
            .retriever(retriever)
            .completion_provider(providers.completion.clone())
            .completion_options(options.clone())
            .mode(config.pipeline.mode)
            .k(config.retrieval.k)
            .classify_passages(config.pipeline.classify_passages)
            .build()?;

        let session = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            documents,
            chunks,
            pipeline,
            summarizer: Summarizer::new(providers.completion.clone(), options),
        };
        info!(
            session = %session.id,
            documents = session.documents.len(),
            chunks = session.chunks.len(),
            hybrid = config.embedding.is_enabled(),
            "session ready"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub async fn ask(&self, question: &str) -> Result<PipelineRun> {
        Ok(self.pipeline.ask(question).await?)
    }

    /// Summarize all session documents together.
    pub async fn summarize(&self) -> Result<String> {
        let text = self
            .documents
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(self.summarizer.summarize(&text).await?)
    }
}
