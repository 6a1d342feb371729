//! # docgate-core
//!
//! Runtime-agnostic core of docgate: chunking, vector and BM25 retrieval,
//! hybrid fusion, relevance gating, answer drafting, verification and the
//! pipeline state machine.
//!
//! This crate performs no network or filesystem I/O. Embedding and
//! completion backends are supplied by the caller through the
//! [`embedding::EmbeddingProvider`] and [`completion::CompletionProvider`]
//! traits.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Documents, chunks, retrieval results, answers, reports |
//! | [`chunk`] | Boundary-aware overlapping chunker |
//! | [`embedding`] | Embedding trait and similarity metrics |
//! | [`index`] | Vector index and the single-writer [`index::SharedIndex`] |
//! | [`lexical`] | BM25 keyword index |
//! | [`search`] | Retriever trait and weighted hybrid fusion |
//! | [`completion`] | Completion trait and options |
//! | [`relevance`] | Fail-closed three-way relevance classifier |
//! | [`draft`] | Answer drafter and refusal detection |
//! | [`verify`] | Verifier and report parser |
//! | [`summarize`] | One-paragraph summaries |
//! | [`pipeline`] | Orchestration state machine |
//! | [`retry`] | Bounded retries with exponential backoff |

pub mod chunk;
pub mod completion;
pub mod draft;
pub mod embedding;
pub mod error;
pub mod index;
pub mod lexical;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod relevance;
pub mod retry;
pub mod search;
pub mod summarize;
pub mod verify;

pub use error::{Error, Result};
