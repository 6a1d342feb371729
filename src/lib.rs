//! # docgate
//!
//! Relevance-gated document question answering.
//!
//! A question is answered only when retrieved context supports it: hybrid
//! (BM25 + vector) retrieval feeds a relevance classifier, an answer drafter
//! and a verifier, and the pipeline refuses rather than guesses. The
//! algorithms live in [`docgate_core`]; this crate supplies configuration,
//! HTTP model providers, document sources, sessions, the CLI and a JSON
//! HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────────────────────┐
//! │  Sources    │──▶│   Session    │──▶│ Pipeline (docgate-core)    │
//! │ files/JSON  │   │ chunk+index  │   │ retrieve→classify→draft→   │
//! └─────────────┘   └──────┬───────┘   │ verify                     │
//!                          │           └────────────────────────────┘
//!                ┌─────────┴─────────┐
//!                ▼                   ▼
//!           ┌──────────┐       ┌──────────┐
//!           │   CLI    │       │   HTTP   │
//!           └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`embedding`] | OpenAI-compatible and Ollama embedding providers |
//! | [`completion`] | OpenAI-compatible, Groq and Ollama completion providers |
//! | [`sources`] | Filesystem document loading |
//! | [`transcript`] | Transcript segments and video ids |
//! | [`session`] | Per-conversation indexes and pipeline |
//! | [`server`] | JSON HTTP server |
//! | [`commands`] | CLI command implementations |
//! | [`logging`] | Tracing initialization |

pub mod commands;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod http;
pub mod logging;
pub mod server;
pub mod session;
pub mod sources;
pub mod transcript;
