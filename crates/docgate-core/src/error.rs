//! Error taxonomy for the question-answering pipeline.
//!
//! Provider implementations report failures as [`anyhow::Error`]; the core
//! wraps them into [`Error::ProviderUnavailable`] once the retry budget is
//! spent. Parsing failures in the verifier are surfaced as
//! [`Error::UnparsableVerification`] and carry the raw model output.

use thiserror::Error;

/// Errors produced by the core pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad chunking, retrieval, or fusion parameters.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An embedding or completion call failed after exhausting retries.
    #[error("provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        /// Model or provider name that failed.
        provider: String,
        /// Last error reported by the provider.
        message: String,
    },

    /// The verifier's output did not contain the expected field layout.
    #[error("unparsable verification output: {}", preview(raw))]
    UnparsableVerification {
        /// The raw completion text, kept for diagnosis.
        raw: String,
    },

    /// The supplied documents contain no text to retrieve from.
    #[error("no context: documents contain no retrievable text")]
    NoContext,

    /// A search was attempted before any index was built.
    #[error("index not ready: build the index before searching")]
    IndexNotReady,

    /// The query embedding does not match the model the index was built with.
    #[error("embedding model mismatch: index built with {index_model} ({index_dims} dims), query from {query_model} ({query_dims} dims)")]
    ModelMismatch {
        index_model: String,
        index_dims: usize,
        query_model: String,
        query_dims: usize,
    },
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

fn preview(raw: &str) -> String {
    let one_line = raw.trim().replace('\n', " ");
    if one_line.chars().count() > 120 {
        let cut: String = one_line.chars().take(120).collect();
        format!("{cut}...")
    } else {
        one_line
    }
}
