//! Relevance gating: does the retrieved context address the question?
//!
//! The classifier is fail-closed. Any model output that is not exactly one
//! of the three labels is treated as [`RelevanceLabel::NoMatch`], so an
//! unexpected reply can never produce a confident answer.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::completion::{complete_with_retry, strip_think, CompletionOptions, CompletionProvider};
use crate::error::Result;
use crate::models::{Chunk, RelevanceLabel};
use crate::prompts;

/// Number of top passages shown to the classifier by default.
pub const DEFAULT_MAX_PASSAGES: usize = 3;

/// Three-way relevance classifier backed by a completion provider.
pub struct RelevanceClassifier {
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
    max_passages: usize,
}

impl RelevanceClassifier {
    pub fn new(provider: Arc<dyn CompletionProvider>, options: CompletionOptions) -> Self {
        Self {
            provider,
            options,
            max_passages: DEFAULT_MAX_PASSAGES,
        }
    }

    pub fn with_max_passages(mut self, max_passages: usize) -> Self {
        self.max_passages = max_passages.max(1);
        self
    }

    /// Label `context` against `question`.
    ///
    /// An empty context is `NoMatch` without a provider call.
    pub async fn classify(&self, question: &str, context: &[Chunk]) -> Result<RelevanceLabel> {
        if context.is_empty() {
            debug!("empty context, classifying as NO_MATCH");
            return Ok(RelevanceLabel::NoMatch);
        }

        let passages = context
            .iter()
            .take(self.max_passages)
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(prompts::PASSAGE_SEPARATOR);
        debug!(
            passages = context.len().min(self.max_passages),
            chars = passages.len(),
            "classifying relevance"
        );

        let prompt = prompts::relevance(question, &passages);
        let raw = complete_with_retry(self.provider.as_ref(), &prompt, &self.options).await?;

        let label = parse_label(&raw).unwrap_or_else(|| {
            warn!(raw = %raw.trim(), "unrecognized relevance label, forcing NO_MATCH");
            RelevanceLabel::NoMatch
        });
        debug!(%label, "relevance classified");
        Ok(label)
    }
}

/// Normalize a model reply to a label, or `None` if it is not one.
pub fn parse_label(raw: &str) -> Option<RelevanceLabel> {
    let cleaned = strip_think(raw);
    let cleaned = cleaned
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.' | '*'))
        .trim()
        .to_uppercase();
    match cleaned.as_str() {
        "CAN_ANSWER" => Some(RelevanceLabel::CanAnswer),
        "PARTIAL" => Some(RelevanceLabel::Partial),
        "NO_MATCH" => Some(RelevanceLabel::NoMatch),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        reply: String,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for Canned {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn ctx() -> Vec<Chunk> {
        vec![Chunk::new("d", 0, 0, 32, "Ottawa is the capital of Canada.")]
    }

    #[test]
    fn test_parse_label_variants() {
        assert_eq!(parse_label("CAN_ANSWER"), Some(RelevanceLabel::CanAnswer));
        assert_eq!(parse_label("  partial \n"), Some(RelevanceLabel::Partial));
        assert_eq!(parse_label("\"NO_MATCH\""), Some(RelevanceLabel::NoMatch));
        assert_eq!(
            parse_label("<think>the passages mention it</think>\nCAN_ANSWER"),
            Some(RelevanceLabel::CanAnswer)
        );
        assert_eq!(parse_label("The answer is CAN_ANSWER"), None);
        assert_eq!(parse_label(""), None);
    }

    #[tokio::test]
    async fn test_empty_context_skips_provider() {
        let provider = Canned::new("CAN_ANSWER");
        let classifier = RelevanceClassifier::new(provider.clone(), CompletionOptions::default());
        let label = classifier.classify("anything?", &[]).await.unwrap();
        assert_eq!(label, RelevanceLabel::NoMatch);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_reply_fails_closed() {
        let provider = Canned::new("Yes, I think so.");
        let classifier = RelevanceClassifier::new(provider, CompletionOptions::default());
        let label = classifier.classify("capital?", &ctx()).await.unwrap();
        assert_eq!(label, RelevanceLabel::NoMatch);
    }

    #[tokio::test]
    async fn test_classification_is_deterministic() {
        let provider = Canned::new("partial");
        let classifier = RelevanceClassifier::new(provider.clone(), CompletionOptions::default());
        let first = classifier.classify("capital?", &ctx()).await.unwrap();
        let second = classifier.classify("capital?", &ctx()).await.unwrap();
        assert_eq!(first, RelevanceLabel::Partial);
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
