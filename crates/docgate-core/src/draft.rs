//! Answer drafting.

use std::sync::Arc;

use tracing::debug;

use crate::completion::{complete_with_retry, strip_think, CompletionOptions, CompletionProvider};
use crate::error::Result;
use crate::models::{Answer, Chunk, Confidence};
use crate::prompts::{self, BOUNDARY_MARKER, REFUSAL_SENTINEL};

/// Drafts an answer conditioned on a context set.
pub struct AnswerDrafter {
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
}

impl AnswerDrafter {
    pub fn new(provider: Arc<dyn CompletionProvider>, options: CompletionOptions) -> Self {
        Self { provider, options }
    }

    /// Draft an answer. Chunk order is preserved in the prompt.
    ///
    /// The returned [`Answer`] may be the refusal sentinel; check with
    /// [`is_refusal`].
    pub async fn draft(
        &self,
        question: &str,
        context: &[Chunk],
        confidence: Confidence,
    ) -> Result<Answer> {
        let joined = join_context(context);
        debug!(chunks = context.len(), chars = joined.len(), "drafting answer");

        let prompt = prompts::draft(question, &joined);
        let raw = complete_with_retry(self.provider.as_ref(), &prompt, &self.options).await?;

        Ok(Answer {
            text: strip_think(&raw),
            context: context.to_vec(),
            confidence,
        })
    }
}

/// Concatenate chunk texts with [`BOUNDARY_MARKER`] between them.
pub fn join_context(context: &[Chunk]) -> String {
    context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(BOUNDARY_MARKER)
}

/// True when `text` is the drafter's refusal sentinel.
///
/// Case-insensitive prefix match after removing think blocks, surrounding
/// whitespace and quotes.
pub fn is_refusal(text: &str) -> bool {
    let cleaned = strip_think(text);
    let cleaned = cleaned.trim().trim_start_matches(['"', '\'']).trim_start();
    let sentinel = REFUSAL_SENTINEL.trim_end_matches('.');
    cleaned
        .get(..sentinel.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(sentinel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recording {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionProvider for Recording {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn chunk(i: usize, text: &str) -> Chunk {
        Chunk::new("d", i, 0, text.chars().count(), text)
    }

    #[test]
    fn test_is_refusal() {
        assert!(is_refusal(REFUSAL_SENTINEL));
        assert!(is_refusal(
            "  \"i cannot answer this question based on the provided documents\"  "
        ));
        assert!(is_refusal(
            "<think>nothing here</think>I cannot answer this question based on the provided documents. Sorry."
        ));
        assert!(!is_refusal("Ottawa is the capital of Canada."));
        assert!(!is_refusal("I cannot"));
        assert!(!is_refusal(""));
    }

    #[test]
    fn test_join_context_preserves_order() {
        let joined = join_context(&[chunk(0, "first"), chunk(1, "second")]);
        assert_eq!(joined, "first\n\n---\n\nsecond");
    }

    #[tokio::test]
    async fn test_draft_carries_context_and_confidence() {
        let provider = Arc::new(Recording {
            reply: "<think>easy</think>Ottawa.".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let drafter = AnswerDrafter::new(provider.clone(), CompletionOptions::default());
        let ctx = vec![chunk(0, "Ottawa is the capital of Canada.")];
        let answer = drafter
            .draft("What is the capital of Canada?", &ctx, Confidence::Low)
            .await
            .unwrap();
        assert_eq!(answer.text, "Ottawa.");
        assert_eq!(answer.context, ctx);
        assert_eq!(answer.confidence, Confidence::Low);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Ottawa is the capital of Canada."));
        assert!(prompts[0].contains(REFUSAL_SENTINEL));
    }
}
