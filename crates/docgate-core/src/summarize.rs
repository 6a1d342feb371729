//! One-paragraph summaries of transcripts and documents.

use std::sync::Arc;

use tracing::debug;

use crate::completion::{complete_with_retry, strip_think, CompletionOptions, CompletionProvider};
use crate::error::{Error, Result};
use crate::prompts;

pub struct Summarizer {
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn CompletionProvider>, options: CompletionOptions) -> Self {
        Self { provider, options }
    }

    pub async fn summarize(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "nothing to summarize: text is empty".to_string(),
            ));
        }
        debug!(chars = text.len(), "summarizing");
        let prompt = prompts::summarize(text);
        let raw = complete_with_retry(self.provider.as_ref(), &prompt, &self.options).await?;
        Ok(strip_think(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl CompletionProvider for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> anyhow::Result<String> {
            Ok(format!("<think>...</think>{}", prompt.lines().last().unwrap_or_default()))
        }
    }

    #[tokio::test]
    async fn test_summarize() {
        let s = Summarizer::new(Arc::new(Echo), CompletionOptions::default());
        let out = s.summarize("Text: hello Start: 0.0").await.unwrap();
        assert_eq!(out, "Text: hello Start: 0.0");
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let s = Summarizer::new(Arc::new(Echo), CompletionOptions::default());
        assert!(matches!(
            s.summarize("  \n").await,
            Err(Error::InvalidArgument(_))
        ));
    }
}
