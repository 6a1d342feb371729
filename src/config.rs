use anyhow::{Context, Result};
use docgate_core::embedding::Metric;
use docgate_core::pipeline::Mode;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use docgate_core::completion::CompletionOptions;
use docgate_core::retry::RetryPolicy;
use docgate_core::search::FusionWeights;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    200
}
fn default_overlap() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_weight")]
    pub vector_weight: f64,
    #[serde(default)]
    pub metric: Metric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            lexical_weight: default_weight(),
            vector_weight: default_weight(),
            metric: Metric::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn weights(&self) -> Result<FusionWeights> {
        FusionWeights::new(self.lexical_weight, self.vector_weight)
            .map_err(|e| anyhow::anyhow!("retrieval weights: {e}"))
    }
}

fn default_k() -> usize {
    3
}
fn default_weight() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override, e.g. `https://api.mistral.ai/v1`.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: None,
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Some(Duration::from_secs(self.timeout_secs)),
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: None,
            temperature: 0.0,
            max_tokens: None,
            max_retries: default_max_retries(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Some(Duration::from_secs(self.timeout_secs)),
            max_retries: self.max_retries,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    2
}
fn default_embed_timeout_secs() -> u64 {
    30
}
fn default_completion_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_classify_passages")]
    pub classify_passages: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Strict,
            classify_passages: default_classify_passages(),
        }
    }
}

fn default_classify_passages() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Sessions kept at once; the least recently used is evicted beyond this.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Idle seconds after which a session is discarded.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_sessions: default_max_sessions(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7860".to_string()
}

fn default_max_sessions() -> usize {
    256
}

fn default_session_ttl_secs() -> u64 {
    3600
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.size {
        anyhow::bail!(
            "chunking.overlap ({}) must be < chunking.size ({})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    // Validate retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    config.retrieval.weights()?;

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    // Validate completion
    match config.completion.provider.as_str() {
        "disabled" | "openai" | "groq" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled, openai, groq, or ollama.",
            other
        ),
    }
    if config.completion.is_enabled() && config.completion.model.is_none() {
        anyhow::bail!(
            "completion.model must be specified when provider is '{}'",
            config.completion.provider
        );
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
    }

    // Validate pipeline
    if config.pipeline.classify_passages < 1 {
        anyhow::bail!("pipeline.classify_passages must be >= 1");
    }

    // Validate server
    if config.server.max_sessions < 1 {
        anyhow::bail!("server.max_sessions must be >= 1");
    }
    if config.server.session_ttl_secs == 0 {
        anyhow::bail!("server.session_ttl_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.size, 200);
        assert_eq!(config.chunking.overlap, 20);
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.retrieval.metric, Metric::Cosine);
        assert_eq!(config.embedding.max_retries, 2);
        assert_eq!(config.pipeline.mode, Mode::Strict);
        assert_eq!(config.server.bind, "127.0.0.1:7860");
        assert_eq!(config.server.max_sessions, 256);
        assert_eq!(config.server.session_ttl_secs, 3600);
        assert!(!config.completion.is_enabled());
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
[chunking]
size = 500
overlap = 50

[retrieval]
k = 5
lexical_weight = 0.3
vector_weight = 0.7
metric = "inner_product"

[embedding]
provider = "openai"
model = "mistral-embed"
dims = 1024
url = "https://api.mistral.ai/v1"
api_key_env = "MISTRAL_API_KEY"

[completion]
provider = "groq"
model = "qwen/qwen3-32b"

[pipeline]
mode = "lenient"
"#,
        )
        .unwrap();
        assert_eq!(config.retrieval.metric, Metric::InnerProduct);
        assert_eq!(config.retrieval.weights().unwrap().vector(), 0.7);
        assert_eq!(config.pipeline.mode, Mode::Lenient);
        assert_eq!(config.completion.options().max_retries, 2);
    }

    #[test]
    fn test_rejects_bad_overlap() {
        let err = parse_config("[chunking]\nsize = 10\noverlap = 10\n").unwrap_err();
        assert!(err.to_string().contains("chunking.overlap"));
    }

    #[test]
    fn test_rejects_bad_weights() {
        let err = parse_config("[retrieval]\nlexical_weight = 0.7\nvector_weight = 0.7\n")
            .unwrap_err();
        assert!(err.to_string().contains("weights"));
        assert!(parse_config("[retrieval]\nlexical_weight = -0.5\nvector_weight = 1.5\n").is_err());
    }

    #[test]
    fn test_enabled_provider_needs_model() {
        assert!(parse_config("[embedding]\nprovider = \"openai\"\ndims = 8\n").is_err());
        assert!(parse_config("[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n").is_err());
        assert!(parse_config("[completion]\nprovider = \"groq\"\n").is_err());
        assert!(parse_config("[completion]\nprovider = \"bard\"\nmodel = \"m\"\n").is_err());
    }

    #[test]
    fn test_rejects_zero_session_limits() {
        let err = parse_config("[server]\nmax_sessions = 0\n").unwrap_err();
        assert!(err.to_string().contains("server.max_sessions"));
        let err = parse_config("[server]\nsession_ttl_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("server.session_ttl_secs"));
    }
}
