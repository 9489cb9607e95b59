use serde::{Deserialize, Serialize};

/// Which embedding backend produces vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Local ONNX model through fastembed
    FastEmbed,
    /// OpenAI-compatible embeddings API
    OpenAI,
    /// Offline feature-hashing embedder
    Hashing,
}

impl Default for ProviderType {
    fn default() -> Self {
        Self::FastEmbed
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::FastEmbed => "fastembed",
            Self::OpenAI => "openai",
            Self::Hashing => "hashing",
        })
    }
}

/// `[embeddings]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub provider: ProviderType,

    /// Model name for the fastembed provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Output dimension (used by the hashing provider and for validation)
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Text is cut to this many characters before embedding
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Longest text accepted by `POST /api/embeddings`
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Most texts accepted by `POST /api/embeddings/batch`
    #[serde(default = "default_max_batch_texts")]
    pub max_batch_texts: usize,

    #[serde(default)]
    pub openai: OpenAIConfig,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderType::default(),
            model: default_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            max_input_chars: default_max_input_chars(),
            max_text_chars: default_max_text_chars(),
            max_batch_texts: default_max_batch_texts(),
            openai: OpenAIConfig::default(),
        }
    }
}

fn default_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

fn default_max_input_chars() -> usize {
    512
}

fn default_max_text_chars() -> usize {
    10000
}

fn default_max_batch_texts() -> usize {
    50
}

/// `[embeddings.openai]`: any endpoint speaking the OpenAI embeddings API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Literal key or `${VAR}`; empty means `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_openai_attempts")]
    pub max_retries: usize,

    /// Inputs per request
    #[serde(default = "default_openai_batch")]
    pub batch_size: usize,

    #[serde(default = "default_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
            base_url: None,
            max_retries: default_openai_attempts(),
            batch_size: default_openai_batch(),
            initial_backoff_ms: default_backoff_ms(),
        }
    }
}

impl OpenAIConfig {
    pub fn load_api_key(&self) -> anyhow::Result<String> {
        crate::config::secret_from(&self.api_key, &["OPENAI_API_KEY"])
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("no embeddings API key: set [embeddings.openai].api_key or OPENAI_API_KEY"))
    }
}

fn default_openai_model() -> String {
    "text-embedding-3-small".into()
}

fn default_openai_attempts() -> usize {
    3
}

fn default_openai_batch() -> usize {
    100
}

fn default_backoff_ms() -> u64 {
    500
}
