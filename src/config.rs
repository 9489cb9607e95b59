use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::embeddings::EmbeddingsConfig;
use crate::knowledge::DocumentType;

const CONFIG_FILE: &str = "ragtim.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS (empty = any)
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

/// A markdown file that contributes sections to the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path relative to `content_dir` (or absolute)
    pub path: String,

    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    #[serde(default = "default_priority")]
    pub priority: i32,
}

/// A hand-written corpus entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    #[serde(default)]
    pub id: Option<String>,

    pub section: String,

    pub content: String,

    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default)]
    pub source: Option<String>,
}

fn default_priority() -> i32 {
    5
}

/// Corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory holding the markdown sources
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Sections at or below this many characters are skipped
    #[serde(default = "default_min_section_chars")]
    pub min_section_chars: usize,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            min_section_chars: default_min_section_chars(),
            sources: Vec::new(),
            entries: Vec::new(),
        }
    }
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_min_section_chars() -> usize {
    50
}

/// Search mode configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Vector-only semantic search
    Vector,
    /// BM25-only keyword search
    Bm25,
    /// Hybrid search combining vector and BM25
    Hybrid,
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::Hybrid
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Vector => write!(f, "vector"),
            SearchMode::Bm25 => write!(f, "bm25"),
            SearchMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "bm25" => Ok(Self::Bm25),
            "hybrid" => Ok(Self::Hybrid),
            other => anyhow::bail!("Unknown search mode '{}'. Valid options are: vector, bm25, hybrid", other),
        }
    }
}

/// Retrieval tuning. The defaults are product-tuning values, not derived constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub default_mode: SearchMode,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Largest `topK` a caller may request
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// BM25 term-frequency saturation
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// BM25 length normalisation
    #[serde(default = "default_b")]
    pub b: f32,

    /// Vector scores closer than this are ordered by document priority
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f32,

    /// BM25 scores are multiplied by `1 + priority / divisor`
    #[serde(default = "default_priority_boost_divisor")]
    pub priority_boost_divisor: f32,

    /// Max-normalise each signal before hybrid averaging
    #[serde(default)]
    pub normalize_scores: bool,

    /// Only used when `normalize_scores` is on
    #[serde(default = "default_weight")]
    pub vector_weight: f32,

    /// Only used when `normalize_scores` is on
    #[serde(default = "default_weight")]
    pub bm25_weight: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_mode: SearchMode::default(),
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            k1: default_k1(),
            b: default_b(),
            tie_epsilon: default_tie_epsilon(),
            priority_boost_divisor: default_priority_boost_divisor(),
            normalize_scores: false,
            vector_weight: default_weight(),
            bm25_weight: default_weight(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    50
}

fn default_k1() -> f32 {
    1.5
}

fn default_b() -> f32 {
    0.75
}

fn default_tie_epsilon() -> f32 {
    0.05
}

fn default_priority_boost_divisor() -> f32 {
    50.0
}

fn default_weight() -> f32 {
    1.0
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// TTL for full search responses
    #[serde(default = "default_search_ttl_secs")]
    pub search_ttl_secs: u64,

    /// TTL for ad-hoc embedding requests
    #[serde(default = "default_embedding_ttl_secs")]
    pub embedding_ttl_secs: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            search_ttl_secs: default_search_ttl_secs(),
            embedding_ttl_secs: default_embedding_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_search_ttl_secs() -> u64 {
    3600
}

fn default_embedding_ttl_secs() -> u64 {
    86400
}

fn default_max_entries() -> usize {
    10000
}

/// Language model (chat completion) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key (can be environment variable reference like ${DEEPSEEK_API_KEY})
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_llm_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Per-request HTTP timeout of the chat client
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_retries: default_llm_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}

fn default_llm_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_llm_max_retries() -> usize {
    2
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_llm_timeout_secs() -> u64 {
    25
}

/// Resolve a configured secret.
///
/// `${VAR}` reads that variable, a literal value is used as is, and an empty
/// value falls through to the first set variable in `fallback_vars`.
pub(crate) fn secret_from(configured: &str, fallback_vars: &[&str]) -> Option<String> {
    if let Some(var) = configured.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        return std::env::var(var).ok();
    }
    if !configured.is_empty() {
        return Some(configured.to_string());
    }
    fallback_vars.iter().find_map(|var| std::env::var(var).ok())
}

const PLACEHOLDER_MARKERS: &[&str] = &["placeholder", "your_actual", "api_key_here"];

impl LlmConfig {
    /// Resolve the API key from configuration or the environment.
    ///
    /// Returns `None` when no usable key exists; placeholder values shipped in
    /// sample configs count as missing.
    pub fn load_api_key(&self) -> Option<String> {
        let key = secret_from(&self.api_key, &["RAGTIM_LLM_API_KEY", "DEEPSEEK_API_KEY"])?;

        let key = key.trim();
        if key.is_empty() || PLACEHOLDER_MARKERS.iter().any(|m| key.contains(m)) {
            return None;
        }
        Some(key.to_string())
    }
}

/// Which retrieval+generation strategy a fallback slot uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process engine
    Local,
    /// A ragtim server reached over HTTP
    Remote,
    /// A hosted inference endpoint with its own search API
    Hosted,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::Hosted => write!(f, "hosted"),
        }
    }
}

/// Orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Backends in fallback order
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendKind>,

    #[serde(default = "default_remote_url")]
    pub remote_url: String,

    #[serde(default)]
    pub hosted_url: Option<String>,

    /// Fusion weights requested from the hosted endpoint
    #[serde(default = "default_hosted_vector_weight")]
    pub hosted_vector_weight: f32,

    #[serde(default = "default_hosted_bm25_weight")]
    pub hosted_bm25_weight: f32,

    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,

    /// Token budget of the assembled context block
    #[serde(default = "default_context_max_tokens")]
    pub context_max_tokens: usize,

    #[serde(default = "default_context_max_results")]
    pub context_max_results: usize,

    /// Smallest truncated fragment worth including
    #[serde(default = "default_min_fragment_chars")]
    pub min_fragment_chars: usize,

    /// Number of prior conversation messages forwarded to the model
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Applies to every health check, search and generation call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            remote_url: default_remote_url(),
            hosted_url: None,
            hosted_vector_weight: default_hosted_vector_weight(),
            hosted_bm25_weight: default_hosted_bm25_weight(),
            retrieval_top_k: default_retrieval_top_k(),
            context_max_tokens: default_context_max_tokens(),
            context_max_results: default_context_max_results(),
            min_fragment_chars: default_min_fragment_chars(),
            history_turns: default_history_turns(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backends() -> Vec<BackendKind> {
    vec![BackendKind::Local]
}

fn default_remote_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_hosted_vector_weight() -> f32 {
    0.6
}

fn default_hosted_bm25_weight() -> f32 {
    0.4
}

fn default_retrieval_top_k() -> usize {
    8
}

fn default_context_max_tokens() -> usize {
    2000
}

fn default_context_max_results() -> usize {
    8
}

fn default_min_fragment_chars() -> usize {
    100
}

fn default_history_turns() -> usize {
    6
}

fn default_timeout_secs() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write logs to rolling files
    #[serde(default)]
    pub enabled: bool,

    /// Write logs to stderr
    #[serde(default = "default_true")]
    pub stderr: bool,

    /// Level for the file layer
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// daily, hourly, minutely or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            stderr: default_true(),
            level: default_log_level(),
            directory: default_log_dir(),
            file_prefix: default_file_prefix(),
            rotation: default_rotation(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_file_prefix() -> String {
    "ragtim.log".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Config {
    /// Load configuration from an explicit file, or `ragtim.toml` in `root`.
    ///
    /// A missing file yields the defaults. Environment overrides are applied last.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let config_path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.join(CONFIG_FILE));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;

            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", config_path))?
        } else if explicit.is_some() {
            anyhow::bail!("Config file {:?} does not exist", config_path);
        } else {
            Config::default()
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());

        if config.knowledge.content_dir.is_relative() {
            config.knowledge.content_dir = root.join(&config.knowledge.content_dir);
        }

        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("RAGTIM_BACKEND_URL") {
            self.rag.remote_url = url;
        }
        if let Some(url) = lookup("RAGTIM_HOSTED_URL") {
            self.rag.hosted_url = Some(url);
        }
        if let Some(key) = lookup("RAGTIM_LLM_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(url) = lookup("RAGTIM_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("RAGTIM_LLM_MODEL") {
            self.llm.model = model;
        }

        override_parsed(&lookup, "RAGTIM_SEARCH_CACHE_TTL_SECS", &mut self.cache.search_ttl_secs);
        override_parsed(&lookup, "RAGTIM_EMBEDDING_CACHE_TTL_SECS", &mut self.cache.embedding_ttl_secs);
        override_parsed(&lookup, "RAGTIM_BM25_K1", &mut self.search.k1);
        override_parsed(&lookup, "RAGTIM_BM25_B", &mut self.search.b);
        override_parsed(&lookup, "PORT", &mut self.server.port);
    }
}

fn override_parsed<F, T>(lookup: &F, name: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(name) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring unparseable value '{}' for {}", raw, name),
        }
    }
}
