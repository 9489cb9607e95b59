mod config;
mod fastembed_provider;
mod hashing;
mod openai_provider;
mod provider;
mod service;

pub use config::{EmbeddingsConfig, OpenAIConfig, ProviderType};
pub use fastembed_provider::FastEmbedProvider;
pub use hashing::HashingEmbedder;
pub use openai_provider::OpenAIProvider;
pub use provider::{EmbeddingProvider, HealthStatus};
pub use service::EmbeddingService;

use anyhow::Result;
use std::sync::Arc;

/// Create the provider selected by `[embeddings].provider`
pub fn create_provider(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderType::FastEmbed => Arc::new(FastEmbedProvider::new(config)?),
        ProviderType::OpenAI => Arc::new(OpenAIProvider::new(&config.openai)?),
        ProviderType::Hashing => Arc::new(HashingEmbedder::new(config.dimension)),
    };
    Ok(provider)
}
