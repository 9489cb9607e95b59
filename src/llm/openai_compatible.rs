use anyhow::{anyhow, Context, Result};
use async_openai::{
    config::OpenAIConfig as AsyncOpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{ChatMessage, GenerationOptions, LanguageModel, Role};
use crate::config::LlmConfig;
use crate::metrics::GENERATION_LATENCY;
use crate::retry::retry_with_backoff;

/// Chat completions against any OpenAI-compatible endpoint (DeepSeek by default).
pub struct OpenAiCompatibleModel {
    client: Client<AsyncOpenAIConfig>,
    model: String,
    timeout: Duration,
    max_retries: usize,
    initial_backoff_ms: u64,
}

impl OpenAiCompatibleModel {
    /// Build a client, or `None` when no usable API key is configured.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let api_key = config.load_api_key()?;

        let openai_config = AsyncOpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(config.base_url.trim_end_matches('/'));

        info!("Initialized chat model {} at {}", config.model, config.base_url);

        Some(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
        })
    }

    fn build_request(&self, messages: &[ChatMessage], options: GenerationOptions) -> Result<CreateChatCompletionRequest> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let max_tokens = u16::try_from(options.max_tokens).unwrap_or(u16::MAX);

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(max_tokens)
            .temperature(options.temperature)
            .top_p(options.top_p)
            .build()
            .context("Failed to build chat completion request")
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let built: ChatCompletionRequestMessage = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
    };
    Ok(built)
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    async fn complete(&self, messages: &[ChatMessage], options: GenerationOptions) -> Result<String> {
        let request = self.build_request(messages, options)?;
        let start = Instant::now();

        let response = retry_with_backoff("Chat completion request", self.max_retries, self.initial_backoff_ms, || async {
            tokio::time::timeout(self.timeout, self.client.chat().create(request.clone()))
                .await
                .map_err(|_| anyhow!("Chat completion timed out after {:?}", self.timeout))?
                .context("Chat completion request failed")
        })
        .await?;

        GENERATION_LATENCY.observe(start.elapsed().as_secs_f64());

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow!("Language model returned no content"))?;

        debug!(
            model = %self.model,
            chars = content.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion received"
        );

        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
