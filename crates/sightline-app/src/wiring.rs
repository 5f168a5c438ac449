//! 어댑터 와이어링.
//!
//! `AppConfig`로부터 포트 구현체를 생성해 `Arc<dyn Port>`로 조립한다.

use anyhow::Result;
use sightline_core::config::AppConfig;
use sightline_core::ports::image_context::ImageContextCache;
use sightline_core::ports::llm_provider::ChatCompletionClient;
use sightline_core::ports::vision::ImageProcessor;
use sightline_network::chat_client::OpenAiChatClient;
use sightline_network::conversation::ConversationSession;
use sightline_network::formatter::MessageFormatter;
use sightline_vision::compressor::AdaptiveCompressor;
use sightline_vision::context_cache::ImageContentCache;
use std::sync::Arc;
use tracing::debug;

/// 조립된 어댑터 묶음
pub struct Components {
    pub client: Arc<dyn ChatCompletionClient>,
    pub processor: Arc<dyn ImageProcessor>,
    pub cache: Arc<dyn ImageContextCache>,
}

impl Components {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client: Arc<dyn ChatCompletionClient> = Arc::new(OpenAiChatClient::new(
            &config.server,
            config.chat.fallback_models.clone(),
        )?);
        let processor: Arc<dyn ImageProcessor> =
            Arc::new(AdaptiveCompressor::new(config.compression.clone()));
        let cache: Arc<dyn ImageContextCache> = Arc::new(ImageContentCache::new());

        debug!(
            "어댑터 생성 완료: 프로파일 {}개",
            config.compression.profiles.len()
        );
        Ok(Self {
            client,
            processor,
            cache,
        })
    }

    /// 세션 생성 (ID 미지정 시 자동 생성)
    pub fn session(&self, config: &AppConfig, session_id: Option<String>) -> ConversationSession {
        let formatter = MessageFormatter::new(Arc::clone(&self.processor), Arc::clone(&self.cache));
        match session_id {
            Some(id) => ConversationSession::with_id(
                id,
                Arc::clone(&self.client),
                formatter,
                config.chat.clone(),
            ),
            None => ConversationSession::new(Arc::clone(&self.client), formatter, config.chat.clone()),
        }
    }
}
