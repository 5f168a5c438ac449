//! # sightline-network
//!
//! OpenAI 호환 모델 서버 어댑터와 대화 전송 계층.
//!
//! - [`chat_client`]: `/v1/chat/completions`, `/v1/models` HTTP 클라이언트 (reqwest)
//! - [`sse`]: 스트리밍 응답 라인 디코더
//! - [`formatter`]: 대화 이력 → 요청 메시지 변환 (이미지 압축, 중복 참조)
//! - [`conversation`]: 세션 이력과 전송 상태 머신
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use sightline_network::chat_client::OpenAiChatClient;
//! use sightline_network::conversation::{ConversationSession, SendOptions};
//! use sightline_network::formatter::MessageFormatter;
//!
//! let client = Arc::new(OpenAiChatClient::new(&config.server, config.chat.fallback_models.clone())?);
//! let formatter = MessageFormatter::new(processor, cache);
//! let session = ConversationSession::new(client, formatter, config.chat.clone());
//! session.send("이 도면의 축척은?", images, SendOptions::default()).await?;
//! ```

pub mod chat_client;
pub mod conversation;
pub mod formatter;
pub mod sse;

#[cfg(test)]
pub(crate) mod test_support;
