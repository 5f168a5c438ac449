//! 채팅 완성 제공자 포트.
//!
//! OpenAI 호환 엔드포인트(`/v1/chat/completions`, `/v1/models`)에 대한
//! 인터페이스. 구현: `sightline-network::chat_client::OpenAiChatClient`

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::CoreError;
use crate::models::message::{ChatMessage, StreamDelta};

/// 증분 스트림: 소스 읽기마다 중단(suspend)되는 pull 스트림
pub type DeltaStream = BoxStream<'static, Result<StreamDelta, CoreError>>;

/// 채팅 완성 제공자
#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    /// 비스트리밍 완성: `choices[0].message.content`
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, CoreError>;

    /// 스트리밍 완성: 응답 헤더 수신 후 증분 스트림 반환
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<DeltaStream, CoreError>;

    /// 사용 가능한 모델 목록 (실패 시 구현체의 기본 목록)
    async fn list_models(&self) -> Vec<String>;
}
