//! OpenAI 호환 채팅 완성 클라이언트.
//!
//! `ChatCompletionClient` 포트 구현.
//! - `POST /v1/chat/completions` (비스트리밍 / 스트리밍)
//! - `GET /v1/models` (실패 시 기본 모델 목록)
//!
//! 로컬 추론 서버를 주 대상으로 하므로 Bearer 토큰은 placeholder도 허용한다.

use async_trait::async_trait;
use serde::Deserialize;
use sightline_core::config::ServerConfig;
use sightline_core::error::CoreError;
use sightline_core::models::message::{ChatMessage, CompletionRequest};
use sightline_core::ports::llm_provider::{ChatCompletionClient, DeltaStream};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::sse;

/// Retry-After 헤더가 없을 때 기본 대기 (초)
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
/// 에러 메시지에 포함할 응답 본문 최대 길이
const ERROR_BODY_PREFIX_LEN: usize = 200;

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// OpenAI 호환 엔드포인트 클라이언트
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    /// 비스트리밍 요청 전체 타임아웃 (스트리밍은 연결 수립까지만)
    timeout: Duration,
    fallback_models: Vec<String>,
}

impl OpenAiChatClient {
    /// 서버 설정과 기본 모델 목록으로 생성
    pub fn new(server: &ServerConfig, fallback_models: Vec<String>) -> Result<Self, CoreError> {
        let timeout = server.timeout();
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        debug!(
            base_url = %server.base_url,
            timeout_secs = server.timeout_secs,
            "OpenAiChatClient 초기화"
        );

        Ok(Self {
            http_client,
            base_url: server.base_url.trim_end_matches('/').to_string(),
            api_key: server.api_key.clone(),
            temperature: server.temperature,
            max_tokens: server.max_tokens,
            timeout,
            fallback_models,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request_body(&self, messages: &[ChatMessage], model: &str, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            stream,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        let prefix: String = text.chars().take(ERROR_BODY_PREFIX_LEN).collect();

        warn!(status = %status, "모델 엔드포인트 오류 응답");

        match status.as_u16() {
            401 => Err(CoreError::Auth(format!("인증 실패: {prefix}"))),
            404 => Err(CoreError::NotFound {
                resource_type: "endpoint".to_string(),
                id: prefix,
            }),
            429 => Err(CoreError::RateLimit { retry_after_secs }),
            503 => Err(CoreError::ServiceUnavailable(prefix)),
            _ => Err(CoreError::Network(format!("API 에러 ({status}): {prefix}"))),
        }
    }

    async fn post_completion(
        &self,
        body: &CompletionRequest,
    ) -> Result<reqwest::Response, CoreError> {
        let mut builder = self
            .http_client
            .post(self.url("/v1/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(body);
        if !body.stream {
            builder = builder.timeout(self.timeout);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("채팅 완성 요청 실패: {e}")))?;
        Self::check_response(resp).await
    }

    /// `/v1/models` 조회 (폴백 없음)
    pub async fn fetch_models(&self) -> Result<Vec<String>, CoreError> {
        let resp = self
            .http_client
            .get(self.url("/v1/models"))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("모델 목록 요청 실패: {e}")))?;
        let resp = Self::check_response(resp).await?;

        let list: ModelList = resp
            .json()
            .await
            .map_err(|e| CoreError::Network(format!("모델 목록 파싱 실패: {e}")))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl ChatCompletionClient for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, CoreError> {
        let body = self.request_body(messages, model, false);
        debug!(model, messages = messages.len(), "채팅 완성 요청");

        let resp = self.post_completion(&body).await?;
        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Network(format!("채팅 완성 응답 파싱 실패: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CoreError::Network("응답에 choices[0].message.content 없음".to_string()))
    }

    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<DeltaStream, CoreError> {
        let body = self.request_body(messages, model, true);
        let image_parts: usize = messages.iter().map(ChatMessage::image_part_count).sum();
        info!(model, messages = messages.len(), image_parts, "스트리밍 요청 시작");

        let resp = self.post_completion(&body).await?;
        Ok(sse::decode_stream(Box::pin(resp.bytes_stream())))
    }

    async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => {
                warn!("모델 목록이 비어 있음, 기본 목록 사용");
                self.fallback_models.clone()
            }
            Err(e) => {
                warn!("모델 목록 조회 실패, 기본 목록 사용: {e}");
                self.fallback_models.clone()
            }
        }
    }
}
