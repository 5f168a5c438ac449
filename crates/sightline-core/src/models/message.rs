//! 대화 메시지 모델.
//!
//! 대화 이력(`Message`)과 모델 엔드포인트로 나가는 와이어 포맷
//! (`ChatMessage`, `ContentPart`)을 정의.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::bitmap::Bitmap;

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 메시지에 첨부된 원본 이미지
#[derive(Debug, Clone)]
pub enum ImageAttachment {
    /// 단일 캡처 (캔버스 보이는 영역, 래스터 파일)
    Bitmap(Arc<Bitmap>),
    /// 파일 전체 캡처 (파일명이 안내 문구로 함께 전송됨)
    WholeFile {
        file_name: String,
        bitmap: Arc<Bitmap>,
    },
    /// 문서 전체 캡처: 페이지마다 하나의 비트맵
    Document {
        file_name: String,
        pages: Vec<Arc<Bitmap>>,
    },
}

impl ImageAttachment {
    /// 첨부가 담고 있는 비트맵 수
    pub fn bitmap_count(&self) -> usize {
        match self {
            ImageAttachment::Bitmap(_) | ImageAttachment::WholeFile { .. } => 1,
            ImageAttachment::Document { pages, .. } => pages.len(),
        }
    }
}

/// 대화 이력의 한 메시지
///
/// 이력은 추가/스트리밍 갱신만 허용되며 순서가 바뀌지 않는다.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub images: Vec<ImageAttachment>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    /// 스트리밍 중인 어시스턴트 메시지 여부
    pub is_streaming: bool,
}

impl Message {
    /// 새 메시지 생성 (고유 ID 부여)
    pub fn new(role: Role, content: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            images: Vec::new(),
            timestamp: Utc::now(),
            session_id: session_id.into(),
            is_streaming: false,
        }
    }

    /// 이미지 첨부
    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    /// 비트맵을 하나 이상 담은 첨부가 있는지 (빈 문서는 제외)
    pub fn has_images(&self) -> bool {
        self.images.iter().any(|a| a.bitmap_count() > 0)
    }
}

/// 엔드포인트로 전송하는 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    /// 이미지 파트 수
    pub fn image_part_count(&self) -> usize {
        match &self.content {
            MessageContent::Text(_) => 0,
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| matches!(p, ContentPart::ImageUrl { .. }))
                .count(),
        }
    }
}

/// 텍스트 또는 파트 배열
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// 콘텐츠 파트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// `{ "url": "data:image/<fmt>;base64,..." }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// 채팅 완성 요청
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// 스트리밍 증분
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// 증분 텍스트
    pub content: String,
    /// `finish_reason`이 null이 아니면 true
    pub finished: bool,
}
