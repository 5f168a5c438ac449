//! 대화 이력 → 요청 메시지 포맷터.
//!
//! 이미지가 포함된 마지막 메시지 하나만 이미지 파트를 싣고, 나머지 메시지는
//! 텍스트만 보낸다 (대화 길이와 무관하게 요청 크기를 제한).
//! 이미지 압축은 블로킹 풀에서 실행된다.

use sightline_core::error::CoreError;
use sightline_core::models::bitmap::Bitmap;
use sightline_core::models::context::{ImageReference, ResolvedImage};
use sightline_core::models::image::{CompressionOverrides, DocumentType, ProcessedImage};
use sightline_core::models::message::{
    ChatMessage, ContentPart, ImageAttachment, ImageUrl, Message, MessageContent,
};
use sightline_core::ports::image_context::ImageContextCache;
use sightline_core::ports::vision::{ImageProcessor, ProcessRequest};
use std::sync::Arc;
use tracing::{debug, info};

/// 이미지만 있고 텍스트가 비었을 때 사용하는 기본 질문
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image.";

/// 포맷 옵션: 압축 프로파일 선택에 쓰는 대상 모델과 문서 유형
#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    pub model: String,
    pub document_type: DocumentType,
    pub overrides: CompressionOverrides,
}

impl FormatOptions {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    fn process_request(&self) -> ProcessRequest {
        ProcessRequest {
            model: self.model.clone(),
            document_type: self.document_type,
            overrides: self.overrides.clone(),
        }
    }
}

/// 문서 첨부 안내 문구
fn document_prefix(file_name: &str, pages: usize) -> String {
    let unit = if pages == 1 { "page" } else { "pages" };
    format!("[PDF Document: {file_name} - {pages} {unit} captured]")
}

/// 파일 전체 캡처 안내 문구
fn whole_file_prefix(file_name: &str) -> String {
    format!("[Whole file capture: {file_name}]")
}

/// 메시지 포맷터
#[derive(Clone)]
pub struct MessageFormatter {
    processor: Arc<dyn ImageProcessor>,
    cache: Arc<dyn ImageContextCache>,
}

impl MessageFormatter {
    pub fn new(processor: Arc<dyn ImageProcessor>, cache: Arc<dyn ImageContextCache>) -> Self {
        Self { processor, cache }
    }

    pub fn cache(&self) -> &Arc<dyn ImageContextCache> {
        &self.cache
    }

    /// 이력 전체를 요청 메시지로 변환
    pub async fn format_messages(
        &self,
        history: &[Message],
        session_id: &str,
        options: &FormatOptions,
    ) -> Result<Vec<ChatMessage>, CoreError> {
        let image_turn = history.iter().rposition(Message::has_images);
        let mut formatted = Vec::with_capacity(history.len());

        for (index, message) in history.iter().enumerate() {
            if Some(index) == image_turn {
                formatted.push(self.format_image_message(message, session_id, options).await?);
                continue;
            }
            if message.has_images() {
                debug!(
                    "이전 이미지 메시지 {}: 이미지 {}개 제외, 텍스트만 전송",
                    message.id,
                    message.images.len()
                );
            }
            formatted.push(ChatMessage {
                role: message.role,
                content: MessageContent::Text(message.content.clone()),
            });
        }

        Ok(formatted)
    }

    /// 이미지 메시지: 이미지 파트들 + 마지막 텍스트 파트
    async fn format_image_message(
        &self,
        message: &Message,
        session_id: &str,
        options: &FormatOptions,
    ) -> Result<ChatMessage, CoreError> {
        let mut parts = Vec::new();
        let mut references: Vec<ImageReference> = Vec::new();
        let mut prefixes: Vec<String> = Vec::new();

        for attachment in &message.images {
            let bitmaps: Vec<Arc<Bitmap>> = match attachment {
                ImageAttachment::Bitmap(bitmap) => vec![Arc::clone(bitmap)],
                ImageAttachment::WholeFile { file_name, bitmap } => {
                    prefixes.push(whole_file_prefix(file_name));
                    vec![Arc::clone(bitmap)]
                }
                ImageAttachment::Document { file_name, pages } => {
                    info!("문서 첨부 처리: {file_name} ({}페이지)", pages.len());
                    prefixes.push(document_prefix(file_name, pages.len()));
                    pages.clone()
                }
            };

            for bitmap in bitmaps {
                let processed = self.process(bitmap, options.process_request()).await?;
                match self.cache.resolve(processed, session_id) {
                    ResolvedImage::Send(image) => {
                        debug!(
                            "이미지 전송: {}x{} {} {:.1}KB",
                            image.width,
                            image.height,
                            image.format,
                            image.size_kb()
                        );
                        parts.push(ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.data_url(),
                            },
                        });
                    }
                    ResolvedImage::Reference(reference) => references.push(reference),
                }
            }
        }

        let user_text = if message.content.trim().is_empty() {
            DEFAULT_IMAGE_PROMPT.to_string()
        } else {
            message.content.clone()
        };

        let mut sections = prefixes;
        if !references.is_empty() {
            sections.push(self.cache.reference_text(&references));
        }
        sections.push(user_text);

        parts.push(ContentPart::Text {
            text: sections.join("\n\n"),
        });

        info!(
            "이미지 메시지 포맷 완료: 전송 {}개, 참조 {}개",
            parts.len() - 1,
            references.len()
        );

        Ok(ChatMessage {
            role: message.role,
            content: MessageContent::Parts(parts),
        })
    }

    /// 블로킹 풀에서 압축
    async fn process(
        &self,
        bitmap: Arc<Bitmap>,
        request: ProcessRequest,
    ) -> Result<ProcessedImage, CoreError> {
        let processor = Arc::clone(&self.processor);
        tokio::task::spawn_blocking(move || processor.process(&bitmap, &request))
            .await
            .map_err(|e| CoreError::Internal(format!("압축 작업 실패: {e}")))?
    }
}
