//! 비전(이미지 처리) 포트.
//!
//! 구현: `sightline-vision` crate (image, fast_image_resize, webp)

use crate::error::CoreError;
use crate::models::bitmap::Bitmap;
use crate::models::image::{CompressionOverrides, DocumentType, ProcessedImage};

/// 이미지 처리 요청: 대상 모델과 문서 유형으로 프로파일/프리셋이 결정된다
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    /// 모델 ID (프로파일 조회 키, 없으면 default)
    pub model: String,
    pub document_type: DocumentType,
    pub overrides: CompressionOverrides,
}

/// 이미지 처리기: 비트맵 → 바이트 한도 내 인코딩 이미지
///
/// CPU 바운드 동기 작업. 비동기 호출자는 `spawn_blocking`으로 실행한다.
pub trait ImageProcessor: Send + Sync {
    /// 모델 프로파일과 문서 프리셋에 맞춰 비트맵 압축
    fn process(&self, bitmap: &Bitmap, request: &ProcessRequest)
        -> Result<ProcessedImage, CoreError>;
}
