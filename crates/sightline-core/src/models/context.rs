//! 이미지 컨텍스트(중복 제거) 모델.
//!
//! 콘텐츠 해시, 전역 캐시 엔트리, 세션별 참조 결과를 정의.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::image::{ImageMetadata, ProcessedImage};

/// 인코딩된 페이로드 샘플 기반 콘텐츠 지문 (64비트)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub u64);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// 전역 캐시 엔트리: 최초 등록 후 변경되지 않음
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: ContentHash,
    /// `img_ref_<n>_<unix_ms>`
    pub reference_id: String,
    pub first_seen_at: DateTime<Utc>,
    /// 예: `JPEG image (1024×768, 123.4KB)`
    pub description: String,
    pub metadata: ImageMetadata,
}

/// 이미 전송된 이미지에 대한 텍스트 참조
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReference {
    pub entry: CacheEntry,
    /// 경과 시간 버킷 ("just now" / "Nm ago" / "Nh ago")
    pub elapsed: String,
    pub referenced_at: DateTime<Utc>,
}

impl ImageReference {
    /// 모델에 전달하는 참조 문구
    pub fn text(&self) -> String {
        format!(
            "[Referring to {} sent {}]",
            self.entry.description, self.elapsed
        )
    }
}

/// `resolve` 결과: 바이트 전송 또는 텍스트 참조
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedImage {
    /// 세션 내 첫 사용: 바이트 전송
    Send(ProcessedImage),
    /// 세션 내 재사용: 참조 문구로 대체
    Reference(ImageReference),
}

/// 전역 캐시 통계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_images: usize,
    pub total_sessions: usize,
    pub total_references: usize,
    pub average_references_per_session: f64,
}

/// 세션별 캐시 항목 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionImageSummary {
    pub reference_id: String,
    pub description: String,
    pub first_seen_at: DateTime<Utc>,
}

/// 세션별 통계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub image_count: usize,
    pub images: Vec<SessionImageSummary>,
}
