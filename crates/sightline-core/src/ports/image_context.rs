//! 이미지 컨텍스트 캐시 포트.
//!
//! 구현: `sightline-vision::context_cache::ImageContentCache`

use crate::models::context::{CacheEntry, CacheStats, ImageReference, ResolvedImage, SessionStats};
use crate::models::image::ProcessedImage;

/// 콘텐츠 주소 기반 중복 제거 + 세션별 참조 추적
///
/// `resolve`는 원자적이어야 한다 (해시 확인 후 삽입 사이에 끼어들기 불가).
pub trait ImageContextCache: Send + Sync {
    /// 세션 내 첫 사용이면 `Send`, 재사용이면 `Reference`
    fn resolve(&self, image: ProcessedImage, session_id: &str) -> ResolvedImage;

    /// 해당 세션의 사용 기록만 제거 (캐시 엔트리는 유지)
    fn clear_session(&self, session_id: &str);

    /// 전역 캐시와 모든 세션 상태 제거
    fn clear_all(&self);

    /// 참조 목록을 모델용 문구로 변환
    fn reference_text(&self, references: &[ImageReference]) -> String {
        references
            .iter()
            .map(ImageReference::text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 참조 ID로 캐시 엔트리 조회
    fn entry_by_reference_id(&self, reference_id: &str) -> Option<CacheEntry>;

    fn stats(&self) -> CacheStats;

    fn session_stats(&self, session_id: &str) -> SessionStats;
}
