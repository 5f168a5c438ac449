//! 캡처 표면 포트.
//!
//! 캔버스, 래스터 파일, 문서 페이지 등 비트맵을 만들어내는 외부 소스.

use crate::error::CoreError;
use crate::models::bitmap::Bitmap;

/// 캡처 표면: 동기 호출로 비트맵을 넘겨준다
pub trait CaptureSurface: Send + Sync {
    /// 표면 ID
    fn id(&self) -> &str;

    /// 현재 내용을 캡처.
    ///
    /// 단일 표면은 비트맵 하나, 문서 전체 캡처는 페이지별 비트맵을 반환한다.
    fn capture(&self) -> Result<Vec<Bitmap>, CoreError>;

    /// 캡처 가능한 상태인지 (내용이 비어 있으면 false)
    fn is_available(&self) -> bool {
        true
    }
}
