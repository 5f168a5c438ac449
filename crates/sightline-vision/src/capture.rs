//! 캡처 표면 어댑터.
//!
//! `CaptureSurface` 포트 구현과 표면 레지스트리.
//! 캔버스(메모리 비트맵), 래스터 파일, 페이지 단위 문서를 지원한다.

use parking_lot::RwLock;
use sightline_core::error::CoreError;
use sightline_core::models::bitmap::Bitmap;
use sightline_core::ports::capture::CaptureSurface;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 문서 캡처 기본 최대 페이지 수
pub const DEFAULT_MAX_PAGES: usize = 20;

fn capture_error(surface_id: &str, message: impl Into<String>) -> CoreError {
    CoreError::Capture {
        surface_id: surface_id.to_string(),
        message: message.into(),
    }
}

/// 래스터 파일 하나를 비트맵으로 디코딩
fn decode_file(path: &Path, surface_id: &str) -> Result<Bitmap, CoreError> {
    let image = image::open(path)
        .map_err(|e| capture_error(surface_id, format!("{} 디코딩 실패: {e}", path.display())))?;
    Bitmap::from_image(&image, surface_id)
}

// ============================================================
// 캔버스
// ============================================================

/// 그리기 표면이 갱신하는 공유 메모리 비트맵
#[derive(Clone)]
pub struct CanvasSurface {
    id: String,
    content: Arc<RwLock<Option<Bitmap>>>,
}

impl CanvasSurface {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: Arc::new(RwLock::new(None)),
        }
    }

    /// 캔버스 내용 교체 (그리기 측에서 호출)
    pub fn present(&self, bitmap: Bitmap) {
        debug!(
            "캔버스 갱신: {} {}x{}",
            self.id,
            bitmap.width(),
            bitmap.height()
        );
        *self.content.write() = Some(bitmap);
    }

    pub fn clear(&self) {
        *self.content.write() = None;
    }
}

impl CaptureSurface for CanvasSurface {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&self) -> Result<Vec<Bitmap>, CoreError> {
        let guard = self.content.read();
        let bitmap = guard
            .as_ref()
            .ok_or_else(|| capture_error(&self.id, "캔버스가 비어 있음"))?;
        let captured = Bitmap::new(
            bitmap.width(),
            bitmap.height(),
            bitmap.pixels().to_vec(),
            self.id.as_str(),
        )?;
        Ok(vec![captured])
    }

    fn is_available(&self) -> bool {
        self.content.read().is_some()
    }
}

// ============================================================
// 래스터 파일
// ============================================================

/// 디스크의 래스터 이미지 파일 (PNG/JPEG/WebP 등)
pub struct RasterFileSurface {
    id: String,
    path: PathBuf,
}

impl RasterFileSurface {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureSurface for RasterFileSurface {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&self) -> Result<Vec<Bitmap>, CoreError> {
        let bitmap = decode_file(&self.path, &self.id)?;
        debug!(
            "파일 캡처: {} {}x{}",
            self.path.display(),
            bitmap.width(),
            bitmap.height()
        );
        Ok(vec![bitmap])
    }

    fn is_available(&self) -> bool {
        self.path.is_file()
    }
}

// ============================================================
// 문서 (페이지 단위)
// ============================================================

/// 페이지별로 렌더된 이미지 파일 묶음.
///
/// 페이지마다 비트맵 하나를 만들고, 실패한 페이지는 건너뛴다.
/// 모든 페이지가 실패할 때만 에러.
pub struct DocumentSurface {
    id: String,
    file_name: String,
    pages: Vec<PathBuf>,
    max_pages: usize,
}

impl DocumentSurface {
    pub fn new(id: impl Into<String>, file_name: impl Into<String>, pages: Vec<PathBuf>) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            pages,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// 원본 문서 파일명 (메시지 접두 문구에 사용)
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl CaptureSurface for DocumentSurface {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&self) -> Result<Vec<Bitmap>, CoreError> {
        if self.pages.len() > self.max_pages {
            warn!(
                "문서 {}: {}페이지 중 앞 {}페이지만 캡처",
                self.file_name,
                self.pages.len(),
                self.max_pages
            );
        }

        let bitmaps: Vec<Bitmap> = self
            .pages
            .iter()
            .take(self.max_pages)
            .enumerate()
            .filter_map(|(i, path)| {
                let page_id = format!("{}#page-{}", self.id, i + 1);
                match decode_file(path, &page_id) {
                    Ok(bitmap) => Some(bitmap),
                    Err(e) => {
                        warn!("문서 {} {}페이지 캡처 실패 (건너뜀): {e}", self.file_name, i + 1);
                        None
                    }
                }
            })
            .collect();

        if bitmaps.is_empty() {
            return Err(capture_error(
                &self.id,
                format!("{}: 렌더된 페이지 없음", self.file_name),
            ));
        }

        info!(
            "문서 캡처 완료: {} ({}페이지)",
            self.file_name,
            bitmaps.len()
        );
        Ok(bitmaps)
    }

    fn is_available(&self) -> bool {
        !self.pages.is_empty()
    }
}

// ============================================================
// 레지스트리
// ============================================================

/// 표면 ID → 캡처 표면
#[derive(Default)]
pub struct SurfaceRegistry {
    surfaces: RwLock<BTreeMap<String, Arc<dyn CaptureSurface>>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 등록. 같은 ID가 있으면 교체하고 이전 표면을 반환.
    pub fn register(&self, surface: Arc<dyn CaptureSurface>) -> Option<Arc<dyn CaptureSurface>> {
        let id = surface.id().to_string();
        debug!("캡처 표면 등록: {id}");
        self.surfaces.write().insert(id, surface)
    }

    pub fn unregister(&self, id: &str) -> Option<Arc<dyn CaptureSurface>> {
        self.surfaces.write().remove(id)
    }

    /// 단일 표면 캡처
    pub fn capture(&self, id: &str) -> Result<Vec<Bitmap>, CoreError> {
        let surface = self
            .surfaces
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                resource_type: "capture_surface".to_string(),
                id: id.to_string(),
            })?;
        surface.capture()
    }

    /// 전체 표면 캡처. 실패한 표면은 로그만 남기고 계속 진행.
    pub fn capture_all(&self) -> Vec<Bitmap> {
        let surfaces: Vec<Arc<dyn CaptureSurface>> =
            self.surfaces.read().values().cloned().collect();

        surfaces
            .iter()
            .filter(|s| s.is_available())
            .flat_map(|surface| match surface.capture() {
                Ok(bitmaps) => bitmaps,
                Err(e) => {
                    warn!("표면 {} 캡처 실패 (건너뜀): {e}", surface.id());
                    Vec::new()
                }
            })
            .collect()
    }

    /// 캡처 가능한 표면 ID 목록
    pub fn available(&self) -> Vec<String> {
        self.surfaces
            .read()
            .values()
            .filter(|s| s.is_available())
            .map(|s| s.id().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.path().join(name);
        RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn canvas_requires_content() {
        let canvas = CanvasSurface::new("canvas");
        assert!(!canvas.is_available());
        assert!(matches!(canvas.capture(), Err(CoreError::Capture { .. })));

        canvas.present(Bitmap::filled(30, 20, [1, 2, 3, 255], "draw").unwrap());
        assert!(canvas.is_available());
        let bitmaps = canvas.capture().unwrap();
        assert_eq!(bitmaps.len(), 1);
        assert_eq!(bitmaps[0].surface_id(), "canvas");
        assert_eq!((bitmaps[0].width(), bitmaps[0].height()), (30, 20));

        canvas.clear();
        assert!(!canvas.is_available());
    }

    #[test]
    fn canvas_clones_share_content() {
        let canvas = CanvasSurface::new("canvas");
        let drawer = canvas.clone();
        drawer.present(Bitmap::filled(4, 4, [0, 0, 0, 255], "x").unwrap());
        assert!(canvas.is_available());
    }

    #[test]
    fn raster_file_decodes() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "plan.png", 40, 25);
        let surface = RasterFileSurface::new("plan", &path);
        assert!(surface.is_available());
        let bitmaps = surface.capture().unwrap();
        assert_eq!((bitmaps[0].width(), bitmaps[0].height()), (40, 25));
        assert_eq!(&bitmaps[0].pixels()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn missing_raster_file_is_capture_error() {
        let surface = RasterFileSurface::new("gone", "/nonexistent/plan.png");
        assert!(!surface.is_available());
        assert!(matches!(surface.capture(), Err(CoreError::Capture { .. })));
    }

    #[test]
    fn document_skips_broken_pages() {
        let dir = TempDir::new().unwrap();
        let p1 = write_png(&dir, "p1.png", 10, 10);
        let broken = dir.path().join("p2.png");
        std::fs::write(&broken, b"not an image").unwrap();
        let p3 = write_png(&dir, "p3.png", 12, 10);

        let doc = DocumentSurface::new("doc", "plans.pdf", vec![p1, broken, p3]);
        let pages = doc.capture().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].surface_id(), "doc#page-1");
        assert_eq!(pages[1].surface_id(), "doc#page-3");
        assert_eq!(doc.file_name(), "plans.pdf");
    }

    #[test]
    fn document_respects_max_pages() {
        let dir = TempDir::new().unwrap();
        let pages: Vec<PathBuf> = (0..5)
            .map(|i| write_png(&dir, &format!("p{i}.png"), 8, 8))
            .collect();
        let doc = DocumentSurface::new("doc", "big.pdf", pages).with_max_pages(3);
        assert_eq!(doc.page_count(), 5);
        assert_eq!(doc.capture().unwrap().len(), 3);
    }

    #[test]
    fn document_with_no_renderable_pages_fails() {
        let doc = DocumentSurface::new("doc", "empty.pdf", vec![PathBuf::from("/nope.png")]);
        assert!(matches!(doc.capture(), Err(CoreError::Capture { .. })));
    }

    #[test]
    fn registry_capture_all_continues_past_failures() {
        let dir = TempDir::new().unwrap();
        let registry = SurfaceRegistry::new();

        let canvas = CanvasSurface::new("canvas");
        canvas.present(Bitmap::filled(5, 5, [9, 9, 9, 255], "c").unwrap());
        registry.register(Arc::new(canvas));
        registry.register(Arc::new(RasterFileSurface::new(
            "file",
            write_png(&dir, "a.png", 6, 6),
        )));
        // 파일은 있지만 디코딩 실패
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"garbage").unwrap();
        registry.register(Arc::new(RasterFileSurface::new("bad", bad)));
        registry.register(Arc::new(CanvasSurface::new("blank")));

        let bitmaps = registry.capture_all();
        assert_eq!(bitmaps.len(), 2);

        let mut available = registry.available();
        available.sort();
        assert_eq!(available, vec!["bad", "canvas", "file"]);
    }

    #[test]
    fn registry_unknown_surface() {
        let registry = SurfaceRegistry::new();
        assert!(matches!(
            registry.capture("missing"),
            Err(CoreError::NotFound { .. })
        ));
        registry.register(Arc::new(CanvasSurface::new("c")));
        assert!(registry.unregister("c").is_some());
        assert!(registry.unregister("c").is_none());
    }
}
