//! 비트맵 모델.
//!
//! 캡처 표면이 넘겨주는 원본 RGBA 픽셀 버퍼.

use image::{DynamicImage, RgbaImage};

use crate::error::CoreError;

/// RGBA8 원본 비트맵 (행 우선 배치)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    surface_id: String,
}

impl Bitmap {
    /// 픽셀 버퍼로부터 비트맵 생성
    ///
    /// 크기가 0이거나 버퍼 길이가 `width * height * 4`와 다르면 거부한다.
    pub fn new(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        surface_id: impl Into<String>,
    ) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::Validation {
                field: "bitmap".to_string(),
                message: format!("빈 비트맵 ({width}x{height})"),
            });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(CoreError::Validation {
                field: "bitmap.pixels".to_string(),
                message: format!("버퍼 길이 {} != 기대값 {expected}", pixels.len()),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            surface_id: surface_id.into(),
        })
    }

    /// 단색 비트맵 (테스트, 플레이스홀더용)
    pub fn filled(
        width: u32,
        height: u32,
        rgba: [u8; 4],
        surface_id: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, pixels, surface_id)
    }

    /// `DynamicImage`에서 변환
    pub fn from_image(image: &DynamicImage, surface_id: impl Into<String>) -> Result<Self, CoreError> {
        let rgba = image.to_rgba8();
        let (w, h) = rgba.dimensions();
        Self::new(w, h, rgba.into_raw(), surface_id)
    }

    /// `DynamicImage`로 변환 (픽셀 복사)
    pub fn to_image(&self) -> Result<DynamicImage, CoreError> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| CoreError::Internal("비트맵 → 이미지 변환 실패".to_string()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// 캡처된 표면 ID
    pub fn surface_id(&self) -> &str {
        &self.surface_id
    }
}
