//! 포맷별 인코더.
//!
//! JPEG/PNG/WebP 단일 인코딩과 전송 크기 추정, 품질 하향 스케줄.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use sightline_core::error::CoreError;
use sightline_core::models::image::ImageFormat;
use tracing::debug;

/// 품질 비교 허용 오차 (부동소수 누적 오차 흡수)
pub const QUALITY_EPSILON: f32 = 1e-4;

/// 0.0~1.0 품질 → 1~100 정수 품질
fn quality_percent(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// 단일 인코딩. 무손실 포맷은 `quality`를 무시한다.
pub fn encode(image: &RgbaImage, format: ImageFormat, quality: f32) -> Result<Vec<u8>, CoreError> {
    let (w, h) = image.dimensions();
    let mut buf = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            // JPEG는 알파 채널 미지원
            let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality_percent(quality))
                .encode_image(&rgb)
                .map_err(|e| CoreError::ImageEncoding(format!("JPEG 인코딩 실패: {e}")))?;
        }
        ImageFormat::Png => {
            PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
                .write_image(image.as_raw(), w, h, ExtendedColorType::Rgba8)
                .map_err(|e| CoreError::ImageEncoding(format!("PNG 인코딩 실패: {e}")))?;
        }
        ImageFormat::Webp => {
            let encoder = webp::Encoder::from_rgba(image.as_raw(), w, h);
            buf = encoder.encode(quality_percent(quality) as f32).to_vec();
        }
    }

    if buf.is_empty() {
        return Err(CoreError::ImageEncoding(format!(
            "{format} 인코딩 결과가 비어 있음"
        )));
    }

    debug!(
        "{} 인코딩: {}x{} → {} bytes (품질 {:.2})",
        format,
        w,
        h,
        buf.len(),
        quality
    );

    Ok(buf)
}

/// base64 인코딩 길이
pub fn base64_len(payload_len: usize) -> usize {
    payload_len.div_ceil(3) * 4
}

/// 전송 크기 추정: `base64 길이 × 0.75`
pub fn estimated_size(payload: &[u8]) -> usize {
    (base64_len(payload.len()) as f64 * 0.75) as usize
}

/// 품질 하향 스케줄: `start, start - step, ...`
///
/// `start`는 `[floor, 1.0]`로 보정되고 floor 아래로 내려가지 않는다.
/// floor에 도달하면 끝나며 최대 `max_attempts`개.
pub fn quality_schedule(
    start: f32,
    step: f32,
    floor: f32,
    max_attempts: u32,
) -> impl Iterator<Item = f32> {
    let floor = floor.clamp(0.0, 1.0);
    let start = start.clamp(floor, 1.0);
    let step = step.max(0.0);
    std::iter::successors(Some(start), move |q| {
        let next = (q - step).max(floor);
        (next < *q - QUALITY_EPSILON).then_some(next)
    })
    .take(max_attempts as usize)
}
