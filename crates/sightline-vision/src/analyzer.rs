//! 콘텐츠 분석.
//!
//! 고정 간격 샘플링으로 밝기/대비/에지 비율을 계산하고
//! 도면·세밀·어두운 배경 여부를 분류한다. 순수 함수.

use sightline_core::error::CoreError;
use sightline_core::models::bitmap::Bitmap;
use sightline_core::models::image::ContentAnalysis;

/// 샘플 간격 (픽셀): 10픽셀마다 1개
const SAMPLE_STRIDE_PX: usize = 10;
/// 에지 판정 대비 임계값
const EDGE_CONTRAST_THRESHOLD: f32 = 50.0;
/// 도면 판정: 에지 비율 하한
const ARCHITECTURAL_EDGE_RATIO: f32 = 0.15;
/// 도면 판정: 평균 대비 하한
const ARCHITECTURAL_CONTRAST: f32 = 30.0;
/// 세밀 판정: 에지 비율 하한
const DETAILED_EDGE_RATIO: f32 = 0.1;
/// 어두운 배경 판정: 평균 밝기 상한
const DARK_BRIGHTNESS: f32 = 85.0;

#[inline]
fn brightness(px: &[u8]) -> f32 {
    (px[0] as f32 + px[1] as f32 + px[2] as f32) / 3.0
}

/// 비트맵 콘텐츠 분석
pub fn analyze(bitmap: &Bitmap) -> Result<ContentAnalysis, CoreError> {
    analyze_pixels(bitmap.pixels())
}

/// RGBA 버퍼 직접 분석
pub fn analyze_pixels(pixels: &[u8]) -> Result<ContentAnalysis, CoreError> {
    if pixels.len() < 4 {
        return Err(CoreError::Validation {
            field: "bitmap".to_string(),
            message: "빈 비트맵은 분석할 수 없음".to_string(),
        });
    }

    let samples: Vec<f32> = pixels
        .chunks_exact(4)
        .step_by(SAMPLE_STRIDE_PX)
        .map(brightness)
        .collect();
    let sample_count = samples.len() as f32;

    let total_brightness: f32 = samples.iter().sum();
    let (contrast_sum, edge_count) =
        samples
            .windows(2)
            .fold((0.0f32, 0usize), |(sum, edges), pair| {
                let contrast = (pair[0] - pair[1]).abs();
                let is_edge = contrast > EDGE_CONTRAST_THRESHOLD;
                (sum + contrast, edges + usize::from(is_edge))
            });

    let avg_brightness = total_brightness / sample_count;
    let avg_contrast = if samples.len() > 1 {
        contrast_sum / (sample_count - 1.0)
    } else {
        0.0
    };
    let edge_ratio = edge_count as f32 / sample_count;

    Ok(ContentAnalysis {
        edge_ratio,
        avg_contrast,
        avg_brightness,
        is_detailed: edge_ratio > DETAILED_EDGE_RATIO,
        is_architectural: edge_ratio > ARCHITECTURAL_EDGE_RATIO
            && avg_contrast > ARCHITECTURAL_CONTRAST,
        is_dark_background: avg_brightness < DARK_BRIGHTNESS,
    })
}
