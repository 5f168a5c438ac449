//! 적응형 압축기.
//!
//! `ImageProcessor` 포트 구현. 분석 → 전처리 → 리사이즈 → 품질 하향 인코딩 →
//! PNG 폴백 → 비상 축소 순서로 진행하며, 인코딩 횟수는
//! `max_attempts + 2`를 넘지 않는다.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use sightline_core::config::CompressionConfig;
use sightline_core::error::CoreError;
use sightline_core::models::bitmap::Bitmap;
use sightline_core::models::image::{
    CompressionOverrides, CompressionProfile, ContentAnalysis, DocumentType, ImageFormat,
    ProcessedImage,
};
use sightline_core::ports::vision::{ImageProcessor, ProcessRequest};
use tracing::{debug, info, warn};

use crate::encoder::{self, QUALITY_EPSILON};
use crate::{analyzer, enhance, resize};

/// 사전 점검 시 가정하는 품질 계수
const ESTIMATE_QUALITY: f64 = 0.9;
/// base64 오버헤드 포함 계수
const ESTIMATE_OVERHEAD: f64 = 1.37;

/// 인코딩 후보 하나
struct Candidate {
    payload: Vec<u8>,
    size: usize,
    format: ImageFormat,
    quality: f32,
}

/// 압축 필요 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionReason {
    Dimensions,
    Size,
    None,
}

/// `needs_compression` 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionCheck {
    pub needed: bool,
    pub reason: CompressionReason,
    /// `w × h × 3 × 0.9 × 1.37` 추정치 (바이트)
    pub estimated_size: usize,
    pub width: u32,
    pub height: u32,
}

/// 적응형 압축기
#[derive(Debug, Clone, Default)]
pub struct AdaptiveCompressor {
    config: CompressionConfig,
}

impl AdaptiveCompressor {
    pub fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// 인코딩 없이 압축 필요 여부만 빠르게 판단
    pub fn needs_compression(bitmap: &Bitmap, profile: &CompressionProfile) -> CompressionCheck {
        let (w, h) = (bitmap.width(), bitmap.height());
        let estimated_size =
            (w as f64 * h as f64 * 3.0 * ESTIMATE_QUALITY * ESTIMATE_OVERHEAD) as usize;
        let over_dimensions = w > profile.max_width || h > profile.max_height;
        let over_size = estimated_size > profile.max_bytes;

        let reason = if over_dimensions {
            CompressionReason::Dimensions
        } else if over_size {
            CompressionReason::Size
        } else {
            CompressionReason::None
        };

        CompressionCheck {
            needed: over_dimensions || over_size,
            reason,
            estimated_size,
            width: w,
            height: h,
        }
    }

    /// 비트맵을 프로파일 한도 안으로 압축
    pub fn compress(
        &self,
        bitmap: &Bitmap,
        profile: &CompressionProfile,
        document_type: DocumentType,
        overrides: &CompressionOverrides,
    ) -> Result<ProcessedImage, CoreError> {
        let processing = &self.config.processing;
        let fallback = &self.config.fallback;
        let preset = document_type.preset();

        let max_width = overrides.max_width.unwrap_or(profile.max_width);
        let max_height = overrides.max_height.unwrap_or(profile.max_height);
        let max_bytes = overrides.max_bytes.unwrap_or(profile.max_bytes);
        let start_quality = overrides
            .start_quality()
            .or(profile.min_quality)
            .unwrap_or(preset.min_quality);
        let format = overrides
            .format
            .or(profile.preferred_format)
            .unwrap_or(preset.preferred_format);

        let (original_width, original_height) = (bitmap.width(), bitmap.height());

        let analysis = if processing.enable_content_analysis {
            analyzer::analyze(bitmap)?
        } else {
            ContentAnalysis::neutral()
        };
        debug!(
            "콘텐츠 분석: edge={:.3} contrast={:.1} brightness={:.1} architectural={} detailed={}",
            analysis.edge_ratio,
            analysis.avg_contrast,
            analysis.avg_brightness,
            analysis.is_architectural,
            analysis.is_detailed
        );

        let mut working = RgbaImage::from_raw(
            original_width,
            original_height,
            bitmap.pixels().to_vec(),
        )
        .ok_or_else(|| CoreError::ImageDecoding("비트맵 버퍼 변환 실패".to_string()))?;

        if preset.enhance_contrast
            && (document_type == DocumentType::Architectural || analysis.is_architectural)
        {
            enhance::enhance_contrast(&mut working, processing.contrast_factor);
        }
        if preset.sharpen_text && analysis.is_detailed {
            enhance::sharpen(&mut working);
        }

        let (target_w, target_h) =
            resize::fit_within(original_width, original_height, max_width, max_height);
        if (target_w, target_h) != (original_width, original_height) || overrides.force_resize {
            working = resize::resample(&working, target_w, target_h, preset.preserve_lines)?;
        }

        // 무손실 선호 포맷은 1회만 시도하고 이후 후보는 JPEG로 진행
        let candidates = encoder::quality_schedule(
            start_quality,
            processing.quality_step,
            processing.quality_floor,
            processing.max_attempts,
        )
        .enumerate()
        .map(|(i, q)| {
            if format.is_lossless() && i > 0 {
                (ImageFormat::Jpeg, q)
            } else {
                (format, q)
            }
        });

        let mut passes = 0u32;
        let mut best: Option<Candidate> = None;

        for (fmt, quality) in candidates {
            passes += 1;
            let payload = match encoder::encode(&working, fmt, quality) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("인코딩 시도 {passes} 실패, 후보 중단: {e}");
                    break;
                }
            };
            let size = encoder::estimated_size(&payload);
            debug!(
                "압축 시도 {}: {} q={:.2} → {:.1}KB",
                passes,
                fmt,
                quality,
                size as f64 / 1024.0
            );

            if best.as_ref().map_or(true, |b| size <= b.size) {
                best = Some(Candidate {
                    payload,
                    size,
                    format: fmt,
                    quality,
                });
            }
            if size <= max_bytes || quality <= processing.quality_floor + QUALITY_EPSILON {
                break;
            }
        }

        let over_budget = best.as_ref().map_or(true, |b| b.size > max_bytes);
        if over_budget && fallback.use_png_fallback && !format.is_lossless() {
            passes += 1;
            match encoder::encode(&working, ImageFormat::Png, 1.0) {
                Ok(payload) => {
                    let size = encoder::estimated_size(&payload);
                    let keep = best
                        .as_ref()
                        .map_or(true, |b| size <= max_bytes || size < b.size);
                    debug!("PNG 폴백: {:.1}KB (채택: {})", size as f64 / 1024.0, keep);
                    if keep {
                        best = Some(Candidate {
                            payload,
                            size,
                            format: ImageFormat::Png,
                            quality: 1.0,
                        });
                    }
                }
                Err(e) => warn!("PNG 폴백 실패: {e}"),
            }
        }

        let mut chosen = best.ok_or_else(|| {
            CoreError::ImageEncoding(format!("인코딩 후보 없음 ({passes}회 시도)"))
        })?;
        let (mut width, mut height) = working.dimensions();
        let mut emergency_applied = false;

        if fallback.use_emergency_compression && chosen.size > fallback.emergency_max_bytes {
            let (ew, eh) = resize::fit_within(
                width,
                height,
                fallback.emergency_max_dimension.min(max_width),
                fallback.emergency_max_dimension.min(max_height),
            );
            if ew < width || eh < height {
                warn!(
                    "비상 축소: {:.1}KB > {:.1}KB, {}x{} → {}x{}",
                    chosen.size as f64 / 1024.0,
                    fallback.emergency_max_bytes as f64 / 1024.0,
                    width,
                    height,
                    ew,
                    eh
                );
                passes += 1;
                let shrunk = resize::resample(&working, ew, eh, preset.preserve_lines)?;
                match encoder::encode(&shrunk, ImageFormat::Jpeg, fallback.emergency_quality) {
                    Ok(payload) => {
                        chosen = Candidate {
                            size: encoder::estimated_size(&payload),
                            payload,
                            format: ImageFormat::Jpeg,
                            quality: fallback.emergency_quality,
                        };
                        width = ew;
                        height = eh;
                        emergency_applied = true;
                    }
                    Err(e) => warn!("비상 인코딩 실패, 기존 결과 유지: {e}"),
                }
            }
        }

        if chosen.size > max_bytes {
            warn!(
                "예산 초과 상태로 반환: {:.1}KB > {:.1}KB",
                chosen.size as f64 / 1024.0,
                max_bytes as f64 / 1024.0
            );
        }

        info!(
            "이미지 압축 완료: {}x{} → {}x{}, {} {:.1}KB (q={:.2}, {}회)",
            original_width,
            original_height,
            width,
            height,
            chosen.format,
            chosen.size as f64 / 1024.0,
            chosen.quality,
            passes
        );

        Ok(ProcessedImage {
            payload: chosen.payload,
            width,
            height,
            original_width,
            original_height,
            size_bytes: chosen.size,
            format: chosen.format,
            quality: chosen.quality,
            analysis,
            encode_passes: passes,
            emergency_applied,
        })
    }
}

impl ImageProcessor for AdaptiveCompressor {
    fn process(
        &self,
        bitmap: &Bitmap,
        request: &ProcessRequest,
    ) -> Result<ProcessedImage, CoreError> {
        let profile = self.config.profile_for(&request.model);
        self.compress(bitmap, &profile, request.document_type, &request.overrides)
    }
}
