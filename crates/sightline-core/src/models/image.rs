//! 이미지 처리 모델.
//!
//! 압축 프로파일, 문서 유형 프리셋, 콘텐츠 분석 결과, 압축 완료 이미지 등
//! 적응형 압축 파이프라인에서 주고받는 값 타입을 정의.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 인코딩 포맷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// 손실 압축: 도면/사진 기본값
    Jpeg,
    /// 무손실: 텍스트가 많은 다이어그램, 폴백 포맷
    Png,
    /// 손실 압축 (libwebp)
    Webp,
}

impl ImageFormat {
    /// 데이터 URL / content-type에 쓰는 하위 타입 (`image/<fmt>`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn mime(&self) -> String {
        format!("image/{}", self.as_str())
    }

    /// 파일 확장자
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    /// 품질 파라미터가 의미 없는 무손실 포맷인지
    pub fn is_lossless(&self) -> bool {
        matches!(self, ImageFormat::Png)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(format!("지원하지 않는 포맷: {other}")),
        }
    }
}

/// 문서 유형: 전처리/품질 프리셋 선택 기준
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// 건축 도면 (선/치수 텍스트 보존)
    #[default]
    Architectural,
    /// 다이어그램 (텍스트 위주, PNG 선호)
    Diagram,
    /// 사진
    Photograph,
    /// 일반 문서
    General,
}

impl DocumentType {
    /// 유형별 기본 프리셋
    pub fn preset(&self) -> DocumentPreset {
        match self {
            DocumentType::Architectural => DocumentPreset {
                preserve_lines: true,
                enhance_contrast: true,
                sharpen_text: true,
                min_quality: 0.85,
                preferred_format: ImageFormat::Jpeg,
            },
            DocumentType::Diagram => DocumentPreset {
                preserve_lines: true,
                enhance_contrast: true,
                sharpen_text: true,
                min_quality: 0.90,
                preferred_format: ImageFormat::Png,
            },
            DocumentType::Photograph => DocumentPreset {
                preserve_lines: false,
                enhance_contrast: false,
                sharpen_text: false,
                min_quality: 0.80,
                preferred_format: ImageFormat::Jpeg,
            },
            DocumentType::General => DocumentPreset {
                preserve_lines: false,
                enhance_contrast: false,
                sharpen_text: false,
                min_quality: 0.75,
                preferred_format: ImageFormat::Jpeg,
            },
        }
    }

    /// 문자열 파싱: 알 수 없는 값은 `General`
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "architectural" => DocumentType::Architectural,
            "diagram" => DocumentType::Diagram,
            "photograph" | "photo" => DocumentType::Photograph,
            _ => DocumentType::General,
        }
    }
}

/// 문서 유형별 전처리 프리셋
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentPreset {
    /// 선 보존 (리사이즈 필터 선택 힌트)
    pub preserve_lines: bool,
    /// 대비 강화 적용
    pub enhance_contrast: bool,
    /// 텍스트 샤프닝 적용
    pub sharpen_text: bool,
    /// 시작 품질 (0.0 ~ 1.0)
    pub min_quality: f32,
    /// 선호 포맷
    pub preferred_format: ImageFormat,
}

/// 명명된 품질 단계 (`CompressionOverrides::quality_preset`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Maximum,
    High,
    Medium,
    Low,
    Minimum,
}

impl QualityPreset {
    pub fn value(&self) -> f32 {
        match self {
            QualityPreset::Maximum => 0.95,
            QualityPreset::High => 0.90,
            QualityPreset::Medium => 0.80,
            QualityPreset::Low => 0.65,
            QualityPreset::Minimum => 0.50,
        }
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maximum" | "max" => Ok(QualityPreset::Maximum),
            "high" => Ok(QualityPreset::High),
            "medium" => Ok(QualityPreset::Medium),
            "low" => Ok(QualityPreset::Low),
            "minimum" | "min" => Ok(QualityPreset::Minimum),
            other => Err(format!("알 수 없는 품질 단계: {other}")),
        }
    }
}

/// 모델별 압축 한도
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionProfile {
    /// 최대 너비 (픽셀)
    pub max_width: u32,
    /// 최대 높이 (픽셀)
    pub max_height: u32,
    /// 최대 페이로드 크기 (바이트, base64 보정 후)
    pub max_bytes: usize,
    /// 시작 품질: 지정 시 문서 프리셋보다 우선
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quality: Option<f32>,
    /// 선호 포맷: 지정 시 문서 프리셋보다 우선
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_format: Option<ImageFormat>,
}

impl CompressionProfile {
    /// 크기 한도만 지정한 프로파일
    pub fn bounded(max_width: u32, max_height: u32, max_bytes: usize) -> Self {
        Self {
            max_width,
            max_height,
            max_bytes,
            min_quality: None,
            preferred_format: None,
        }
    }
}

impl Default for CompressionProfile {
    fn default() -> Self {
        Self::bounded(1024, 1024, 2 * 1024 * 1024)
    }
}

/// 호출자가 지정하는 명시적 오버라이드
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressionOverrides {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub max_bytes: Option<usize>,
    /// 시작 품질 강제 (`quality_preset`보다 우선)
    pub quality: Option<f32>,
    /// 명명된 품질 단계로 시작 품질 지정
    pub quality_preset: Option<QualityPreset>,
    /// 포맷 강제
    pub format: Option<ImageFormat>,
    /// 한도 내 이미지라도 리샘플 수행
    pub force_resize: bool,
}

/// 콘텐츠 분석 결과 (비트맵마다 재계산)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    /// 에지 샘플 비율 (0.0 ~ 1.0)
    pub edge_ratio: f32,
    /// 평균 인접 샘플 대비
    pub avg_contrast: f32,
    /// 평균 밝기 (0 ~ 255)
    pub avg_brightness: f32,
    pub is_detailed: bool,
    pub is_architectural: bool,
    pub is_dark_background: bool,
}

impl ContentAnalysis {
    /// 분석 비활성화 시 사용하는 중립값
    pub fn neutral() -> Self {
        Self {
            edge_ratio: 0.0,
            avg_contrast: 0.0,
            avg_brightness: 128.0,
            is_detailed: false,
            is_architectural: false,
            is_dark_background: false,
        }
    }
}

/// 압축 완료 이미지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedImage {
    /// 인코딩된 바이트
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    /// 추정 전송 크기 (base64 길이 × 0.75)
    pub size_bytes: usize,
    pub format: ImageFormat,
    /// 최종 인코딩 품질 (0.0 ~ 1.0)
    pub quality: f32,
    pub analysis: ContentAnalysis,
    /// 수행한 인코딩 횟수
    pub encode_passes: u32,
    /// 비상 축소 경로를 탔는지
    pub emergency_applied: bool,
}

impl CompressionOverrides {
    /// 명시적 시작 품질: 숫자 지정 > 품질 단계
    pub fn start_quality(&self) -> Option<f32> {
        self.quality.or(self.quality_preset.map(|p| p.value()))
    }
}

impl ProcessedImage {
    pub fn base64(&self) -> String {
        B64.encode(&self.payload)
    }

    /// `data:image/<fmt>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime(), self.base64())
    }

    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }

    /// 캐시 엔트리에 보관하는 메타데이터
    pub fn metadata(&self) -> ImageMetadata {
        ImageMetadata {
            width: self.width,
            height: self.height,
            original_width: self.original_width,
            original_height: self.original_height,
            format: self.format,
            size_bytes: self.size_bytes,
            quality: self.quality,
        }
    }
}

/// 이미지 메타데이터 (바이트 제외)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub format: ImageFormat,
    pub size_bytes: usize,
    pub quality: f32,
}

impl ImageMetadata {
    /// 사람이 읽는 설명: 예: `JPEG image (1024×768, 123.4KB)`
    pub fn describe(&self) -> String {
        format!(
            "{} image ({}×{}, {:.1}KB)",
            self.format.as_str().to_uppercase(),
            self.width,
            self.height,
            self.size_bytes as f64 / 1024.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_document_type_falls_back_to_general() {
        assert_eq!(DocumentType::parse_lenient("blueprint"), DocumentType::General);
        assert_eq!(DocumentType::parse_lenient("Diagram"), DocumentType::Diagram);
    }

    #[test]
    fn format_parsing() {
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert!("gif".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn quality_preset_parsing_and_precedence() {
        assert_eq!("Low".parse::<QualityPreset>().unwrap(), QualityPreset::Low);
        assert_eq!("max".parse::<QualityPreset>().unwrap(), QualityPreset::Maximum);
        assert!("ultra".parse::<QualityPreset>().is_err());

        let preset_only = CompressionOverrides {
            quality_preset: Some(QualityPreset::High),
            ..Default::default()
        };
        assert_eq!(preset_only.start_quality(), Some(0.90));

        let both = CompressionOverrides {
            quality: Some(0.6),
            ..preset_only
        };
        assert_eq!(both.start_quality(), Some(0.6));
        assert_eq!(CompressionOverrides::default().start_quality(), None);
    }

    #[test]
    fn metadata_description() {
        let meta = ImageMetadata {
            width: 1024,
            height: 768,
            original_width: 4000,
            original_height: 3000,
            format: ImageFormat::Jpeg,
            size_bytes: 126_361,
            quality: 0.85,
        };
        assert_eq!(meta.describe(), "JPEG image (1024×768, 123.4KB)");
    }

    #[test]
    fn data_url_uses_format_mime() {
        let img = ProcessedImage {
            payload: vec![1, 2, 3],
            width: 1,
            height: 1,
            original_width: 1,
            original_height: 1,
            size_bytes: 3,
            format: ImageFormat::Png,
            quality: 1.0,
            analysis: ContentAnalysis::neutral(),
            encode_passes: 1,
            emergency_applied: false,
        };
        assert_eq!(img.data_url(), "data:image/png;base64,AQID");
    }
}
