//! 애플리케이션 설정 구조체.
//!
//! 모델 엔드포인트, 모델별 압축 프로파일, 압축 루프/폴백 파라미터,
//! 대화(모델 선택) 설정을 정의한다. `ConfigManager`가 JSON 파일로 로드/저장.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::image::CompressionProfile;

/// 기본 프로파일 키
pub const DEFAULT_PROFILE_KEY: &str = "default";

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 모델 엔드포인트 설정
    pub server: ServerConfig,
    /// 이미지 압축 설정
    #[serde(default)]
    pub compression: CompressionConfig,
    /// 대화/모델 선택 설정
    #[serde(default)]
    pub chat: ChatConfig,
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            compression: CompressionConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================
// 서버 설정
// ============================================================

/// OpenAI 호환 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 베이스 URL (예: "http://localhost:8091")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer 토큰 (로컬 서버는 placeholder 허용)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// 요청 타임아웃 (초): 스트리밍은 연결 수립까지만 적용
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ============================================================
// 압축 설정
// ============================================================

/// 이미지 압축 설정: 모델별 프로파일 + 처리/폴백 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// 모델 ID → 프로파일 (`default` 키가 폴백)
    #[serde(default = "default_profiles")]
    pub profiles: BTreeMap<String, CompressionProfile>,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl CompressionConfig {
    /// 모델 ID로 프로파일 조회, 없으면 default
    pub fn profile_for(&self, model: &str) -> CompressionProfile {
        self.profiles
            .get(model)
            .or_else(|| self.profiles.get(DEFAULT_PROFILE_KEY))
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            processing: ProcessingConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

/// 반복 인코딩 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// 품질 하향 인코딩 최대 시도 횟수
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 시도마다 낮추는 품질 폭
    #[serde(default = "default_quality_step")]
    pub quality_step: f32,
    /// 절대 품질 하한
    #[serde(default = "default_quality_floor")]
    pub quality_floor: f32,
    /// 콘텐츠 분석 사용 (끄면 중립 분석값으로 처리)
    #[serde(default = "default_true")]
    pub enable_content_analysis: bool,
    /// 대비 강화 계수
    #[serde(default = "default_contrast_factor")]
    pub contrast_factor: f32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            quality_step: default_quality_step(),
            quality_floor: default_quality_floor(),
            enable_content_analysis: true,
            contrast_factor: default_contrast_factor(),
        }
    }
}

/// 예산 초과 시 폴백 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// 손실 포맷이 예산을 못 맞추면 PNG 1회 시도
    #[serde(default = "default_true")]
    pub use_png_fallback: bool,
    /// 비상 축소 사용
    #[serde(default = "default_true")]
    pub use_emergency_compression: bool,
    /// 비상 축소 발동 기준 (바이트)
    #[serde(default = "default_emergency_max_bytes")]
    pub emergency_max_bytes: usize,
    /// 비상 축소 시 최대 변 길이
    #[serde(default = "default_emergency_max_dimension")]
    pub emergency_max_dimension: u32,
    /// 비상 인코딩 품질
    #[serde(default = "default_emergency_quality")]
    pub emergency_quality: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            use_png_fallback: true,
            use_emergency_compression: true,
            emergency_max_bytes: default_emergency_max_bytes(),
            emergency_max_dimension: default_emergency_max_dimension(),
            emergency_quality: default_emergency_quality(),
        }
    }
}

// ============================================================
// 대화 설정
// ============================================================

/// 모델 선택 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// 텍스트 전용 대화 기본 모델
    #[serde(default = "default_model")]
    pub default_model: String,
    /// 이미지 첨부 시 자동 전환되는 모델
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    /// 이미지 입력 지원 모델
    #[serde(default = "default_image_capable_models")]
    pub image_capable_models: Vec<String>,
    /// `/v1/models` 실패 시 사용하는 목록
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            vision_model: default_vision_model(),
            image_capable_models: default_image_capable_models(),
            fallback_models: default_fallback_models(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_base_url() -> String {
    "http://localhost:8091".to_string()
}
fn default_api_key() -> String {
    "no-key".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_max_attempts() -> u32 {
    5
}
fn default_quality_step() -> f32 {
    0.10
}
fn default_quality_floor() -> f32 {
    0.50
}
fn default_contrast_factor() -> f32 {
    1.15
}
fn default_emergency_max_bytes() -> usize {
    1024 * 1024
}
fn default_emergency_max_dimension() -> u32 {
    800
}
fn default_emergency_quality() -> f32 {
    0.50
}
fn default_model() -> String {
    "qwen-vl:7b".to_string()
}
fn default_vision_model() -> String {
    "gemma3:4b".to_string()
}
fn default_image_capable_models() -> Vec<String> {
    vec!["gemma3:4b".to_string(), "qwen-vl:7b".to_string()]
}
fn default_fallback_models() -> Vec<String> {
    ["qwen3:0.6b", "qwen-vl:7b", "gemma3:4b", "llama3:1b", "tinyllama:1.1b"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_profiles() -> BTreeMap<String, CompressionProfile> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        DEFAULT_PROFILE_KEY.to_string(),
        CompressionProfile::bounded(1024, 1024, 2 * 1024 * 1024),
    );
    profiles.insert(
        "gemma3:4b".to_string(),
        CompressionProfile::bounded(1280, 1280, 3 * 1024 * 1024),
    );
    profiles.insert(
        "qwen-vl:7b".to_string(),
        CompressionProfile::bounded(1024, 1024, 2_621_440),
    );
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_lookup_falls_back_to_default() {
        let config = CompressionConfig::default();
        let unknown = config.profile_for("mystery-model");
        assert_eq!(unknown.max_width, 1024);
        assert_eq!(unknown.max_bytes, 2 * 1024 * 1024);

        let gemma = config.profile_for("gemma3:4b");
        assert_eq!(gemma.max_width, 1280);
        assert_eq!(gemma.max_bytes, 3 * 1024 * 1024);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let json = r#"{"server": {"base_url": "http://10.0.0.2:8080"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.base_url, "http://10.0.0.2:8080");
        assert_eq!(config.server.api_key, "no-key");
        assert_eq!(config.compression.profiles.len(), 3);
        assert!(config.compression.fallback.use_png_fallback);
        assert_eq!(config.chat.fallback_models.len(), 5);
    }

    #[test]
    fn serde_roundtrip_keeps_profiles() {
        let config = AppConfig::default_config();
        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.compression.profiles, config.compression.profiles);
    }
}
