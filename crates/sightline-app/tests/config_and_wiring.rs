//! 설정 및 어댑터 와이어링 통합 테스트.
//!
//! ConfigManager 파일 로드/저장 → 어댑터 생성 검증.

use sightline_core::config::AppConfig;
use sightline_core::config_manager::ConfigManager;
use sightline_core::models::bitmap::Bitmap;
use sightline_core::models::image::{DocumentType, ImageFormat};
use sightline_core::ports::vision::{ImageProcessor, ProcessRequest};
use sightline_network::chat_client::OpenAiChatClient;
use sightline_vision::compressor::AdaptiveCompressor;

#[test]
fn config_defaults_are_valid() {
    let config = AppConfig::default_config();

    assert_eq!(config.server.base_url, "http://localhost:8091");
    assert_eq!(config.server.api_key, "no-key");
    assert!((config.server.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.server.timeout_secs, 120);

    let processing = &config.compression.processing;
    assert!(processing.quality_floor < 1.0);
    assert!(processing.quality_step > 0.0);
    assert!(processing.max_attempts > 0);

    for model in &config.chat.image_capable_models {
        assert!(config.compression.profiles.contains_key(model), "{model} 프로파일 없음");
    }
}

#[test]
fn first_run_writes_defaults_and_reload_picks_up_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let manager = ConfigManager::with_path(path.clone()).unwrap();
    assert!(path.exists());
    assert_eq!(manager.get().chat.vision_model, "gemma3:4b");

    manager
        .update_with(|c| {
            c.server.base_url = "http://10.1.2.3:8091".to_string();
            c.chat.vision_model = "qwen-vl:7b".to_string();
        })
        .unwrap();

    let other = ConfigManager::with_path(path).unwrap();
    assert_eq!(other.get().server.base_url, "http://10.1.2.3:8091");
    assert_eq!(other.get().chat.vision_model, "qwen-vl:7b");

    other.update_with(|c| c.server.max_tokens = 512).unwrap();
    assert_eq!(manager.get().server.max_tokens, 2048);
    manager.reload().unwrap();
    assert_eq!(manager.get().server.max_tokens, 512);
}

#[test]
fn hand_edited_profile_changes_compression_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "server": {"base_url": "http://localhost:8091"},
            "compression": {
                "profiles": {
                    "default": {"max_width": 256, "max_height": 256, "max_bytes": 65536}
                }
            }
        }"#,
    )
    .unwrap();

    let manager = ConfigManager::with_path(path).unwrap();
    let config = manager.get();
    let compressor = AdaptiveCompressor::new(config.compression.clone());

    let bitmap = Bitmap::filled(1000, 500, [120, 130, 140, 255], "canvas").unwrap();
    let request = ProcessRequest {
        model: "anything".to_string(),
        document_type: DocumentType::Photograph,
        ..ProcessRequest::default()
    };
    let result = compressor.process(&bitmap, &request).unwrap();

    assert_eq!((result.width, result.height), (256, 128));
    assert_eq!(result.format, ImageFormat::Jpeg);
    assert!(result.size_bytes <= 65_536);
}

#[test]
fn adapters_instantiate_from_config() {
    let config = AppConfig::default_config();
    let _client =
        OpenAiChatClient::new(&config.server, config.chat.fallback_models.clone()).unwrap();
    let _compressor = AdaptiveCompressor::new(config.compression.clone());
}
