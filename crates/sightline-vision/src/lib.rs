//! # sightline-vision
//!
//! 시각 컨텍스트 전처리 크레이트.
//! 콘텐츠 분석, 대비/샤프닝 전처리, 종횡비 보존 리사이즈, 적응형 압축,
//! 콘텐츠 해시 기반 이미지 캐시, 캡처 표면 어댑터를 담당한다.

pub mod analyzer;
pub mod capture;
pub mod compressor;
pub mod context_cache;
pub mod encoder;
pub mod enhance;
pub mod resize;
