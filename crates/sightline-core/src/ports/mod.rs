//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 각 어댑터 crate가 이 trait들을 구현하며,
//! `sightline-app`에서 `Arc<dyn T>`로 와이어링한다.
//!
//! 네트워크 포트는 `async_trait` 매크로로 object safety를 보장하고,
//! CPU 바운드 포트(캡처, 압축)는 동기 trait으로 두어 호출자가
//! 블로킹 풀에서 실행하도록 한다.

pub mod capture;
pub mod image_context;
pub mod llm_provider;
pub mod vision;
