//! sightline 도메인 모델.
//!
//! 캡처 → 압축 → 중복 제거 → 대화 포맷팅 파이프라인에서
//! 주고받는 데이터 구조체를 정의한다.

pub mod bitmap;
pub mod context;
pub mod image;
pub mod message;
pub mod session;
