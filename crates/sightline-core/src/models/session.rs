//! 전송 세션 상태 모델.

use serde::{Deserialize, Serialize};

/// 한 번의 전송 상태
///
/// `Idle → Sending → AwaitingFirstToken → Streaming → {Completed | Cancelled | Errored}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendState {
    /// 대기
    Idle,
    /// 메시지 포맷팅 및 요청 전송 중
    Sending,
    /// 요청 전송 완료, 첫 토큰 대기
    AwaitingFirstToken,
    /// 증분 수신 중
    Streaming,
    /// 정상 종료
    Completed,
    /// 사용자 취소
    Cancelled,
    /// 에러 (폴백 메시지 추가 후 Idle 복귀)
    Errored,
}

impl SendState {
    /// 새 전송을 시작할 수 있는 상태인지
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SendState::Idle | SendState::Completed | SendState::Cancelled | SendState::Errored
        )
    }

    /// 취소가 유효한 상태인지
    pub fn is_cancellable(&self) -> bool {
        matches!(self, SendState::AwaitingFirstToken | SendState::Streaming)
    }
}

/// 전송 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// 스트림 정상 종료: 어시스턴트 메시지 ID
    Completed { message_id: String },
    /// 취소됨: 취소 시점까지의 내용 유지
    Cancelled { message_id: String },
    /// 에러: 폴백 메시지 ID와 에러 설명
    Errored { message_id: String, error: String },
}
