//! 대화 세션.
//!
//! 한 세션의 이력과 전송 상태 머신을 관리한다.
//! `Idle → Sending → AwaitingFirstToken → Streaming → {Completed | Cancelled | Errored}`
//!
//! 세션당 동시에 하나의 전송만 허용되며 (진행 중이면 즉시 거부), 취소는
//! 증분 적용 직전에 확인하는 협조적 방식이다.

use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use sightline_core::config::ChatConfig;
use sightline_core::error::CoreError;
use sightline_core::models::message::{ChatMessage, ImageAttachment, Message, Role};
use sightline_core::models::session::{SendOutcome, SendState};
use sightline_core::ports::llm_provider::{ChatCompletionClient, DeltaStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::formatter::{FormatOptions, MessageFormatter};

/// 에러 시 이력에 추가되는 어시스턴트 메시지
pub const ERROR_FALLBACK_MESSAGE: &str =
    "Sorry, I encountered an error while processing your message. Please try again.";

/// 증분 브로드캐스트 채널 용량
const DELTA_CHANNEL_CAPACITY: usize = 256;

/// 전송 옵션
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// 모델 지정 (없으면 이미지 유무로 자동 선택)
    pub model_override: Option<String>,
    /// 압축 옵션 (모델 필드는 무시되고 선택된 모델로 채워짐)
    pub format: FormatOptions,
}

/// 전송 중 플래그 해제 가드
struct SendGuard<'a>(&'a AtomicBool);

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 스트림 소비 결과
enum StreamEnd {
    Completed,
    Cancelled,
    Failed(CoreError),
}

/// 대화 세션
pub struct ConversationSession {
    session_id: String,
    client: Arc<dyn ChatCompletionClient>,
    formatter: MessageFormatter,
    chat_config: ChatConfig,
    /// 사용자가 선택한 텍스트 모델
    selected_model: RwLock<String>,
    history: Mutex<Vec<Message>>,
    state_tx: watch::Sender<SendState>,
    state_rx: watch::Receiver<SendState>,
    /// 적용된 증분 텍스트 (출력용)
    delta_tx: broadcast::Sender<String>,
    /// 진행 중 전송 가드
    sending: AtomicBool,
    cancel_requested: AtomicBool,
    cancel_notify: Notify,
}

impl ConversationSession {
    /// 새 세션 (세션 ID 자동 생성)
    pub fn new(
        client: Arc<dyn ChatCompletionClient>,
        formatter: MessageFormatter,
        chat_config: ChatConfig,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), client, formatter, chat_config)
    }

    /// 지정 ID로 세션 생성
    pub fn with_id(
        session_id: impl Into<String>,
        client: Arc<dyn ChatCompletionClient>,
        formatter: MessageFormatter,
        chat_config: ChatConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SendState::Idle);
        let (delta_tx, _) = broadcast::channel(DELTA_CHANNEL_CAPACITY);
        let selected_model = RwLock::new(chat_config.default_model.clone());
        Self {
            session_id: session_id.into(),
            client,
            formatter,
            chat_config,
            selected_model,
            history: Mutex::new(Vec::new()),
            state_tx,
            state_rx,
            delta_tx,
            sending: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            cancel_notify: Notify::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 현재 전송 상태
    pub fn state(&self) -> SendState {
        *self.state_rx.borrow()
    }

    /// 상태 변경 수신기 생성
    pub fn subscribe(&self) -> watch::Receiver<SendState> {
        self.state_rx.clone()
    }

    /// 이력에 적용되는 증분 텍스트 수신기 생성
    pub fn subscribe_deltas(&self) -> broadcast::Receiver<String> {
        self.delta_tx.subscribe()
    }

    /// 이력 복제본
    pub fn history(&self) -> Vec<Message> {
        self.history.lock().clone()
    }

    pub fn selected_model(&self) -> String {
        self.selected_model.read().clone()
    }

    pub fn set_model(&self, model: impl Into<String>) {
        let model = model.into();
        info!("모델 선택: {model}");
        *self.selected_model.write() = model;
    }

    /// 이미지 입력 지원 모델인지
    pub fn is_image_capable(&self, model: &str) -> bool {
        self.chat_config
            .image_capable_models
            .iter()
            .any(|m| m == model)
    }

    /// 사용 가능한 모델 목록
    pub async fn available_models(&self) -> Vec<String> {
        self.client.list_models().await
    }

    /// 이력과 세션 이미지 사용 기록 초기화
    pub fn clear(&self) {
        let removed = {
            let mut history = self.history.lock();
            let n = history.len();
            history.clear();
            n
        };
        self.formatter.cache().clear_session(&self.session_id);
        info!("세션 {} 초기화: 메시지 {removed}개 제거", self.session_id);
    }

    /// 전송할 모델 결정: 지정 > 이미지 첨부 시 비전 모델 > 선택 모델
    fn model_for(&self, images: &[ImageAttachment], model_override: Option<&str>) -> String {
        if let Some(model) = model_override {
            return model.to_string();
        }
        if images.iter().any(|a| a.bitmap_count() > 0) {
            return self.chat_config.vision_model.clone();
        }
        self.selected_model()
    }

    fn set_state(&self, state: SendState) {
        debug!("세션 {} 상태: {:?}", self.session_id, state);
        let _ = self.state_tx.send(state);
    }

    /// 진행 중 전송 취소. 첫 토큰 대기/스트리밍 중일 때만 유효.
    pub fn cancel(&self) -> bool {
        if !self.state().is_cancellable() {
            debug!("취소 무시: 현재 상태 {:?}", self.state());
            return false;
        }
        self.cancel_requested.store(true, Ordering::Release);
        self.cancel_notify.notify_waiters();
        info!("세션 {} 전송 취소 요청", self.session_id);
        true
    }

    fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// 사용자 메시지 전송 후 응답 스트리밍.
    ///
    /// 진행 중인 전송이 있으면 `CoreError::SendInProgress`. 포맷/네트워크/스트림
    /// 에러는 폴백 메시지를 이력에 추가하고 `SendOutcome::Errored`로 반환된다.
    pub async fn send(
        &self,
        text: impl Into<String>,
        images: Vec<ImageAttachment>,
        options: SendOptions,
    ) -> Result<SendOutcome, CoreError> {
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("세션 {}: 이미 전송 중, 새 메시지 거부", self.session_id);
            return Err(CoreError::SendInProgress);
        }
        let _guard = SendGuard(&self.sending);
        self.cancel_requested.store(false, Ordering::Release);
        self.set_state(SendState::Sending);

        let model = self.model_for(&images, options.model_override.as_deref());
        let user_message = Message::new(Role::User, text, self.session_id.as_str()).with_images(images);
        let snapshot = {
            let mut history = self.history.lock();
            history.push(user_message);
            history.clone()
        };

        let format_options = FormatOptions {
            model: model.clone(),
            ..options.format
        };
        let formatted = match self
            .formatter
            .format_messages(&snapshot, &self.session_id, &format_options)
            .await
        {
            Ok(formatted) => formatted,
            Err(e) => return Ok(self.fail(e)),
        };

        let assistant = Message {
            is_streaming: true,
            ..Message::new(Role::Assistant, "", self.session_id.as_str())
        };
        let assistant_id = assistant.id.clone();
        self.history.lock().push(assistant);

        info!(
            "세션 {} 전송: 모델 {model}, 메시지 {}개",
            self.session_id,
            formatted.len()
        );
        self.set_state(SendState::AwaitingFirstToken);

        let end = match self.open_stream(&formatted, &model).await {
            Ok(Some(stream)) => self.consume(stream, &assistant_id).await,
            Ok(None) => StreamEnd::Cancelled,
            Err(e) => StreamEnd::Failed(e),
        };
        self.finish_streaming(&assistant_id);

        Ok(match end {
            StreamEnd::Completed => {
                self.set_state(SendState::Completed);
                SendOutcome::Completed {
                    message_id: assistant_id,
                }
            }
            StreamEnd::Cancelled => {
                info!("세션 {} 전송 취소됨", self.session_id);
                self.set_state(SendState::Cancelled);
                SendOutcome::Cancelled {
                    message_id: assistant_id,
                }
            }
            StreamEnd::Failed(e) => self.fail(e),
        })
    }

    /// 요청 전송: 응답 헤더 대기 중 취소되면 `None`
    async fn open_stream(
        &self,
        formatted: &[ChatMessage],
        model: &str,
    ) -> Result<Option<DeltaStream>, CoreError> {
        let notified = self.cancel_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancel_requested() {
            return Ok(None);
        }

        tokio::select! {
            biased;
            _ = &mut notified => Ok(None),
            result = self.client.stream_completion(formatted, model) => result.map(Some),
        }
    }

    /// 증분을 어시스턴트 메시지에 적용
    async fn consume(&self, mut stream: DeltaStream, assistant_id: &str) -> StreamEnd {
        let notified = self.cancel_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        loop {
            if self.is_cancel_requested() {
                return StreamEnd::Cancelled;
            }

            let next = tokio::select! {
                biased;
                _ = &mut notified => return StreamEnd::Cancelled,
                next = stream.next() => next,
            };

            let delta = match next {
                Some(Ok(delta)) => delta,
                Some(Err(e)) => return StreamEnd::Failed(e),
                None => return StreamEnd::Completed,
            };

            if self.is_cancel_requested() {
                return StreamEnd::Cancelled;
            }
            if self.state() == SendState::AwaitingFirstToken {
                self.set_state(SendState::Streaming);
            }
            if !delta.content.is_empty() {
                self.append_to(assistant_id, &delta.content);
                let _ = self.delta_tx.send(delta.content);
            }
            if delta.finished {
                return StreamEnd::Completed;
            }
        }
    }

    fn append_to(&self, message_id: &str, content: &str) {
        let mut history = self.history.lock();
        if let Some(message) = history.iter_mut().rev().find(|m| m.id == message_id) {
            message.content.push_str(content);
        }
    }

    fn finish_streaming(&self, message_id: &str) {
        let mut history = self.history.lock();
        if let Some(message) = history.iter_mut().rev().find(|m| m.id == message_id) {
            message.is_streaming = false;
        }
    }

    /// 에러 처리: 폴백 메시지 추가 후 Idle 복귀. 이미 받은 내용은 유지.
    fn fail(&self, error: CoreError) -> SendOutcome {
        warn!("세션 {} 전송 실패: {error}", self.session_id);
        let fallback = Message::new(Role::Assistant, ERROR_FALLBACK_MESSAGE, self.session_id.as_str());
        let message_id = fallback.id.clone();
        self.history.lock().push(fallback);
        self.set_state(SendState::Errored);
        self.set_state(SendState::Idle);
        SendOutcome::Errored {
            message_id,
            error: error.to_string(),
        }
    }
}
