//! 단위 테스트용 포트 대역.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use sightline_core::error::CoreError;
use sightline_core::models::bitmap::Bitmap;
use sightline_core::models::context::{
    CacheEntry, CacheStats, ContentHash, ImageReference, ResolvedImage, SessionImageSummary,
    SessionStats,
};
use sightline_core::models::image::{ContentAnalysis, ImageFormat, ProcessedImage};
use sightline_core::models::message::{ChatMessage, StreamDelta};
use sightline_core::ports::image_context::ImageContextCache;
use sightline_core::ports::llm_provider::{ChatCompletionClient, DeltaStream};
use sightline_core::ports::vision::{ImageProcessor, ProcessRequest};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

/// 시드 값으로 채운 4x4 비트맵
pub(crate) fn bitmap(seed: u8) -> Bitmap {
    Bitmap::filled(4, 4, [seed, seed, seed, 255], "test").unwrap()
}

pub(crate) fn delta(content: &str, finished: bool) -> StreamDelta {
    StreamDelta {
        content: content.to_string(),
        finished,
    }
}

/// 픽셀을 그대로 PNG 페이로드로 취급하는 처리기
#[derive(Default)]
pub(crate) struct FakeProcessor {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeProcessor {
    pub(crate) fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageProcessor for FakeProcessor {
    fn process(
        &self,
        bitmap: &Bitmap,
        _request: &ProcessRequest,
    ) -> Result<ProcessedImage, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CoreError::ImageEncoding("예산 내 인코딩 불가".to_string()));
        }
        let payload = bitmap.pixels().to_vec();
        Ok(ProcessedImage {
            size_bytes: payload.len(),
            payload,
            width: bitmap.width(),
            height: bitmap.height(),
            original_width: bitmap.width(),
            original_height: bitmap.height(),
            format: ImageFormat::Png,
            quality: 1.0,
            analysis: ContentAnalysis::neutral(),
            encode_passes: 1,
            emergency_applied: false,
        })
    }
}

/// 해제 신호를 받을 때까지 압축을 멈추는 처리기
pub(crate) struct GatedProcessor {
    inner: FakeProcessor,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedProcessor {
    pub(crate) fn new() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let processor = Self {
            inner: FakeProcessor::default(),
            release: Mutex::new(rx),
        };
        (processor, tx)
    }
}

impl ImageProcessor for GatedProcessor {
    fn process(
        &self,
        bitmap: &Bitmap,
        request: &ProcessRequest,
    ) -> Result<ProcessedImage, CoreError> {
        // 송신측이 사라져도 진행
        let _ = self.release.lock().recv();
        self.inner.process(bitmap, request)
    }
}

/// 페이로드 전체를 키로 쓰는 단순 캐시
#[derive(Default)]
pub(crate) struct FakeCache {
    sessions: Mutex<HashMap<String, HashMap<Vec<u8>, CacheEntry>>>,
}

impl ImageContextCache for FakeCache {
    fn resolve(&self, image: ProcessedImage, session_id: &str) -> ResolvedImage {
        let mut sessions = self.sessions.lock();
        let used = sessions.entry(session_id.to_string()).or_default();
        if let Some(entry) = used.get(&image.payload) {
            return ResolvedImage::Reference(ImageReference {
                entry: entry.clone(),
                elapsed: "just now".to_string(),
                referenced_at: Utc::now(),
            });
        }
        let entry = CacheEntry {
            hash: ContentHash(used.len() as u64),
            reference_id: format!("img_ref_{}_0", used.len() + 1),
            first_seen_at: Utc::now(),
            description: image.metadata().describe(),
            metadata: image.metadata(),
        };
        used.insert(image.payload.clone(), entry);
        ResolvedImage::Send(image)
    }

    fn clear_session(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }

    fn clear_all(&self) {
        self.sessions.lock().clear();
    }

    fn entry_by_reference_id(&self, reference_id: &str) -> Option<CacheEntry> {
        self.sessions
            .lock()
            .values()
            .flat_map(|used| used.values())
            .find(|e| e.reference_id == reference_id)
            .cloned()
    }

    fn stats(&self) -> CacheStats {
        let sessions = self.sessions.lock();
        let total_references: usize = sessions.values().map(HashMap::len).sum();
        CacheStats {
            total_images: total_references,
            total_sessions: sessions.len(),
            total_references,
            average_references_per_session: 0.0,
        }
    }

    fn session_stats(&self, session_id: &str) -> SessionStats {
        let sessions = self.sessions.lock();
        let images: Vec<SessionImageSummary> = sessions
            .get(session_id)
            .map(|used| {
                used.values()
                    .map(|e| SessionImageSummary {
                        reference_id: e.reference_id.clone(),
                        description: e.description.clone(),
                        first_seen_at: e.first_seen_at,
                    })
                    .collect()
            })
            .unwrap_or_default();
        SessionStats {
            session_id: session_id.to_string(),
            image_count: images.len(),
            images,
        }
    }
}

/// 스크립트 응답
pub(crate) enum Reply {
    /// 항목을 모두 내보낸 뒤 종료
    Stream(Vec<Result<StreamDelta, CoreError>>),
    /// 항목을 내보낸 뒤 영원히 대기
    StreamThenHang(Vec<StreamDelta>),
    /// 요청 자체 실패
    Fail(CoreError),
}

/// 순서대로 스크립트 응답을 돌려주는 클라이언트
pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(Vec<ChatMessage>, String)>>,
}

impl ScriptedClient {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 요청마다 사용된 모델
    pub(crate) fn models(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    /// 요청마다 전송된 메시지
    pub(crate) fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().iter().map(|(r, _)| r.clone()).collect()
    }
}

#[async_trait]
impl ChatCompletionClient for ScriptedClient {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, CoreError> {
        let mut stream = self.stream_completion(messages, model).await?;
        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            text.push_str(&delta?.content);
        }
        Ok(text)
    }

    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<DeltaStream, CoreError> {
        self.requests
            .lock()
            .push((messages.to_vec(), model.to_string()));
        let reply = self
            .replies
            .lock()
            .pop_front()
            .ok_or_else(|| CoreError::Internal("스크립트 소진".to_string()))?;
        match reply {
            Reply::Stream(items) => Ok(stream::iter(items).boxed()),
            Reply::StreamThenHang(items) => Ok(stream::iter(items.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Reply::Fail(e) => Err(e),
        }
    }

    async fn list_models(&self) -> Vec<String> {
        vec!["gemma3:4b".to_string()]
    }
}
