//! 이미지 컨텍스트 캐시.
//!
//! `ImageContextCache` 포트 구현. 인코딩 페이로드 중앙부 샘플의 FNV-1a 해시로
//! 이미지를 식별하고, 세션별로 이미 보낸 이미지는 텍스트 참조로 대체한다.
//!
//! 전역 엔트리 맵과 세션 맵은 하나의 뮤텍스 아래에 있어
//! 해시 확인과 삽입이 원자적으로 이루어진다.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sightline_core::error::CoreError;
use sightline_core::models::context::{
    CacheEntry, CacheStats, ContentHash, ImageReference, ResolvedImage, SessionImageSummary,
    SessionStats,
};
use sightline_core::models::image::ProcessedImage;
use sightline_core::ports::image_context::ImageContextCache;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// 해시 샘플 최대 길이 (바이트)
const HASH_SAMPLE_LEN: usize = 1000;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 페이로드 중앙부 샘플 기반 콘텐츠 해시.
///
/// 헤더/트레일러가 같은 이미지끼리 충돌하지 않도록 가운데에서 최대 1000바이트를
/// 잘라 FNV-1a 64비트로 해싱한다. 빈 페이로드는 해싱 불가.
pub fn compute_content_hash(payload: &[u8]) -> Result<ContentHash, CoreError> {
    if payload.is_empty() {
        return Err(CoreError::Validation {
            field: "payload".to_string(),
            message: "빈 페이로드는 해싱할 수 없음".to_string(),
        });
    }
    let sample_len = payload.len().min(HASH_SAMPLE_LEN);
    let start = (payload.len() - sample_len) / 2;
    let hash = payload[start..start + sample_len]
        .iter()
        .fold(FNV_OFFSET_BASIS, |h, &b| (h ^ b as u64).wrapping_mul(FNV_PRIME));
    Ok(ContentHash(hash))
}

/// 경과 시간 버킷: `just now` / `Nm ago` / `Nh ago`
pub fn elapsed_label(first_seen_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - first_seen_at).num_seconds().max(0);
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[derive(Default)]
struct CacheState {
    /// 해시 → 엔트리 (프로세스 전역)
    entries: HashMap<ContentHash, CacheEntry>,
    /// 세션 ID → 이미 보낸 해시
    sessions: HashMap<String, HashSet<ContentHash>>,
    reference_counter: u64,
}

impl CacheState {
    fn next_reference_id(&mut self, now: DateTime<Utc>) -> String {
        self.reference_counter += 1;
        format!("img_ref_{}_{}", self.reference_counter, now.timestamp_millis())
    }
}

/// 콘텐츠 주소 기반 이미지 캐시
#[derive(Default)]
pub struct ImageContentCache {
    state: Mutex<CacheState>,
}

impl ImageContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_at(
        &self,
        image: ProcessedImage,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> ResolvedImage {
        let hash = match compute_content_hash(&image.payload) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("콘텐츠 해시 실패, 중복 제거 없이 전송: {e}");
                return ResolvedImage::Send(image);
            }
        };

        let mut state = self.state.lock();

        let already_sent = state
            .sessions
            .get(session_id)
            .is_some_and(|sent| sent.contains(&hash));
        if already_sent {
            if let Some(entry) = state.entries.get(&hash) {
                let reference = ImageReference {
                    entry: entry.clone(),
                    elapsed: elapsed_label(entry.first_seen_at, now),
                    referenced_at: now,
                };
                debug!(
                    "이미지 참조 사용: {} ({}) session={}",
                    entry.reference_id, hash, session_id
                );
                return ResolvedImage::Reference(reference);
            }
        }

        if !state.entries.contains_key(&hash) {
            let reference_id = state.next_reference_id(now);
            let metadata = image.metadata();
            let entry = CacheEntry {
                hash,
                reference_id,
                first_seen_at: now,
                description: metadata.describe(),
                metadata,
            };
            debug!(
                "새 이미지 등록: {} ({}, {:.1}KB)",
                entry.reference_id,
                hash,
                image.size_kb()
            );
            state.entries.insert(hash, entry);
        }
        state
            .sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(hash);

        ResolvedImage::Send(image)
    }
}

impl ImageContextCache for ImageContentCache {
    fn resolve(&self, image: ProcessedImage, session_id: &str) -> ResolvedImage {
        self.resolve_at(image, session_id, Utc::now())
    }

    fn clear_session(&self, session_id: &str) {
        self.state.lock().sessions.remove(session_id);
        info!("세션 이미지 기록 삭제: {session_id}");
    }

    fn clear_all(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.sessions.clear();
        state.reference_counter = 0;
        info!("이미지 캐시 전체 삭제");
    }

    fn entry_by_reference_id(&self, reference_id: &str) -> Option<CacheEntry> {
        self.state
            .lock()
            .entries
            .values()
            .find(|e| e.reference_id == reference_id)
            .cloned()
    }

    fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let total_sessions = state.sessions.len();
        let total_references: usize = state.sessions.values().map(HashSet::len).sum();
        CacheStats {
            total_images: state.entries.len(),
            total_sessions,
            total_references,
            average_references_per_session: if total_sessions > 0 {
                total_references as f64 / total_sessions as f64
            } else {
                0.0
            },
        }
    }

    fn session_stats(&self, session_id: &str) -> SessionStats {
        let state = self.state.lock();
        let mut images: Vec<SessionImageSummary> = state
            .sessions
            .get(session_id)
            .into_iter()
            .flatten()
            .filter_map(|hash| state.entries.get(hash))
            .map(|entry| SessionImageSummary {
                reference_id: entry.reference_id.clone(),
                description: entry.description.clone(),
                first_seen_at: entry.first_seen_at,
            })
            .collect();
        images.sort_by(|a, b| {
            a.first_seen_at
                .cmp(&b.first_seen_at)
                .then_with(|| a.reference_id.cmp(&b.reference_id))
        });

        SessionStats {
            session_id: session_id.to_string(),
            image_count: images.len(),
            images,
        }
    }
}
