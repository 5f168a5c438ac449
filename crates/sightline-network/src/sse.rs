//! 스트리밍 응답 라인 디코더.
//!
//! `/v1/chat/completions` (stream: true) 응답은 `data: <json>` 라인의 연속이며
//! `data: [DONE]`으로 끝난다. 청크 경계가 라인 중간에 걸릴 수 있으므로
//! 완성되지 않은 라인은 다음 읽기까지 버퍼에 남긴다.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use sightline_core::error::CoreError;
use sightline_core::models::message::StreamDelta;
use sightline_core::ports::llm_provider::DeltaStream;
use std::collections::VecDeque;
use std::fmt::Display;
use tracing::{debug, warn};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// 디코딩된 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Delta(StreamDelta),
    Done,
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// 한 라인 해석. `data:` 접두가 없거나 내용이 비면 `None`.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix(DATA_PREFIX)?.trim_start();
    if data.is_empty() {
        return None;
    }
    if data == DONE_SENTINEL {
        return Some(SseEvent::Done);
    }

    let payload: ChunkPayload = match serde_json::from_str(data) {
        Ok(p) => p,
        Err(e) => {
            warn!(
                "스트림 라인 파싱 실패 (건너뜀): {e} (raw: {})",
                data.chars().take(120).collect::<String>()
            );
            return None;
        }
    };

    let choice = payload.choices.into_iter().next()?;
    let content = choice.delta.and_then(|d| d.content).unwrap_or_default();
    let finished = choice.finish_reason.is_some();
    if content.is_empty() && !finished {
        return None;
    }
    Some(SseEvent::Delta(StreamDelta { content, finished }))
}

/// 청크 단위 입력을 라인 단위 이벤트로 변환하는 디코더
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: BytesMut,
    done: bool,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `[DONE]`을 받았는지
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// 청크 입력 → 완성된 라인의 이벤트들
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            if self.decode_line(&line[..pos], &mut events) {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// 입력 종료. 개행 없이 끝난 마지막 라인을 처리한다.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let rest = self.buffer.split();
            self.decode_line(&rest, &mut events);
        }
        self.buffer.clear();
        events
    }

    /// 라인 하나 처리. `[DONE]`이면 true.
    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<SseEvent>) -> bool {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        match parse_line(&line) {
            Some(SseEvent::Done) => {
                debug!("스트림 종료 신호 수신");
                self.done = true;
                events.push(SseEvent::Done);
                true
            }
            Some(event) => {
                events.push(event);
                false
            }
            None => false,
        }
    }
}

struct DecodeState<S> {
    source: S,
    decoder: SseLineDecoder,
    pending: VecDeque<StreamDelta>,
    finished: bool,
}

/// 바이트 스트림 → 증분 스트림.
///
/// 소스 읽기마다 중단되는 pull 방식이며, `[DONE]` 이후의 입력은 읽지 않는다.
pub fn decode_stream<S, E>(source: S) -> DeltaStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        source,
        decoder: SseLineDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                return Some((Ok(delta), state));
            }
            if state.finished {
                return None;
            }

            let events = match state.source.next().await {
                Some(Ok(chunk)) => state.decoder.feed(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(CoreError::Network(format!("스트림 읽기 실패: {e}"))), state));
                }
                None => {
                    state.finished = true;
                    state.decoder.finish()
                }
            };

            for event in events {
                match event {
                    SseEvent::Delta(delta) => state.pending.push_back(delta),
                    SseEvent::Done => state.finished = true,
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn chunk(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}},\"finish_reason\":null}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    fn full_body() -> String {
        let mut body = String::new();
        for piece in ["안녕", "하세요", ", 도면", "을 확인했습니다."] {
            body.push_str(&chunk(piece));
        }
        body.push_str(
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\ndata: [DONE]\n\n",
        );
        body
    }

    fn collect_text(events: &[SseEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                SseEvent::Delta(d) => Some(d.content.as_str()),
                SseEvent::Done => None,
            })
            .collect()
    }

    #[test]
    fn parses_delta_and_finish() {
        assert_eq!(
            parse_line("data: {\"choices\":[{\"delta\":{\"content\":\"hi\"},\"finish_reason\":null}]}"),
            Some(SseEvent::Delta(StreamDelta {
                content: "hi".to_string(),
                finished: false
            }))
        );
        assert_eq!(
            parse_line("data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}"),
            Some(SseEvent::Delta(StreamDelta {
                content: String::new(),
                finished: true
            }))
        );
        assert_eq!(parse_line("data: [DONE]"), Some(SseEvent::Done));
        assert_eq!(parse_line("data:[DONE]"), Some(SseEvent::Done));
    }

    #[test]
    fn ignores_non_data_lines_and_garbage() {
        assert_eq!(parse_line(": keep-alive"), None);
        assert_eq!(parse_line("event: message"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("data: {not json"), None);
        assert_eq!(parse_line("data: {\"choices\":[]}"), None);
        // role만 있는 첫 청크
        assert_eq!(
            parse_line("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}"),
            None
        );
    }

    #[test]
    fn split_at_every_offset_reassembles_same_text() {
        let body = full_body();
        let bytes = body.as_bytes();

        let mut whole = SseLineDecoder::new();
        let expected = collect_text(&whole.feed(bytes));
        assert_eq!(expected, "안녕하세요, 도면을 확인했습니다.");

        for split in 0..=bytes.len() {
            let mut decoder = SseLineDecoder::new();
            let mut events = decoder.feed(&bytes[..split]);
            events.extend(decoder.feed(&bytes[split..]));
            events.extend(decoder.finish());
            assert_eq!(collect_text(&events), expected, "split at {split}");
            assert!(decoder.is_done());
        }
    }

    #[test]
    fn byte_by_byte_feeding() {
        let body = full_body();
        let mut decoder = SseLineDecoder::new();
        let mut events = Vec::new();
        for b in body.as_bytes() {
            events.extend(decoder.feed(std::slice::from_ref(b)));
        }
        assert_eq!(collect_text(&events), "안녕하세요, 도면을 확인했습니다.");
        assert_eq!(events.last(), Some(&SseEvent::Done));
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let body = full_body().replace('\n', "\r\n");
        let mut decoder = SseLineDecoder::new();
        let events = decoder.feed(body.as_bytes());
        assert_eq!(collect_text(&events), "안녕하세요, 도면을 확인했습니다.");
    }

    #[test]
    fn input_after_done_is_ignored() {
        let mut decoder = SseLineDecoder::new();
        let body = format!("data: [DONE]\n{}", chunk("late"));
        let events = decoder.feed(body.as_bytes());
        assert_eq!(events, vec![SseEvent::Done]);
        assert!(decoder.feed(chunk("later").as_bytes()).is_empty());
    }

    #[test]
    fn trailing_line_without_newline_flushed_on_finish() {
        let mut decoder = SseLineDecoder::new();
        let body = chunk("tail");
        let trimmed = body.trim_end();
        assert!(decoder.feed(trimmed.as_bytes()).is_empty());
        assert_eq!(collect_text(&decoder.finish()), "tail");
    }

    #[tokio::test]
    async fn decode_stream_over_chunked_source() {
        let body = full_body();
        let chunks: Vec<Result<Bytes, std::io::Error>> = body
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let deltas: Vec<StreamDelta> = decode_stream(stream::iter(chunks))
            .try_collect()
            .await
            .unwrap();
        let text: String = deltas.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(text, "안녕하세요, 도면을 확인했습니다.");
        assert!(deltas.last().unwrap().finished);
    }

    #[test]
    fn partial_line_waits_for_more_input() {
        let source = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
            b"data: {\"choices\"",
        ))])
        .chain(stream::pending());
        let mut deltas = decode_stream(source);
        let mut next = tokio_test::task::spawn(deltas.next());
        tokio_test::assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn decode_stream_surfaces_source_error() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(chunk("부분"))),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut stream = decode_stream(stream::iter(chunks));
        assert_eq!(stream.next().await.unwrap().unwrap().content, "부분");
        assert!(matches!(
            stream.next().await,
            Some(Err(CoreError::Network(_)))
        ));
        assert!(stream.next().await.is_none());
    }
}
