//! 서브커맨드 실행.

use anyhow::{anyhow, Context, Result};
use clap::Args as ClapArgs;
use sightline_core::config::AppConfig;
use sightline_core::models::image::{
    CompressionOverrides, DocumentType, ImageFormat, QualityPreset,
};
use sightline_core::models::message::ImageAttachment;
use sightline_core::models::session::SendOutcome;
use sightline_core::ports::capture::CaptureSurface;
use sightline_network::conversation::SendOptions;
use sightline_network::formatter::FormatOptions;
use sightline_vision::capture::{DocumentSurface, RasterFileSurface, SurfaceRegistry};
use sightline_vision::compressor::AdaptiveCompressor;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::wiring::Components;

/// 문서 캡처 표면 ID
const DOCUMENT_SURFACE_ID: &str = "document";

#[derive(ClapArgs, Debug)]
pub struct CompressArgs {
    /// 입력 이미지 파일
    pub input: PathBuf,

    /// 출력 파일 (기본: `<입력>.sightline.<확장자>`)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// 압축 프로파일 모델 (기본: 비전 모델)
    #[arg(long)]
    pub model: Option<String>,

    /// 문서 유형 (architectural, diagram, photograph, general)
    #[arg(long, default_value = "architectural")]
    pub doc_type: String,

    /// 시작 품질 단계 (maximum, high, medium, low, minimum)
    #[arg(long)]
    pub quality: Option<QualityPreset>,

    /// 결과 요약을 JSON으로 출력
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct AskArgs {
    /// 질문
    pub prompt: String,

    /// 첨부 이미지 파일 (반복 가능)
    #[arg(long = "image")]
    pub images: Vec<PathBuf>,

    /// 파일 전체 캡처로 첨부할 이미지 파일 (파일명이 함께 전송됨)
    #[arg(long = "whole-file")]
    pub whole_files: Vec<PathBuf>,

    /// 문서 페이지 이미지 파일들 (한 문서로 첨부)
    #[arg(long, num_args = 1..)]
    pub document: Vec<PathBuf>,

    /// 문서 파일명 (기본: 첫 페이지 파일명)
    #[arg(long)]
    pub document_name: Option<String>,

    /// 모델 지정 (기본: 이미지 첨부 시 비전 모델, 아니면 기본 모델)
    #[arg(long)]
    pub model: Option<String>,

    /// 세션 ID
    #[arg(long)]
    pub session: Option<String>,

    /// 문서 유형
    #[arg(long, default_value = "architectural")]
    pub doc_type: String,
}

/// `sightline models`
pub async fn run_models(config: &AppConfig) -> Result<()> {
    let components = Components::from_config(config)?;
    let models = components.client.list_models().await;
    for model in models {
        let marker = if config.chat.image_capable_models.contains(&model) {
            " (image)"
        } else {
            ""
        };
        println!("{model}{marker}");
    }
    Ok(())
}

/// 기본 출력 경로: `plan.png` → `plan.sightline.jpg`
fn default_output_path(input: &Path, format: ImageFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}.sightline.{}", format.extension()))
}

/// `sightline compress`
pub fn run_compress(config: &AppConfig, args: CompressArgs) -> Result<()> {
    let surface = RasterFileSurface::new("input", &args.input);
    let bitmap = surface
        .capture()?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("이미지를 읽지 못함: {}", args.input.display()))?;

    let model = args.model.unwrap_or_else(|| config.chat.vision_model.clone());
    let profile = config.compression.profile_for(&model);
    let document_type = DocumentType::parse_lenient(&args.doc_type);

    let check = AdaptiveCompressor::needs_compression(&bitmap, &profile);
    info!(
        "압축 필요 여부: {} ({:?}, 추정 {}B)",
        check.needed, check.reason, check.estimated_size
    );

    let compressor = AdaptiveCompressor::new(config.compression.clone());
    let result = compressor.compress(
        &bitmap,
        &profile,
        document_type,
        &CompressionOverrides {
            quality_preset: args.quality,
            ..CompressionOverrides::default()
        },
    )?;

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input, result.format));
    std::fs::write(&output, &result.payload)
        .with_context(|| format!("출력 파일 쓰기 실패: {}", output.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "{} → {}\n  {}x{} → {}x{}, {} q={:.2}, {:.1}KB (한도 {:.1}KB), 인코딩 {}회{}",
            args.input.display(),
            output.display(),
            result.original_width,
            result.original_height,
            result.width,
            result.height,
            result.format,
            result.quality,
            result.size_kb(),
            profile.max_bytes as f64 / 1024.0,
            result.encode_passes,
            if result.emergency_applied {
                ", 비상 축소"
            } else {
                ""
            }
        );
    }
    Ok(())
}

/// 문서 파일명 기본값: 첫 페이지 파일명
fn default_document_name(pages: &[PathBuf]) -> String {
    pages
        .first()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// 첨부 파일 캡처. 실패한 첨부는 로그 후 건너뛴다.
fn capture_attachments(args: &AskArgs) -> Vec<ImageAttachment> {
    let registry = SurfaceRegistry::new();
    let mut attachments = Vec::new();

    for (i, path) in args.images.iter().enumerate() {
        let id = format!("image-{}", i + 1);
        registry.register(Arc::new(RasterFileSurface::new(id.as_str(), path)));
        match registry.capture(&id) {
            Ok(bitmaps) => attachments.extend(
                bitmaps
                    .into_iter()
                    .map(|b| ImageAttachment::Bitmap(Arc::new(b))),
            ),
            Err(e) => warn!("이미지 첨부 실패 (건너뜀): {}: {e}", path.display()),
        }
    }

    for (i, path) in args.whole_files.iter().enumerate() {
        let id = format!("whole-file-{}", i + 1);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        registry.register(Arc::new(RasterFileSurface::new(id.as_str(), path)));
        match registry.capture(&id) {
            Ok(bitmaps) => attachments.extend(bitmaps.into_iter().map(|b| {
                ImageAttachment::WholeFile {
                    file_name: file_name.clone(),
                    bitmap: Arc::new(b),
                }
            })),
            Err(e) => warn!("파일 전체 첨부 실패 (건너뜀): {}: {e}", path.display()),
        }
    }

    if !args.document.is_empty() {
        let file_name = args
            .document_name
            .clone()
            .unwrap_or_else(|| default_document_name(&args.document));
        registry.register(Arc::new(DocumentSurface::new(
            DOCUMENT_SURFACE_ID,
            file_name.as_str(),
            args.document.clone(),
        )));
        match registry.capture(DOCUMENT_SURFACE_ID) {
            Ok(pages) => attachments.push(ImageAttachment::Document {
                file_name,
                pages: pages.into_iter().map(Arc::new).collect(),
            }),
            Err(e) => warn!("문서 첨부 실패 (건너뜀): {file_name}: {e}"),
        }
    }

    attachments
}

/// Ctrl-C 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// 전송 취소 요청됨
    Cancelled,
    /// 압축/포맷 단계라 아직 취소 불가. 다음 Ctrl-C는 강제 중단.
    Deferred,
    /// 강제 중단
    Abort,
}

/// 반복되는 Ctrl-C 추적
#[derive(Debug, Default)]
struct InterruptTracker {
    cancelled: bool,
    deferred: bool,
}

impl InterruptTracker {
    /// `try_cancel`은 취소가 받아들여졌으면 true
    fn on_interrupt(&mut self, try_cancel: impl FnOnce() -> bool) -> Interrupt {
        if !self.cancelled && try_cancel() {
            self.cancelled = true;
            return Interrupt::Cancelled;
        }
        if self.cancelled || self.deferred {
            return Interrupt::Abort;
        }
        self.deferred = true;
        Interrupt::Deferred
    }
}

/// `sightline ask`
pub async fn run_ask(config: &AppConfig, args: AskArgs) -> Result<()> {
    let components = Components::from_config(config)?;
    let session = components.session(config, args.session.clone());
    let attachments = capture_attachments(&args);
    info!(
        "세션 {}: 첨부 {}개",
        session.session_id(),
        attachments.len()
    );

    let options = SendOptions {
        model_override: args.model.clone(),
        format: FormatOptions {
            document_type: DocumentType::parse_lenient(&args.doc_type),
            ..FormatOptions::default()
        },
    };

    let mut deltas = session.subscribe_deltas();
    let mut stdout = std::io::stdout();
    let mut interrupts = InterruptTracker::default();

    let send = session.send(args.prompt.clone(), attachments, options);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome?,
            Ok(text) = deltas.recv() => {
                print!("{text}");
                stdout.flush()?;
            }
            _ = tokio::signal::ctrl_c() => {
                match interrupts.on_interrupt(|| session.cancel()) {
                    Interrupt::Cancelled => info!("전송 취소 요청"),
                    Interrupt::Deferred => {
                        warn!("아직 취소할 수 없는 단계 (다시 누르면 중단)")
                    }
                    Interrupt::Abort => {
                        println!();
                        return Err(anyhow!("사용자 중단"));
                    }
                }
            }
        }
    };
    while let Ok(text) = deltas.try_recv() {
        print!("{text}");
    }
    println!();

    match outcome {
        SendOutcome::Completed { .. } => Ok(()),
        SendOutcome::Cancelled { .. } => {
            eprintln!("(취소됨)");
            Ok(())
        }
        SendOutcome::Errored { message_id, error } => {
            if let Some(fallback) = session.history().iter().find(|m| m.id == message_id) {
                eprintln!("{}", fallback.content);
            }
            Err(anyhow!("응답 실패: {error}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_uses_encoded_format() {
        assert_eq!(
            default_output_path(Path::new("/tmp/plans/floor.png"), ImageFormat::Jpeg),
            PathBuf::from("/tmp/plans/floor.sightline.jpg")
        );
    }

    #[test]
    fn document_name_defaults_to_first_page() {
        let pages = vec![PathBuf::from("scan/page-1.png"), PathBuf::from("scan/page-2.png")];
        assert_eq!(default_document_name(&pages), "page-1.png");
        assert_eq!(default_document_name(&[]), "document");
    }

    #[test]
    fn missing_attachments_are_skipped() {
        let args = AskArgs {
            prompt: "q".to_string(),
            images: vec![PathBuf::from("/nonexistent/a.png")],
            whole_files: vec![PathBuf::from("/nonexistent/whole.png")],
            document: vec![PathBuf::from("/nonexistent/p1.png")],
            document_name: None,
            model: None,
            session: None,
            doc_type: "general".to_string(),
        };
        assert!(capture_attachments(&args).is_empty());
    }

    #[test]
    fn interrupt_before_stream_is_deferred_then_cancels() {
        let mut tracker = InterruptTracker::default();
        // 압축 중: 세션이 취소를 거부
        assert_eq!(tracker.on_interrupt(|| false), Interrupt::Deferred);
        // 스트리밍 시작 후: 취소 수락
        assert_eq!(tracker.on_interrupt(|| true), Interrupt::Cancelled);
        assert_eq!(tracker.on_interrupt(|| true), Interrupt::Abort);
    }

    #[test]
    fn repeated_interrupt_while_not_cancellable_aborts() {
        let mut tracker = InterruptTracker::default();
        assert_eq!(tracker.on_interrupt(|| false), Interrupt::Deferred);
        assert_eq!(tracker.on_interrupt(|| false), Interrupt::Abort);
    }

    #[test]
    fn cancelled_send_is_not_cancelled_twice() {
        let mut tracker = InterruptTracker::default();
        assert_eq!(tracker.on_interrupt(|| true), Interrupt::Cancelled);
        let mut called = false;
        assert_eq!(
            tracker.on_interrupt(|| {
                called = true;
                true
            }),
            Interrupt::Abort
        );
        assert!(!called);
    }

    #[test]
    fn whole_file_attachment_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-plan.png");
        image::RgbaImage::from_pixel(8, 6, image::Rgba([200, 200, 200, 255]))
            .save(&path)
            .unwrap();

        let args = AskArgs {
            prompt: "q".to_string(),
            images: Vec::new(),
            whole_files: vec![path],
            document: Vec::new(),
            document_name: None,
            model: None,
            session: None,
            doc_type: "general".to_string(),
        };
        let attachments = capture_attachments(&args);
        assert_eq!(attachments.len(), 1);
        let ImageAttachment::WholeFile { file_name, bitmap } = &attachments[0] else {
            panic!("파일 전체 첨부가 아님");
        };
        assert_eq!(file_name, "site-plan.png");
        assert_eq!((bitmap.width(), bitmap.height()), (8, 6));
    }
}
