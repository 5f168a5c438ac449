//! # sightline-app
//!
//! sightline CLI 바이너리 진입점.
//! 설정 로드, 어댑터 와이어링, 서브커맨드 실행.

mod commands;
mod wiring;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sightline_core::config_manager::ConfigManager;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::commands::{AskArgs, CompressArgs};

/// 로컬 비전 모델 대화 클라이언트
///
/// 이미지/문서를 모델 한도에 맞게 압축하고, 세션 내 중복 이미지는
/// 텍스트 참조로 대체해 전송한다.
#[derive(Parser, Debug)]
#[command(name = "sightline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 모델 서버 URL (기본: 설정 파일, 없으면 http://localhost:8091)
    #[arg(long, short = 's', global = true)]
    server: Option<String>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 사용 가능한 모델 목록
    Models,
    /// 이미지 파일 하나를 압축해 결과 요약 출력
    Compress(CompressArgs),
    /// 질문 전송 후 응답 스트리밍 출력
    Ask(AskArgs),
}

/// tracing 필터 문자열: 워크스페이스 크레이트만 지정 레벨 적용
fn log_filter(level: &str) -> String {
    ["sightline", "sightline_app", "sightline_core", "sightline_vision", "sightline_network"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn load_config(args: &Args) -> Result<ConfigManager> {
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    debug!("설정 파일: {}", manager.config_path().display());
    Ok(manager)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 응답 본문은 stdout, 로그는 stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(&args.log_level))),
        )
        .with_writer(std::io::stderr)
        .init();

    let manager = load_config(&args)?;
    let mut config = manager.get();
    if let Some(ref server_url) = args.server {
        config.server.base_url = server_url.clone();
    }
    info!("sightline 시작 (서버: {})", config.server.base_url);

    match args.command {
        Command::Models => commands::run_models(&config).await,
        Command::Compress(compress) => commands::run_compress(&config, compress),
        Command::Ask(ask) => commands::run_ask(&config, ask).await,
    }
}
