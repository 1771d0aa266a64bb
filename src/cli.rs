use std::io::BufRead;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use crossbeam_channel::{never, select, unbounded, Receiver};
use dialoguer::{Input, Select};

use crate::config::{self, DispatcherKind};
use crate::core::engine::{Collaborators, EngineSettings, SyncEngine};
use crate::core::identity::extract_identity;
use crate::dispatch;
use crate::models::SyncStatus;
use crate::sources::itunes::{classify_candidate, ItunesCatalog};
use crate::sources::spotify::SpotifyPlayer;
use crate::sources::CatalogSource;

#[derive(Parser)]
#[command(name = "amsync", about = "Spotify 재생을 Apple Music으로 미러링")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// 디버그 로그 출력
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 미러링 실행 (stdin: on / off / quit)
    Run {
        /// 국가 코드 (예: US, KR)
        #[arg(long)]
        region: Option<String>,
    },
    /// 제목/아티스트로 Apple Music URL 한 번 찾기
    Resolve {
        title: String,
        artist: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// 검색 결과 후보와 해석 방식 표시
    Search {
        title: String,
        artist: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Spotify 항목 ID에서 트랙 식별자 추출
    Identity {
        /// 예: spotify:track:4uLU6hMCjMI75M1A2tKUQC
        raw: String,
    },
    /// 설정 편집
    Config,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Run { region }) => cmd_run(region),
        Some(Commands::Resolve {
            title,
            artist,
            region,
        }) => cmd_resolve(&title, &artist, region),
        Some(Commands::Search {
            title,
            artist,
            region,
        }) => cmd_search(&title, &artist, region),
        Some(Commands::Identity { raw }) => cmd_identity(&raw),
        Some(Commands::Config) => cmd_config(),
        None => {
            println!("사용법: amsync <명령어>");
            println!("자세한 정보는 amsync --help를 실행하세요.");
            Ok(())
        }
    }
}

fn load_config_with_region(region: Option<String>) -> config::Config {
    let mut cfg = config::load_config();
    if region.is_some() {
        cfg.region = region;
    }
    cfg
}

enum RunEvent {
    Status(SyncStatus),
    Input(String),
    InputClosed,
    EngineGone,
}

fn cmd_run(region: Option<String>) -> Result<()> {
    let cfg = load_config_with_region(region);
    let settings = EngineSettings::from_config(&cfg);

    let collaborators = Collaborators {
        source: Arc::new(SpotifyPlayer::new(&cfg.source)),
        catalog: Arc::new(ItunesCatalog::new(&cfg.catalog)?),
        dispatcher: dispatch::build_dispatcher(&cfg.target),
    };

    println!(
        "국가 코드: {}, 폴링 주기: {}ms",
        settings.region,
        settings.poll_interval.as_millis()
    );

    let (engine, status_rx) = SyncEngine::spawn(collaborators, settings)?;
    engine.start();
    println!("미러링을 시작합니다. (off: 정지, on: 재개, quit: 종료)\n");

    let mut input_rx = spawn_input_reader()?;

    loop {
        let event = select! {
            recv(status_rx) -> status => match status {
                Ok(status) => RunEvent::Status(status),
                Err(_) => RunEvent::EngineGone,
            },
            recv(input_rx) -> line => match line {
                Ok(line) => RunEvent::Input(line),
                Err(_) => RunEvent::InputClosed,
            },
        };

        match event {
            RunEvent::Status(status) => println!("[상태] {}", status),
            RunEvent::Input(line) => match line.trim() {
                "on" => engine.start(),
                "off" => engine.stop(),
                "quit" | "q" => break,
                "" => {}
                other => println!("알 수 없는 명령입니다: {}", other),
            },
            // stdin이 닫혀도 미러링은 계속한다
            RunEvent::InputClosed => input_rx = never(),
            RunEvent::EngineGone => break,
        }
    }

    engine.shutdown();
    println!("종료합니다.");
    Ok(())
}

fn spawn_input_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("amsync-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("입력 스레드 생성에 실패했습니다")?;
    Ok(rx)
}

fn cmd_resolve(title: &str, artist: &str, region: Option<String>) -> Result<()> {
    let cfg = load_config_with_region(region);
    let catalog = ItunesCatalog::new(&cfg.catalog)?;

    match catalog.resolve(title, artist, &cfg.region())? {
        Some(url) => {
            let kind = if url.is_canonical() { "정식" } else { "대체" };
            println!("{} ({} URL)", url, kind);
        }
        None => println!("Apple Music에서 찾지 못했습니다: {} {}", title, artist),
    }
    Ok(())
}

fn cmd_search(title: &str, artist: &str, region: Option<String>) -> Result<()> {
    let cfg = load_config_with_region(region);
    let region = cfg.region();
    let catalog = ItunesCatalog::new(&cfg.catalog)?;

    let results = catalog.search(title, artist, &region)?;

    if results.is_empty() {
        println!("검색 결과가 없습니다.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["#", "종류", "트랙 ID", "방식", "URL"]);

        for (i, candidate) in results.iter().enumerate() {
            let link = classify_candidate(candidate, &region, catalog.host());
            let label = link.label();
            let url = link
                .into_resolved()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "-".to_string());

            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(candidate.kind.as_deref().unwrap_or("-")),
                Cell::new(
                    candidate
                        .item_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::new(label),
                Cell::new(url),
            ]);
        }

        println!("{table}");
    }

    println!(
        "\n검색 링크: {}",
        catalog.build_search_url(title, artist, &region)
    );
    Ok(())
}

fn cmd_identity(raw: &str) -> Result<()> {
    match extract_identity(raw) {
        Some(identity) => println!("{}", identity),
        None => println!("동기화 대상이 아닙니다 (에피소드 또는 로컬 파일)"),
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let mut cfg = config::load_config();

    println!("amsync 설정\n");

    let region: String = Input::new()
        .with_prompt("국가 코드 (비우면 로케일 사용)")
        .with_initial_text(cfg.region.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let kinds = ["단축어 실행 (shortcut)", "Music 앱에서 열기 (open-location)"];
    let current = match cfg.target.dispatcher {
        DispatcherKind::Shortcut => 0,
        DispatcherKind::OpenLocation => 1,
    };
    let selection = Select::new()
        .with_prompt("재생 방식")
        .items(&kinds)
        .default(current)
        .interact()?;

    let shortcut_name: String = Input::new()
        .with_prompt("단축어 이름")
        .with_initial_text(cfg.target.shortcut_name.clone())
        .interact_text()?;

    let poll_interval_ms: u64 = Input::new()
        .with_prompt("폴링 주기 (ms)")
        .default(cfg.sync.poll_interval_ms)
        .interact_text()?;

    cfg.region = Some(region.trim().to_string()).filter(|r| !r.is_empty());
    cfg.target.dispatcher = if selection == 0 {
        DispatcherKind::Shortcut
    } else {
        DispatcherKind::OpenLocation
    };
    cfg.target.shortcut_name = shortcut_name;
    cfg.sync.poll_interval_ms = poll_interval_ms;

    config::save_config(&cfg)?;
    println!("\n설정이 저장되었습니다!");
    Ok(())
}
