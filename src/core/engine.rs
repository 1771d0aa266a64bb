//! 소스 플레이어 폴링 → 트랙 변경 감지 → 카탈로그 해석 → 타깃 재생.
//!
//! 상태(마지막 식별자, 해석 진행 여부, 캐시)는 워커 스레드 하나가 독점한다.
//! 타이머 틱, 시작/정지, 해석 완료는 모두 채널 메시지로 워커에 도착한다.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{never, select, tick, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::config::Config;
use crate::core::cache::ResolutionCache;
use crate::core::identity::{extract_identity, is_ineligible};
use crate::dispatch::Dispatcher;
use crate::models::{PlaybackState, ResolvedUrl, SyncStatus, TrackIdentity};
use crate::sources::{CatalogSource, SourcePlayer};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    pub region: String,
    pub max_retries: u32,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.sync.poll_interval_ms.max(1)),
            region: config.region(),
            max_retries: config.sync.max_retries,
        }
    }
}

/// 엔진이 호출하는 외부 협력자들.
pub struct Collaborators {
    pub source: Arc<dyn SourcePlayer>,
    pub catalog: Arc<dyn CatalogSource>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionJob {
    pub identity: TrackIdentity,
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickAction {
    None,
    /// 캐시에 없음. 네트워크 해석이 필요하다.
    Resolve(ResolutionJob),
    /// 캐시 적중. 바로 재생한다.
    Dispatch(ResolvedUrl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub status: SyncStatus,
    pub action: TickAction,
}

impl TickOutcome {
    fn status_only(status: SyncStatus) -> Self {
        Self {
            status,
            action: TickAction::None,
        }
    }
}

/// 워커가 소유하는 동기화 상태. 채널이나 스레드를 모르는 순수 상태 기계.
#[derive(Debug)]
pub struct SyncState {
    last_identity: Option<TrackIdentity>,
    resolution_in_flight: bool,
    running: bool,
    cache: ResolutionCache,
    /// 현재 재생 중인 트랙의 실패 횟수. 트랙이 바뀌면 초기화된다.
    failure: Option<(TrackIdentity, u32)>,
    retry_pending: bool,
    max_retries: u32,
}

impl SyncState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            last_identity: None,
            resolution_in_flight: false,
            running: false,
            cache: ResolutionCache::new(),
            failure: None,
            retry_pending: false,
            max_retries,
        }
    }

    /// 이미 실행 중이면 false.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    /// 이미 정지 상태면 false.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 폴링 결과 하나를 처리한다.
    /// 새 식별자는 해석이 끝나기 전에 바로 `last_identity`에 기록된다.
    pub fn on_tick(&mut self, playback: PlaybackState) -> TickOutcome {
        let snapshot = match playback {
            PlaybackState::NotRunning => {
                return TickOutcome::status_only(SyncStatus::SourceNotRunning)
            }
            PlaybackState::NotPlaying => {
                return TickOutcome::status_only(SyncStatus::WaitingForPlayback)
            }
            PlaybackState::Playing(snapshot) => snapshot,
        };

        let status = SyncStatus::Playing {
            title: snapshot.title.clone(),
            artist: snapshot.artist.clone(),
        };

        if is_ineligible(&snapshot.raw_identifier) {
            return TickOutcome::status_only(status);
        }
        let Some(identity) = extract_identity(&snapshot.raw_identifier) else {
            return TickOutcome::status_only(status);
        };

        if self.resolution_in_flight {
            return TickOutcome::status_only(status);
        }

        if self.last_identity.as_ref() == Some(&identity) {
            if !self.retry_pending {
                return TickOutcome::status_only(status);
            }
            debug!("Retrying resolution for {}", identity);
        } else {
            debug!(
                "Track change detected: {} -> {}",
                self.last_identity
                    .as_ref()
                    .map(|id| id.as_str())
                    .unwrap_or("nil"),
                identity
            );
            self.last_identity = Some(identity.clone());
            self.failure = None;
        }
        self.retry_pending = false;

        if let Some(url) = self.cache.get(&identity) {
            debug!("Cache hit for {}", identity);
            return TickOutcome {
                status,
                action: TickAction::Dispatch(url.clone()),
            };
        }

        self.resolution_in_flight = true;
        TickOutcome {
            status,
            action: TickAction::Resolve(ResolutionJob {
                identity,
                title: snapshot.title,
                artist: snapshot.artist,
            }),
        }
    }

    /// 해석 결과를 반영하고, 재생해야 할 URL이 있으면 반환한다.
    /// 정지 후에 끝난 해석은 캐시에만 저장하고 재생하지 않는다.
    pub fn on_resolved(
        &mut self,
        identity: TrackIdentity,
        result: Result<Option<ResolvedUrl>>,
    ) -> Option<ResolvedUrl> {
        self.resolution_in_flight = false;

        match result {
            Ok(Some(url)) => {
                if self.failure.as_ref().is_some_and(|(id, _)| *id == identity) {
                    self.failure = None;
                }
                self.cache.put(identity, url.clone());
                debug!(
                    "Resolved Apple Music URL: {} ({} cached)",
                    url,
                    self.cache.len()
                );
                if self.running {
                    Some(url)
                } else {
                    debug!("Sync stopped, not dispatching {}", url);
                    None
                }
            }
            Ok(None) => {
                warn!("Failed to resolve Apple Music URL for trackId={}", identity);
                self.record_failure(identity);
                None
            }
            Err(e) => {
                warn!("resolveURL error for trackId={}: {:#}", identity, e);
                self.record_failure(identity);
                None
            }
        }
    }

    /// 같은 트랙이 계속 재생되는 동안에만 `max_retries`번 다시 시도한다.
    fn record_failure(&mut self, identity: TrackIdentity) {
        if self.last_identity.as_ref() != Some(&identity) {
            return;
        }

        let attempts = match &self.failure {
            Some((id, count)) if *id == identity => count + 1,
            _ => 1,
        };
        self.failure = Some((identity.clone(), attempts));

        if attempts <= self.max_retries {
            debug!(
                "Retrying {} on next tick ({}/{})",
                identity, attempts, self.max_retries
            );
            self.retry_pending = true;
        }
    }
}

#[cfg(test)]
impl SyncState {
    pub fn is_resolving(&self) -> bool {
        self.resolution_in_flight
    }

    pub fn last_identity(&self) -> Option<&TrackIdentity> {
        self.last_identity.as_ref()
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }
}

enum Command {
    Start,
    Stop,
    Resolved {
        identity: TrackIdentity,
        result: Result<Option<ResolvedUrl>>,
    },
    Shutdown,
}

enum Event {
    Command(Command),
    Tick,
    Closed,
}

/// 동기화 엔진 핸들. 드롭하면 워커를 종료하고 기다린다.
pub struct SyncEngine {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    dispatch_worker: Option<JoinHandle<()>>,
}

impl SyncEngine {
    /// 워커/재생 스레드를 띄우고 상태 수신 채널을 함께 반환한다.
    /// 엔진은 정지 상태로 시작하며 `start()`로 폴링을 시작한다.
    pub fn spawn(
        collaborators: Collaborators,
        settings: EngineSettings,
    ) -> Result<(Self, Receiver<SyncStatus>)> {
        let (command_tx, command_rx) = unbounded();
        let (status_tx, status_rx) = unbounded();
        let (dispatch_tx, dispatch_rx) = unbounded();

        let dispatch_worker = spawn_dispatch_thread(Arc::clone(&collaborators.dispatcher), dispatch_rx)?;

        let _ = status_tx.send(SyncStatus::Idle);
        let worker = Worker {
            state: SyncState::new(settings.max_retries),
            settings,
            collaborators,
            commands: command_rx,
            loopback: command_tx.clone(),
            dispatch_tx,
            status_tx,
            last_status: Some(SyncStatus::Idle),
        };

        let worker = thread::Builder::new()
            .name("amsync-sync".to_string())
            .spawn(move || worker.run())
            .context("동기화 스레드 생성에 실패했습니다")?;

        Ok((
            Self {
                commands: command_tx,
                worker: Some(worker),
                dispatch_worker: Some(dispatch_worker),
            },
            status_rx,
        ))
    }

    pub fn start(&self) {
        let _ = self.commands.send(Command::Start);
    }

    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Sync worker panicked");
            }
        }
        if let Some(dispatch_worker) = self.dispatch_worker.take() {
            if dispatch_worker.join().is_err() {
                error!("Dispatch worker panicked");
            }
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.join();
    }
}

struct Worker {
    state: SyncState,
    settings: EngineSettings,
    collaborators: Collaborators,
    commands: Receiver<Command>,
    loopback: Sender<Command>,
    dispatch_tx: Sender<ResolvedUrl>,
    status_tx: Sender<SyncStatus>,
    last_status: Option<SyncStatus>,
}

impl Worker {
    fn run(mut self) {
        let commands = self.commands.clone();
        // tick 채널은 용량이 1이라 워커가 바쁜 동안의 틱은 버려진다
        let mut ticker: Receiver<Instant> = never();

        loop {
            let event = select! {
                recv(commands) -> msg => match msg {
                    Ok(command) => Event::Command(command),
                    Err(_) => Event::Closed,
                },
                recv(ticker) -> _ => Event::Tick,
            };

            match event {
                Event::Command(Command::Start) => {
                    if self.state.start() {
                        info!("Sync started");
                        self.publish(SyncStatus::Running);
                        self.prepare_collaborators();
                        self.tick();
                        ticker = tick(self.settings.poll_interval);
                    }
                }
                Event::Command(Command::Stop) => {
                    if self.state.stop() {
                        ticker = never();
                        info!("Sync stopped");
                        self.publish(SyncStatus::Stopped);
                    }
                }
                Event::Command(Command::Resolved { identity, result }) => {
                    if let Some(url) = self.state.on_resolved(identity, result) {
                        self.dispatch(url);
                    }
                }
                Event::Tick => {
                    if self.state.is_running() {
                        self.tick();
                    }
                }
                Event::Command(Command::Shutdown) | Event::Closed => break,
            }
        }
        debug!("Sync worker exiting");
    }

    fn prepare_collaborators(&self) {
        if let Err(e) = self.collaborators.source.ensure_running() {
            warn!("Could not launch source player: {:#}", e);
        }
        if let Err(e) = self.collaborators.dispatcher.prepare() {
            warn!("Could not reach target player: {:#}", e);
        }
    }

    fn tick(&mut self) {
        let playback = match self.collaborators.source.playback_state() {
            Ok(playback) => playback,
            Err(e) => {
                error!("Source player query failed: {:#}", e);
                PlaybackState::NotPlaying
            }
        };

        let outcome = self.state.on_tick(playback);
        self.publish(outcome.status);

        match outcome.action {
            TickAction::None => {}
            TickAction::Dispatch(url) => self.dispatch(url),
            TickAction::Resolve(job) => self.spawn_resolution(job),
        }
    }

    fn spawn_resolution(&mut self, job: ResolutionJob) {
        let catalog = Arc::clone(&self.collaborators.catalog);
        let loopback = self.loopback.clone();
        let region = self.settings.region.clone();
        let identity = job.identity.clone();

        let spawned = thread::Builder::new()
            .name("amsync-resolve".to_string())
            .spawn(move || {
                let result = catalog.resolve(&job.title, &job.artist, &region);
                let _ = loopback.send(Command::Resolved {
                    identity: job.identity,
                    result,
                });
            });

        if let Err(e) = spawned {
            let result: Result<Option<ResolvedUrl>> =
                Err(e).context("해석 스레드 생성에 실패했습니다");
            self.state.on_resolved(identity, result);
        }
    }

    fn dispatch(&self, url: ResolvedUrl) {
        if self.dispatch_tx.send(url).is_err() {
            error!("Dispatch worker is gone");
        }
    }

    /// 직전과 같은 상태는 다시 보내지 않는다.
    fn publish(&mut self, status: SyncStatus) {
        if self.last_status.as_ref() == Some(&status) {
            return;
        }
        self.last_status = Some(status.clone());
        let _ = self.status_tx.send(status);
    }
}

fn spawn_dispatch_thread(
    dispatcher: Arc<dyn Dispatcher>,
    urls: Receiver<ResolvedUrl>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("amsync-dispatch".to_string())
        .spawn(move || {
            for url in urls.iter() {
                if let Err(e) = dispatcher.dispatch(&url) {
                    error!("Dispatch failed for {}: {:#}", url, e);
                }
            }
        })
        .context("재생 스레드 생성에 실패했습니다")
}
