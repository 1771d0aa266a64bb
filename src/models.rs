use std::fmt;

use serde::Deserialize;

/// 소스 플레이어에서 한 번의 폴링으로 얻은 재생 중 트랙 정보.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingSnapshot {
    pub raw_identifier: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: i64,
    pub position_sec: f64,
}

/// 소스 플레이어 상태 조회 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    NotRunning,
    NotPlaying,
    Playing(NowPlayingSnapshot),
}

/// 트랙 변경 판단에 쓰는 정규화된 식별자.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackIdentity(String);

impl TrackIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 카탈로그 검색 응답의 결과 한 건. 모든 필드가 생략될 수 있다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchCandidate {
    #[serde(rename = "trackViewUrl", default)]
    pub direct_url: Option<String>,
    #[serde(rename = "collectionViewUrl", default)]
    pub collection_url: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(rename = "trackId", default)]
    pub item_id: Option<i64>,
}

/// 타깃 카탈로그에서 재생할 항목의 URL.
/// 앨범 슬러그와 트랙 ID로 조립한 경우에만 canonical로 표시된다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    url: String,
    canonical: bool,
}

impl ResolvedUrl {
    pub fn canonical(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            canonical: true,
        }
    }

    pub fn fallback(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            canonical: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn is_canonical(&self) -> bool {
        self.canonical
    }
}

impl fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// UI 쪽에 전달되는 사람이 읽을 수 있는 동기화 상태.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Running,
    Stopped,
    SourceNotRunning,
    WaitingForPlayback,
    Playing { title: String, artist: String },
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => f.write_str("Idle"),
            SyncStatus::Running => f.write_str("Running"),
            SyncStatus::Stopped => f.write_str("Stopped"),
            SyncStatus::SourceNotRunning => f.write_str("Spotify not running"),
            SyncStatus::WaitingForPlayback => f.write_str("Waiting for playback"),
            SyncStatus::Playing { title, artist } => write!(f, "Playing: {} — {}", title, artist),
        }
    }
}
