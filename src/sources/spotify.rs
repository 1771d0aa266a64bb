use anyhow::Result;
use log::{debug, info};

use crate::automation;
use crate::config::SourceConfig;
use crate::models::{NowPlayingSnapshot, PlaybackState};
use crate::sources::SourcePlayer;

/// 필드 구분자 (ASCII unit separator). 제목에 `|`가 들어가도 깨지지 않는다.
const FIELD_SEPARATOR: char = '\u{1f}';
const STATE_PREFIX: &str = "STATE";
const NOT_RUNNING: &str = "not running";

const LAUNCHED: &str = "launched";

// 앱 이름은 argv로 받고, 용어는 Spotify 사전을 쓴다
const NOW_PLAYING_SCRIPT: &str = r#"
on run argv
    set appName to item 1 of argv
    set sep to ASCII character 31
    if application appName is running then
        using terms from application "Spotify"
            tell application appName
                set s to player state as text
                if s is "playing" then
                    set t to current track
                    return (spotify url of t) & sep & (name of t) & sep & (artist of t) & sep & (album of t) & sep & (duration of t as text) & sep & (player position as text)
                else
                    return "STATE" & sep & s
                end if
            end tell
        end using terms from
    else
        return "STATE" & sep & "not running"
    end if
end run
"#;

const LAUNCH_SCRIPT: &str = r#"
on run argv
    set appName to item 1 of argv
    if application appName is running then
        return "running"
    end if
    tell application appName to launch
    return "launched"
end run
"#;

/// AppleScript로 Spotify 데스크톱 앱의 재생 상태를 조회하는 어댑터.
#[derive(Debug)]
pub struct SpotifyPlayer {
    application: String,
}

impl SpotifyPlayer {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            application: config.application.clone(),
        }
    }
}

impl SourcePlayer for SpotifyPlayer {
    fn playback_state(&self) -> Result<PlaybackState> {
        let output = automation::run_script(NOW_PLAYING_SCRIPT, &[self.application.as_str()])?;
        Ok(parse_now_playing(&output))
    }

    fn ensure_running(&self) -> Result<()> {
        let output = automation::run_script(LAUNCH_SCRIPT, &[self.application.as_str()])?;
        if was_launched(&output) {
            info!("Requested launch of {} for automation consent", self.application);
        } else {
            debug!("{} already running", self.application);
        }
        Ok(())
    }
}

/// 실행 스크립트가 앱을 새로 띄웠는지. 이미 떠 있었으면 "running"이 온다.
fn was_launched(output: &str) -> bool {
    output.trim() == LAUNCHED
}

/// 스크립트 출력을 재생 상태로 변환한다.
/// 필드 수나 숫자 형식이 맞지 않으면 재생 중이 아닌 것으로 본다.
pub fn parse_now_playing(output: &str) -> PlaybackState {
    let output = output.trim_end_matches(['\r', '\n']);
    let parts: Vec<&str> = output.split(FIELD_SEPARATOR).collect();

    if parts.first() == Some(&STATE_PREFIX) {
        let state = parts.get(1).copied().unwrap_or_default();
        return if state == NOT_RUNNING {
            PlaybackState::NotRunning
        } else {
            PlaybackState::NotPlaying
        };
    }

    match parse_snapshot(&parts) {
        Some(snapshot) => {
            debug!(
                "NowPlaying: id={} name={} artist={} album={} dur={}ms pos={:.2}",
                snapshot.raw_identifier,
                snapshot.title,
                snapshot.artist,
                snapshot.album,
                snapshot.duration_ms,
                snapshot.position_sec
            );
            PlaybackState::Playing(snapshot)
        }
        None => {
            debug!("Failed to parse now playing output: {:?}", output);
            PlaybackState::NotPlaying
        }
    }
}

fn parse_snapshot(parts: &[&str]) -> Option<NowPlayingSnapshot> {
    if parts.len() != 6 {
        return None;
    }

    let duration_ms = parts[4].trim().parse::<i64>().ok()?;
    // 로케일에 따라 소수점이 쉼표로 출력된다
    let position_sec = parts[5].trim().replace(',', ".").parse::<f64>().ok()?;

    Some(NowPlayingSnapshot {
        raw_identifier: parts[0].to_string(),
        title: parts[1].to_string(),
        artist: parts[2].to_string(),
        album: parts[3].to_string(),
        duration_ms,
        position_sec,
    })
}
