use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::automation;
use crate::config::{DispatcherKind, TargetConfig};
use crate::models::ResolvedUrl;

const RUN_SHORTCUT_SCRIPT: &str = r#"
on run argv
    tell application "Shortcuts Events"
        run shortcut named (item 1 of argv) with input (item 2 of argv)
    end tell
end run
"#;

const OPEN_LOCATION_SCRIPT: &str = r#"
on run argv
    tell application "Music"
        open location (item 1 of argv)
        delay 0.8
        play
    end tell
end run
"#;

const MUSIC_CONSENT_SCRIPT: &str = r#"tell application "Music" to get name"#;

/// 해석된 URL을 타깃 플레이어에서 재생시키는 트레이트.
pub trait Dispatcher: Send + Sync {
    /// 동기화 시작 시 한 번 호출된다. 자동화 권한 요청 등에 쓴다.
    fn prepare(&self) -> Result<()> {
        Ok(())
    }
    fn dispatch(&self, url: &ResolvedUrl) -> Result<()>;
}

/// 사용자가 설치한 단축어에 URL을 입력으로 넘겨 실행한다.
pub struct ShortcutDispatcher {
    shortcut_name: String,
}

impl ShortcutDispatcher {
    pub fn new(shortcut_name: impl Into<String>) -> Self {
        Self {
            shortcut_name: shortcut_name.into(),
        }
    }
}

impl Dispatcher for ShortcutDispatcher {
    fn prepare(&self) -> Result<()> {
        automation::run_script(MUSIC_CONSENT_SCRIPT, &[])?;
        Ok(())
    }

    fn dispatch(&self, url: &ResolvedUrl) -> Result<()> {
        debug!("Sending URL to Shortcuts: name={} url={}", self.shortcut_name, url);
        automation::run_script(RUN_SHORTCUT_SCRIPT, &[self.shortcut_name.as_str(), url.as_str()])?;
        Ok(())
    }
}

/// Music 앱에 직접 `open location` 후 재생을 요청한다.
#[derive(Debug, Default)]
pub struct OpenLocationDispatcher;

impl Dispatcher for OpenLocationDispatcher {
    fn prepare(&self) -> Result<()> {
        automation::run_script(MUSIC_CONSENT_SCRIPT, &[])?;
        Ok(())
    }

    fn dispatch(&self, url: &ResolvedUrl) -> Result<()> {
        debug!("openMusic url={}", url);
        automation::run_script(OPEN_LOCATION_SCRIPT, &[url.as_str()])?;
        Ok(())
    }
}

pub fn build_dispatcher(config: &TargetConfig) -> Arc<dyn Dispatcher> {
    match config.dispatcher {
        DispatcherKind::Shortcut => Arc::new(ShortcutDispatcher::new(&config.shortcut_name)),
        DispatcherKind::OpenLocation => Arc::new(OpenLocationDispatcher),
    }
}
