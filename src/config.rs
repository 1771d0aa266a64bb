use std::path::PathBuf;

use anyhow::Result;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

const DEFAULT_REGION: &str = "US";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// 2글자 국가 코드. 없으면 로케일에서 추론한다.
    pub region: Option<String>,
    /// error / warn / info / debug / trace. `--verbose`가 우선한다.
    pub log_level: Option<String>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub target: TargetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub poll_interval_ms: u64,
    /// 해석에 실패한 트랙을 같은 트랙이 계속 재생될 때 다시 시도할 횟수
    pub max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 800,
            max_retries: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// AppleScript로 조회할 앱 이름. Spotify 용어를 지원해야 한다.
    pub application: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            application: "Spotify".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub search_endpoint: String,
    pub host: String,
    pub timeout_secs: u64,
    pub limit: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            search_endpoint: "https://itunes.apple.com/search".to_string(),
            host: "music.apple.com".to_string(),
            timeout_secs: 10,
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DispatcherKind {
    #[default]
    Shortcut,
    OpenLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub dispatcher: DispatcherKind,
    pub shortcut_name: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherKind::Shortcut,
            shortcut_name: "Play Music From URL (new)".to_string(),
        }
    }
}

impl Config {
    /// 설정된 국가 코드, 없으면 로케일 환경변수에서 추론, 그래도 없으면 "US".
    pub fn region(&self) -> String {
        self.region
            .as_ref()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .or_else(region_from_env)
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// 알 수 없는 값이면 None.
    pub fn log_level(&self) -> Option<LevelFilter> {
        self.log_level
            .as_deref()
            .and_then(|level| level.trim().parse().ok())
    }
}

fn region_from_env() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find_map(|value| locale_region(&value))
}

/// "ko_KR.UTF-8" → "KR". 국가 부분이 없으면 None.
fn locale_region(locale: &str) -> Option<String> {
    let base = locale.split(['.', '@']).next()?;
    let region = base.split(['_', '-']).nth(1)?;
    if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(region.to_ascii_uppercase())
    } else {
        None
    }
}

fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("amsync")
        .join("config.toml")
}

pub fn load_config() -> Config {
    let path = config_path();
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str(&content).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}

pub fn save_config(config: &Config) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_region() {
        assert_eq!(locale_region("ko_KR.UTF-8").as_deref(), Some("KR"));
        assert_eq!(locale_region("en-gb").as_deref(), Some("GB"));
        assert_eq!(locale_region("C"), None);
        assert_eq!(locale_region("C.UTF-8"), None);
    }

    #[test]
    fn test_explicit_region_wins() {
        let cfg = Config {
            region: Some(" jp ".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.region(), "jp");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            region = "KR"

            [sync]
            poll_interval_ms = 500

            [target]
            dispatcher = "open-location"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.region.as_deref(), Some("KR"));
        assert_eq!(cfg.sync.poll_interval_ms, 500);
        assert_eq!(cfg.sync.max_retries, 1);
        assert_eq!(cfg.catalog.host, "music.apple.com");
        assert_eq!(cfg.target.dispatcher, DispatcherKind::OpenLocation);
        assert_eq!(cfg.target.shortcut_name, "Play Music From URL (new)");
        assert_eq!(cfg.source.application, "Spotify");
        assert_eq!(cfg.log_level(), None);
    }

    #[test]
    fn test_source_and_log_level() {
        let cfg: Config = toml::from_str(
            r#"
            log_level = "Debug"

            [source]
            application = "Spotify Beta"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_level(), Some(LevelFilter::Debug));
        assert_eq!(cfg.source.application, "Spotify Beta");

        let cfg = Config {
            log_level: Some("loud".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.log_level(), None);
    }
}
