pub mod itunes;
pub mod spotify;

use anyhow::Result;

use crate::models::{PlaybackState, ResolvedUrl};

/// 재생 상태를 폴링할 수 있는 소스 플레이어 트레이트.
pub trait SourcePlayer: Send + Sync {
    /// 현재 재생 상태를 조회한다.
    fn playback_state(&self) -> Result<PlaybackState>;
    /// 플레이어가 실행 중이 아니면 실행을 요청한다.
    /// 기본 구현은 아무 것도 하지 않는다.
    fn ensure_running(&self) -> Result<()> {
        Ok(())
    }
}

/// 제목/아티스트로 타깃 카탈로그의 재생 URL을 찾는 트레이트.
pub trait CatalogSource: Send + Sync {
    /// 검색 결과가 없거나 URL을 만들 수 없으면 `Ok(None)`을 반환한다.
    fn resolve(&self, title: &str, artist: &str, region: &str) -> Result<Option<ResolvedUrl>>;
}
