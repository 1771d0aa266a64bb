use crate::models::TrackIdentity;

const TRACK_URI_MARKER: &str = ":track:";
const TRACK_PATH_MARKER: &str = "/track/";
const EPISODE_URI_MARKER: &str = ":episode:";
const LOCAL_URI_MARKER: &str = ":local:";

/// 소스 플레이어의 원시 항목 ID를 트랙 식별자로 변환한다.
///
/// 지원하는 형식:
/// - "spotify:track:abc123" → "abc123"
/// - "https://open.spotify.com/track/abc123?si=x" → "abc123"
/// - "spotify:episode:..." / "spotify:local:..." → None (카탈로그 트랙이 아님)
/// - 그 외에는 입력을 그대로 식별자로 쓴다
pub fn extract_identity(raw: &str) -> Option<TrackIdentity> {
    if raw.contains(TRACK_URI_MARKER) {
        return raw.rsplit(':').next().map(TrackIdentity::new);
    }

    if raw.contains(TRACK_PATH_MARKER) {
        if let Some(segment) = raw.rsplit(TRACK_PATH_MARKER).next() {
            let id = segment.split('?').next().unwrap_or(segment);
            return Some(TrackIdentity::new(id));
        }
    }

    if is_ineligible(raw) {
        return None;
    }

    Some(TrackIdentity::new(raw))
}

/// 에피소드와 로컬 파일은 카탈로그에 대응 항목이 없다.
pub fn is_ineligible(raw: &str) -> bool {
    raw.contains(EPISODE_URI_MARKER) || raw.contains(LOCAL_URI_MARKER)
}
