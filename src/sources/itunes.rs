use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::config::CatalogConfig;
use crate::models::{ResolvedUrl, SearchCandidate};
use crate::sources::CatalogSource;

const SONG_KIND: &str = "song";
const SHARE_LINK_LIMIT: u32 = 3;

/// iTunes Search API 클라이언트.
/// 제목과 아티스트로 곡을 검색하여 Apple Music 재생 URL을 만든다.
pub struct ItunesCatalog {
    client: reqwest::blocking::Client,
    endpoint: String,
    host: String,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "resultCount", default)]
    result_count: u32,
    #[serde(default)]
    results: Vec<SearchCandidate>,
}

/// 검색 결과 한 건을 어떤 방식으로 URL로 만들 수 있는지 분류한 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateLink {
    /// 앨범 슬러그 + 트랙 ID로 조립한 정식 곡 URL
    Canonical(String),
    /// 응답에 들어있던 트랙 URL 그대로
    Direct(String),
    /// 앨범 URL 뒤에 `?i={trackId}`를 붙인 URL
    Anchored(String),
    None,
}

impl CandidateLink {
    pub fn into_resolved(self) -> Option<ResolvedUrl> {
        match self {
            CandidateLink::Canonical(url) => Some(ResolvedUrl::canonical(url)),
            CandidateLink::Direct(url) | CandidateLink::Anchored(url) => {
                Some(ResolvedUrl::fallback(url))
            }
            CandidateLink::None => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CandidateLink::Canonical(_) => "canonical",
            CandidateLink::Direct(_) => "direct",
            CandidateLink::Anchored(_) => "anchored",
            CandidateLink::None => "-",
        }
    }
}

impl ItunesCatalog {
    /// 설정의 엔드포인트/호스트/타임아웃으로 클라이언트를 생성한다.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("카탈로그 HTTP 클라이언트 생성에 실패했습니다")?;

        Ok(Self {
            client,
            endpoint: config.search_endpoint.clone(),
            host: config.host.clone(),
            limit: config.limit,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// 검색 API를 호출하여 결과 목록을 그대로 반환한다.
    pub fn search(&self, title: &str, artist: &str, region: &str) -> Result<Vec<SearchCandidate>> {
        let url = search_url(&self.endpoint, title, artist, region, self.limit);

        let resp: SearchResponse = self
            .client
            .get(&url)
            .send()
            .context("카탈로그 검색에 실패했습니다")?
            .error_for_status()
            .context("카탈로그 검색 요청이 실패했습니다")?
            .json()
            .context("카탈로그 검색 응답 파싱에 실패했습니다")?;

        debug!(
            "Catalog search term={:?} -> {} result(s)",
            search_term(title, artist),
            resp.result_count
        );
        Ok(resp.results)
    }

    /// 공유용 검색 링크. 해석에는 쓰이지 않는다.
    pub fn build_search_url(&self, title: &str, artist: &str, region: &str) -> String {
        search_url(&self.endpoint, title, artist, region, SHARE_LINK_LIMIT)
    }
}

impl CatalogSource for ItunesCatalog {
    fn resolve(&self, title: &str, artist: &str, region: &str) -> Result<Option<ResolvedUrl>> {
        let results = self.search(title, artist, region)?;
        let resolved = resolve_from_results(&results, region, &self.host);
        debug!(
            "Catalog search term={:?} -> url={}",
            search_term(title, artist),
            resolved.as_ref().map(|u| u.as_str()).unwrap_or("nil")
        );
        Ok(resolved)
    }
}

/// 검색어는 "제목 아티스트" 형식이다.
pub fn search_term(title: &str, artist: &str) -> String {
    format!("{} {}", title, artist)
}

pub fn search_url(endpoint: &str, title: &str, artist: &str, region: &str, limit: u32) -> String {
    format!(
        "{}?term={}&country={}&entity=song&limit={}&media=music",
        endpoint,
        urlencoding::encode(&search_term(title, artist)),
        region.to_lowercase(),
        limit
    )
}

/// 결과 중 `kind == "song"`인 첫 항목을 골라 URL로 만든다.
pub fn resolve_from_results(
    results: &[SearchCandidate],
    region: &str,
    host: &str,
) -> Option<ResolvedUrl> {
    let candidate = select_candidate(results)?;
    classify_candidate(candidate, region, host).into_resolved()
}

pub fn select_candidate(results: &[SearchCandidate]) -> Option<&SearchCandidate> {
    results
        .iter()
        .find(|c| c.kind.as_deref() == Some(SONG_KIND))
}

/// 우선순위: 정식 곡 URL → 트랙 URL → `?i=` 앵커 앨범 URL.
pub fn classify_candidate(candidate: &SearchCandidate, region: &str, host: &str) -> CandidateLink {
    if let (Some(collection), Some(item_id)) = (&candidate.collection_url, candidate.item_id) {
        if let Some(slug) = album_slug(collection) {
            return CandidateLink::Canonical(format!(
                "https://{}/{}/song/{}/{}",
                host,
                region.to_lowercase(),
                slug,
                item_id
            ));
        }
    }

    if let Some(direct) = &candidate.direct_url {
        return CandidateLink::Direct(direct.clone());
    }

    if let (Some(collection), Some(item_id)) = (&candidate.collection_url, candidate.item_id) {
        return CandidateLink::Anchored(format!("{}?i={}", collection, item_id));
    }

    CandidateLink::None
}

/// URL 경로에서 `album` 세그먼트 바로 다음 세그먼트를 찾는다.
fn album_slug(collection_url: &str) -> Option<String> {
    let url = reqwest::Url::parse(collection_url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.collect();
    let idx = segments.iter().position(|s| *s == "album")?;
    segments
        .get(idx + 1)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "music.apple.com";

    fn parse(json: &str) -> Vec<SearchCandidate> {
        let resp: SearchResponse = serde_json::from_str(json).expect("응답 파싱 실패");
        resp.results
    }

    #[test]
    fn test_canonical_wins_over_direct() {
        let results = parse(
            r#"{"resultCount": 1, "results": [{
                "kind": "song",
                "trackId": 1440857781,
                "trackViewUrl": "https://music.apple.com/us/album/blinding-lights/1440857777?i=1440857781",
                "collectionViewUrl": "https://music.apple.com/us/album/blinding-lights/1440857777?uo=4"
            }]}"#,
        );
        let url = resolve_from_results(&results, "US", HOST).unwrap();
        assert_eq!(
            url.as_str(),
            "https://music.apple.com/us/song/blinding-lights/1440857781"
        );
        assert!(url.is_canonical());
    }

    #[test]
    fn test_direct_when_slug_missing() {
        let results = parse(
            r#"{"resultCount": 1, "results": [{
                "kind": "song",
                "trackId": 42,
                "trackViewUrl": "https://music.apple.com/us/song/x/42",
                "collectionViewUrl": "https://music.apple.com/us/playlist/x/1"
            }]}"#,
        );
        let url = resolve_from_results(&results, "US", HOST).unwrap();
        assert_eq!(url.as_str(), "https://music.apple.com/us/song/x/42");
        assert!(!url.is_canonical());
    }

    #[test]
    fn test_anchored_when_only_collection() {
        let results = parse(
            r#"{"resultCount": 1, "results": [{
                "kind": "song",
                "trackId": 42,
                "collectionViewUrl": "https://music.apple.com/us/collection/1"
            }]}"#,
        );
        let url = resolve_from_results(&results, "US", HOST).unwrap();
        assert_eq!(url.as_str(), "https://music.apple.com/us/collection/1?i=42");
    }

    #[test]
    fn test_album_segment_at_end_is_not_a_slug() {
        let candidate = SearchCandidate {
            kind: Some("song".to_string()),
            item_id: Some(7),
            collection_url: Some("https://music.apple.com/us/album".to_string()),
            direct_url: None,
        };
        assert_eq!(
            classify_candidate(&candidate, "us", HOST),
            CandidateLink::Anchored("https://music.apple.com/us/album?i=7".to_string())
        );
    }

    #[test]
    fn test_nothing_usable() {
        let results = parse(r#"{"resultCount": 1, "results": [{"kind": "song"}]}"#);
        assert!(resolve_from_results(&results, "US", HOST).is_none());
    }

    #[test]
    fn test_no_results() {
        let results = parse(r#"{"resultCount": 0, "results": []}"#);
        assert!(resolve_from_results(&results, "US", HOST).is_none());

        let results = parse(r#"{}"#);
        assert!(results.is_empty());
    }

    #[test]
    fn test_no_song_kind() {
        let results = parse(
            r#"{"resultCount": 2, "results": [
                {"kind": "music-video", "trackId": 1, "trackViewUrl": "https://x/1"},
                {"trackId": 2, "trackViewUrl": "https://x/2"}
            ]}"#,
        );
        assert!(resolve_from_results(&results, "US", HOST).is_none());
    }

    #[test]
    fn test_first_song_is_selected() {
        let results = parse(
            r#"{"resultCount": 3, "results": [
                {"kind": "music-video", "trackViewUrl": "https://x/video"},
                {"kind": "song", "trackViewUrl": "https://x/first"},
                {"kind": "song", "trackViewUrl": "https://x/second"}
            ]}"#,
        );
        let url = resolve_from_results(&results, "US", HOST).unwrap();
        assert_eq!(url.as_str(), "https://x/first");
    }

    #[test]
    fn test_region_is_lowercased() {
        let candidate = SearchCandidate {
            kind: Some("song".to_string()),
            item_id: Some(9),
            collection_url: Some("https://music.apple.com/kr/album/slug/1".to_string()),
            direct_url: None,
        };
        assert_eq!(
            classify_candidate(&candidate, "KR", HOST),
            CandidateLink::Canonical("https://music.apple.com/kr/song/slug/9".to_string())
        );
    }

    #[test]
    fn test_search_url() {
        let url = search_url("https://itunes.apple.com/search", "Song", "Artist", "US", 10);
        assert_eq!(
            url,
            "https://itunes.apple.com/search?term=Song%20Artist&country=us&entity=song&limit=10&media=music"
        );
    }

    #[test]
    fn test_search_url_escapes_reserved_characters() {
        let url = search_url("https://itunes.apple.com/search", "A&B", "C=D", "us", 10);
        assert!(url.contains("term=A%26B%20C%3DD&"));
    }

    /// iTunes Search API를 실제로 호출하는 통합 테스트.
    /// 실행: cargo test itunes -- --ignored
    #[test]
    #[ignore]
    fn test_resolve_live() {
        let catalog = ItunesCatalog::new(&CatalogConfig::default()).expect("클라이언트 생성 실패");
        let url = catalog
            .resolve("Blinding Lights", "The Weeknd", "US")
            .expect("검색 실패")
            .expect("결과 없음");
        println!("해석된 URL: {}", url);
        assert!(url.as_str().starts_with("https://"));
    }
}
