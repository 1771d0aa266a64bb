use std::collections::HashMap;

use crate::models::{ResolvedUrl, TrackIdentity};

/// 트랙 식별자 → 해석된 URL 캐시.
/// 프로세스가 살아있는 동안 항목을 제거하지 않는다.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<TrackIdentity, ResolvedUrl>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &TrackIdentity) -> Option<&ResolvedUrl> {
        self.entries.get(identity)
    }

    /// 이미 있는 식별자면 새 URL로 덮어쓴다.
    pub fn put(&mut self, identity: TrackIdentity, url: ResolvedUrl) {
        self.entries.insert(identity, url);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
