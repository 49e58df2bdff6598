//! 세션 중복 캐시
//!
//! 프로세스 수명 동안 이미 본 라인(정리된 내용의 SHA-256)을 기억합니다.
//! 용량을 넘으면 점진적으로 내보내지 않고 전체를 비웁니다. 비운 직후에는
//! 같은 라인이 다시 분류될 수 있으며, 이 경우 서버의 ID 멱등성이 중복을 흡수합니다.

use std::collections::HashSet;

use tracing::info;

use crate::classifier::line_digest;

/// 기본 용량
pub const DEFAULT_DEDUP_CAPACITY: usize = 100_000;

/// 세션 중복 캐시
#[derive(Debug)]
pub struct SessionDedupCache {
    seen: HashSet<[u8; 32]>,
    capacity: usize,
    clears: u64,
}

impl Default for SessionDedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl SessionDedupCache {
    /// 주어진 용량으로 캐시를 생성합니다 (최소 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            capacity: capacity.max(1),
            clears: 0,
        }
    }

    /// 라인을 기록합니다. 처음 보는 라인이면 `true`.
    pub fn insert(&mut self, line: &str) -> bool {
        let inserted = self.seen.insert(line_digest(line));
        if self.seen.len() > self.capacity {
            self.clears += 1;
            info!(
                capacity = self.capacity,
                clears = self.clears,
                "session dedup cache full, clearing"
            );
            self.seen.clear();
        }
        inserted
    }

    /// 라인 기록을 되돌립니다. 전송 실패로 같은 구간을 다시 읽어야 할 때 사용합니다.
    pub fn forget(&mut self, line: &str) -> bool {
        self.seen.remove(&line_digest(line))
    }

    /// 이미 본 라인인지 확인합니다.
    pub fn contains(&self, line: &str) -> bool {
        self.seen.contains(&line_digest(line))
    }

    /// 현재 항목 수
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 용량 초과로 비운 횟수
    pub fn clears(&self) -> u64 {
        self.clears
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn repeated_line_is_rejected() {
        let mut cache = SessionDedupCache::new(10);
        assert!(cache.insert("Failed password for root"));
        assert!(!cache.insert("Failed password for root"));
        assert!(cache.contains("Failed password for root"));
    }

    #[test]
    fn whitespace_variants_are_the_same_line() {
        let mut cache = SessionDedupCache::new(10);
        assert!(cache.insert("  disk error on sda \r"));
        assert!(!cache.insert("disk error on sda"));
    }

    #[test]
    fn overflow_clears_everything() {
        let mut cache = SessionDedupCache::new(2);
        cache.insert("line one");
        cache.insert("line two");
        assert_eq!(cache.len(), 2);

        cache.insert("line three");
        assert!(cache.is_empty());
        assert_eq!(cache.clears(), 1);
        // 비운 뒤에는 다시 새 라인으로 취급
        assert!(cache.insert("line one"));
    }

    #[test]
    fn forgotten_line_is_new_again() {
        let mut cache = SessionDedupCache::new(10);
        cache.insert("Invalid user guest from 10.0.0.1");
        assert!(cache.forget("Invalid user guest from 10.0.0.1"));
        assert!(cache.insert("Invalid user guest from 10.0.0.1"));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(SessionDedupCache::new(0).capacity(), 1);
    }

    proptest! {
        #[test]
        fn size_never_exceeds_capacity(
            capacity in 1usize..50,
            lines in proptest::collection::vec("[a-z ]{0,20}", 0..200),
        ) {
            let mut cache = SessionDedupCache::new(capacity);
            for line in &lines {
                cache.insert(line);
                prop_assert!(cache.len() <= capacity);
            }
        }
    }
}
