//! Sorted sets
//!
//! Redis-style sorted sets of profile ids. Each operation is atomic on its
//! own; callers that touch two sets do so with two separate operations.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use super::models::ProfileId;

/// Score-ordered membership store keyed by string
#[async_trait]
pub trait SortedSetStore: Send + Sync {
    /// Add `member` with `score`; returns true if the member was new
    ///
    /// Re-adding an existing member only updates its score.
    async fn zadd(&self, key: &str, score: i64, member: ProfileId) -> bool;

    /// Remove `member`; returns true if it was present
    async fn zrem(&self, key: &str, member: ProfileId) -> bool;

    /// Members ranked `start..=stop` by ascending score
    ///
    /// Negative indices count from the end (-1 is the last member).
    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Vec<ProfileId>;

    /// Score of `member`, if present
    async fn zscore(&self, key: &str, member: ProfileId) -> Option<i64>;

    /// Number of members
    async fn zcard(&self, key: &str) -> usize;
}

#[derive(Debug, Default)]
struct SortedSet {
    /// (score, member), ordered
    ranked: BTreeSet<(i64, ProfileId)>,
    scores: HashMap<ProfileId, i64>,
}

impl SortedSet {
    fn insert(&mut self, score: i64, member: ProfileId) -> bool {
        match self.scores.insert(member, score) {
            Some(previous) => {
                self.ranked.remove(&(previous, member));
                self.ranked.insert((score, member));
                false
            }
            None => {
                self.ranked.insert((score, member));
                true
            }
        }
    }

    fn remove(&mut self, member: ProfileId) -> bool {
        match self.scores.remove(&member) {
            Some(score) => {
                self.ranked.remove(&(score, member));
                true
            }
            None => false,
        }
    }

    fn range(&self, start: i64, stop: i64) -> Vec<ProfileId> {
        let len = self.ranked.len() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

        if start > stop || start >= len {
            return Vec::new();
        }

        self.ranked
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(|(_, member)| *member)
            .collect()
    }
}

/// In-process sorted set store
#[derive(Debug, Default)]
pub struct MemorySortedSets {
    sets: RwLock<HashMap<String, SortedSet>>,
}

impl MemorySortedSets {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SortedSetStore for MemorySortedSets {
    async fn zadd(&self, key: &str, score: i64, member: ProfileId) -> bool {
        let mut sets = self.sets.write().await;
        sets.entry(key.to_string())
            .or_default()
            .insert(score, member)
    }

    async fn zrem(&self, key: &str, member: ProfileId) -> bool {
        let mut sets = self.sets.write().await;
        let Some(set) = sets.get_mut(key) else {
            return false;
        };

        let removed = set.remove(member);
        if set.scores.is_empty() {
            sets.remove(key);
        }
        removed
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Vec<ProfileId> {
        let sets = self.sets.read().await;
        sets.get(key)
            .map(|set| set.range(start, stop))
            .unwrap_or_default()
    }

    async fn zscore(&self, key: &str, member: ProfileId) -> Option<i64> {
        let sets = self.sets.read().await;
        sets.get(key)
            .and_then(|set| set.scores.get(&member).copied())
    }

    async fn zcard(&self, key: &str) -> usize {
        let sets = self.sets.read().await;
        sets.get(key).map(|set| set.scores.len()).unwrap_or(0)
    }
}
