//! Relationship index
//!
//! Keeps the follow graph in two directed sorted sets per profile:
//! `following[actor]` and `followers[target]`, scored by member id. The
//! durable edge store stays authoritative; the sets are a fast index over it
//! that may briefly diverge (two-set writes are not transactional) and are
//! repaired by [`RelationshipIndex::reconcile_edge`] and
//! [`RelationshipIndex::rebuild`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::audience;
use crate::data::{
    EdgeStore, KeyValueCache, ProfileId, RelationshipStatus, SortedSetStore, put_as, remember_as,
};
use crate::error::AppError;
use crate::metrics::RELATIONSHIP_REPAIRS_TOTAL;

const FOLLOWING_KEY: &str = "services:follow:following:id:";
const FOLLOWERS_KEY: &str = "services:follow:followers:id:";

/// Default inclusive upper bound for range reads
pub const DEFAULT_RANGE_STOP: i64 = 10;

const STATE_TTL: Duration = Duration::from_secs(60 * 60 * 24);

pub fn following_key(id: ProfileId) -> String {
    format!("{FOLLOWING_KEY}{id}")
}

pub fn followers_key(id: ProfileId) -> String {
    format!("{FOLLOWERS_KEY}{id}")
}

// =============================================================================
// Relationship state
// =============================================================================

/// Cached follow flags for an ordered pair of profiles
pub struct RelationshipState {
    cache: Arc<dyn KeyValueCache>,
    edges: Arc<dyn EdgeStore>,
}

impl RelationshipState {
    pub fn new(cache: Arc<dyn KeyValueCache>, edges: Arc<dyn EdgeStore>) -> Self {
        Self { cache, edges }
    }

    fn key(actor: ProfileId, target: ProfileId) -> String {
        format!("relationship:state:{actor}:{target}")
    }

    /// Cached state, computed from the edge store on miss
    pub async fn get(
        &self,
        actor: ProfileId,
        target: ProfileId,
    ) -> Result<RelationshipStatus, AppError> {
        remember_as(
            self.cache.as_ref(),
            &Self::key(actor, target),
            STATE_TTL,
            self.compute(actor, target),
        )
        .await
    }

    /// Drop the cached state and store a freshly computed one
    pub async fn refresh(
        &self,
        actor: ProfileId,
        target: ProfileId,
    ) -> Result<RelationshipStatus, AppError> {
        let key = Self::key(actor, target);
        self.cache.forget(&key).await;

        let status = self.compute(actor, target).await?;
        put_as(self.cache.as_ref(), &key, &status, STATE_TTL).await?;
        Ok(status)
    }

    async fn compute(
        &self,
        actor: ProfileId,
        target: ProfileId,
    ) -> Result<RelationshipStatus, AppError> {
        Ok(RelationshipStatus {
            following: self.edges.edge_exists(actor, target).await?,
            followed_by: self.edges.edge_exists(target, actor).await?,
        })
    }
}

// =============================================================================
// Index
// =============================================================================

/// Result of reconciling one edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRepair {
    /// Both sets already agreed with the edge store
    Consistent,
    /// A missing side was added
    Added,
    /// A stale side was removed
    Removed,
}

/// Membership changes made while rebuilding a profile's sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub added: usize,
    pub removed: usize,
}

pub struct RelationshipIndex {
    sets: Arc<dyn SortedSetStore>,
    edges: Arc<dyn EdgeStore>,
    cache: Arc<dyn KeyValueCache>,
    state: RelationshipState,
}

impl RelationshipIndex {
    pub fn new(
        sets: Arc<dyn SortedSetStore>,
        edges: Arc<dyn EdgeStore>,
        cache: Arc<dyn KeyValueCache>,
    ) -> Self {
        let state = RelationshipState::new(cache.clone(), edges.clone());
        Self {
            sets,
            edges,
            cache,
            state,
        }
    }

    pub fn state(&self) -> &RelationshipState {
        &self.state
    }

    /// Record that `actor` follows `target`
    ///
    /// Idempotent. Does not touch cached audiences.
    pub async fn add(&self, actor: ProfileId, target: ProfileId) -> Result<(), AppError> {
        self.state.refresh(actor, target).await?;
        self.link(actor, target).await;
        tracing::debug!(actor, target, "Follow edge indexed");
        Ok(())
    }

    /// Record that `actor` no longer follows `target`
    ///
    /// Idempotent. Busts the cached audiences of both profiles.
    pub async fn remove(&self, actor: ProfileId, target: ProfileId) -> Result<(), AppError> {
        self.state.refresh(actor, target).await?;
        self.unlink(actor, target).await;
        audience::invalidate(self.cache.as_ref(), actor).await;
        audience::invalidate(self.cache.as_ref(), target).await;
        tracing::debug!(actor, target, "Follow edge removed from index");
        Ok(())
    }

    /// Followers of `id` ranked `start..=stop` (negative indices from the end)
    pub async fn followers(&self, id: ProfileId, start: i64, stop: i64) -> Vec<ProfileId> {
        self.sets.zrange(&followers_key(id), start, stop).await
    }

    /// Profiles followed by `id` ranked `start..=stop`
    pub async fn following(&self, id: ProfileId, start: i64, stop: i64) -> Vec<ProfileId> {
        self.sets.zrange(&following_key(id), start, stop).await
    }

    /// Authoritative follow check against the edge store
    pub async fn follows(&self, actor: ProfileId, target: ProfileId) -> Result<bool, AppError> {
        self.edges.edge_exists(actor, target).await
    }

    /// Fast follow check against the index
    pub async fn follows_indexed(&self, actor: ProfileId, target: ProfileId) -> bool {
        self.sets
            .zscore(&following_key(actor), target)
            .await
            .is_some()
    }

    pub async fn follower_count(&self, id: ProfileId) -> usize {
        self.sets.zcard(&followers_key(id)).await
    }

    pub async fn following_count(&self, id: ProfileId) -> usize {
        self.sets.zcard(&following_key(id)).await
    }

    /// Make both sets agree with the edge store for one pair
    pub async fn reconcile_edge(
        &self,
        actor: ProfileId,
        target: ProfileId,
    ) -> Result<EdgeRepair, AppError> {
        let durable = self.edges.edge_exists(actor, target).await?;
        let in_following = self.follows_indexed(actor, target).await;
        let in_followers = self
            .sets
            .zscore(&followers_key(target), actor)
            .await
            .is_some();

        let repair = match (durable, in_following, in_followers) {
            (true, true, true) | (false, false, false) => EdgeRepair::Consistent,
            (true, _, _) => {
                self.link(actor, target).await;
                EdgeRepair::Added
            }
            (false, _, _) => {
                self.unlink(actor, target).await;
                audience::invalidate(self.cache.as_ref(), actor).await;
                audience::invalidate(self.cache.as_ref(), target).await;
                EdgeRepair::Removed
            }
        };

        if repair != EdgeRepair::Consistent {
            let action = if repair == EdgeRepair::Added { "added" } else { "removed" };
            RELATIONSHIP_REPAIRS_TOTAL.with_label_values(&[action]).inc();
            tracing::info!(actor, target, action, "Repaired one-sided follow edge");
        }

        Ok(repair)
    }

    /// Re-derive both sets of `id` from the edge store
    ///
    /// Applied as a diff so readers never observe an emptied set. The
    /// counterpart set of every touched member is repaired too.
    pub async fn rebuild(&self, id: ProfileId) -> Result<RebuildReport, AppError> {
        let mut report = RebuildReport::default();

        let durable_followers = self.edges.follower_ids(id).await?;
        let indexed_followers = self.followers(id, 0, -1).await;
        for actor in diff(&durable_followers, &indexed_followers) {
            self.unlink(actor, id).await;
            report.removed += 1;
        }
        for actor in durable_followers {
            if self.link(actor, id).await {
                report.added += 1;
            }
        }

        let durable_following = self.edges.following_ids(id).await?;
        let indexed_following = self.following(id, 0, -1).await;
        for target in diff(&durable_following, &indexed_following) {
            self.unlink(id, target).await;
            report.removed += 1;
        }
        for target in durable_following {
            if self.link(id, target).await {
                report.added += 1;
            }
        }

        if report.removed > 0 {
            audience::invalidate(self.cache.as_ref(), id).await;
        }
        if report != RebuildReport::default() {
            RELATIONSHIP_REPAIRS_TOTAL
                .with_label_values(&["added"])
                .inc_by(report.added as u64);
            RELATIONSHIP_REPAIRS_TOTAL
                .with_label_values(&["removed"])
                .inc_by(report.removed as u64);
            tracing::info!(
                profile_id = id,
                added = report.added,
                removed = report.removed,
                "Rebuilt relationship sets"
            );
        }

        Ok(report)
    }

    /// Returns true if either side was missing
    async fn link(&self, actor: ProfileId, target: ProfileId) -> bool {
        let following = self.sets.zadd(&following_key(actor), target, target).await;
        let followers = self.sets.zadd(&followers_key(target), actor, actor).await;
        following || followers
    }

    async fn unlink(&self, actor: ProfileId, target: ProfileId) {
        self.sets.zrem(&following_key(actor), target).await;
        self.sets.zrem(&followers_key(target), actor).await;
    }
}

/// Members of `indexed` absent from `durable`
fn diff(durable: &[ProfileId], indexed: &[ProfileId]) -> Vec<ProfileId> {
    let durable: HashSet<_> = durable.iter().copied().collect();
    indexed
        .iter()
        .copied()
        .filter(|member| !durable.contains(member))
        .collect()
}
