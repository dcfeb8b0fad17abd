//! Delivery audience
//!
//! The audience of a profile is the ordered, deduplicated list of remote
//! endpoints that its activities must be delivered to. It is cached for a
//! day and only invalidated when a follow edge is removed; new followers
//! join the audience when the entry expires.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::data::{EdgeStore, InstanceDirectory, KeyValueCache, ProfileId, remember_as};
use crate::error::AppError;

const AUDIENCE_TTL: Duration = Duration::from_secs(60 * 60 * 24);

pub fn cache_key(id: ProfileId) -> String {
    format!("services:follow:audience:{id}")
}

/// Drop the cached audience of `id`
pub async fn invalidate(cache: &dyn KeyValueCache, id: ProfileId) {
    cache.forget(&cache_key(id)).await;
}

pub struct AudienceCache {
    cache: Arc<dyn KeyValueCache>,
    edges: Arc<dyn EdgeStore>,
    instances: Arc<dyn InstanceDirectory>,
}

impl AudienceCache {
    pub fn new(
        cache: Arc<dyn KeyValueCache>,
        edges: Arc<dyn EdgeStore>,
        instances: Arc<dyn InstanceDirectory>,
    ) -> Self {
        Self {
            cache,
            edges,
            instances,
        }
    }

    /// Delivery endpoints of every remote follower of `id`
    ///
    /// Shared inboxes are preferred over personal ones. Unknown profiles
    /// and profiles without remote followers yield an empty list.
    pub async fn audience(&self, id: ProfileId) -> Result<Vec<String>, AppError> {
        remember_as(self.cache.as_ref(), &cache_key(id), AUDIENCE_TTL, async move {
            let followers = self.edges.remote_followers(id).await?;
            let inboxes = dedupe(
                followers
                    .iter()
                    .filter(|profile| !profile.is_local())
                    .filter_map(|profile| profile.delivery_inbox())
                    .map(str::to_string),
            );
            tracing::debug!(profile_id = id, inboxes = inboxes.len(), "Computed audience");
            Ok(inboxes)
        })
        .await
    }

    /// Audience restricted to hosts running `software`
    ///
    /// Software names compare case-insensitively. Inboxes without a
    /// parsable host are dropped.
    pub async fn software_audience(
        &self,
        id: ProfileId,
        software: &str,
    ) -> Result<Vec<String>, AppError> {
        let wanted = software.to_lowercase();
        let mut matching = Vec::new();

        for inbox in self.audience(id).await? {
            let Some(host) = url::Url::parse(&inbox)
                .ok()
                .and_then(|url| url.host_str().map(str::to_lowercase))
            else {
                continue;
            };

            let known = self.instances.software(&host).await?;
            if known.is_some_and(|name| name.to_lowercase() == wanted) {
                matching.push(inbox);
            }
        }

        Ok(dedupe(matching))
    }

    pub async fn invalidate(&self, id: ProfileId) {
        invalidate(self.cache.as_ref(), id).await;
    }
}

/// Drop repeats, keeping first-seen order
fn dedupe(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
