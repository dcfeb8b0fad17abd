//! Resource resolver
//!
//! Produces the discovery documents and public collections of local
//! profiles. Every operation first checks its feature switch; a disabled
//! endpoint answers 404 (400 for webfinger) exactly like a missing one.

use axum::http::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use super::nodeinfo::{NodeInfo, NodeInfoLinks, NodeInfoSource};
use super::webfinger::{self, WebFingerResponse};
use crate::config::AppConfig;
use crate::data::{
    KeyValueCache, OutboxSource, Profile, ProfileStore, Status, get_as, put_as, remember_as,
};
use crate::error::AppError;

const WEBFINGER_TTL: Duration = Duration::from_secs(60 * 60 * 12);
const OUTBOX_TTL: Duration = Duration::from_secs(60 * 15);
const OUTBOX_LIMIT: usize = 10;

const ACTIVITYSTREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";
const PUBLIC_COLLECTION: &str = "https://www.w3.org/ns/activitystreams#Public";

fn outbox_key(id: i64) -> String {
    format!("ap:outbox:latest_{OUTBOX_LIMIT}:pid:{id}")
}

/// Which follow collection is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Followers,
    Following,
}

pub struct Resolver {
    config: Arc<AppConfig>,
    cache: Arc<dyn KeyValueCache>,
    profiles: Arc<dyn ProfileStore>,
    outbox: Arc<dyn OutboxSource>,
    nodeinfo: NodeInfoSource,
}

impl Resolver {
    pub fn new(
        config: Arc<AppConfig>,
        cache: Arc<dyn KeyValueCache>,
        profiles: Arc<dyn ProfileStore>,
        outbox: Arc<dyn OutboxSource>,
        nodeinfo: NodeInfoSource,
    ) -> Self {
        Self {
            config,
            cache,
            profiles,
            outbox,
            nodeinfo,
        }
    }

    /// Resolve a webfinger `resource` to the JRD of a local account
    pub async fn webfinger(&self, resource: Option<&str>) -> Result<WebFingerResponse, AppError> {
        if !self.config.federation.webfinger_enabled {
            return Err(AppError::Disabled(StatusCode::BAD_REQUEST));
        }

        let resource = resource
            .filter(|resource| !resource.trim().is_empty())
            .ok_or_else(|| AppError::Validation("resource parameter is required".to_string()))?;

        let key = webfinger::cache_key(resource);
        if let Some(cached) = get_as::<WebFingerResponse>(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let address = webfinger::parse_resource(resource).ok_or(AppError::NotFound)?;
        if address.domain != self.config.server.domain.to_lowercase() {
            tracing::debug!(%resource, domain = %address.domain, "Webfinger for foreign domain");
            return Err(AppError::NotFound);
        }

        let profile = self
            .profiles
            .find_local_profile(&address.username)
            .await?
            .ok_or(AppError::NotFound)?;
        if !profile.is_active() {
            return Err(account_status(&profile));
        }

        let response = webfinger::generate_webfinger_response(
            &profile.username,
            &self.config.server.domain,
            &self.config.server.base_url(),
        );
        put_as(self.cache.as_ref(), &key, &response, WEBFINGER_TTL).await?;

        Ok(response)
    }

    /// XRD document advertising the webfinger template
    pub fn host_meta(&self) -> Result<String, AppError> {
        if !self.config.federation.webfinger_enabled {
            return Err(AppError::Disabled(StatusCode::NOT_FOUND));
        }
        Ok(webfinger::host_meta_document(&self.config.server.base_url()))
    }

    pub fn nodeinfo_well_known(&self) -> Result<NodeInfoLinks, AppError> {
        self.require_nodeinfo()?;
        Ok(self.nodeinfo.well_known(&self.config.server.base_url()))
    }

    pub async fn nodeinfo(&self) -> Result<NodeInfo, AppError> {
        self.require_nodeinfo()?;
        self.nodeinfo.document().await
    }

    /// Latest public activities of a local account as an `OrderedCollection`
    pub async fn outbox(&self, username: &str) -> Result<Value, AppError> {
        let activitypub = &self.config.federation.activitypub;
        if !activitypub.enabled || !activitypub.outbox {
            return Err(AppError::Disabled(StatusCode::NOT_FOUND));
        }

        let profile = self.public_profile(username).await?;
        remember_as(
            self.cache.as_ref(),
            &outbox_key(profile.id),
            OUTBOX_TTL,
            self.build_outbox(&profile),
        )
        .await
    }

    /// Followers or following collection of a local account
    ///
    /// Always an empty page; `id` echoes the requested URI.
    pub async fn collection(
        &self,
        kind: CollectionKind,
        username: &str,
        request_uri: &str,
    ) -> Result<Value, AppError> {
        self.require_activitypub()?;
        let profile = self.public_profile(username).await?;
        tracing::debug!(?kind, profile_id = profile.id, "Serving empty collection");

        Ok(json!({
            "@context": ACTIVITYSTREAMS_CONTEXT,
            "id": request_uri,
            "type": "OrderedCollectionPage",
            "totalItems": 0,
            "orderedItems": [],
        }))
    }

    /// Gate for the per-user inbox
    pub fn inbox_enabled(&self) -> Result<(), AppError> {
        self.require_activitypub()?;
        if !self.config.federation.activitypub.inbox {
            return Err(AppError::Disabled(StatusCode::NOT_FOUND));
        }
        Ok(())
    }

    /// Gate for the shared inbox
    pub fn shared_inbox_enabled(&self) -> Result<(), AppError> {
        self.require_activitypub()?;
        if !self.config.federation.activitypub.shared_inbox {
            return Err(AppError::Disabled(StatusCode::NOT_FOUND));
        }
        Ok(())
    }

    fn require_activitypub(&self) -> Result<(), AppError> {
        if !self.config.federation.activitypub.enabled {
            return Err(AppError::Disabled(StatusCode::NOT_FOUND));
        }
        Ok(())
    }

    fn require_nodeinfo(&self) -> Result<(), AppError> {
        if !self.config.federation.nodeinfo_enabled {
            return Err(AppError::Disabled(StatusCode::NOT_FOUND));
        }
        Ok(())
    }

    /// Local, unmoderated, public profile by username
    async fn public_profile(&self, username: &str) -> Result<Profile, AppError> {
        self.profiles
            .find_local_profile(username)
            .await?
            .filter(|profile| profile.is_active() && !profile.is_private)
            .ok_or(AppError::NotFound)
    }

    async fn build_outbox(&self, profile: &Profile) -> Result<Value, AppError> {
        let statuses = self
            .outbox
            .recent_public_statuses(profile.id, OUTBOX_LIMIT)
            .await?;
        let total = self.outbox.count_public_statuses(profile.id).await?;

        let actor_url = self.actor_url(&profile.username);
        let items: Vec<Value> = statuses
            .iter()
            .map(|status| create_activity(&actor_url, status))
            .collect();

        Ok(json!({
            "@context": ACTIVITYSTREAMS_CONTEXT,
            "id": format!("{}/outbox", actor_url),
            "type": "OrderedCollection",
            "totalItems": total,
            "orderedItems": items,
        }))
    }

    fn actor_url(&self, username: &str) -> String {
        format!("{}/users/{}", self.config.server.base_url(), username)
    }
}

/// Response for a profile carrying a moderation status
///
/// Deleted and disabled accounts look missing; anything else is gone.
pub fn account_status(profile: &Profile) -> AppError {
    match profile.status.as_deref() {
        Some("deleted" | "delete" | "disabled") => AppError::NotFound,
        Some(status) => AppError::Gone(status.to_string()),
        None => AppError::NotFound,
    }
}

fn create_activity(actor_url: &str, status: &Status) -> Value {
    let followers = format!("{}/followers", actor_url);
    let (to, cc) = if status.visibility == "unlisted" {
        (json!([followers]), json!([PUBLIC_COLLECTION]))
    } else {
        (json!([PUBLIC_COLLECTION]), json!([followers]))
    };
    let published = status.created_at.to_rfc3339();

    json!({
        "id": format!("{}/activity", status.uri),
        "type": "Create",
        "actor": actor_url,
        "published": published,
        "to": to,
        "cc": cc,
        "object": {
            "id": status.uri,
            "type": "Note",
            "attributedTo": actor_url,
            "content": status.content,
            "published": published,
            "url": status.uri,
            "to": to,
            "cc": cc,
        },
    })
}
