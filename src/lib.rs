//! fedigate - the federation edge of an ActivityPub node
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Well-known discovery (WebFinger, host-meta, NodeInfo)    │
//! │  - ActivityPub inboxes, outbox and collections              │
//! │  - Prometheus metrics                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Federation Layer                         │
//! │  - Inbox dispatcher and prioritized queue lanes             │
//! │  - Relationship index (followers / following)               │
//! │  - Audience cache and resource resolver                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Moka key-value cache                                     │
//! │  - In-memory sorted sets                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `federation`: Dispatch, relationships, audiences and discovery
//! - `data`: Database, cache and sorted-set layer
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod federation;
pub mod metrics;

use std::sync::Arc;

use data::{Database, EdgeStore, KeyValueCache, MemorySortedSets, MokaCache, ProfileStore};
use federation::{
    AudienceCache, InboxDispatcher, LaneQueue, NodeInfoSource, RebuildReport, RelationshipIndex,
    Resolver,
};

/// Application state shared across all handlers
///
/// Cloned for each request; every component is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration snapshot
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<Database>,

    /// Key-value cache (volatile)
    pub cache: Arc<MokaCache>,

    /// Inbox lanes drained by the worker pool
    pub queue: Arc<LaneQueue>,

    pub dispatcher: Arc<InboxDispatcher>,

    /// Followers / following sets (volatile, rebuilt from the database)
    pub relationships: Arc<RelationshipIndex>,

    pub audience: Arc<AudienceCache>,

    pub resolver: Arc<Resolver>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Wire the cache, queue and federation components
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Database::connect(&config.database.path).await?;
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let state = Self::with_database(config, db);
        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Wire every component around an open database
    pub fn with_database(config: config::AppConfig, db: Database) -> Self {
        let config = Arc::new(config);
        let db = Arc::new(db);

        let cache = Arc::new(MokaCache::new(config.cache.max_capacity));
        let kv: Arc<dyn KeyValueCache> = cache.clone();
        let edges: Arc<dyn EdgeStore> = db.clone();
        let profiles: Arc<dyn ProfileStore> = db.clone();

        let queue = Arc::new(LaneQueue::new(config.queue.lane_capacity));
        let dispatcher = Arc::new(InboxDispatcher::new(queue.clone()));

        let relationships = Arc::new(RelationshipIndex::new(
            Arc::new(MemorySortedSets::new()),
            edges.clone(),
            kv.clone(),
        ));
        let audience = Arc::new(AudienceCache::new(kv.clone(), edges, db.clone()));
        let resolver = Arc::new(Resolver::new(
            config.clone(),
            kv,
            profiles,
            db.clone(),
            NodeInfoSource::new(db.clone()),
        ));

        Self {
            config,
            db,
            cache,
            queue,
            dispatcher,
            relationships,
            audience,
            resolver,
        }
    }

    /// Rebuild the relationship sets of every local profile
    ///
    /// A profile that fails to rebuild is logged and skipped.
    pub async fn rebuild_relationships(&self) -> Result<RebuildReport, error::AppError> {
        let ids = self.db.local_profile_ids().await?;
        let mut total = RebuildReport::default();

        for id in ids {
            match self.relationships.rebuild(id).await {
                Ok(report) => {
                    total.added += report.added;
                    total.removed += report.removed;
                }
                Err(error) => {
                    tracing::warn!(profile_id = id, %error, "Failed to rebuild relationships");
                }
            }
        }

        Ok(total)
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::wellknown_router())
        .merge(api::activitypub_router(state.config.queue.max_payload_bytes))
        .layer(middleware::from_fn(api::track_http))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
