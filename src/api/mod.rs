//! API layer
//!
//! HTTP handlers for:
//! - ActivityPub (inboxes, outbox, collections)
//! - Well-known discovery (WebFinger, host-meta, NodeInfo)
//! - Metrics (Prometheus)

mod activitypub;
pub mod metrics;
mod wellknown;

pub use activitypub::activitypub_router;
pub use metrics::{metrics_router, track_http};
pub use wellknown::wellknown_router;
