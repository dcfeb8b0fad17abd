//! ActivityPub federation module
//!
//! Handles:
//! - Inbox dispatch into prioritized queue lanes
//! - The follow relationship index
//! - Delivery audiences
//! - WebFinger, host-meta and NodeInfo discovery
//! - Outbox and collection documents

pub mod audience;
mod inbox;
mod nodeinfo;
mod queue;
pub mod relationship;
mod resolver;
pub mod webfinger;

pub use audience::AudienceCache;
pub use inbox::{InboxDispatcher, InboxJob, JobKind, MAX_PAYLOAD_DEPTH, activity_type};
pub use nodeinfo::{NodeInfo, NodeInfoLinks, NodeInfoSource};
pub use queue::{
    EnqueueOutcome, InboxJobHandler, JobQueue, Lane, LaneQueue, TracingJobHandler, spawn_workers,
};
pub use relationship::{EdgeRepair, RebuildReport, RelationshipIndex, RelationshipState};
pub use resolver::{CollectionKind, Resolver, account_status};
pub use webfinger::{WebFingerLink, WebFingerResponse, generate_webfinger_response};
