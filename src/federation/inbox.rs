//! Inbox dispatcher
//!
//! Classifies incoming deliveries and routes them into queue lanes. This is
//! the only work done on the request path: a bounded-depth parse and a
//! non-blocking enqueue. Nothing is ever rejected here; malformed payloads
//! are routed like any other delivery and judged by the workers.

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use std::sync::Arc;

use super::queue::{EnqueueOutcome, JobQueue, Lane};
use crate::metrics::ACTIVITYPUB_ACTIVITIES_RECEIVED;

/// Maximum container nesting accepted when looking for the activity type
pub const MAX_PAYLOAD_DEPTH: usize = 8;

/// Activity types tracked individually in metrics
const TRACKED_ACTIVITY_TYPES: &[&str] = &[
    "Accept", "Add", "Announce", "Block", "Create", "Delete", "Flag", "Follow", "Like", "Move",
    "Reject", "Remove", "Undo", "Update",
];

/// Which pipeline a job belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    /// Tombstone delivered to either inbox
    Delete,
    /// Delivery addressed to one local user
    Inbox { username: String },
    /// Multi-recipient delivery; recipients are resolved downstream
    SharedInbox,
}

impl JobKind {
    pub fn lane(&self) -> Lane {
        match self {
            JobKind::Delete => Lane::Delete,
            JobKind::Inbox { .. } | JobKind::SharedInbox => Lane::High,
        }
    }
}

/// Immutable envelope handed to the queue, one per accepted delivery
#[derive(Debug, Clone)]
pub struct InboxJob {
    id: String,
    kind: JobKind,
    headers: HeaderMap,
    payload: Bytes,
    received_at: DateTime<Utc>,
}

impl InboxJob {
    pub fn new(kind: JobKind, headers: HeaderMap, payload: Bytes) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            kind,
            headers,
            payload,
            received_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    pub fn lane(&self) -> Lane {
        self.kind.lane()
    }

    /// Local username for per-user deliveries
    pub fn target_username(&self) -> Option<&str> {
        match &self.kind {
            JobKind::Inbox { username } => Some(username),
            _ => None,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw request body, exactly as received
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Top-level `type` of a payload, if it can be observed safely
///
/// Returns None for invalid JSON, non-object payloads, non-string types and
/// payloads nested deeper than [`MAX_PAYLOAD_DEPTH`].
pub fn activity_type(payload: &[u8]) -> Option<String> {
    if exceeds_depth(payload, MAX_PAYLOAD_DEPTH) {
        return None;
    }

    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value.get("type")?.as_str().map(str::to_string)
}

/// Linear scan for container nesting beyond `max_depth`
///
/// Runs before any parse so that hostile nesting never builds a tree.
fn exceeds_depth(payload: &[u8], max_depth: usize) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for &byte in payload {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > max_depth {
                    return true;
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    false
}

/// Routes deliveries from both inbox endpoints
pub struct InboxDispatcher {
    queue: Arc<dyn JobQueue>,
}

impl InboxDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Accept a delivery for `target` (per-user inbox) or for the shared inbox
    ///
    /// Exactly one job is enqueued per call. Never fails and never waits.
    pub fn accept(&self, target: Option<&str>, headers: HeaderMap, payload: Bytes) {
        let activity_type = activity_type(&payload);
        let kind = match (activity_type.as_deref(), target) {
            (Some("Delete"), _) => JobKind::Delete,
            (_, Some(username)) => JobKind::Inbox {
                username: username.to_string(),
            },
            (_, None) => JobKind::SharedInbox,
        };

        ACTIVITYPUB_ACTIVITIES_RECEIVED
            .with_label_values(&[metric_label(activity_type.as_deref())])
            .inc();

        let job = InboxJob::new(kind, headers, payload);
        let job_id = job.id().to_string();
        let lane = job.lane();
        let outcome = self.queue.enqueue(job);

        tracing::debug!(
            %job_id,
            lane = %lane,
            target = ?target,
            activity_type = ?activity_type,
            displaced = outcome == EnqueueOutcome::DisplacedOldest,
            "Inbox delivery accepted"
        );
    }

    /// POST /users/{username}/inbox
    pub fn accept_personal(&self, username: &str, headers: HeaderMap, payload: Bytes) {
        self.accept(Some(username), headers, payload);
    }

    /// POST /inbox
    pub fn accept_shared(&self, headers: HeaderMap, payload: Bytes) {
        self.accept(None, headers, payload);
    }
}

fn metric_label(activity_type: Option<&str>) -> &'static str {
    match activity_type {
        None => "unparsed",
        Some(kind) => TRACKED_ACTIVITY_TYPES
            .iter()
            .find(|tracked| **tracked == kind)
            .copied()
            .unwrap_or("other"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::queue::MockJobQueue;

    fn nested(depth: usize) -> String {
        let mut payload = String::from(r#"{"type":"Delete","object":"#);
        for _ in 0..depth.saturating_sub(1) {
            payload.push('[');
        }
        payload.push('1');
        for _ in 0..depth.saturating_sub(1) {
            payload.push(']');
        }
        payload.push('}');
        payload
    }

    fn dispatcher_expecting(check: impl Fn(&InboxJob) -> bool + Send + 'static) -> InboxDispatcher {
        let mut queue = MockJobQueue::new();
        queue
            .expect_enqueue()
            .withf(move |job| check(job))
            .times(1)
            .return_const(EnqueueOutcome::Queued);
        InboxDispatcher::new(Arc::new(queue))
    }

    #[test]
    fn activity_type_reads_top_level_string() {
        assert_eq!(
            activity_type(br#"{"type":"Follow","actor":"https://a.example/u"}"#).as_deref(),
            Some("Follow")
        );
        assert_eq!(activity_type(br#"{"actor":"x"}"#), None);
        assert_eq!(activity_type(br#"{"type":["Delete"]}"#), None);
        assert_eq!(activity_type(br#"["Delete"]"#), None);
        assert_eq!(activity_type(b"not json"), None);
        assert_eq!(activity_type(b""), None);
    }

    #[test]
    fn depth_limit_is_eight_levels() {
        assert_eq!(activity_type(nested(8).as_bytes()).as_deref(), Some("Delete"));
        assert_eq!(activity_type(nested(9).as_bytes()), None);
    }

    #[test]
    fn depth_scan_ignores_brackets_inside_strings() {
        let payload = r#"{"type":"Delete","content":"[[[[[[[[[[{{{{{{{{ \" [[[["}"#;
        assert_eq!(activity_type(payload.as_bytes()).as_deref(), Some("Delete"));
    }

    #[test]
    fn delete_goes_to_delete_lane_from_personal_inbox() {
        let dispatcher = dispatcher_expecting(|job| {
            job.lane() == Lane::Delete
                && *job.kind() == JobKind::Delete
                && job.target_username().is_none()
        });
        dispatcher.accept_personal(
            "alice",
            HeaderMap::new(),
            Bytes::from_static(br#"{"type":"Delete","actor":"https://a.example/u"}"#),
        );
    }

    #[test]
    fn delete_goes_to_delete_lane_from_shared_inbox() {
        let dispatcher = dispatcher_expecting(|job| job.lane() == Lane::Delete);
        dispatcher.accept_shared(HeaderMap::new(), Bytes::from_static(br#"{"type":"Delete"}"#));
    }

    #[test]
    fn personal_delivery_carries_username() {
        let dispatcher = dispatcher_expecting(|job| {
            job.lane() == Lane::High && job.target_username() == Some("alice")
        });
        dispatcher.accept_personal(
            "alice",
            HeaderMap::new(),
            Bytes::from_static(br#"{"type":"Follow"}"#),
        );
    }

    #[test]
    fn shared_delivery_has_no_target() {
        let dispatcher = dispatcher_expecting(|job| {
            job.lane() == Lane::High && *job.kind() == JobKind::SharedInbox
        });
        dispatcher.accept_shared(HeaderMap::new(), Bytes::from_static(br#"{"type":"Create"}"#));
    }

    #[test]
    fn unparsable_payload_is_still_enqueued() {
        let dispatcher = dispatcher_expecting(|job| {
            job.lane() == Lane::High && job.payload().as_ref() == b"{{{ garbage"
        });
        dispatcher.accept_shared(HeaderMap::new(), Bytes::from_static(b"{{{ garbage"));
    }

    #[test]
    fn too_deep_delete_is_routed_as_default() {
        let payload = Bytes::from(nested(9));
        let dispatcher = dispatcher_expecting(|job| job.lane() == Lane::High);
        dispatcher.accept_personal("alice", HeaderMap::new(), payload);
    }

    #[test]
    fn headers_and_payload_are_preserved() {
        let mut headers = HeaderMap::new();
        headers.insert("signature", "keyId=\"k\"".parse().unwrap());
        let dispatcher = dispatcher_expecting(|job| {
            job.headers().get("signature").map(|v| v.as_bytes()) == Some(b"keyId=\"k\"".as_slice())
                && job.payload().as_ref() == br#"{"type":"Like"}"#
        });
        dispatcher.accept_shared(headers, Bytes::from_static(br#"{"type":"Like"}"#));
    }

    #[test]
    fn metric_label_bounds_cardinality() {
        assert_eq!(metric_label(Some("Follow")), "Follow");
        assert_eq!(metric_label(Some("Xyzzy")), "other");
        assert_eq!(metric_label(None), "unparsed");
    }
}
