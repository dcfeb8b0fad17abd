//! Data models
//!
//! Rust structs representing database rows read by the federation edge.
//! Profiles and statuses are owned by the account subsystem; this crate
//! only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric profile identifier (also used as sorted-set score)
pub type ProfileId = i64;

// =============================================================================
// Profile
// =============================================================================

/// A local or remote actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: ProfileId,
    pub username: String,
    /// None for local profiles
    pub domain: Option<String>,
    pub is_private: bool,
    /// Moderation status; Some means suspended, deleted or disabled
    pub status: Option<String>,
    /// Personal inbox URL (remote profiles)
    pub inbox_url: Option<String>,
    /// Shared inbox URL (remote profiles)
    pub shared_inbox: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_local(&self) -> bool {
        self.domain.is_none()
    }

    /// True when the profile has no moderation status
    pub fn is_active(&self) -> bool {
        self.status.is_none()
    }

    /// Endpoint that activities for this profile should be delivered to
    ///
    /// Prefers the shared inbox so that one delivery per instance suffices.
    pub fn delivery_inbox(&self) -> Option<&str> {
        self.shared_inbox
            .as_deref()
            .or(self.inbox_url.as_deref())
    }
}

// =============================================================================
// Status
// =============================================================================

/// A locally authored post, as exposed through the outbox
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Status {
    pub id: i64,
    pub profile_id: ProfileId,
    /// ActivityPub URI (globally unique)
    pub uri: String,
    /// HTML content
    pub content: String,
    /// Visibility: public, unlisted, private, direct
    pub visibility: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Relationship state
// =============================================================================

/// Follow state between an ordered pair of profiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipStatus {
    /// actor follows target
    pub following: bool,
    /// target follows actor
    pub followed_by: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(shared_inbox: Option<&str>, inbox_url: Option<&str>) -> Profile {
        Profile {
            id: 1,
            username: "alice".to_string(),
            domain: Some("remote.example".to_string()),
            is_private: false,
            status: None,
            inbox_url: inbox_url.map(str::to_string),
            shared_inbox: shared_inbox.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn delivery_inbox_prefers_shared_inbox() {
        let profile = remote(
            Some("https://remote.example/inbox"),
            Some("https://remote.example/users/alice/inbox"),
        );
        assert_eq!(profile.delivery_inbox(), Some("https://remote.example/inbox"));
    }

    #[test]
    fn delivery_inbox_falls_back_to_personal_inbox() {
        let profile = remote(None, Some("https://remote.example/users/alice/inbox"));
        assert_eq!(
            profile.delivery_inbox(),
            Some("https://remote.example/users/alice/inbox")
        );
        assert_eq!(remote(None, None).delivery_inbox(), None);
    }
}
