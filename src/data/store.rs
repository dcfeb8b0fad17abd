//! Read-side collaborator traits
//!
//! The federation edge never owns profile, edge or instance records. It reads
//! them through these traits so components can be wired to the SQLite
//! [`Database`](super::Database) in production and to mocks in tests.

use async_trait::async_trait;

use super::models::{Profile, ProfileId, Status};
use crate::error::AppError;

/// Profile lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Local profile (domain IS NULL) by username, case-insensitive
    async fn find_local_profile(&self, username: &str) -> Result<Option<Profile>, AppError>;

    /// Ids of every local profile
    async fn local_profile_ids(&self) -> Result<Vec<ProfileId>, AppError>;
}

/// Durable follow edges
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// Whether `actor` follows `target`
    async fn edge_exists(&self, actor: ProfileId, target: ProfileId) -> Result<bool, AppError>;

    /// Ids following `target`, oldest edge first
    async fn follower_ids(&self, target: ProfileId) -> Result<Vec<ProfileId>, AppError>;

    /// Ids followed by `actor`, oldest edge first
    async fn following_ids(&self, actor: ProfileId) -> Result<Vec<ProfileId>, AppError>;

    /// Remote profiles following `target`, oldest edge first
    async fn remote_followers(&self, target: ProfileId) -> Result<Vec<Profile>, AppError>;
}

/// Instance metadata lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstanceDirectory: Send + Sync {
    /// Software name reported by the instance at `domain`, if known
    async fn software(&self, domain: &str) -> Result<Option<String>, AppError>;
}

/// Locally authored posts for the outbox
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboxSource: Send + Sync {
    /// Most recent public or unlisted statuses of a profile, newest first
    async fn recent_public_statuses(
        &self,
        profile_id: ProfileId,
        limit: usize,
    ) -> Result<Vec<Status>, AppError>;

    /// Number of public or unlisted statuses of a profile
    async fn count_public_statuses(&self, profile_id: ProfileId) -> Result<i64, AppError>;
}

/// Instance-wide usage numbers for nodeinfo
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageStats: Send + Sync {
    async fn local_user_count(&self) -> Result<i64, AppError>;

    async fn local_post_count(&self) -> Result<i64, AppError>;
}
