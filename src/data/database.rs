//! SQLite database operations
//!
//! All database access goes through this module.
//! Read paths implement the collaborator traits in [`super::store`]; the
//! write helpers exist for the account subsystem and for tests.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use super::store::{EdgeStore, InstanceDirectory, OutboxSource, ProfileStore, UsageStats};
use crate::error::AppError;

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Insert or replace a profile
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, username, domain, is_private, status, inbox_url, shared_inbox, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                domain = excluded.domain,
                is_private = excluded.is_private,
                status = excluded.status,
                inbox_url = excluded.inbox_url,
                shared_inbox = excluded.shared_inbox
            "#,
        )
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.domain)
        .bind(profile.is_private)
        .bind(&profile.status)
        .bind(&profile.inbox_url)
        .bind(&profile.shared_inbox)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Follow edges
    // =========================================================================

    /// Record that `actor` follows `target`
    ///
    /// # Returns
    /// true if a new edge was written
    pub async fn insert_follow_edge(
        &self,
        actor: ProfileId,
        target: ProfileId,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO followers (profile_id, following_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(actor)
        .bind(target)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the edge `actor` → `target`
    ///
    /// # Returns
    /// true if an edge was removed
    pub async fn delete_follow_edge(
        &self,
        actor: ProfileId,
        target: ProfileId,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM followers WHERE profile_id = ? AND following_id = ?")
            .bind(actor)
            .bind(target)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Record the software a remote instance runs
    pub async fn upsert_instance(
        &self,
        domain: &str,
        software: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO instances (domain, software) VALUES (?, ?)
             ON CONFLICT(domain) DO UPDATE SET software = excluded.software",
        )
        .bind(domain.to_ascii_lowercase())
        .bind(software)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Statuses
    // =========================================================================

    /// Insert a locally authored status
    pub async fn insert_status(&self, status: &Status) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO statuses (id, profile_id, uri, content, visibility, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(status.id)
        .bind(status.profile_id)
        .bind(&status.uri)
        .bind(&status.content)
        .bind(&status.visibility)
        .bind(status.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ProfileStore for Database {
    async fn find_local_profile(&self, username: &str) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles WHERE domain IS NULL AND username = ? COLLATE NOCASE LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn local_profile_ids(&self) -> Result<Vec<ProfileId>, AppError> {
        let ids = sqlx::query_scalar::<_, ProfileId>(
            "SELECT id FROM profiles WHERE domain IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl EdgeStore for Database {
    async fn edge_exists(&self, actor: ProfileId, target: ProfileId) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM followers WHERE profile_id = ? AND following_id = ?)",
        )
        .bind(actor)
        .bind(target)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    async fn follower_ids(&self, target: ProfileId) -> Result<Vec<ProfileId>, AppError> {
        let ids = sqlx::query_scalar::<_, ProfileId>(
            "SELECT profile_id FROM followers WHERE following_id = ? ORDER BY id",
        )
        .bind(target)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn following_ids(&self, actor: ProfileId) -> Result<Vec<ProfileId>, AppError> {
        let ids = sqlx::query_scalar::<_, ProfileId>(
            "SELECT following_id FROM followers WHERE profile_id = ? ORDER BY id",
        )
        .bind(actor)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn remote_followers(&self, target: ProfileId) -> Result<Vec<Profile>, AppError> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT p.* FROM followers f
            JOIN profiles p ON p.id = f.profile_id
            WHERE f.following_id = ? AND p.domain IS NOT NULL
            ORDER BY f.id
            "#,
        )
        .bind(target)
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }
}

#[async_trait]
impl InstanceDirectory for Database {
    async fn software(&self, domain: &str) -> Result<Option<String>, AppError> {
        let software = sqlx::query_scalar::<_, Option<String>>(
            "SELECT software FROM instances WHERE domain = ?",
        )
        .bind(domain.to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(software.flatten())
    }
}

#[async_trait]
impl OutboxSource for Database {
    async fn recent_public_statuses(
        &self,
        profile_id: ProfileId,
        limit: usize,
    ) -> Result<Vec<Status>, AppError> {
        let statuses = sqlx::query_as::<_, Status>(
            r#"
            SELECT * FROM statuses
            WHERE profile_id = ? AND visibility IN ('public', 'unlisted')
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(profile_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(statuses)
    }

    async fn count_public_statuses(&self, profile_id: ProfileId) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM statuses WHERE profile_id = ? AND visibility IN ('public', 'unlisted')",
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl UsageStats for Database {
    async fn local_user_count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM profiles WHERE domain IS NULL AND status IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn local_post_count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM statuses")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
