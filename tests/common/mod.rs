//! Common test utilities for E2E tests

#![allow(dead_code)]

pub mod schema_validator;

use chrono::Utc;
use fedigate::data::{Profile, ProfileId};
use fedigate::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const DOMAIN: &str = "test.example.com";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

/// Configuration used by every test server
pub fn test_config(db_path: std::path::PathBuf) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: DOMAIN.to_string(),
            protocol: "https".to_string(),
        },
        database: config::DatabaseConfig { path: db_path },
        federation: config::FederationConfig {
            nodeinfo_enabled: true,
            webfinger_enabled: true,
            activitypub: config::ActivityPubConfig {
                enabled: true,
                inbox: true,
                shared_inbox: true,
                outbox: true,
            },
        },
        cache: config::CacheConfig {
            max_capacity: 10_000,
        },
        queue: config::QueueConfig {
            workers: 1,
            lane_capacity: 100,
            max_payload_bytes: 8 * 1024 * 1024,
        },
        relationships: config::RelationshipConfig {
            reconcile_interval_seconds: 0,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Create a new test server instance
    ///
    /// No inbox workers are started, so queued jobs stay observable.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server after adjusting the default configuration
    pub async fn with_config(adjust: impl FnOnce(&mut config::AppConfig)) -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path().join("test.db"));
        adjust(&mut config);

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = fedigate::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Store a local profile
    pub async fn create_local_profile(&self, id: ProfileId, username: &str) -> Profile {
        let profile = Profile {
            id,
            username: username.to_string(),
            domain: None,
            is_private: false,
            status: None,
            inbox_url: None,
            shared_inbox: None,
            created_at: Utc::now(),
        };
        self.state.db.upsert_profile(&profile).await.unwrap();
        profile
    }

    /// Store a local profile carrying a moderation status
    pub async fn create_moderated_profile(
        &self,
        id: ProfileId,
        username: &str,
        status: &str,
    ) -> Profile {
        let mut profile = self.create_local_profile(id, username).await;
        profile.status = Some(status.to_string());
        self.state.db.upsert_profile(&profile).await.unwrap();
        profile
    }

    /// Store a remote profile on `domain`
    pub async fn create_remote_profile(
        &self,
        id: ProfileId,
        username: &str,
        domain: &str,
        shared_inbox: Option<&str>,
    ) -> Profile {
        let profile = Profile {
            id,
            username: username.to_string(),
            domain: Some(domain.to_string()),
            is_private: false,
            status: None,
            inbox_url: Some(format!("https://{}/users/{}/inbox", domain, username)),
            shared_inbox: shared_inbox.map(str::to_string),
            created_at: Utc::now(),
        };
        self.state.db.upsert_profile(&profile).await.unwrap();
        profile
    }

    /// Persist a follow edge and index it
    pub async fn follow(&self, actor: ProfileId, target: ProfileId) {
        self.state.db.insert_follow_edge(actor, target).await.unwrap();
        self.state.relationships.add(actor, target).await.unwrap();
    }

    /// Delete a follow edge and drop it from the index
    pub async fn unfollow(&self, actor: ProfileId, target: ProfileId) {
        self.state.db.delete_follow_edge(actor, target).await.unwrap();
        self.state.relationships.remove(actor, target).await.unwrap();
    }
}
