//! Database tests

use super::*;
use chrono::{Duration, Utc};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn local(id: ProfileId, username: &str) -> Profile {
    Profile {
        id,
        username: username.to_string(),
        domain: None,
        is_private: false,
        status: None,
        inbox_url: None,
        shared_inbox: None,
        created_at: Utc::now(),
    }
}

fn remote(id: ProfileId, username: &str, domain: &str, shared_inbox: Option<&str>) -> Profile {
    Profile {
        id,
        username: username.to_string(),
        domain: Some(domain.to_string()),
        is_private: false,
        status: None,
        inbox_url: Some(format!("https://{}/users/{}/inbox", domain, username)),
        shared_inbox: shared_inbox.map(str::to_string),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
}

#[tokio::test]
async fn test_profile_upsert_and_lookup() {
    let (db, _temp_dir) = create_test_db().await;

    db.upsert_profile(&local(1, "alice")).await.unwrap();
    db.upsert_profile(&remote(2, "alice", "remote.example", None))
        .await
        .unwrap();

    let found = db.find_local_profile("alice").await.unwrap().unwrap();
    assert_eq!(found.id, 1);
    assert!(found.is_local());

    // Username lookups ignore case, remote profiles are never returned
    let found = db.find_local_profile("ALICE").await.unwrap().unwrap();
    assert_eq!(found.id, 1);
    assert!(db.find_local_profile("bob").await.unwrap().is_none());

    assert_eq!(db.local_profile_ids().await.unwrap(), vec![1]);
}

#[tokio::test]
async fn test_profile_upsert_updates_status() {
    let (db, _temp_dir) = create_test_db().await;

    let mut profile = local(1, "alice");
    db.upsert_profile(&profile).await.unwrap();
    profile.status = Some("suspended".to_string());
    db.upsert_profile(&profile).await.unwrap();

    let found = db.find_local_profile("alice").await.unwrap().unwrap();
    assert_eq!(found.status.as_deref(), Some("suspended"));
    assert_eq!(db.local_user_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_follow_edges() {
    let (db, _temp_dir) = create_test_db().await;

    assert!(db.insert_follow_edge(2, 1).await.unwrap());
    assert!(!db.insert_follow_edge(2, 1).await.unwrap());
    assert!(db.insert_follow_edge(3, 1).await.unwrap());

    assert!(db.edge_exists(2, 1).await.unwrap());
    assert!(!db.edge_exists(1, 2).await.unwrap());
    assert_eq!(db.follower_ids(1).await.unwrap(), vec![2, 3]);
    assert_eq!(db.following_ids(2).await.unwrap(), vec![1]);

    assert!(db.delete_follow_edge(2, 1).await.unwrap());
    assert!(!db.delete_follow_edge(2, 1).await.unwrap());
    assert_eq!(db.follower_ids(1).await.unwrap(), vec![3]);
}

#[tokio::test]
async fn test_remote_followers_excludes_local_profiles() {
    let (db, _temp_dir) = create_test_db().await;

    db.upsert_profile(&local(1, "alice")).await.unwrap();
    db.upsert_profile(&remote(2, "r1", "a.example", Some("https://a.example/inbox")))
        .await
        .unwrap();
    db.upsert_profile(&local(3, "carol")).await.unwrap();
    db.upsert_profile(&remote(4, "r2", "b.example", None))
        .await
        .unwrap();

    db.insert_follow_edge(4, 1).await.unwrap();
    db.insert_follow_edge(3, 1).await.unwrap();
    db.insert_follow_edge(2, 1).await.unwrap();

    let followers = db.remote_followers(1).await.unwrap();
    let ids: Vec<_> = followers.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![4, 2]);
}

#[tokio::test]
async fn test_instance_software_lookup_is_case_insensitive_on_domain() {
    let (db, _temp_dir) = create_test_db().await;

    db.upsert_instance("Pixel.Example", Some("pixelfed"))
        .await
        .unwrap();
    db.upsert_instance("quiet.example", None).await.unwrap();

    assert_eq!(
        db.software("pixel.example").await.unwrap().as_deref(),
        Some("pixelfed")
    );
    assert_eq!(db.software("quiet.example").await.unwrap(), None);
    assert_eq!(db.software("unknown.example").await.unwrap(), None);
}

#[tokio::test]
async fn test_recent_public_statuses() {
    let (db, _temp_dir) = create_test_db().await;
    let now = Utc::now();

    for (id, visibility) in [(1, "public"), (2, "unlisted"), (3, "private"), (4, "direct")] {
        db.insert_status(&Status {
            id,
            profile_id: 1,
            uri: format!("https://local.example/p/{}", id),
            content: format!("<p>{}</p>", id),
            visibility: visibility.to_string(),
            created_at: now + Duration::seconds(id),
        })
        .await
        .unwrap();
    }

    let statuses = db.recent_public_statuses(1, 10).await.unwrap();
    let ids: Vec<_> = statuses.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(db.count_public_statuses(1).await.unwrap(), 2);
    assert_eq!(db.local_post_count().await.unwrap(), 4);

    let limited = db.recent_public_statuses(1, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, 2);
}
