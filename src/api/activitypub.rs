//! ActivityPub endpoints
//!
//! - Inbox and shared inbox (activity receiving)
//! - Outbox
//! - Followers/Following collections

use axum::body::Bytes;
use axum::{
    Router,
    extract::{DefaultBodyLimit, OriginalUri, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use http::HeaderMap;

use crate::AppState;
use crate::error::AppError;
use crate::federation::CollectionKind;

const ACTIVITY_JSON: &str = "application/activity+json";

/// Create ActivityPub router
///
/// Routes:
/// - POST /users/:username/inbox - Personal inbox
/// - POST /inbox - Shared inbox
/// - GET /users/:username/outbox - Outbox
/// - GET /users/:username/followers - Followers collection
/// - GET /users/:username/following - Following collection
///
/// Inbox bodies larger than `max_payload_bytes` are answered with 413 and
/// never queued.
pub fn activitypub_router(max_payload_bytes: usize) -> Router<AppState> {
    let inboxes = Router::new()
        .route("/users/:username/inbox", post(inbox))
        .route("/inbox", post(shared_inbox))
        .layer(DefaultBodyLimit::max(max_payload_bytes));

    Router::new()
        .merge(inboxes)
        .route("/users/:username/outbox", get(outbox))
        .route("/users/:username/followers", get(followers))
        .route("/users/:username/following", get(following))
}

/// POST /users/:username/inbox
///
/// Queues the delivery and answers 200 with an empty body. Signature and
/// payload checks happen in the inbox workers.
async fn inbox(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    state.resolver.inbox_enabled()?;
    state.dispatcher.accept_personal(&username, headers, body);
    Ok(StatusCode::OK)
}

/// POST /inbox
async fn shared_inbox(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    state.resolver.shared_inbox_enabled()?;
    state.dispatcher.accept_shared(headers, body);
    Ok(StatusCode::OK)
}

/// GET /users/:username/outbox
///
/// Content-Type: application/activity+json
async fn outbox(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let collection = state.resolver.outbox(&username).await?;
    let body = serde_json::to_vec(&collection)?;
    Ok(([(header::CONTENT_TYPE, ACTIVITY_JSON)], body))
}

/// GET /users/:username/followers
async fn followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<serde_json::Value>, AppError> {
    collection(state, CollectionKind::Followers, &username, &uri).await
}

/// GET /users/:username/following
async fn following(
    State(state): State<AppState>,
    Path(username): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<serde_json::Value>, AppError> {
    collection(state, CollectionKind::Following, &username, &uri).await
}

async fn collection(
    state: AppState,
    kind: CollectionKind,
    username: &str,
    uri: &http::Uri,
) -> Result<Json<serde_json::Value>, AppError> {
    let path = uri
        .path_and_query()
        .map(|path| path.as_str())
        .unwrap_or_else(|| uri.path());
    let request_uri = format!("{}{}", state.config.server.base_url(), path);

    let page = state
        .resolver
        .collection(kind, username, &request_uri)
        .await?;
    Ok(Json(page))
}
