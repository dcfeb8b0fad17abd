//! Well-known endpoints
//!
//! - /.well-known/webfinger
//! - /.well-known/nodeinfo
//! - /.well-known/host-meta
//! - /nodeinfo/2.0

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppError;

/// Create well-known router
pub fn wellknown_router() -> Router<AppState> {
    Router::new()
        .route("/.well-known/webfinger", get(webfinger))
        .route("/.well-known/nodeinfo", get(nodeinfo_links))
        .route("/.well-known/host-meta", get(host_meta))
        .route("/nodeinfo/2.0", get(nodeinfo))
}

/// WebFinger query parameters
#[derive(Debug, Deserialize)]
struct WebFingerQuery {
    resource: Option<String>,
}

/// JSON body with slashes left unescaped and open CORS
///
/// serde_json never escapes `/`, so discovery documents keep their URLs
/// readable as-is.
struct DiscoveryJson<T>(T);

impl<T: Serialize> IntoResponse for DiscoveryJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => (
                [
                    (
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    ),
                    (
                        header::ACCESS_CONTROL_ALLOW_ORIGIN,
                        HeaderValue::from_static("*"),
                    ),
                ],
                body,
            )
                .into_response(),
            Err(error) => AppError::from(error).into_response(),
        }
    }
}

/// GET /.well-known/webfinger
///
/// Query: ?resource=acct:user@domain
async fn webfinger(
    State(state): State<AppState>,
    Query(query): Query<WebFingerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let jrd = state.resolver.webfinger(query.resource.as_deref()).await?;
    Ok(DiscoveryJson(jrd))
}

/// GET /.well-known/nodeinfo
async fn nodeinfo_links(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(DiscoveryJson(state.resolver.nodeinfo_well_known()?))
}

/// GET /nodeinfo/2.0
async fn nodeinfo(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(DiscoveryJson(state.resolver.nodeinfo().await?))
}

/// GET /.well-known/host-meta
async fn host_meta(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let xml = state.resolver.host_meta()?;
    Ok(([(header::CONTENT_TYPE, "application/xrd+xml")], xml))
}
