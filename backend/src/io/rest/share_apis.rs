//! # REST API for Share Links
//!
//! Turns the address the client runs on into a shareable link and QR code.

use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use shared::ShareLinkResponse;
use tracing::{info, warn};

use crate::domain::{profile_share_url, qr_code_url, shareable_base_url};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkQuery {
    /// Current address of the client
    pub href: String,
    /// Link straight to this profile instead of the app's home
    #[serde(default)]
    pub profile_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_share_link))
}

pub async fn get_share_link(Query(query): Query<ShareLinkQuery>) -> Response {
    info!("GET /api/share-link - href: {}", query.href);

    let Some(base_url) = shareable_base_url(&query.href) else {
        warn!("No share link for {}", query.href);
        return (StatusCode::BAD_REQUEST, "Cannot derive a share link from this address").into_response();
    };

    let profile_url = query
        .profile_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| profile_share_url(&base_url, id));
    let qr_code_url = qr_code_url(profile_url.as_deref().unwrap_or(&base_url));

    let response = ShareLinkResponse {
        base_url,
        qr_code_url,
        profile_url,
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::rest::test_support::{create_test_app_state, empty_request, read_json};
    use tower::ServiceExt;

    async fn app() -> Router {
        Router::new()
            .nest("/api/share-link", router())
            .with_state(create_test_app_state().await)
    }

    #[tokio::test]
    async fn test_share_link_for_app() {
        let uri = "/api/share-link?href=https%3A%2F%2Fhost%2Fapp%2F%23%2Fdog%2F1%3Fx%3D2";

        let response = app().await.oneshot(empty_request("GET", uri)).await.unwrap();
        let link: ShareLinkResponse = read_json(response, StatusCode::OK).await;

        assert_eq!(link.base_url, "https://host/app/");
        assert_eq!(link.profile_url, None);
        assert!(link.qr_code_url.contains("data=https%3A%2F%2Fhost%2Fapp%2F&"));
    }

    #[tokio::test]
    async fn test_share_link_for_profile() {
        let uri = "/api/share-link?href=https%3A%2F%2Fhost%2F&profileId=1";

        let response = app().await.oneshot(empty_request("GET", uri)).await.unwrap();
        let link: ShareLinkResponse = read_json(response, StatusCode::OK).await;

        assert_eq!(link.profile_url.as_deref(), Some("https://host/#/dog/1"));
        assert!(link.qr_code_url.contains("data=https%3A%2F%2Fhost%2F%23%2Fdog%2F1&"));
    }

    #[tokio::test]
    async fn test_unusable_href() {
        let response = app()
            .await
            .oneshot(empty_request("GET", "/api/share-link?href=nowhere"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
