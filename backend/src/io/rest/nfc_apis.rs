//! # REST API for NFC Scanning
//!
//! Controls the scan session and resolves scanned tags. While a scan runs,
//! every tag posted by the bridge is resolved in the background, in the order
//! the tags were read, and the outcome is exposed through
//! `GET /api/nfc/status` until the next scan.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use shared::{NfcStatusResponse, ResolveTagRequest, ResolveTagResponse, Route, TagReadingRequest};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::scan_error_response;
use crate::domain::{decide, ScanResolver, TagResolution};
use crate::AppState;

/// Outcome for the latest tag, stamped with the scan that produced it
#[derive(Debug, Default)]
pub struct LatestResolution {
    scan: u64,
    latest: Option<ResolveTagResponse>,
}

impl LatestResolution {
    /// Forget the previous outcome and return the id of the new scan
    pub fn begin_scan(&mut self) -> u64 {
        self.scan += 1;
        self.latest = None;
        self.scan
    }

    /// Keep `response` unless a newer scan has started since `scan`
    pub fn record(&mut self, scan: u64, response: ResolveTagResponse) -> bool {
        if scan != self.scan {
            return false;
        }
        self.latest = Some(response);
        true
    }

    pub fn latest(&self) -> Option<ResolveTagResponse> {
        self.latest.clone()
    }
}

/// Create a router for NFC related APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(start_scan))
        .route("/stop", post(stop_scan))
        .route("/readings", post(push_reading))
        .route("/resolve", post(resolve_tag))
}

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(status_response(&state).await))
}

/// Start listening for tags
pub async fn start_scan(State(state): State<AppState>) -> Response {
    info!("POST /api/nfc/scan");

    let scan = state.last_resolution.lock().await.begin_scan();
    let (tags_tx, tags_rx) = mpsc::unbounded_channel();
    tokio::spawn(resolve_in_order(
        state.scan_resolver.clone(),
        state.last_resolution.clone(),
        scan,
        tags_rx,
    ));

    // The resolver task ends once the session drops this observer
    let result = state
        .scan_session
        .start(move |tag_id| {
            let _ = tags_tx.send(tag_id);
        })
        .await;

    match result {
        Ok(_subscription) => (StatusCode::OK, Json(status_response(&state).await)).into_response(),
        Err(e) => {
            error!("Failed to start NFC scan: {}", e);
            scan_error_response(e)
        }
    }
}

pub async fn stop_scan(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /api/nfc/stop");

    if !state.scan_session.stop() {
        info!("No NFC scan was running");
    }
    (StatusCode::OK, Json(status_response(&state).await))
}

/// Tag reading forwarded by an NFC bridge device
pub async fn push_reading(State(state): State<AppState>, Json(request): Json<TagReadingRequest>) -> Response {
    let tag_id = request.tag_id.trim();
    info!("POST /api/nfc/readings - tag: {}", tag_id);

    if tag_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "Tag id cannot be empty").into_response();
    }

    if state.nfc_bridge.push(tag_id).await {
        StatusCode::ACCEPTED.into_response()
    } else {
        warn!("Tag {} read while no scan is active", tag_id);
        (StatusCode::CONFLICT, "No NFC scan is active").into_response()
    }
}

/// Resolve a tag with the user's answer to the create prompt
pub async fn resolve_tag(State(state): State<AppState>, Json(request): Json<ResolveTagRequest>) -> Response {
    let tag_id = request.tag_id.trim().to_string();
    info!("POST /api/nfc/resolve - tag: {}, confirm: {}", tag_id, request.confirm_create);

    if tag_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "Tag id cannot be empty").into_response();
    }

    let resolution = state.scan_resolver.resolve(&tag_id).await;
    let confirm_create = request.confirm_create;
    let route = decide(&resolution, &move |_: &str| confirm_create);

    (StatusCode::OK, Json(to_response(tag_id, resolution, route))).into_response()
}

async fn resolve_in_order(
    resolver: ScanResolver,
    slot: Arc<Mutex<LatestResolution>>,
    scan: u64,
    mut tags: mpsc::UnboundedReceiver<String>,
) {
    while let Some(tag_id) = tags.recv().await {
        let resolution = resolver.resolve(&tag_id).await;
        // Unknown tags wait for the user's answer via /resolve
        let route = decide(&resolution, &|_: &str| false);
        if !slot.lock().await.record(scan, to_response(tag_id, resolution, route)) {
            debug!("Dropping tag resolution from superseded scan {}", scan);
        }
    }
}

async fn status_response(state: &AppState) -> NfcStatusResponse {
    NfcStatusResponse {
        status: state.scan_session.status(),
        last_resolution: state.last_resolution.lock().await.latest(),
    }
}

fn to_response(tag_id: String, resolution: TagResolution, route: Option<Route>) -> ResolveTagResponse {
    let profile = match resolution {
        TagResolution::Assigned(profile) => Some(profile),
        TagResolution::Unassigned(_) => None,
    };
    ResolveTagResponse { tag_id, profile, route }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::rest::test_support::{create_test_app_state, empty_request, json_request, read_json};
    use serde_json::json;
    use shared::ScanState;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        Router::new().nest("/api/nfc", router()).with_state(state)
    }

    async fn wait_for_resolution(state: &AppState) -> ResolveTagResponse {
        for _ in 0..50 {
            if let Some(resolution) = state.last_resolution.lock().await.latest() {
                return resolution;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("No tag was resolved");
    }

    #[tokio::test]
    async fn test_status_when_idle() {
        let state = create_test_app_state().await;

        let response = app(state).oneshot(empty_request("GET", "/api/nfc/status")).await.unwrap();
        let status: NfcStatusResponse = read_json(response, StatusCode::OK).await;

        assert!(status.status.is_supported);
        assert!(!status.status.is_reading);
        assert_eq!(status.status.state, ScanState::Idle);
        assert!(status.last_resolution.is_none());
    }

    #[tokio::test]
    async fn test_reading_without_scan_is_rejected() {
        let state = create_test_app_state().await;

        let response = app(state)
            .oneshot(json_request("POST", "/api/nfc/readings", json!({"tagId": "04:AA"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_scan_resolves_known_tag() {
        let state = create_test_app_state().await;

        let response = app(state.clone()).oneshot(empty_request("POST", "/api/nfc/scan")).await.unwrap();
        let status: NfcStatusResponse = read_json(response, StatusCode::OK).await;
        assert!(status.status.is_reading);

        let response = app(state.clone())
            .oneshot(json_request("POST", "/api/nfc/readings", json!({"tagId": "04:A1:B2:C3:D4:E5:F6"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let resolution = wait_for_resolution(&state).await;
        assert_eq!(resolution.route, Some(Route::ProfileDetail { id: "1".to_string() }));
        assert_eq!(resolution.profile.map(|p| p.name).as_deref(), Some("Burek"));

        let response = app(state.clone()).oneshot(empty_request("POST", "/api/nfc/stop")).await.unwrap();
        let status: NfcStatusResponse = read_json(response, StatusCode::OK).await;
        assert_eq!(status.status.state, ScanState::Idle);
        assert_eq!(status.status.scanned_tag_id.as_deref(), Some("04:A1:B2:C3:D4:E5:F6"));
    }

    #[tokio::test]
    async fn test_scan_leaves_unknown_tag_for_the_user() {
        let state = create_test_app_state().await;
        app(state.clone()).oneshot(empty_request("POST", "/api/nfc/scan")).await.unwrap();

        app(state.clone())
            .oneshot(json_request("POST", "/api/nfc/readings", json!({"tagId": "04:BB"})))
            .await
            .unwrap();

        let resolution = wait_for_resolution(&state).await;
        assert_eq!(resolution.tag_id, "04:BB");
        assert_eq!(resolution.profile, None);
        assert_eq!(resolution.route, None);
    }

    #[tokio::test]
    async fn test_scan_keeps_outcome_of_newest_tag() {
        let state = create_test_app_state().await;
        app(state.clone()).oneshot(empty_request("POST", "/api/nfc/scan")).await.unwrap();

        for tag_id in ["04:A1:B2:C3:D4:E5:F6", "04:BB"] {
            let response = app(state.clone())
                .oneshot(json_request("POST", "/api/nfc/readings", json!({"tagId": tag_id})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }

        for _ in 0..50 {
            let latest = state.last_resolution.lock().await.latest();
            if latest.is_some_and(|r| r.tag_id == "04:BB") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let response = app(state).oneshot(empty_request("GET", "/api/nfc/status")).await.unwrap();
        let status: NfcStatusResponse = read_json(response, StatusCode::OK).await;
        let latest = status.last_resolution.expect("Expected a resolved tag");
        assert_eq!(latest.tag_id, "04:BB");
        assert_eq!(latest.profile, None);
    }

    #[test]
    fn test_results_from_superseded_scan_are_dropped() {
        let mut slot = LatestResolution::default();
        let old_scan = slot.begin_scan();
        let response = ResolveTagResponse {
            tag_id: "04:AA".to_string(),
            profile: None,
            route: None,
        };
        assert!(slot.record(old_scan, response.clone()));

        let new_scan = slot.begin_scan();
        assert_eq!(slot.latest(), None);
        assert!(!slot.record(old_scan, response.clone()));
        assert_eq!(slot.latest(), None);

        assert!(slot.record(new_scan, response.clone()));
        assert_eq!(slot.latest(), Some(response));
    }

    #[tokio::test]
    async fn test_resolve_with_confirmation() {
        let state = create_test_app_state().await;

        let body = json!({"tagId": "04:BB", "confirmCreate": true});
        let response = app(state.clone()).oneshot(json_request("POST", "/api/nfc/resolve", body)).await.unwrap();
        let confirmed: ResolveTagResponse = read_json(response, StatusCode::OK).await;
        assert_eq!(confirmed.route, Some(Route::CreateProfile { nfc_id: Some("04:BB".to_string()) }));

        let body = json!({"tagId": "04:BB"});
        let response = app(state).oneshot(json_request("POST", "/api/nfc/resolve", body)).await.unwrap();
        let declined: ResolveTagResponse = read_json(response, StatusCode::OK).await;
        assert_eq!(declined.route, None);
    }

    #[tokio::test]
    async fn test_scan_on_disabled_bridge() {
        let mut state = create_test_app_state().await;
        let reader = std::sync::Arc::new(crate::io::BridgeTagReader::new(false));
        state.scan_session = crate::domain::NfcScanSession::new(reader.clone());
        state.nfc_bridge = reader;

        let response = app(state).oneshot(empty_request("POST", "/api/nfc/scan")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
