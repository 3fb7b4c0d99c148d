//! # PetNFC Backend
//!
//! Dog profiles linked to NFC collar tags, served as a JSON API.
//!
//! ## Architecture
//!
//! ```text
//! IO Layer (REST API, NFC bridge, Gemini client)
//!     ↓
//! Domain Layer (profile store, scan session, editor, assistant)
//!     ↓
//! Storage Layer (snapshot persistence)
//! ```
//!
//! The domain layer only talks to the outside through traits
//! ([`storage::SnapshotStorage`], [`domain::TagReader`],
//! [`domain::BreedDetector`], [`domain::VaccinationAdvisor`]), so every
//! collaborator can be swapped for a fake in tests.

pub mod config;
pub mod domain;
pub mod io;
pub mod logging;
pub mod storage;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::{
    demo_profiles, BreedDetector, NfcScanSession, ProfileStore, ScanResolver, VaccinationAdviceService,
    VaccinationAdvisor,
};
use crate::io::rest::nfc_apis::LatestResolution;
use crate::io::rest::{assistant_apis, nfc_apis, profile_apis, share_apis};
use crate::io::{BridgeTagReader, GeminiClient};
use crate::storage::{JsonFileStorage, DEFAULT_SLOT};

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub profile_store: ProfileStore,
    pub scan_session: NfcScanSession,
    /// Entry point for readings posted by bridge devices
    pub nfc_bridge: Arc<BridgeTagReader>,
    pub scan_resolver: ScanResolver,
    pub breed_detector: Option<Arc<dyn BreedDetector>>,
    pub vaccination_advice: VaccinationAdviceService,
    /// Outcome for the latest tag seen by the running scan
    pub last_resolution: Arc<Mutex<LatestResolution>>,
}

impl AppState {
    pub fn new(
        profile_store: ProfileStore,
        nfc_bridge: Arc<BridgeTagReader>,
        breed_detector: Option<Arc<dyn BreedDetector>>,
        vaccination_advisor: Option<Arc<dyn VaccinationAdvisor>>,
    ) -> Self {
        Self {
            scan_session: NfcScanSession::new(nfc_bridge.clone()),
            nfc_bridge,
            scan_resolver: ScanResolver::new(profile_store.clone()),
            profile_store,
            breed_detector,
            vaccination_advice: VaccinationAdviceService::new(vaccination_advisor),
            last_resolution: Arc::new(Mutex::new(LatestResolution::default())),
        }
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    info!("Setting up storage in {}", config.data_dir.display());
    let storage = JsonFileStorage::new(&config.data_dir, DEFAULT_SLOT)?;

    let seed = if config.seed_demo_profile {
        demo_profiles(Utc::now().timestamp_millis())
    } else {
        Vec::new()
    };
    let profile_store = ProfileStore::open(Arc::new(storage), seed)
        .await
        .context("Failed to open profile store")?;

    info!("Setting up NFC bridge (enabled: {})", config.nfc_bridge_enabled);
    let nfc_bridge = Arc::new(BridgeTagReader::new(config.nfc_bridge_enabled));

    let (breed_detector, vaccination_advisor) = match &config.gemini {
        Some(gemini_config) => {
            info!("Setting up Gemini assistant ({})", gemini_config.model);
            let client = Arc::new(GeminiClient::new(gemini_config).context("Failed to create Gemini client")?);
            let detector: Arc<dyn BreedDetector> = client.clone();
            let advisor: Arc<dyn VaccinationAdvisor> = client;
            (Some(detector), Some(advisor))
        }
        None => {
            warn!("GEMINI_API_KEY not set, breed detection disabled and vaccination advice uses the fallback list");
            (None, None)
        }
    };

    info!("Setting up application state");
    Ok(AppState::new(profile_store, nfc_bridge, breed_detector, vaccination_advisor))
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, cors_origin: &str) -> Result<Router> {
    // CORS setup to allow the frontend to make requests
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .nest("/dogs", profile_apis::router())
        .nest("/nfc", nfc_apis::router())
        .nest("/breed-detection", assistant_apis::router())
        .nest("/share-link", share_apis::router());

    Ok(Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(app_state))
}
