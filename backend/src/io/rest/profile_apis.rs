//! # REST API for Dog Profiles
//!
//! CRUD for profiles plus their vaccination entries and vaccination advice.
//! Writes go through the profile editor, so the API enforces the same rules
//! as the in-app form. Changes to an existing profile are applied with
//! [`ProfileStore::modify`], so overlapping requests never drop each other's
//! edits.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::Local;
use shared::{
    DeleteProfileResponse, DogProfile, ProfileListResponse, ProfileResponse, Route, SaveProfileRequest,
    VaccinationAdviceResponse, VaccinationInput,
};
use tracing::{error, info};

use super::profile_error_response;
use crate::domain::{DraftField, ProfileEditor, ProfileError, PromptResponse};
use crate::AppState;

/// Create a router for profile related APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_profiles).post(create_profile))
        .route("/:id", get(get_profile).put(update_profile).delete(delete_profile))
        .route("/:id/vaccinations", post(add_vaccination))
        .route("/:id/vaccinations/:vaccination_id", delete(remove_vaccination))
        .route("/:id/vaccination-advice", get(get_vaccination_advice))
}

/// List all profiles in insertion order
pub async fn list_profiles(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/dogs");

    let profiles = state.profile_store.list().await;
    (StatusCode::OK, Json(ProfileListResponse { profiles }))
}

pub async fn get_profile(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    info!("GET /api/dogs/{}", id);

    match state.profile_store.get(&id).await {
        Some(profile) => (StatusCode::OK, Json(profile)).into_response(),
        None => profile_error_response(ProfileError::NotFound(id)),
    }
}

/// Create a profile, optionally linked to a tag and with initial vaccinations
pub async fn create_profile(State(state): State<AppState>, Json(request): Json<SaveProfileRequest>) -> Response {
    info!("POST /api/dogs - name: {}, tag: {:?}", request.name, request.nfc_id);

    let mut editor = ProfileEditor::new_profile(request.nfc_id.clone());
    apply_request(&mut editor, &request);

    for input in request.vaccinations {
        if let Err(e) = editor.add_vaccination(PromptResponse::Submit(input)) {
            return profile_error_response(e.into());
        }
    }

    let result = editor.submit(&state.profile_store).await.map(|(profile, _)| profile);
    saved_response(result, StatusCode::CREATED, "created")
}

/// Update the editable fields of a profile. Vaccinations are left alone.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SaveProfileRequest>,
) -> Response {
    info!("PUT /api/dogs/{}", id);

    let result = state
        .profile_store
        .modify(&id, |current| {
            let mut editor = ProfileEditor::edit(current);
            apply_request(&mut editor, &request);
            Ok(editor.validated_profile()?)
        })
        .await;

    saved_response(result, StatusCode::OK, "updated")
}

pub async fn delete_profile(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    info!("DELETE /api/dogs/{}", id);

    match state.profile_store.remove(&id).await {
        Ok(deleted) => (
            StatusCode::OK,
            Json(DeleteProfileResponse {
                deleted,
                route: Route::Home,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to delete profile {}: {}", id, e);
            profile_error_response(e)
        }
    }
}

pub async fn add_vaccination(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<VaccinationInput>,
) -> Response {
    info!("POST /api/dogs/{}/vaccinations - {}", id, input.name);

    let result = state
        .profile_store
        .modify(&id, |current| {
            let mut editor = ProfileEditor::edit(current);
            editor.add_vaccination(PromptResponse::Submit(input))?;
            Ok(editor.validated_profile()?)
        })
        .await;

    saved_response(result, StatusCode::CREATED, "updated")
}

pub async fn remove_vaccination(
    State(state): State<AppState>,
    Path((id, vaccination_id)): Path<(String, String)>,
) -> Response {
    info!("DELETE /api/dogs/{}/vaccinations/{}", id, vaccination_id);

    let result = state
        .profile_store
        .modify(&id, |current| {
            let mut editor = ProfileEditor::edit(current);
            if editor.remove_vaccination(&vaccination_id).is_none() {
                return Err(ProfileError::VaccinationNotFound(vaccination_id.clone()));
            }
            Ok(editor.validated_profile()?)
        })
        .await;

    saved_response(result, StatusCode::OK, "updated")
}

/// Recommended vaccines for the dog's breed and current age
pub async fn get_vaccination_advice(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    info!("GET /api/dogs/{}/vaccination-advice", id);

    let Some(profile) = state.profile_store.get(&id).await else {
        return profile_error_response(ProfileError::NotFound(id));
    };

    let age_in_months = profile.age_in_months(Local::now().date_naive());
    let recommendations = state
        .vaccination_advice
        .recommend(&profile.breed, age_in_months)
        .await;

    let response = VaccinationAdviceResponse {
        breed: profile.breed,
        age_in_months,
        recommendations,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Copy the request into the draft. Optional fields that are absent keep the
/// draft's value.
fn apply_request(editor: &mut ProfileEditor, request: &SaveProfileRequest) {
    editor.set_field(DraftField::Name(request.name.clone()));
    editor.set_field(DraftField::Breed(request.breed.clone()));
    if let Some(gender) = request.gender {
        editor.set_field(DraftField::Gender(gender));
    }
    if let Some(birth_date) = request.birth_date {
        editor.set_field(DraftField::BirthDate(birth_date));
    }
    if let Some(photo_url) = &request.photo_url {
        editor.set_field(DraftField::PhotoUrl(Some(photo_url.clone())));
    }
    if let Some(nfc_id) = &request.nfc_id {
        editor.set_field(DraftField::NfcId(Some(nfc_id.clone())));
    }
}

fn saved_response(result: Result<DogProfile, ProfileError>, status: StatusCode, verb: &str) -> Response {
    match result {
        Ok(profile) => {
            let route = Route::ProfileDetail { id: profile.id.clone() };
            let success_message = format!("Profile for {} {}", profile.name, verb);
            (status, Json(ProfileResponse { profile, route, success_message })).into_response()
        }
        Err(e) => {
            error!("Failed to save profile: {}", e);
            profile_error_response(e)
        }
    }
}
