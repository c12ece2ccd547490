use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateGoalPayload, CreateProfilePayload, GenerateRoadmapPayload, GeneratedRoadmapResponse, Goal,
    HealthResponse, LatestRoadmapQuery, Profile, RoadmapDocument,
};
use crate::service::PlannerCore;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    core: Arc<PlannerCore>,
}

impl AppState {
    pub fn new(core: Arc<PlannerCore>) -> Self {
        Self { core }
    }
}

pub fn build_router(core: Arc<PlannerCore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/profiles", post(create_profile))
        .route("/profiles/:id", get(get_profile))
        .route("/goals", post(create_goal))
        .route("/roadmaps/generate", post(generate_roadmap))
        .route("/roadmaps", get(latest_roadmap))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(core))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn create_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let payload = body_or_default(&headers, &body)?;
    let profile = blocking(state, move |core| core.create_profile(payload)).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn get_profile(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Profile>> {
    let profile = blocking(state, move |core| core.get_profile(&id)).await?;
    Ok(Json(profile))
}

async fn create_goal(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Goal>)> {
    let payload = body_or_default(&headers, &body)?;
    let goal = blocking(state, move |core| core.create_goal(payload)).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn generate_roadmap(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<GeneratedRoadmapResponse>)> {
    let payload = body_or_default(&headers, &body)?;
    let response = blocking(state, move |core| core.generate_roadmap(payload)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn latest_roadmap(
    State(state): State<AppState>,
    query: Result<Query<LatestRoadmapQuery>, QueryRejection>,
) -> AppResult<Json<RoadmapDocument>> {
    let Query(query) = query.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let document = blocking(state, move |core| core.latest_roadmap(query)).await?;
    Ok(Json(document))
}

/// A request whose body is empty or not sent as JSON is treated as an empty
/// object so the required-field checks produce the error. Malformed JSON is
/// rejected.
fn body_or_default<T: DeserializeOwned + Default>(headers: &HeaderMap, body: &Bytes) -> AppResult<T> {
    if !is_json_content(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Json::<T>::from_bytes(body)
        .map(|Json(payload)| payload)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

// SQLite calls block, so they run off the async executor.
async fn blocking<T, F>(state: AppState, work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&PlannerCore) -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&state.core)).await?
}
