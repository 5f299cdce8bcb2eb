//! API request handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use species_filter_applier::ApplyMode;
use species_filter_core::FilterRequest;
use species_filter_storage::{FilterStorage, ObservationStorage};
use std::sync::Arc;
use uuid::Uuid;

use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ApplyParams {
    #[serde(default)]
    pub mode: ApplyMode,
}

// ==================== Filter Handlers ====================

/// Create a new filter
pub async fn create_filter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FilterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = req.into_filter();
    filter.validate()?;

    let saved = FilterStorage::save(state.filter_storage.as_ref(), filter).await?;

    tracing::info!("Created filter '{}' ({})", saved.name, saved.id);

    Ok((StatusCode::CREATED, Json(saved)))
}

/// Get a filter by ID
pub async fn get_filter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = FilterStorage::get_by_id(state.filter_storage.as_ref(), id).await?;

    match filter {
        Some(f) => Ok(Json(f)),
        None => Err(ApiError::NotFound(format!("Filter {} not found", id))),
    }
}

/// List all filters
pub async fn list_filters(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let filters = FilterStorage::list(state.filter_storage.as_ref()).await?;
    Ok(Json(filters))
}

/// Replace a filter's fields
pub async fn update_filter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<FilterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut filter = FilterStorage::get_by_id(state.filter_storage.as_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Filter {} not found", id)))?;

    filter.replace_with(req);
    filter.validate()?;

    let saved = FilterStorage::update(state.filter_storage.as_ref(), filter).await?;

    tracing::info!("Updated filter '{}' ({})", saved.name, saved.id);

    Ok(Json(saved))
}

/// Delete a filter
pub async fn delete_filter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    FilterStorage::delete(state.filter_storage.as_ref(), id).await?;
    tracing::info!("Deleted filter {}", id);
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Application Handlers ====================

/// Apply one filter, whether or not it is enabled
pub async fn apply_filter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ApplyParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = FilterStorage::get_by_id(state.filter_storage.as_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Filter {} not found", id)))?;

    let report = state.applier.apply_with(&filter, params.mode).await?;

    tracing::info!(
        "Applied filter '{}': {} updated, {} failed",
        filter.name,
        report.updated,
        report.failed.len()
    );

    Ok(Json(report))
}

/// Apply every enabled filter in creation order
pub async fn apply_enabled_filters(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let filters = FilterStorage::list(state.filter_storage.as_ref()).await?;
    let response = state.applier.apply_enabled(&filters).await?;

    tracing::info!(
        "Applied {} filters ({} skipped): {} observations updated",
        response.reports.len(),
        response.skipped,
        response.updated
    );

    Ok(Json(response))
}

// ==================== Observation Handlers ====================

/// Get an observation by ID
pub async fn get_observation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let observation = ObservationStorage::get_by_id(state.observation_storage.as_ref(), id).await?;

    match observation {
        Some(o) => Ok(Json(o)),
        None => Err(ApiError::NotFound(format!("Observation {} not found", id))),
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "species-filter"
    }))
}
