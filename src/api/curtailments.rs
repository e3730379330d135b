use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{error::ApiError, response::ApiResponse, AppState};
use crate::domain::{Curtailment, CurtailmentUpdate, NewCurtailment};
use crate::store::CurtailmentStore;

/// POST /api/v1/curtailments
pub async fn create_curtailment(
    State(state): State<AppState>,
    Json(new): Json<NewCurtailment>,
) -> Result<ApiResponse<Curtailment>, ApiError> {
    let curtailment = state.store.create_curtailment(new).await?;
    Ok(ApiResponse::created(curtailment))
}

/// GET /api/v1/curtailments/{uuid}
pub async fn get_curtailment(
    State(state): State<AppState>,
    Path(curtailment_uuid): Path<Uuid>,
) -> Result<ApiResponse<Curtailment>, ApiError> {
    Ok(ApiResponse::success(state.store.get_curtailment(curtailment_uuid).await?))
}

/// PUT /api/v1/curtailments/{uuid}
pub async fn update_curtailment(
    State(state): State<AppState>,
    Path(curtailment_uuid): Path<Uuid>,
    Json(update): Json<CurtailmentUpdate>,
) -> Result<ApiResponse<Curtailment>, ApiError> {
    let updated = state.store.update_curtailment(curtailment_uuid, update).await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/v1/curtailments/{uuid}
pub async fn delete_curtailment(
    State(state): State<AppState>,
    Path(curtailment_uuid): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_curtailment(curtailment_uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/sites/{site_uuid}/curtailments
pub async fn list_site_curtailments(
    State(state): State<AppState>,
    Path(site_uuid): Path<Uuid>,
) -> Result<ApiResponse<Vec<Curtailment>>, ApiError> {
    let curtailments = state.store.list_curtailments(site_uuid).await?;
    let count = curtailments.len();
    Ok(ApiResponse::success(curtailments).with_count(count))
}
