use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::{
    adherence_summary, dose_log_list, user_create, user_delete, user_get, user_list,
    user_medication_list_by_user, user_update, AdherenceDto, DoseLogFilter, DoseLogListReq,
    DoseLogPage, UserCreateReq, UserDto, UserUpdateReq,
};
use crate::error::AppError;
use crate::routes::extract::{AppJson, AppQuery};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserMedicationListQuery {
    pub include_inactive: Option<bool>,
}

pub async fn create_user(
    State(state): State<AppState>,
    AppJson(req): AppJson<UserCreateReq>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    let user = state.run(move |pool| user_create(pool, req)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let users = state.run(user_list).await?;
    Ok(Json(json!({ "users": users })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserDto>, AppError> {
    let user = state.run(move |pool| user_get(pool, &user_id)).await?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppJson(req): AppJson<UserUpdateReq>,
) -> Result<Json<UserDto>, AppError> {
    let user = state
        .run(move |pool| user_update(pool, &user_id, req))
        .await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.run(move |pool| user_delete(pool, &user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_user_medications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppQuery(query): AppQuery<UserMedicationListQuery>,
) -> Result<Json<Value>, AppError> {
    let include_inactive = query.include_inactive.unwrap_or(false);
    let medications = state
        .run(move |pool| user_medication_list_by_user(pool, &user_id, include_inactive))
        .await?;
    Ok(Json(json!({ "medications": medications })))
}

pub async fn list_medication_logs(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppQuery(req): AppQuery<DoseLogListReq>,
) -> Result<Json<DoseLogPage>, AppError> {
    let page = state
        .run(move |pool| dose_log_list(pool, &user_id, req))
        .await?;
    Ok(Json(page))
}

pub async fn get_adherence(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppQuery(filter): AppQuery<DoseLogFilter>,
) -> Result<Json<AdherenceDto>, AppError> {
    let summary = state
        .run(move |pool| adherence_summary(pool, &user_id, filter))
        .await?;
    Ok(Json(summary))
}
