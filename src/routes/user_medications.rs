use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::app::{
    user_medication_create, user_medication_delete, user_medication_get, user_medication_update,
    UserMedicationCreateReq, UserMedicationDto, UserMedicationUpdateReq,
};
use crate::error::AppError;
use crate::routes::extract::AppJson;
use crate::state::AppState;

pub async fn create_user_medication(
    State(state): State<AppState>,
    AppJson(req): AppJson<UserMedicationCreateReq>,
) -> Result<(StatusCode, Json<UserMedicationDto>), AppError> {
    let user_medication = state
        .run(move |pool| user_medication_create(pool, req))
        .await?;
    Ok((StatusCode::CREATED, Json(user_medication)))
}

pub async fn get_user_medication(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserMedicationDto>, AppError> {
    let user_medication = state.run(move |pool| user_medication_get(pool, &id)).await?;
    Ok(Json(user_medication))
}

pub async fn update_user_medication(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UserMedicationUpdateReq>,
) -> Result<Json<UserMedicationDto>, AppError> {
    let user_medication = state
        .run(move |pool| user_medication_update(pool, &id, req))
        .await?;
    Ok(Json(user_medication))
}

pub async fn delete_user_medication(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |pool| user_medication_delete(pool, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
