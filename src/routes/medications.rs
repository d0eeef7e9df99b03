use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::{
    dose_log_record, medication_create, medication_delete, medication_get, medication_list,
    medication_update, DoseLogCreateReq, DoseLogRecordResult, MedicationCreateReq, MedicationDto,
    MedicationUpdateReq,
};
use crate::error::AppError;
use crate::routes::extract::{AppJson, AppQuery};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MedicationListQuery {
    pub only_active: Option<bool>,
}

pub async fn create_medication(
    State(state): State<AppState>,
    AppJson(req): AppJson<MedicationCreateReq>,
) -> Result<(StatusCode, Json<MedicationDto>), AppError> {
    let medication = state.run(move |pool| medication_create(pool, req)).await?;
    Ok((StatusCode::CREATED, Json(medication)))
}

pub async fn list_medications(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MedicationListQuery>,
) -> Result<Json<Value>, AppError> {
    let only_active = query.only_active.unwrap_or(true);
    let medications = state
        .run(move |pool| medication_list(pool, only_active))
        .await?;
    Ok(Json(json!({ "medications": medications })))
}

pub async fn get_medication(
    State(state): State<AppState>,
    Path(medication_id): Path<String>,
) -> Result<Json<MedicationDto>, AppError> {
    let medication = state
        .run(move |pool| medication_get(pool, &medication_id))
        .await?;
    Ok(Json(medication))
}

pub async fn update_medication(
    State(state): State<AppState>,
    Path(medication_id): Path<String>,
    AppJson(req): AppJson<MedicationUpdateReq>,
) -> Result<Json<MedicationDto>, AppError> {
    let medication = state
        .run(move |pool| medication_update(pool, &medication_id, req))
        .await?;
    Ok(Json(medication))
}

pub async fn delete_medication(
    State(state): State<AppState>,
    Path(medication_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |pool| medication_delete(pool, &medication_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn log_medication_dose(
    State(state): State<AppState>,
    Path(medication_id): Path<String>,
    AppJson(req): AppJson<DoseLogCreateReq>,
) -> Result<(StatusCode, Json<DoseLogRecordResult>), AppError> {
    let recorded = state
        .run(move |pool| dose_log_record(pool, &medication_id, req))
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}
