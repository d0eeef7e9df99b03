//! Medication catalog use cases.

use crate::domain::MAX_FREQUENCY_MINUTES;
use crate::error::AppError;
use crate::infra::get_connection;
use crate::infra::DbPool;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct MedicationCreateReq {
    pub name: String,
    pub default_dosage: Option<i64>,
    pub default_unit: Option<String>,
    pub default_frequency_minutes: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationDto {
    pub id: String,
    pub name: String,
    pub default_dosage: Option<i64>,
    pub default_unit: Option<String>,
    pub default_frequency_minutes: Option<i64>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MedicationUpdateReq {
    pub name: Option<String>,
    pub default_dosage: Option<i64>,
    pub default_unit: Option<String>,
    pub default_frequency_minutes: Option<i64>,
    pub is_active: Option<bool>,
}

const MEDICATION_COLUMNS: &str = "id, name, default_dosage, default_unit, default_frequency_minutes, is_active, created_at, updated_at";

fn map_medication(row: &rusqlite::Row<'_>) -> rusqlite::Result<MedicationDto> {
    Ok(MedicationDto {
        id: row.get(0)?,
        name: row.get(1)?,
        default_dosage: row.get(2)?,
        default_unit: row.get(3)?,
        default_frequency_minutes: row.get(4)?,
        is_active: row.get::<_, i32>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(crate) fn positive(field: &str, value: Option<i64>) -> Result<Option<i64>, AppError> {
    match value {
        Some(v) if v <= 0 => Err(AppError::Validation(format!("{} must be greater than 0", field))),
        other => Ok(other),
    }
}

/// Dosing interval in minutes: positive and at most [`MAX_FREQUENCY_MINUTES`].
pub(crate) fn frequency(field: &str, value: Option<i64>) -> Result<Option<i64>, AppError> {
    match positive(field, value)? {
        Some(v) if v > MAX_FREQUENCY_MINUTES => Err(AppError::Validation(format!(
            "{} must be at most {}",
            field, MAX_FREQUENCY_MINUTES
        ))),
        other => Ok(other),
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn medication_create(pool: &DbPool, req: MedicationCreateReq) -> Result<MedicationDto, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    let default_dosage = positive("default_dosage", req.default_dosage)?;
    let default_frequency_minutes =
        frequency("default_frequency_minutes", req.default_frequency_minutes)?;
    let default_unit = blank_to_none(req.default_unit);
    let is_active = req.is_active.unwrap_or(true);

    let conn = get_connection(pool);
    if find_medication_by_name(&conn, name)?.is_some() {
        return Err(AppError::Conflict(format!("medication '{}' already exists", name)));
    }
    let dto = insert_medication(
        &conn,
        name,
        default_dosage,
        default_unit,
        default_frequency_minutes,
        is_active,
    )?;
    log::info!("Created medication {} ({})", dto.id, dto.name);
    Ok(dto)
}

pub fn medication_list(pool: &DbPool, only_active: bool) -> Result<Vec<MedicationDto>, AppError> {
    let conn = get_connection(pool);
    let sql = if only_active {
        format!("SELECT {} FROM medications WHERE is_active = 1 ORDER BY name COLLATE NOCASE", MEDICATION_COLUMNS)
    } else {
        format!("SELECT {} FROM medications ORDER BY name COLLATE NOCASE", MEDICATION_COLUMNS)
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_medication)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn medication_get(pool: &DbPool, id: &str) -> Result<MedicationDto, AppError> {
    let conn = get_connection(pool);
    find_medication(&conn, id)
}

pub fn medication_update(
    pool: &DbPool,
    id: &str,
    req: MedicationUpdateReq,
) -> Result<MedicationDto, AppError> {
    let conn = get_connection(pool);
    let current = find_medication(&conn, id)?;

    let name = match req.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::Validation("name is required".into())),
        Some(n) => n.to_string(),
        None => current.name,
    };
    if let Some(other) = find_medication_by_name(&conn, &name)? {
        if other.id != id {
            return Err(AppError::Conflict(format!("medication '{}' already exists", name)));
        }
    }
    let default_dosage = positive("default_dosage", req.default_dosage)?.or(current.default_dosage);
    let default_frequency_minutes =
        frequency("default_frequency_minutes", req.default_frequency_minutes)?
            .or(current.default_frequency_minutes);
    let default_unit = match req.default_unit {
        Some(u) => blank_to_none(Some(u)),
        None => current.default_unit,
    };
    let is_active = req.is_active.unwrap_or(current.is_active);
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "UPDATE medications SET name = ?1, default_dosage = ?2, default_unit = ?3, default_frequency_minutes = ?4, is_active = ?5, updated_at = ?6 WHERE id = ?7",
        params![
            &name,
            default_dosage,
            default_unit,
            default_frequency_minutes,
            is_active as i32,
            &now,
            id
        ],
    )?;

    find_medication(&conn, id)
}

/// Delete a catalog entry. Blocked while any user medication references it;
/// retire it with `is_active = false` instead.
pub fn medication_delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let conn = get_connection(pool);
    find_medication(&conn, id)?;

    let in_use: i64 = conn.query_row(
        "SELECT COUNT(1) FROM user_medications WHERE medication_id = ?1",
        [id],
        |r| r.get(0),
    )?;
    if in_use > 0 {
        return Err(AppError::MedicationInUse(in_use));
    }

    conn.execute("DELETE FROM medications WHERE id = ?1", [id])?;
    log::info!("Deleted medication {}", id);
    Ok(())
}

pub(crate) fn find_medication(conn: &Connection, id: &str) -> Result<MedicationDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM medications WHERE id = ?1", MEDICATION_COLUMNS),
        [id],
        map_medication,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("medication {}", id)))
}

/// Names are unique case-insensitively (column collation).
pub(crate) fn find_medication_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<MedicationDto>, AppError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM medications WHERE name = ?1", MEDICATION_COLUMNS),
            [name.trim()],
            map_medication,
        )
        .optional()?)
}

pub(crate) fn insert_medication(
    conn: &Connection,
    name: &str,
    default_dosage: Option<i64>,
    default_unit: Option<String>,
    default_frequency_minutes: Option<i64>,
    is_active: bool,
) -> Result<MedicationDto, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO medications (id, name, default_dosage, default_unit, default_frequency_minutes, is_active, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            &id,
            name,
            default_dosage,
            &default_unit,
            default_frequency_minutes,
            is_active as i32,
            &now
        ],
    )?;
    Ok(MedicationDto {
        id,
        name: name.to_string(),
        default_dosage,
        default_unit,
        default_frequency_minutes,
        is_active,
        created_at: now.clone(),
        updated_at: now,
    })
}
