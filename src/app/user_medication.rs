//! User medication use cases: prescribe, read, adjust, stop.

use crate::app::medication::{
    find_medication, find_medication_by_name, frequency, insert_medication, positive,
};
use crate::app::user::ensure_user_exists;
use crate::domain::parse_date;
use crate::error::AppError;
use crate::infra::get_connection;
use crate::infra::DbPool;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct UserMedicationCreateReq {
    pub user_id: String,
    /// Existing catalog entry. Exactly one of `medication_id` and
    /// `medication_name` must be given.
    pub medication_id: Option<String>,
    /// Catalog name; the entry is created when it does not exist yet.
    pub medication_name: Option<String>,
    pub dosage: Option<i64>,
    pub unit: Option<String>,
    pub frequency_minutes: Option<i64>,
    pub instructions: Option<String>,
    pub start_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMedicationDto {
    pub id: String,
    pub user_id: String,
    pub medication_id: String,
    pub medication_name: String,
    pub is_active: bool,
    pub dosage: i64,
    pub unit: String,
    pub frequency_minutes: i64,
    pub instructions: Option<String>,
    pub start_date: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserMedicationUpdateReq {
    pub dosage: Option<i64>,
    pub unit: Option<String>,
    pub frequency_minutes: Option<i64>,
    pub instructions: Option<String>,
    pub start_date: Option<String>,
}

enum MedicationRef {
    Id(String),
    Name(String),
}

const USER_MEDICATION_SELECT: &str = "SELECT um.id, um.user_id, um.medication_id, m.name, m.is_active, \
     um.dosage, um.unit, um.frequency_minutes, um.instructions, um.start_date, um.created_at, um.updated_at \
     FROM user_medications um \
     JOIN medications m ON m.id = um.medication_id";

fn map_user_medication(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserMedicationDto> {
    Ok(UserMedicationDto {
        id: r.get(0)?,
        user_id: r.get(1)?,
        medication_id: r.get(2)?,
        medication_name: r.get(3)?,
        is_active: r.get::<_, i32>(4)? != 0,
        dosage: r.get(5)?,
        unit: r.get(6)?,
        frequency_minutes: r.get(7)?,
        instructions: r.get(8)?,
        start_date: r.get(9)?,
        created_at: r.get(10)?,
        updated_at: r.get(11)?,
    })
}

fn validate_start_date(raw: &str) -> Result<String, AppError> {
    parse_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| AppError::Validation(format!("start_date '{}' is not a YYYY-MM-DD date", raw)))
}

fn validate_unit(raw: &str) -> Result<String, AppError> {
    let unit = raw.trim();
    if unit.is_empty() {
        return Err(AppError::Validation("unit is required".into()));
    }
    Ok(unit.to_string())
}

pub fn user_medication_create(
    pool: &DbPool,
    req: UserMedicationCreateReq,
) -> Result<UserMedicationDto, AppError> {
    let user_id = req.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id is required".into()));
    }
    let medication_id = req.medication_id.filter(|s| !s.trim().is_empty());
    let medication_name = req
        .medication_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let medication_ref = match (medication_id, medication_name) {
        (Some(id), None) => MedicationRef::Id(id.trim().to_string()),
        (None, Some(name)) => MedicationRef::Name(name),
        _ => {
            return Err(AppError::Validation(
                "exactly one of medication_id or medication_name is required".into(),
            ))
        }
    };
    let start_date = match req.start_date.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => validate_start_date(raw)?,
        None => Utc::now().date_naive().format("%Y-%m-%d").to_string(),
    };
    let instructions = req.instructions.filter(|s| !s.trim().is_empty());

    let conn = get_connection(pool);
    let tx = conn.unchecked_transaction()?;

    ensure_user_exists(&tx, &user_id)?;

    let medication = match medication_ref {
        MedicationRef::Id(id) => find_medication(&tx, &id)?,
        MedicationRef::Name(name) => match find_medication_by_name(&tx, &name)? {
            Some(existing) => existing,
            None => {
                log::info!("Adding '{}' to the medication catalog", name);
                insert_medication(&tx, &name, None, None, None, true)?
            }
        },
    };
    if !medication.is_active {
        return Err(AppError::Validation(format!(
            "medication '{}' is inactive",
            medication.name
        )));
    }

    let dosage = positive("dosage", req.dosage)?
        .or(medication.default_dosage)
        .ok_or_else(|| AppError::Validation("dosage is required".into()))?;
    let frequency_minutes = frequency("frequency_minutes", req.frequency_minutes)?
        .or(medication.default_frequency_minutes)
        .ok_or_else(|| AppError::Validation("frequency_minutes is required".into()))?;
    let unit = match req.unit.as_deref() {
        Some(u) => validate_unit(u)?,
        None => medication
            .default_unit
            .clone()
            .ok_or_else(|| AppError::Validation("unit is required".into()))?,
    };

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO user_medications (id, user_id, medication_id, dosage, unit, frequency_minutes, instructions, start_date, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            &id,
            &user_id,
            &medication.id,
            dosage,
            &unit,
            frequency_minutes,
            &instructions,
            &start_date,
            &now
        ],
    )?;
    let dto = find_user_medication(&tx, &id)?;
    tx.commit()?;

    log::info!(
        "Prescribed medication {} to user {} as {}",
        dto.medication_id,
        dto.user_id,
        dto.id
    );
    Ok(dto)
}

pub fn user_medication_get(pool: &DbPool, id: &str) -> Result<UserMedicationDto, AppError> {
    let conn = get_connection(pool);
    find_user_medication(&conn, id)
}

/// All user medications of one user. Unless `include_inactive`, rows whose
/// catalog entry was retired are left out.
pub fn user_medication_list_by_user(
    pool: &DbPool,
    user_id: &str,
    include_inactive: bool,
) -> Result<Vec<UserMedicationDto>, AppError> {
    let conn = get_connection(pool);
    ensure_user_exists(&conn, user_id)?;

    let filter = if include_inactive { "" } else { " AND m.is_active = 1" };
    let mut stmt = conn.prepare(&format!(
        "{} WHERE um.user_id = ?1{} ORDER BY m.name COLLATE NOCASE, um.created_at DESC",
        USER_MEDICATION_SELECT, filter
    ))?;
    let rows = stmt.query_map([user_id], map_user_medication)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn user_medication_update(
    pool: &DbPool,
    id: &str,
    req: UserMedicationUpdateReq,
) -> Result<UserMedicationDto, AppError> {
    let conn = get_connection(pool);
    let current = find_user_medication(&conn, id)?;

    let dosage = positive("dosage", req.dosage)?.unwrap_or(current.dosage);
    let frequency_minutes =
        frequency("frequency_minutes", req.frequency_minutes)?.unwrap_or(current.frequency_minutes);
    let unit = match req.unit.as_deref() {
        Some(u) => validate_unit(u)?,
        None => current.unit,
    };
    let instructions = match req.instructions {
        Some(text) => Some(text).filter(|s| !s.trim().is_empty()),
        None => current.instructions,
    };
    let start_date = match req.start_date.as_deref() {
        Some(raw) => validate_start_date(raw)?,
        None => current.start_date,
    };
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "UPDATE user_medications SET dosage = ?1, unit = ?2, frequency_minutes = ?3, instructions = ?4, start_date = ?5, updated_at = ?6 WHERE id = ?7",
        params![dosage, &unit, frequency_minutes, &instructions, &start_date, &now, id],
    )?;

    find_user_medication(&conn, id)
}

/// Stop a prescription; its dose logs are removed with it.
pub fn user_medication_delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let conn = get_connection(pool);
    let rows = conn.execute("DELETE FROM user_medications WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("user medication {}", id)));
    }
    log::info!("Deleted user medication {}", id);
    Ok(())
}

pub(crate) fn find_user_medication(conn: &Connection, id: &str) -> Result<UserMedicationDto, AppError> {
    conn.query_row(
        &format!("{} WHERE um.id = ?1", USER_MEDICATION_SELECT),
        [id],
        map_user_medication,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("user medication {}", id)))
}

/// The user's most recent prescription of a catalog medication.
pub(crate) fn find_latest_for_medication(
    conn: &Connection,
    user_id: &str,
    medication_id: &str,
) -> Result<Option<UserMedicationDto>, AppError> {
    Ok(conn
        .query_row(
            &format!(
                "{} WHERE um.user_id = ?1 AND um.medication_id = ?2 ORDER BY um.created_at DESC, um.rowid DESC LIMIT 1",
                USER_MEDICATION_SELECT
            ),
            params![user_id, medication_id],
            map_user_medication,
        )
        .optional()?)
}
