//! Dose log use cases: record a dose (backfilling skipped ones), list history, adherence.

use crate::app::medication::{find_medication, positive};
use crate::app::user::ensure_user_exists;
use crate::app::user_medication::find_latest_for_medication;
use crate::domain::{
    format_ts, now_ts, parse_range_bound, parse_ts, plan_dose, summarize, AdherenceStats,
    DoseRecord, DoseStatus, RangeBound,
};
use crate::error::AppError;
use crate::infra::get_connection;
use crate::infra::DbPool;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct DoseLogCreateReq {
    pub user_id: String,
    pub actual_time: Option<String>,
    pub dosage: Option<i64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseLogDto {
    pub id: String,
    pub user_id: String,
    pub user_medication_id: String,
    pub medication_id: String,
    pub medication_name: String,
    pub expected_time: String,
    pub actual_time: String,
    pub dosage: i64,
    pub unit: String,
    pub notes: Option<String>,
    pub status: DoseStatus,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct DoseLogRecordResult {
    pub log: DoseLogDto,
    /// Skipped-dose rows written ahead of this dose.
    pub skipped_doses: usize,
}

/// Filters shared by the history listing and the adherence summary.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DoseLogFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub medication_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DoseLogListReq {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub medication_name: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl DoseLogListReq {
    pub fn filter(&self) -> DoseLogFilter {
        DoseLogFilter {
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            medication_name: self.medication_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoseLogPage {
    pub items: Vec<DoseLogDto>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct AdherenceDto {
    pub user_id: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub medication_name: Option<String>,
    #[serde(flatten)]
    pub stats: AdherenceStats,
}

const DOSE_LOG_SELECT: &str = "SELECT l.id, l.user_id, l.user_medication_id, um.medication_id, m.name, \
     l.expected_time, l.actual_time, l.dosage, l.unit, l.notes, l.created_at \
     FROM dose_logs l \
     JOIN user_medications um ON um.id = l.user_medication_id \
     JOIN medications m ON m.id = um.medication_id";

fn map_dose_log(r: &rusqlite::Row<'_>) -> rusqlite::Result<DoseLogDto> {
    let expected_time: String = r.get(5)?;
    let actual_time: String = r.get(6)?;
    let dosage: i64 = r.get(7)?;
    Ok(DoseLogDto {
        id: r.get(0)?,
        user_id: r.get(1)?,
        user_medication_id: r.get(2)?,
        medication_id: r.get(3)?,
        medication_name: r.get(4)?,
        status: DoseStatus::from_stored(&expected_time, &actual_time, dosage),
        expected_time,
        actual_time,
        dosage,
        unit: r.get(8)?,
        notes: r.get(9)?,
        created_at: r.get(10)?,
    })
}

/// Record a dose of `medication_id` for the user in `req`.
///
/// Targets the user's latest prescription of that medication. When whole
/// dosing intervals passed since the last taken dose, one skipped row
/// (dosage 0) is written per missed slot, in the same transaction.
pub fn dose_log_record(
    pool: &DbPool,
    medication_id: &str,
    req: DoseLogCreateReq,
) -> Result<DoseLogRecordResult, AppError> {
    let user_id = req.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id is required".into()));
    }
    let actual = match req.actual_time.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => parse_ts(raw).ok_or_else(|| {
            AppError::Validation(format!("actual_time '{}' is not an ISO 8601 timestamp", raw))
        })?,
        None => now_ts(),
    };
    let dosage_override = positive("dosage", req.dosage)?;
    let notes = req.notes.filter(|s| !s.trim().is_empty());

    let conn = get_connection(pool);
    let tx = conn.unchecked_transaction()?;

    ensure_user_exists(&tx, &user_id)?;
    find_medication(&tx, medication_id)?;
    let user_medication = find_latest_for_medication(&tx, &user_id, medication_id)?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "medication {} is not prescribed to user {}",
                medication_id, user_id
            ))
        })?;

    let dosage = dosage_override.unwrap_or(user_medication.dosage);
    let unit = req
        .unit
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| user_medication.unit.clone());

    let last_taken = last_taken_time(&tx, &user_medication.id)?;
    if let Some(last) = last_taken {
        if actual < last {
            return Err(AppError::Validation(format!(
                "actual_time {} is earlier than the last logged dose at {}",
                format_ts(actual),
                format_ts(last)
            )));
        }
    }
    let plan = plan_dose(last_taken, user_medication.frequency_minutes, actual)?;
    let now = Utc::now().to_rfc3339();

    for slot in &plan.skipped {
        let slot = format_ts(*slot);
        tx.execute(
            "INSERT INTO dose_logs (id, user_id, user_medication_id, expected_time, actual_time, dosage, unit, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?4, 0, ?5, NULL, ?6)",
            params![Uuid::new_v4().to_string(), &user_id, &user_medication.id, &slot, &unit, &now],
        )?;
    }

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO dose_logs (id, user_id, user_medication_id, expected_time, actual_time, dosage, unit, notes, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            &user_id,
            &user_medication.id,
            format_ts(plan.expected_time),
            format_ts(actual),
            dosage,
            &unit,
            &notes,
            &now
        ],
    )?;
    let entry = find_dose_log(&tx, &id)?;
    tx.commit()?;

    if !plan.skipped.is_empty() {
        log::info!(
            "Backfilled {} skipped dose(s) for user medication {}",
            plan.skipped.len(),
            user_medication.id
        );
    }
    Ok(DoseLogRecordResult {
        log: entry,
        skipped_doses: plan.skipped.len(),
    })
}

/// Dose history of a user, newest first.
pub fn dose_log_list(
    pool: &DbPool,
    user_id: &str,
    req: DoseLogListReq,
) -> Result<DoseLogPage, AppError> {
    let limit = req.limit.unwrap_or(50).clamp(1, 200);
    let offset = req.offset.unwrap_or(0).max(0);
    let (where_clause, mut bind_values) = build_filter(user_id, &req.filter())?;

    let conn = get_connection(pool);
    ensure_user_exists(&conn, user_id)?;

    let count_sql = format!(
        "SELECT COUNT(*) FROM dose_logs l \
         JOIN user_medications um ON um.id = l.user_medication_id \
         JOIN medications m ON m.id = um.medication_id{}",
        where_clause
    );
    let total: i64 = conn.query_row(
        &count_sql,
        rusqlite::params_from_iter(bind_values.iter()),
        |r| r.get(0),
    )?;

    let sql = format!(
        "{}{} ORDER BY l.actual_time DESC, l.rowid DESC LIMIT ? OFFSET ?",
        DOSE_LOG_SELECT, where_clause
    );
    bind_values.push(Value::Integer(limit));
    bind_values.push(Value::Integer(offset));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(bind_values.iter()), map_dose_log)?;
    let mut items = Vec::new();
    for r in rows {
        items.push(r?);
    }

    Ok(DoseLogPage {
        items,
        total,
        limit,
        offset,
    })
}

/// Adherence over the logs matching `filter`.
pub fn adherence_summary(
    pool: &DbPool,
    user_id: &str,
    filter: DoseLogFilter,
) -> Result<AdherenceDto, AppError> {
    let (where_clause, bind_values) = build_filter(user_id, &filter)?;

    let conn = get_connection(pool);
    ensure_user_exists(&conn, user_id)?;

    let sql = format!(
        "SELECT l.expected_time, l.actual_time, l.dosage FROM dose_logs l \
         JOIN user_medications um ON um.id = l.user_medication_id \
         JOIN medications m ON m.id = um.medication_id{}",
        where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(bind_values.iter()), |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?))
    })?;
    let mut records = Vec::new();
    for r in rows {
        let (expected, actual, dosage) = r?;
        match (parse_ts(&expected), parse_ts(&actual)) {
            (Some(expected_time), Some(actual_time)) => records.push(DoseRecord {
                expected_time,
                actual_time,
                dosage,
            }),
            _ => log::warn!("Ignoring dose log with unparseable times ({}, {})", expected, actual),
        }
    }

    Ok(AdherenceDto {
        user_id: user_id.to_string(),
        start_date: filter.start_date,
        end_date: filter.end_date,
        medication_name: filter.medication_name,
        stats: summarize(&records),
    })
}

fn build_filter(user_id: &str, filter: &DoseLogFilter) -> Result<(String, Vec<Value>), AppError> {
    let mut conditions = vec!["l.user_id = ?".to_string()];
    let mut bind_values = vec![Value::Text(user_id.to_string())];

    if let Some(raw) = filter.start_date.as_deref().filter(|s| !s.trim().is_empty()) {
        let start = parse_range_bound(raw, RangeBound::Start).ok_or_else(|| {
            AppError::Validation(format!("start_date '{}' is not an ISO 8601 date or timestamp", raw))
        })?;
        conditions.push("l.actual_time >= ?".to_string());
        bind_values.push(Value::Text(format_ts(start)));
    }
    if let Some(raw) = filter.end_date.as_deref().filter(|s| !s.trim().is_empty()) {
        let end = parse_range_bound(raw, RangeBound::End).ok_or_else(|| {
            AppError::Validation(format!("end_date '{}' is not an ISO 8601 date or timestamp", raw))
        })?;
        conditions.push("l.actual_time <= ?".to_string());
        bind_values.push(Value::Text(format_ts(end)));
    }
    if let Some(name) = filter.medication_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("m.name = ?".to_string());
        bind_values.push(Value::Text(name.to_string()));
    }

    Ok((format!(" WHERE {}", conditions.join(" AND ")), bind_values))
}

fn last_taken_time(
    conn: &Connection,
    user_medication_id: &str,
) -> Result<Option<chrono::DateTime<Utc>>, AppError> {
    let last: Option<String> = conn
        .query_row(
            "SELECT actual_time FROM dose_logs WHERE user_medication_id = ?1 AND dosage > 0 ORDER BY actual_time DESC LIMIT 1",
            [user_medication_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(last.as_deref().and_then(parse_ts))
}

fn find_dose_log(conn: &Connection, id: &str) -> Result<DoseLogDto, AppError> {
    conn.query_row(&format!("{} WHERE l.id = ?1", DOSE_LOG_SELECT), [id], map_dose_log)
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("dose log {}", id)))
}
