//! User use cases.

use crate::error::AppError;
use crate::infra::get_connection;
use crate::infra::DbPool;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UserCreateReq {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdateReq {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, created_at, updated_at";

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserDto> {
    Ok(UserDto {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

pub fn user_create(pool: &DbPool, req: UserCreateReq) -> Result<UserDto, AppError> {
    let first_name = required("first_name", &req.first_name)?;
    let last_name = required("last_name", &req.last_name)?;
    let email = req.email.map(|e| e.trim().to_string()).unwrap_or_default();
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let conn = get_connection(pool);
    conn.execute(
        "INSERT INTO users (id, first_name, last_name, email, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, first_name, last_name, email, &now],
    )?;
    log::info!("Created user {}", id);

    Ok(UserDto {
        id,
        first_name,
        last_name,
        email,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn user_list(pool: &DbPool) -> Result<Vec<UserDto>, AppError> {
    let conn = get_connection(pool);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map([], map_user)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn user_get(pool: &DbPool, id: &str) -> Result<UserDto, AppError> {
    let conn = get_connection(pool);
    find_user(&conn, id)
}

pub fn user_update(pool: &DbPool, id: &str, req: UserUpdateReq) -> Result<UserDto, AppError> {
    let conn = get_connection(pool);
    let current = find_user(&conn, id)?;

    let first_name = match req.first_name.as_deref() {
        Some(v) => required("first_name", v)?,
        None => current.first_name,
    };
    let last_name = match req.last_name.as_deref() {
        Some(v) => required("last_name", v)?,
        None => current.last_name,
    };
    let email = req
        .email
        .map(|e| e.trim().to_string())
        .unwrap_or(current.email);
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3, updated_at = ?4 WHERE id = ?5",
        params![&first_name, &last_name, &email, &now, id],
    )?;

    find_user(&conn, id)
}

/// Delete a user; their user medications and dose logs go with them.
pub fn user_delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let conn = get_connection(pool);
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("user {}", id)));
    }
    log::info!("Deleted user {}", id);
    Ok(())
}

pub(crate) fn find_user(conn: &Connection, id: &str) -> Result<UserDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        map_user,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
}

pub(crate) fn ensure_user_exists(conn: &Connection, id: &str) -> Result<(), AppError> {
    let exists: bool = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |_| Ok(true))
        .optional()?
        .unwrap_or(false);
    if !exists {
        return Err(AppError::NotFound(format!("user {}", id)));
    }
    Ok(())
}
