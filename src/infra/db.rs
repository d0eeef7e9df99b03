//! SQLite connection and migrations.

use crate::error::AppError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct DbPool(pub Mutex<Connection>);

const MIGRATIONS: &[(i32, &str)] = &[
    (1, include_str!("../../migrations/0001_init.sql")),
    (2, include_str!("../../migrations/0002_dose_logs.sql")),
];

/// Initialize DB at path, run migrations, return managed pool.
pub fn init_db(db_path: &Path) -> Result<DbPool, AppError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AppError::Db(e.to_string()))?;
    }
    let conn = Connection::open(db_path).map_err(|e| AppError::Db(e.to_string()))?;
    open_pool(conn)
}

/// In-memory database with the full schema, for tests.
pub fn init_test_db() -> DbPool {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    open_pool(conn).expect("migrate in-memory db")
}

fn open_pool(mut conn: Connection) -> Result<DbPool, AppError> {
    migrate(&mut conn).map_err(|e| AppError::Db(format!("database setup failed: {}", e)))?;
    Ok(DbPool(Mutex::new(conn)))
}

/// Apply pending migrations in one transaction. Each script inserts its own
/// `schema_migrations` row.
fn migrate(conn: &mut Connection) -> rusqlite::Result<()> {
    // Per-connection setting; cascades and RESTRICT rely on it.
    conn.pragma_update(None, "foreign_keys", true)?;

    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    let current: i32 = tx.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |r| r.get(0),
    )?;
    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        tx.execute_batch(sql)?;
        log::info!("Applied migration {}", version);
    }
    tx.commit()
}

/// Lock the shared connection for the duration of one use case.
/// A poisoned lock is recovered; any open transaction was rolled back on drop.
pub fn get_connection(pool: &DbPool) -> MutexGuard<'_, Connection> {
    pool.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
