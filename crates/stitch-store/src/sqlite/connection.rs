//! `SQLite` connection pool for the repair event log.
//!
//! Uses `r2d2` with the `r2d2_sqlite` backend. Every new connection gets WAL
//! journaling, a busy timeout, and `synchronous = NORMAL` via
//! [`PragmaCustomizer`].

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use stitch_settings::StorageSettings;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool configuration.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout_ms: 30_000,
        }
    }
}

impl From<&StorageSettings> for ConnectionConfig {
    fn from(settings: &StorageSettings) -> Self {
        Self {
            pool_size: settings.pool_size,
            busy_timeout_ms: settings.busy_timeout_ms,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        Ok(())
    }
}

/// In-memory pool, for tests.
///
/// Each `SQLite` in-memory connection is its own database, so the pool is
/// capped at one connection that is never recycled, regardless of
/// `config.pool_size`.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = builder(config)
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(SqliteConnectionManager::memory())?;
    Ok(pool)
}

/// File-backed pool. Parent directories are created as needed.
pub fn new_file(path: &std::path::Path, config: &ConnectionConfig) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let pool = builder(config)
        .max_size(config.pool_size.max(1))
        .build(SqliteConnectionManager::file(path))?;
    Ok(pool)
}

fn builder(config: &ConnectionConfig) -> r2d2::Builder<SqliteConnectionManager> {
    Pool::builder()
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
}

/// Current journal mode of a connection.
pub fn journal_mode(conn: &Connection) -> Result<String> {
    Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
