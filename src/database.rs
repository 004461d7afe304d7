use std::path::Path;
use std::time::Duration;

use log::info;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension};

use crate::error::PagePulseError;
use crate::schema::{CREATE_SCHEMA_SQL, SCHEMA_VERSION};

pub type DbConnection = PooledConnection<SqliteConnectionManager>;

#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    const POOL_SIZE: u32 = 4;
    const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn open(db_path: &Path) -> Result<Self, PagePulseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.busy_timeout(Self::BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder().max_size(Self::POOL_SIZE).build(manager)?;

        let db = Database { pool };
        db.ensure_schema()?;
        info!("Database opened at: {}", db_path.display());

        Ok(db)
    }

    pub fn conn(&self) -> Result<DbConnection, PagePulseError> {
        Ok(self.pool.get()?)
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction, committing on success
    /// and rolling back on error.
    pub fn immediate_transaction<F, T>(conn: &Connection, f: F) -> Result<T, PagePulseError>
    where
        F: FnOnce(&Connection) -> Result<T, PagePulseError>,
    {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    fn ensure_schema(&self) -> Result<(), PagePulseError> {
        let conn = self.conn()?;

        let table_exists: bool = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='meta'",
                [],
                |row| row.get::<_, i32>(0),
            )
            .map(|count| count > 0)?;

        if !table_exists {
            conn.execute_batch(CREATE_SCHEMA_SQL)?;
            return Ok(());
        }

        let stored_version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored_version.as_deref() {
            Some(SCHEMA_VERSION) => Ok(()),
            Some(other) => Err(PagePulseError::Error(format!(
                "Schema version mismatch: database has {}, expected {}",
                other, SCHEMA_VERSION
            ))),
            None => Err(PagePulseError::Error("Schema version missing".to_string())),
        }
    }
}
