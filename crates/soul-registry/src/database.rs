//! Database layer for the registry tables.

use soul_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Path that opens a private in-process database
pub const MEMORY_PATH: &str = ":memory:";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS objects (
        cid TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        source TEXT,
        size INTEGER NOT NULL,
        data BLOB NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS genes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        soul TEXT NOT NULL,
        source TEXT NOT NULL,
        cid TEXT NOT NULL REFERENCES objects(cid),
        ir TEXT NOT NULL,
        complexity REAL NOT NULL,
        purity REAL NOT NULL,
        size INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (soul, source)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_genes_soul ON genes(soul)",
    r#"
    CREATE TABLE IF NOT EXISTS equivalences (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        soul1 TEXT NOT NULL,
        soul2 TEXT NOT NULL,
        confidence REAL NOT NULL CHECK (confidence > 0.0 AND confidence <= 1.0),
        created_at INTEGER NOT NULL,
        CHECK (soul1 < soul2)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_equivalences_soul1 ON equivalences(soul1)",
    "CREATE INDEX IF NOT EXISTS idx_equivalences_soul2 ON equivalences(soul2)",
    r#"
    CREATE TABLE IF NOT EXISTS champions (
        canonical TEXT PRIMARY KEY,
        soul TEXT NOT NULL,
        source TEXT NOT NULL,
        score REAL NOT NULL,
        objectives TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organisms (
        name TEXT PRIMARY KEY,
        soulset TEXT NOT NULL,
        manifest TEXT NOT NULL REFERENCES objects(cid),
        targets TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attestations (
        id TEXT PRIMARY KEY,
        organism TEXT NOT NULL REFERENCES organisms(name),
        cid TEXT NOT NULL REFERENCES objects(cid),
        signature TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        soul TEXT NOT NULL,
        metric_type TEXT NOT NULL,
        value REAL NOT NULL,
        measured_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_metrics_soul ON metrics(soul, metric_type)",
];

/// Tables counted by [`Database::count`]
pub const TABLES: &[&str] = &[
    "objects",
    "genes",
    "equivalences",
    "champions",
    "organisms",
    "attestations",
    "metrics",
];

pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(format!("{}: {}", context, e))
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        let in_memory = path == MEMORY_PATH;

        if !in_memory {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Database(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))
            .map_err(db_error("Invalid database path"))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to :memory: is a separate database, so keep exactly one alive
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(db_error("Failed to connect to database"))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(db_error("Migration failed"))?;
        }

        info!("Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Row count of one of the registry [`TABLES`].
    pub async fn count(&self, table: &str) -> Result<usize> {
        if !TABLES.contains(&table) {
            return Err(Error::Database(format!("Unknown table {}", table)));
        }
        let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count rows"))?;

        let count: i64 = row.get("count");
        Ok(count as usize)
    }
}

/// Current time in milliseconds, the unit of every timestamp column
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
