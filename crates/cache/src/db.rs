//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// Snapshot finalization writes from one task while object lookups read from
// others; a handful of connections is plenty.
const MAX_CONNECTIONS: u32 = 4;

/// Connection pool over one cache store.
///
/// Every store directory holds exactly one SQLite file; the pool is cheap to
/// clone and shared by every handle onto that store.
#[derive(Debug, Clone)]
pub(crate) struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Query-based PRAGMAs must be applied to every pooled connection,
            // not only the first one handed out.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open (creating if missing) the store file at `path`.
    pub(crate) async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(options, MAX_CONNECTIONS).await
    }

    /// Open a throwaway in-memory store.
    ///
    /// In-memory databases are per-connection, so the pool is limited to a
    /// single connection to keep every query on the same data.
    #[cfg(test)]
    pub(crate) async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        Self::new(options, 1).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL lets readers proceed while a put is being committed.
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // Durable on return from put; NORMAL is durable in WAL mode
            // except across power loss.
            .synchronous(SqliteSynchronous::Normal)
            // Concurrent puts queue on the single WAL writer.
            .busy_timeout(std::time::Duration::from_secs(5))
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::None)
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 1000;
                PRAGMA cache_size = -16384;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("performing cache migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for outstanding connections and close the pool.
    pub(crate) async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
