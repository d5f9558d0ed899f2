use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::CoreError;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the pool and apply the embedded migrations.
///
/// `:memory:` gets a uniquely named shared-cache database per call so
/// parallel tests never see each other's rows.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, CoreError> {
    let url = config.url.as_str();
    let db_pool = if url == ":memory:" || url == "sqlite::memory:" {
        let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let options = SqliteConnectOptions::new()
            .filename(format!(
                "file:mentorlink-memdb-{}-{id}?mode=memory&cache=shared",
                std::process::id()
            ))
            .shared_cache(true)
            .create_if_missing(true);

        // the database lives only as long as a connection does
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?
    } else {
        let options = if url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(url)?
        } else {
            SqliteConnectOptions::new().filename(url)
        };

        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(
                options
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .foreign_keys(true),
            )
            .await?
    };

    sqlx::migrate!("./migrations").run(&db_pool).await?;
    info!(url, "database ready");

    Ok(db_pool)
}
