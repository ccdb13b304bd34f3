//! Connection and transaction management.
//!
//! A [`Database`] wraps a SQLite connection pool. Statements go to the
//! transaction of the scope active in the current task, or straight to the
//! pool (autocommit) when there is none. See [`crate::db::transaction`].

use crate::config::{DatabaseConfig, PoolOptions};
use crate::db::params::build_sqlite_query;
use crate::db::query::Query;
use crate::db::transaction::{TransactionScope, active_scope};
use crate::db::types::decode_row;
use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use futures_util::TryStreamExt;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

static NEXT_DATABASE_ID: AtomicU64 = AtomicU64::new(1);

/// A SQLite database. Clones share the pool and the transaction scopes.
#[derive(Clone)]
pub struct Database {
    id: u64,
    pool: SqlitePool,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("pool_size", &self.pool.size())
            .field("idle", &self.pool.num_idle())
            .finish()
    }
}

impl Database {
    /// Open a pool for a parsed connection configuration. The database file
    /// is created if it does not exist.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let pool_opts = &config.pool_options;
        let options = SqliteConnectOptions::from_str(&config.connection_string)
            .map_err(|e| {
                DbError::connection(
                    format!("Invalid SQLite connection string: {}", e),
                    "Check the connection URL format: sqlite:path/to/db.sqlite",
                )
            })?
            .create_if_missing(true)
            .busy_timeout(pool_opts.busy_timeout_or_default());

        let pool = Self::pool_options(pool_opts)
            .connect_with(options)
            .await
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to connect: {}", e),
                    "Verify the file path exists and is accessible: sqlite:path/to/db.sqlite",
                )
            })?;

        let database = Self::from_pool(pool);
        info!(
            database_id = database.id,
            max_connections = pool_opts.max_connections_or_default(),
            "Connected to database"
        );
        Ok(database)
    }

    /// Parse `url` (with optional pool options) and connect.
    pub async fn open(url: &str) -> DbResult<Self> {
        let config = DatabaseConfig::parse(url).map_err(|e| {
            DbError::connection(e, "Check the connection URL format: sqlite:path/to/db.sqlite")
        })?;
        Self::connect(&config).await
    }

    /// Wrap an existing pool. Each call creates a distinct database as far
    /// as transaction scopes are concerned.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            id: NEXT_DATABASE_ID.fetch_add(1, Ordering::Relaxed),
            pool,
        }
    }

    fn pool_options(opts: &PoolOptions) -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .min_connections(opts.min_connections_or_default())
            .max_connections(opts.max_connections_or_default())
            .acquire_timeout(opts.acquire_timeout_or_default())
            .idle_timeout(Some(opts.idle_timeout_or_default()))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start an empty query.
    pub fn query(&self) -> Query {
        Query::new()
    }

    /// Run `f` inside a transaction scope.
    ///
    /// The outermost scope in a task begins a transaction, commits it when
    /// `f` succeeds and rolls it back when `f` fails. Nested scopes join the
    /// open transaction; a failing nested scope rolls it back immediately.
    /// The caller's error is returned unchanged. An outer scope that
    /// completes successfully after an inner one failed reports
    /// [`DbError::TransactionAborted`].
    ///
    /// ```ignore
    /// db.transaction(|| async move {
    ///     table.insert(&a).await?;
    ///     table.insert(&b).await?;
    ///     Ok::<_, DbError>(())
    /// })
    /// .await?;
    /// ```
    pub async fn transaction<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        if let Some(scope) = active_scope(self.id) {
            return scope.run_nested(f).await;
        }
        let transaction = self.pool.begin().await.map_err(DbError::from)?;
        TransactionScope::run_outermost(self.id, transaction, f).await
    }

    /// Nesting depth of the transaction scope active in the current task;
    /// 0 when idle.
    pub fn transaction_depth(&self) -> usize {
        active_scope(self.id).map_or(0, |scope| scope.depth())
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&self, query: &Query) -> DbResult<u64> {
        let scope = active_scope(self.id);
        debug!(
            sql = %query.sql(),
            params = query.params().len(),
            transaction_id = scope.as_ref().map(|s| s.transaction_id()),
            "Executing statement"
        );

        let statement = build_sqlite_query(query.sql(), query.params());
        let result = match scope {
            Some(scope) => {
                let mut tx = scope.lock().await?;
                statement.execute(&mut **tx).await?
            }
            None => statement.execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    /// Run a query and return every row, decoded into storage-class values.
    pub async fn fetch(&self, query: &Query) -> DbResult<Vec<Vec<SqlValue>>> {
        let scope = active_scope(self.id);
        debug!(
            sql = %query.sql(),
            params = query.params().len(),
            transaction_id = scope.as_ref().map(|s| s.transaction_id()),
            "Executing query"
        );

        let statement = build_sqlite_query(query.sql(), query.params());
        let rows: Vec<SqliteRow> = match scope {
            Some(scope) => {
                let mut tx = scope.lock().await?;
                statement.fetch(&mut **tx).try_collect().await?
            }
            None => statement.fetch(&self.pool).try_collect().await?,
        };
        rows.iter().map(decode_row).collect()
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        info!(database_id = self.id, "Database closed");
    }
}
