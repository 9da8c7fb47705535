//! Database Connection Pool Module
//!
//! PostgreSQL implementation of [`TodoStore`] over a deadpool-postgres pool.
//! Every call is one parameterized statement; caching happens elsewhere.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use tokio_postgres::{NoTls, Row};
use todocache_core::{NewTodo, StoreError, StoreResult, Todo, TodoId};
use todocache_storage::TodoStore;

use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS todos (
    id          SERIAL PRIMARY KEY,
    title       TEXT NOT NULL,
    completed   BOOLEAN NOT NULL DEFAULT FALSE,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
)";

const SELECT_ONE_SQL: &str =
    "SELECT id, title, completed, created_at, updated_at FROM todos WHERE id = $1";

const SELECT_ALL_SQL: &str =
    "SELECT id, title, completed, created_at, updated_at FROM todos ORDER BY id";

const INSERT_SQL: &str = "INSERT INTO todos (title, completed, created_at, updated_at) \
     VALUES ($1, $2, $3, $4) RETURNING id";

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/create/recycle timeout for pooled connections
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "mysecretpassword".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("TODOCACHE_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("TODOCACHE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("TODOCACHE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("TODOCACHE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("TODOCACHE_DB_PASSWORD").unwrap_or(defaults.password),
            max_size: std::env::var("TODOCACHE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("TODOCACHE_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened until the pool is first used.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(self.max_size);
        pool_config.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// Record store backed by the `todos` table.
#[derive(Clone)]
pub struct PgTodoStore {
    pool: Pool,
}

impl PgTodoStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build the pool, check a connection out and make sure the table exists.
    ///
    /// Failure here is fatal at startup: a node never runs without its store.
    pub async fn connect(config: &DbConfig) -> ApiResult<Self> {
        let store = Self::new(config.create_pool()?);
        let conn = store.pool.get().await?;
        conn.batch_execute(SCHEMA_SQL).await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            pool_size = config.max_size,
            "Connected to PostgreSQL"
        );
        Ok(store)
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> StoreResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| backend_error("acquire", e))
    }

    async fn query_one_todo(&self, id: TodoId) -> StoreResult<Todo> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(SELECT_ONE_SQL, &[&id])
            .await
            .map_err(|e| backend_error("fetch_one", e))?;

        match row {
            Some(row) => row_to_todo(&row),
            None => Err(StoreError::not_found(id.to_string())),
        }
    }

    async fn query_all_todos(&self) -> StoreResult<Vec<Todo>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(SELECT_ALL_SQL, &[])
            .await
            .map_err(|e| backend_error("fetch_all", e))?;
        rows.iter().map(row_to_todo).collect()
    }

    async fn insert_todo(&self, todo: &NewTodo) -> StoreResult<TodoId> {
        let now = Utc::now();
        let created_at = todo.created_at.unwrap_or(now);
        let updated_at = todo.updated_at.unwrap_or(created_at);

        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                INSERT_SQL,
                &[&todo.title, &todo.completed, &created_at, &updated_at],
            )
            .await
            .map_err(|e| backend_error("insert", e))?;
        row.try_get("id").map_err(|e| backend_error("insert", e))
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn fetch_one(&self, id: TodoId) -> StoreResult<Todo> {
        timed("fetch_one", self.query_one_todo(id)).await
    }

    async fn fetch_all(&self) -> StoreResult<Vec<Todo>> {
        timed("fetch_all", self.query_all_todos()).await
    }

    async fn insert(&self, todo: &NewTodo) -> StoreResult<TodoId> {
        timed("insert", self.insert_todo(todo)).await
    }

    async fn ping(&self) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| backend_error("ping", e))
    }
}

/// Run a store operation and record its outcome and latency.
///
/// A missing record is an answer, not a failure, so it counts as success.
async fn timed<T>(
    operation: &'static str,
    fut: impl std::future::Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    let start = Instant::now();
    let result = fut.await;
    if let Some(m) = metrics() {
        let success = match &result {
            Ok(_) => true,
            Err(err) => err.is_not_found(),
        };
        m.record_store_operation(operation, success, start.elapsed().as_secs_f64());
    }
    result
}

fn row_to_todo(row: &Row) -> StoreResult<Todo> {
    let decode = |e: tokio_postgres::Error| StoreError::Codec {
        reason: e.to_string(),
    };
    Ok(Todo {
        id: row.try_get("id").map_err(decode)?,
        title: row.try_get("title").map_err(decode)?,
        completed: row.try_get("completed").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn backend_error(operation: &str, err: impl std::fmt::Display) -> StoreError {
    tracing::error!(operation, error = %err, "PostgreSQL operation failed");
    StoreError::backend(format!("{}: {}", operation, err))
}
