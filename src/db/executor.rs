//! Query execution.
//!
//! [`QueryRunner`] is the executor capability consumed by the tool handlers
//! and the export engine. It runs exactly the text it is given: bounding,
//! validation and pagination all happen before a statement gets here.
//!
//! [`PoolExecutor`] implements it over a [`DbPool`] with a per-query
//! timeout. Statements are sent without bind arguments, so drivers use the
//! simple query protocol and return values as text where they can.

use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::QueryBatch;
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Capability to run a statement and return its rows.
pub trait QueryRunner: Send + Sync {
    /// Execute `sql` verbatim and collect every row it returns.
    fn query(&self, sql: &str) -> impl Future<Output = DbResult<QueryBatch>> + Send;

    /// Run the dialect's EXPLAIN for `sql` and render the plan as text.
    fn explain(&self, sql: &str) -> impl Future<Output = DbResult<String>> + Send;
}

/// Executor bound to one connection pool.
#[derive(Debug, Clone)]
pub struct PoolExecutor {
    pool: DbPool,
    query_timeout: Duration,
    decode_binary: bool,
}

impl PoolExecutor {
    pub fn new(pool: DbPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
            decode_binary: false,
        }
    }

    /// Decode binary columns as UTF-8 text where possible instead of base64.
    pub fn with_decode_binary(mut self, decode_binary: bool) -> Self {
        self.decode_binary = decode_binary;
        self
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }
}

impl QueryRunner for PoolExecutor {
    async fn query(&self, sql: &str) -> DbResult<QueryBatch> {
        let start = Instant::now();
        debug!(sql = %sql, timeout_secs = self.query_timeout.as_secs(), "Executing query");

        let (columns, rows) = match &self.pool {
            DbPool::Postgres(p) => {
                let rows = postgres::fetch_rows(p, sql, self.query_timeout).await?;
                convert_rows(&rows, self.decode_binary)
            }
            DbPool::SQLite(p) => {
                let rows = sqlite::fetch_rows(p, sql, self.query_timeout).await?;
                convert_rows(&rows, self.decode_binary)
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(rows = rows.len(), duration_ms, "Query completed");
        Ok(QueryBatch::new(columns, rows, duration_ms))
    }

    async fn explain(&self, sql: &str) -> DbResult<String> {
        match &self.pool {
            DbPool::Postgres(p) => {
                let explain_sql = format!("EXPLAIN (FORMAT JSON) {}", sql);
                let rows = postgres::fetch_rows(p, &explain_sql, self.query_timeout).await?;
                let (_, rows) = convert_rows(&rows, false);
                Ok(render_postgres_plan(&rows))
            }
            DbPool::SQLite(p) => {
                let explain_sql = format!("EXPLAIN QUERY PLAN {}", sql);
                let rows = sqlite::fetch_rows(p, &explain_sql, self.query_timeout).await?;
                let (_, rows) = convert_rows(&rows, false);
                Ok(render_sqlite_plan(&rows))
            }
        }
    }
}

fn convert_rows<R: RowToJson>(
    rows: &[R],
    decode_binary: bool,
) -> (Vec<String>, Vec<crate::models::JsonRow>) {
    let columns = rows.first().map(|r| r.column_names()).unwrap_or_default();
    let json_rows = rows.iter().map(|r| r.to_json_map(decode_binary)).collect();
    (columns, json_rows)
}

/// PostgreSQL returns a single `QUERY PLAN` cell. Over the simple protocol
/// it arrives as JSON text; pretty-print it when it parses.
fn render_postgres_plan(rows: &[crate::models::JsonRow]) -> String {
    let cell = rows.first().and_then(|row| row.values().next());
    match cell {
        Some(JsonValue::String(text)) => match serde_json::from_str::<JsonValue>(text) {
            Ok(plan) => serde_json::to_string_pretty(&plan).unwrap_or_else(|_| text.clone()),
            Err(_) => text.clone(),
        },
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
        None => String::new(),
    }
}

/// SQLite's `EXPLAIN QUERY PLAN` yields `(id, parent, notused, detail)`
/// rows. Render them as an indented tree.
fn render_sqlite_plan(rows: &[crate::models::JsonRow]) -> String {
    let mut depth_of: Vec<(i64, usize)> = Vec::new();
    let mut lines = Vec::with_capacity(rows.len());

    for row in rows {
        let id = row.get("id").and_then(JsonValue::as_i64).unwrap_or(0);
        let parent = row.get("parent").and_then(JsonValue::as_i64).unwrap_or(0);
        let detail = row
            .get("detail")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();

        let depth = depth_of
            .iter()
            .find(|(node, _)| *node == parent)
            .map(|(_, d)| d + 1)
            .unwrap_or(0);
        depth_of.push((id, depth));
        lines.push(format!("{}{}", "  ".repeat(depth), detail));
    }

    lines.join("\n")
}

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> DbResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(DbError::from)?);
    }
    Ok(rows)
}

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs() as u32)
}

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        query_timeout: Duration,
    ) -> DbResult<Vec<PgRow>> {
        use sqlx::Executor;
        let rows_future = pool.fetch(sql).collect::<Vec<_>>();
        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        query_timeout: Duration,
    ) -> DbResult<Vec<SqliteRow>> {
        use sqlx::Executor;
        let rows_future = pool.fetch(sql).collect::<Vec<_>>();
        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}
