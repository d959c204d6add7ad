//! End-to-end tests of the tool handlers against a read-only SQLite file.
//!
//! Each test seeds a fresh database through a writable pool, then connects
//! it through the `ConnectionManager` the same way the server does.

use db_insight_mcp::config::PoolOptions;
use db_insight_mcp::context::CallContext;
use db_insight_mcp::db::ConnectionManager;
use db_insight_mcp::error::DbError;
use db_insight_mcp::export::ExportFormat;
use db_insight_mcp::models::ConnectionConfig;
use db_insight_mcp::safety::SecurityPolicy;
use db_insight_mcp::tools::ToolSettings;
use db_insight_mcp::tools::explain::{ExplainInput, ExplainToolHandler};
use db_insight_mcp::tools::export::{ExportQueryInput, ExportToolHandler};
use db_insight_mcp::tools::format::OutputFormat;
use db_insight_mcp::tools::query::{QueryInput, QueryToolHandler};
use db_insight_mcp::tools::schema::{
    DescribeTableInput, ListTablesInput, SampleRowsInput, SchemaToolHandler,
};
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const ORDER_COUNT: i64 = 120;
const MAX_ROWS: u64 = 50;

struct Harness {
    dir: TempDir,
    manager: Arc<ConnectionManager>,
    settings: Arc<ToolSettings>,
}

impl Harness {
    fn query(&self) -> QueryToolHandler {
        QueryToolHandler::new(self.manager.clone(), self.settings.clone())
    }

    fn schema(&self) -> SchemaToolHandler {
        SchemaToolHandler::new(self.manager.clone(), self.settings.clone())
    }

    fn explain(&self) -> ExplainToolHandler {
        ExplainToolHandler::new(self.manager.clone(), self.settings.clone())
    }

    fn export(&self) -> ExportToolHandler {
        ExportToolHandler::new(self.manager.clone(), self.settings.clone())
    }
}

async fn seed(url: &str) {
    let options = SqliteConnectOptions::from_str(url)
        .unwrap()
        .create_if_missing(true)
        // Rollback journal, so the read-only reopen needs no -shm file.
        .journal_mode(SqliteJournalMode::Delete);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    for ddl in [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER NOT NULL REFERENCES customers(id), total REAL)",
        "INSERT INTO customers (id, name) VALUES (1, 'Ada'), (2, 'Grace'), (3, 'Edsger')",
    ] {
        sqlx::query(ddl).execute(&pool).await.unwrap();
    }
    for id in 1..=ORDER_COUNT {
        sqlx::query("INSERT INTO orders (id, customer_id, total) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(id % 3 + 1)
            .bind(id as f64 * 1.5)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool.close().await;
}

async fn setup() -> Harness {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("shop.db").display());
    seed(&url).await;

    let manager = Arc::new(ConnectionManager::new());
    let config = ConnectionConfig::new("shop", &url, None, PoolOptions::default()).unwrap();
    manager.connect(config).await.unwrap();

    let policy = SecurityPolicy::new(&["SELECT", "WITH", "EXPLAIN"], MAX_ROWS).unwrap();
    let settings = ToolSettings::new(policy, Duration::from_secs(5))
        .with_export(dir.path().join("exports"), 20);

    Harness {
        dir,
        manager,
        settings: Arc::new(settings),
    }
}

fn query_input(sql: &str) -> QueryInput {
    QueryInput {
        connection_id: "shop".to_string(),
        sql: sql.to_string(),
        format: OutputFormat::Json,
        decode_binary: true,
    }
}

fn export_input(sql: &str, file_name: &str) -> ExportQueryInput {
    ExportQueryInput {
        connection_id: "shop".to_string(),
        sql: sql.to_string(),
        format: ExportFormat::Jsonl,
        file_name: Some(file_name.to_string()),
        page_size: None,
        max_rows: None,
    }
}

// =========================================================================
// query
// =========================================================================

#[tokio::test]
async fn test_query_appends_limit() {
    let h = setup().await;
    let ctx = CallContext::detached("query");

    let output = h
        .query()
        .query(&ctx, query_input("SELECT id, total FROM orders ORDER BY id"))
        .await
        .unwrap();

    assert_eq!(output.row_count, MAX_ROWS as usize);
    assert_eq!(
        output.executed_sql,
        "SELECT id, total FROM orders ORDER BY id LIMIT 50"
    );
    assert!(output.warning.is_some());
    assert_eq!(output.rows[0]["id"], json!(1));
}

#[tokio::test]
async fn test_query_clamps_limit() {
    let h = setup().await;
    let ctx = CallContext::detached("query");

    let output = h
        .query()
        .query(&ctx, query_input("SELECT id FROM orders LIMIT 100000"))
        .await
        .unwrap();

    assert_eq!(output.row_count, MAX_ROWS as usize);
    assert!(output.executed_sql.ends_with("LIMIT 50"));
    assert!(output.warning.unwrap().contains("100000"));
}

#[tokio::test]
async fn test_query_keeps_select_order() {
    let h = setup().await;
    let ctx = CallContext::detached("query");

    let output = h
        .query()
        .query(&ctx, query_input("SELECT name, id FROM customers ORDER BY id LIMIT 2"))
        .await
        .unwrap();

    assert_eq!(output.columns, vec!["name", "id"]);
    assert!(output.warning.is_none());
    let keys: Vec<&String> = output.rows[0].keys().collect();
    assert_eq!(keys, vec!["name", "id"]);
}

#[tokio::test]
async fn test_query_line_comment_does_not_swallow_filter() {
    let h = setup().await;
    let ctx = CallContext::detached("query");

    let output = h
        .query()
        .query(
            &ctx,
            query_input("SELECT id FROM orders -- first few only\n  WHERE id <= 3\n  ORDER BY id"),
        )
        .await
        .unwrap();

    assert_eq!(output.row_count, 3);
    assert_eq!(
        output.executed_sql,
        "SELECT id FROM orders -- first few only\nWHERE id <= 3 ORDER BY id\nLIMIT 50"
    );
}

#[tokio::test]
async fn test_connections_report_server_version() {
    let h = setup().await;

    let connections = h.manager.list_connections_detail().await;
    assert_eq!(connections.len(), 1);
    let version = connections[0].server_version.as_deref().unwrap();
    assert!(version.starts_with('3'), "unexpected sqlite version {}", version);
}

#[tokio::test]
async fn test_query_rejects_writes_before_execution() {
    let h = setup().await;
    let ctx = CallContext::detached("query");

    let err = h
        .query()
        .query(&ctx, query_input("DELETE FROM orders"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Rejected { .. }));

    let count = h
        .query()
        .query(&ctx, query_input("SELECT COUNT(*) AS n FROM orders"))
        .await
        .unwrap();
    assert_eq!(count.rows[0]["n"], json!(ORDER_COUNT));
}

#[tokio::test]
async fn test_query_table_format() {
    let h = setup().await;
    let ctx = CallContext::detached("query");
    let mut input = query_input("SELECT id, name FROM customers ORDER BY id");
    input.format = OutputFormat::Table;

    let output = h.query().query(&ctx, input).await.unwrap();
    let table = output.formatted.unwrap();
    assert!(table.contains("Grace"));
    assert!(table.contains("(3 rows"));
    assert!(output.rows.is_empty());
}

#[tokio::test]
async fn test_query_unknown_connection() {
    let h = setup().await;
    let ctx = CallContext::detached("query");
    let mut input = query_input("SELECT 1");
    input.connection_id = "missing".to_string();

    let err = h.query().query(&ctx, input).await.unwrap_err();
    assert!(matches!(err, DbError::ConnectionNotFound { .. }));
}

// =========================================================================
// catalog tools
// =========================================================================

#[tokio::test]
async fn test_list_tables() {
    let h = setup().await;
    let ctx = CallContext::detached("list_tables");

    let output = h
        .schema()
        .list_tables(
            &ctx,
            ListTablesInput {
                connection_id: "shop".to_string(),
                schema: None,
            },
        )
        .await
        .unwrap();

    let names: Vec<&str> = output.tables.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"customers"));
    assert!(names.contains(&"orders"));
    assert_eq!(output.count, output.tables.len());
}

#[tokio::test]
async fn test_describe_table_with_foreign_key() {
    let h = setup().await;
    let ctx = CallContext::detached("describe_table");

    let output = h
        .schema()
        .describe_table(
            &ctx,
            DescribeTableInput {
                connection_id: "shop".to_string(),
                table: "orders".to_string(),
                schema: None,
            },
        )
        .await
        .unwrap();

    let table = output.table;
    assert_eq!(table.table_name, "orders");
    assert_eq!(table.primary_key, vec!["id"]);
    assert_eq!(table.columns.len(), 3);
    assert_eq!(table.foreign_keys.len(), 1);
    assert_eq!(table.foreign_keys[0].column, "customer_id");
    assert_eq!(table.foreign_keys[0].references_table, "customers");
}

#[tokio::test]
async fn test_describe_table_rejects_bad_identifier() {
    let h = setup().await;
    let ctx = CallContext::detached("describe_table");

    let err = h
        .schema()
        .describe_table(
            &ctx,
            DescribeTableInput {
                connection_id: "shop".to_string(),
                table: "orders; DROP TABLE orders".to_string(),
                schema: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Rejected { .. }));
}

fn sample_input(limit: Option<u64>) -> SampleRowsInput {
    SampleRowsInput {
        connection_id: "shop".to_string(),
        table: "orders".to_string(),
        schema: None,
        columns: Some(vec!["id".to_string(), "total".to_string()]),
        limit,
        format: OutputFormat::Json,
    }
}

#[tokio::test]
async fn test_sample_rows() {
    let h = setup().await;
    let ctx = CallContext::detached("sample_rows");

    let output = h.schema().sample_rows(&ctx, sample_input(Some(5))).await.unwrap();
    assert_eq!(output.row_count, 5);
    assert_eq!(output.columns, vec!["id", "total"]);
    assert_eq!(
        output.executed_sql,
        "SELECT \"id\", \"total\" FROM \"orders\" LIMIT 5"
    );
    assert!(output.warning.is_none());

    let output = h.schema().sample_rows(&ctx, sample_input(None)).await.unwrap();
    assert_eq!(output.row_count, 10);
}

#[tokio::test]
async fn test_sample_rows_caps_limit() {
    let h = setup().await;
    let ctx = CallContext::detached("sample_rows");

    let output = h
        .schema()
        .sample_rows(&ctx, sample_input(Some(10_000)))
        .await
        .unwrap();
    assert_eq!(output.row_count, MAX_ROWS as usize);
    assert!(output.warning.is_some());
}

#[tokio::test]
async fn test_sample_rows_rejects_bad_column() {
    let h = setup().await;
    let ctx = CallContext::detached("sample_rows");
    let mut input = sample_input(Some(5));
    input.columns = Some(vec!["id".to_string(), "total) FROM orders --".to_string()]);

    let err = h.schema().sample_rows(&ctx, input).await.unwrap_err();
    assert!(matches!(err, DbError::Rejected { .. }));
}

// =========================================================================
// explain
// =========================================================================

#[tokio::test]
async fn test_explain_returns_plan() {
    let h = setup().await;
    let ctx = CallContext::detached("explain");

    let output = h
        .explain()
        .explain(
            &ctx,
            ExplainInput {
                connection_id: "shop".to_string(),
                sql: "SELECT * FROM orders WHERE id = 7".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(output.plan_format, "text");
    assert!(!output.plan.trim().is_empty());
}

#[tokio::test]
async fn test_explain_rejects_writes() {
    let h = setup().await;
    let ctx = CallContext::detached("explain");

    let err = h
        .explain()
        .explain(
            &ctx,
            ExplainInput {
                connection_id: "shop".to_string(),
                sql: "UPDATE orders SET total = 0".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Rejected { .. }));
}

// =========================================================================
// export_query
// =========================================================================

#[tokio::test]
async fn test_export_writes_every_row() {
    let h = setup().await;
    let ctx = CallContext::detached("export_query");

    let output = h
        .export()
        .export_query(
            &ctx,
            export_input("SELECT id, total FROM orders ORDER BY id", "orders.jsonl"),
        )
        .await
        .unwrap();

    assert_eq!(output.total_rows, ORDER_COUNT as u64);
    assert_eq!(output.batch_count, 6);

    let path = h.dir.path().join("exports").join("orders.jsonl");
    assert_eq!(output.path, path.display().to_string());
    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(contents.lines().count(), ORDER_COUNT as usize);
    assert_eq!(output.bytes_written, contents.len() as u64);
    assert!(contents.starts_with("{\"id\":1,"));
}

#[tokio::test]
async fn test_export_respects_row_cap() {
    let h = setup().await;
    let ctx = CallContext::detached("export_query");
    let mut input = export_input("SELECT id FROM orders ORDER BY id DESC", "latest.csv");
    input.format = ExportFormat::Csv;
    input.max_rows = Some(30);

    let output = h.export().export_query(&ctx, input).await.unwrap();
    assert_eq!(output.total_rows, 30);
    assert_eq!(output.batch_count, 2);

    let path = h.dir.path().join("exports").join("latest.csv");
    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], "id");
    assert_eq!(lines[1], "120");
    assert_eq!(lines.len(), 31);
}

#[tokio::test]
async fn test_export_order_by_after_line_comment() {
    let h = setup().await;
    let ctx = CallContext::detached("export_query");

    let output = h
        .export()
        .export_query(
            &ctx,
            export_input(
                "SELECT id FROM customers -- everyone\nORDER BY id DESC",
                "customers_desc.jsonl",
            ),
        )
        .await
        .unwrap();
    assert_eq!(output.total_rows, 3);

    let path = h.dir.path().join("exports").join("customers_desc.jsonl");
    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(contents.starts_with("{\"id\":3}"));
}

#[tokio::test]
async fn test_export_without_order_by_leaves_no_file() {
    let h = setup().await;
    let ctx = CallContext::detached("export_query");

    let err = h
        .export()
        .export_query(&ctx, export_input("SELECT id FROM orders", "unordered.jsonl"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::OrderingRequired));

    let path = h.dir.path().join("exports").join("unordered.jsonl");
    assert!(!path.exists());
}

#[tokio::test]
async fn test_export_refuses_to_overwrite() {
    let h = setup().await;
    let ctx = CallContext::detached("export_query");
    let sql = "SELECT id FROM customers ORDER BY id";

    h.export()
        .export_query(&ctx, export_input(sql, "customers.jsonl"))
        .await
        .unwrap();
    let err = h
        .export()
        .export_query(&ctx, export_input(sql, "customers.jsonl"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_export_rejects_path_traversal() {
    let h = setup().await;
    let ctx = CallContext::detached("export_query");

    let err = h
        .export()
        .export_query(
            &ctx,
            export_input("SELECT id FROM orders ORDER BY id", "../escape.jsonl"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Rejected { .. } | DbError::InvalidInput { .. }));
    assert!(!h.dir.path().join("escape.jsonl").exists());
}
