//! The `query` tool: validate, bound, execute.

use crate::context::CallContext;
use crate::db::{ConnectionManager, PoolExecutor, QueryRunner};
use crate::error::DbResult;
use crate::models::{JsonRow, QueryBatch};
use crate::safety::{LimitRewrite, SecurityPolicy};
use crate::tools::ToolSettings;
use crate::tools::format::{OutputFormat, format_as_markdown, format_as_table};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

fn default_decode_binary() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// Database connection ID from list_connections
    pub connection_id: String,
    /// Read-only SQL (SELECT, WITH, EXPLAIN, SHOW). A LIMIT is enforced automatically.
    pub sql: String,
    /// Output format: "json" returns structured rows, "table" an ASCII table, "markdown" a markdown table
    #[serde(default)]
    pub format: OutputFormat,
    /// If true (default), decode binary columns as UTF-8 text when possible, else base64
    #[serde(default = "default_decode_binary")]
    pub decode_binary: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// The statement actually executed, after limit enforcement
    pub executed_sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<JsonRow>,
    /// Pre-rendered output for table and markdown formats
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    /// Present when a LIMIT was appended or clamped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl QueryOutput {
    pub fn build(
        executed_sql: String,
        batch: QueryBatch,
        format: OutputFormat,
        warning: Option<String>,
    ) -> Self {
        let columns = batch.column_names();
        let row_count = batch.row_count;
        let execution_time_ms = batch.duration_ms;

        match format {
            OutputFormat::Json => Self {
                executed_sql,
                columns,
                rows: batch.rows,
                formatted: None,
                row_count,
                execution_time_ms,
                warning,
            },
            OutputFormat::Table => Self {
                executed_sql,
                formatted: Some(format_as_table(&columns, &batch.rows, execution_time_ms)),
                columns: Vec::new(),
                rows: Vec::new(),
                row_count,
                execution_time_ms,
                warning,
            },
            OutputFormat::Markdown => Self {
                executed_sql,
                formatted: Some(format_as_markdown(&columns, &batch.rows)),
                columns: Vec::new(),
                rows: Vec::new(),
                row_count,
                execution_time_ms,
                warning,
            },
        }
    }
}

/// Validate and bound `sql` under `policy`. Rejections are reported as
/// security events on the call context.
pub fn prepare_statement(
    policy: &SecurityPolicy,
    ctx: &CallContext,
    sql: &str,
) -> DbResult<LimitRewrite> {
    let outcome = policy.validate(sql);
    if !outcome.accepted {
        if let Some(reason) = outcome.reason.as_deref() {
            ctx.security_event(reason);
        }
    }
    let normalized = outcome.into_result()?;
    Ok(policy.bound(&normalized))
}

/// Run an already-bounded statement and shape the response.
pub async fn run_bounded<R: QueryRunner>(
    runner: &R,
    rewrite: LimitRewrite,
    max_row_limit: u64,
    format: OutputFormat,
) -> DbResult<QueryOutput> {
    let batch = runner.query(&rewrite.sql).await?;
    let warning = rewrite.decision.warning(max_row_limit);
    Ok(QueryOutput::build(rewrite.sql, batch, format, warning))
}

pub struct QueryToolHandler {
    connection_manager: Arc<ConnectionManager>,
    settings: Arc<ToolSettings>,
}

impl QueryToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>, settings: Arc<ToolSettings>) -> Self {
        Self {
            connection_manager,
            settings,
        }
    }

    pub async fn query(&self, ctx: &CallContext, input: QueryInput) -> DbResult<QueryOutput> {
        let policy = &self.settings.policy;
        let rewrite = prepare_statement(policy, ctx, &input.sql)?;

        let pool = self.connection_manager.get_pool(&input.connection_id).await?;
        let executor = PoolExecutor::new(pool, self.settings.query_timeout)
            .with_decode_binary(input.decode_binary);

        let output = run_bounded(&executor, rewrite, policy.max_row_limit(), input.format).await?;

        info!(
            rows = output.row_count,
            duration_ms = output.execution_time_ms,
            limited = output.warning.is_some(),
            "Query executed"
        );
        Ok(output)
    }
}
