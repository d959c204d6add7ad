//! Introspection tools: `list_tables`, `describe_table`, `sample_rows`.
//!
//! Every caller-supplied name passes the identifier guard before use.
//! `sample_rows` builds its own SELECT from quoted identifiers and only
//! bounds it; it is not run through the statement validator, because a
//! quoted column may legitimately be called `delete` or `comment`.

use crate::context::CallContext;
use crate::db::{CatalogInspector, ConnectionManager, PoolExecutor};
use crate::error::{DbError, DbResult};
use crate::models::{TableDescription, TableSummary};
use crate::safety::{
    IdentifierKind, LimitRewrite, enforce_with_report, qualified_name, quote_identifier,
    validate_identifier, validate_identifiers,
};
use crate::tools::ToolSettings;
use crate::tools::format::OutputFormat;
use crate::tools::query::{QueryOutput, run_bounded};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Rows returned by `sample_rows` when no limit is given.
pub const DEFAULT_SAMPLE_ROWS: u64 = 10;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Database connection ID from list_connections
    pub connection_id: String,
    /// Schema to list (PostgreSQL only, default "public")
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub tables: Vec<TableSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Database connection ID from list_connections
    pub connection_id: String,
    pub table: String,
    /// Schema containing the table (PostgreSQL only, default "public")
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeTableOutput {
    #[serde(flatten)]
    pub table: TableDescription,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SampleRowsInput {
    /// Database connection ID from list_connections
    pub connection_id: String,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// Columns to select. All columns when omitted.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    /// Rows to return. Default 10, capped by the server's max row limit.
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub format: OutputFormat,
}

/// Reject an invalid identifier, logging it as a security event.
fn guard(ctx: &CallContext, name: &str, kind: IdentifierKind) -> DbResult<String> {
    let outcome = validate_identifier(name, kind);
    match outcome.sanitized_name {
        Some(sanitized) if outcome.accepted => Ok(sanitized),
        _ => {
            let reason = outcome
                .reason
                .unwrap_or_else(|| format!("Invalid {} name", kind));
            ctx.security_event(&reason);
            Err(DbError::rejected(reason))
        }
    }
}

fn guard_optional(
    ctx: &CallContext,
    name: Option<&str>,
    kind: IdentifierKind,
) -> DbResult<Option<String>> {
    name.map(|n| guard(ctx, n, kind)).transpose()
}

/// Build the bounded sampling statement for a table.
pub fn build_sample_sql(
    ctx: &CallContext,
    input: &SampleRowsInput,
    max_row_limit: u64,
) -> DbResult<LimitRewrite> {
    let table = guard(ctx, &input.table, IdentifierKind::Table)?;
    let schema = guard_optional(ctx, input.schema.as_deref(), IdentifierKind::Schema)?;

    let projection = match input.columns.as_deref() {
        None | Some([]) => "*".to_string(),
        Some(columns) => match validate_identifiers(columns, IdentifierKind::Column) {
            Ok(names) => names
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", "),
            Err(rejected) => {
                let reason = rejected
                    .reason
                    .unwrap_or_else(|| "Invalid column name".to_string());
                ctx.security_event(&reason);
                return Err(DbError::rejected(reason));
            }
        },
    };

    let limit = input
        .limit
        .unwrap_or(DEFAULT_SAMPLE_ROWS)
        .clamp(1, max_row_limit);
    let sql = format!(
        "SELECT {} FROM {}",
        projection,
        qualified_name(schema.as_deref(), &table)
    );
    Ok(enforce_with_report(&sql, limit))
}

pub struct SchemaToolHandler {
    connection_manager: Arc<ConnectionManager>,
    settings: Arc<ToolSettings>,
}

impl SchemaToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>, settings: Arc<ToolSettings>) -> Self {
        Self {
            connection_manager,
            settings,
        }
    }

    pub async fn list_tables(
        &self,
        ctx: &CallContext,
        input: ListTablesInput,
    ) -> DbResult<ListTablesOutput> {
        let schema = guard_optional(ctx, input.schema.as_deref(), IdentifierKind::Schema)?;
        let pool = self.connection_manager.get_pool(&input.connection_id).await?;
        let tables = CatalogInspector::list_tables(&pool, schema.as_deref()).await?;
        Ok(ListTablesOutput {
            count: tables.len(),
            tables,
        })
    }

    pub async fn describe_table(
        &self,
        ctx: &CallContext,
        input: DescribeTableInput,
    ) -> DbResult<DescribeTableOutput> {
        let table = guard(ctx, &input.table, IdentifierKind::Table)?;
        let schema = guard_optional(ctx, input.schema.as_deref(), IdentifierKind::Schema)?;
        let pool = self.connection_manager.get_pool(&input.connection_id).await?;
        let table = CatalogInspector::describe_table(&pool, &table, schema.as_deref()).await?;
        Ok(DescribeTableOutput { table })
    }

    pub async fn sample_rows(
        &self,
        ctx: &CallContext,
        input: SampleRowsInput,
    ) -> DbResult<QueryOutput> {
        let max = self.settings.policy.max_row_limit();
        let rewrite = build_sample_sql(ctx, &input, max)?;
        debug!(sql = %rewrite.sql, "Sampling rows");

        let pool = self.connection_manager.get_pool(&input.connection_id).await?;
        let executor = PoolExecutor::new(pool, self.settings.query_timeout);
        let mut output = run_bounded(&executor, rewrite, max, input.format).await?;
        // The appended LIMIT is the requested sample size, not a truncation.
        output.warning = input.limit.filter(|requested| *requested > max).map(|requested| {
            format!(
                "Requested limit {} exceeds the maximum of {} rows and was reduced",
                requested, max
            )
        });
        Ok(output)
    }
}
