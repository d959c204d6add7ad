//! MCP service implementation using rmcp.
//!
//! `DbService` exposes the read-only tool set. Each tool call gets its own
//! [`CallContext`]; the handler future runs inside the context's span so
//! everything logged while serving the call is correlated by request id.

use crate::context::CallContext;
use crate::db::ConnectionManager;
use crate::models::ConnectionInfo;
use crate::tools::explain::{ExplainInput, ExplainOutput, ExplainToolHandler};
use crate::tools::export::{ExportQueryInput, ExportQueryOutput, ExportToolHandler};
use crate::tools::query::{QueryInput, QueryOutput, QueryToolHandler};
use crate::tools::schema::{
    DescribeTableInput, DescribeTableOutput, ListTablesInput, ListTablesOutput, SampleRowsInput,
    SchemaToolHandler,
};
use crate::tools::ToolSettings;
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    schemars::JsonSchema,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListConnectionsOutput {
    pub connections: Vec<ConnectionInfo>,
    pub count: usize,
}

#[derive(Clone)]
pub struct DbService {
    connection_manager: Arc<ConnectionManager>,
    settings: Arc<ToolSettings>,
    tool_router: ToolRouter<Self>,
}

impl DbService {
    pub fn new(connection_manager: Arc<ConnectionManager>, settings: Arc<ToolSettings>) -> Self {
        Self {
            connection_manager,
            settings,
            tool_router: Self::tool_router(),
        }
    }

    /// Ensure a connection id was provided; returns it trimmed.
    fn validate_connection_id(&self, provided: &str) -> Result<String, McpError> {
        let trimmed = provided.trim();
        if trimmed.is_empty() {
            Err(McpError::invalid_params(
                "connection_id is required. Call list_connections first to get available database IDs.",
                None,
            ))
        } else {
            Ok(trimmed.to_string())
        }
    }
}

#[tool_router]
impl DbService {
    #[tool(
        description = "List all available database connections.\nReturns connection IDs, database types, database names, and server versions."
    )]
    async fn list_connections(&self) -> Json<ListConnectionsOutput> {
        let connections = self.connection_manager.list_connections_detail().await;
        let count = connections.len();
        Json(ListConnectionsOutput { connections, count })
    }

    #[tool(
        description = "Run a read-only SQL statement (SELECT, WITH, EXPLAIN, SHOW) and return rows.\nWrites, DDL and multiple statements are rejected. A LIMIT is appended or lowered to the server maximum; the executed SQL and a warning are returned when that happens.\nOutput format: json (default), table, or markdown."
    )]
    async fn query(
        &self,
        Parameters(mut input): Parameters<QueryInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        input.connection_id = self.validate_connection_id(&input.connection_id)?;
        let ctx = CallContext::new("query", Some(&input.connection_id));
        let handler = QueryToolHandler::new(self.connection_manager.clone(), self.settings.clone());
        handler
            .query(&ctx, input)
            .instrument(ctx.span().clone())
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Show the execution plan for a read-only statement without running it.\nPass the statement without a leading EXPLAIN. PostgreSQL returns a JSON plan, SQLite a text query plan."
    )]
    async fn explain(
        &self,
        Parameters(mut input): Parameters<ExplainInput>,
    ) -> Result<Json<ExplainOutput>, McpError> {
        input.connection_id = self.validate_connection_id(&input.connection_id)?;
        let ctx = CallContext::new("explain", Some(&input.connection_id));
        let handler =
            ExplainToolHandler::new(self.connection_manager.clone(), self.settings.clone());
        handler
            .explain(&ctx, input)
            .instrument(ctx.span().clone())
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List tables and views with estimated row counts and sizes where available.\nOptional `schema` (PostgreSQL, default public)."
    )]
    async fn list_tables(
        &self,
        Parameters(mut input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        input.connection_id = self.validate_connection_id(&input.connection_id)?;
        let ctx = CallContext::new("list_tables", Some(&input.connection_id));
        let handler = SchemaToolHandler::new(self.connection_manager.clone(), self.settings.clone());
        handler
            .list_tables(&ctx, input)
            .instrument(ctx.span().clone())
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Describe a table: columns, types, nullability, defaults, primary key, and foreign keys."
    )]
    async fn describe_table(
        &self,
        Parameters(mut input): Parameters<DescribeTableInput>,
    ) -> Result<Json<DescribeTableOutput>, McpError> {
        input.connection_id = self.validate_connection_id(&input.connection_id)?;
        let ctx = CallContext::new("describe_table", Some(&input.connection_id));
        let handler = SchemaToolHandler::new(self.connection_manager.clone(), self.settings.clone());
        handler
            .describe_table(&ctx, input)
            .instrument(ctx.span().clone())
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Return a few rows from a table, optionally only some columns.\nDefault 10 rows, capped by the server maximum. Output format: json (default), table, or markdown."
    )]
    async fn sample_rows(
        &self,
        Parameters(mut input): Parameters<SampleRowsInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        input.connection_id = self.validate_connection_id(&input.connection_id)?;
        let ctx = CallContext::new("sample_rows", Some(&input.connection_id));
        let handler = SchemaToolHandler::new(self.connection_manager.clone(), self.settings.clone());
        handler
            .sample_rows(&ctx, input)
            .instrument(ctx.span().clone())
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Export the full result of a read-only query to a file in batches.\nThe query must have a top-level ORDER BY (ideally on a unique key) so pages are stable; any LIMIT/OFFSET is replaced.\nFormats: json, jsonl, csv. Returns the file path, row and batch counts, and throughput. On failure the partial file is kept and its path reported."
    )]
    async fn export_query(
        &self,
        Parameters(mut input): Parameters<ExportQueryInput>,
    ) -> Result<Json<ExportQueryOutput>, McpError> {
        input.connection_id = self.validate_connection_id(&input.connection_id)?;
        let ctx = CallContext::new("export_query", Some(&input.connection_id));
        let handler = ExportToolHandler::new(self.connection_manager.clone(), self.settings.clone());
        handler
            .export_query(&ctx, input)
            .instrument(ctx.span().clone())
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for DbService {
    fn get_info(&self) -> ServerInfo {
        let policy = &self.settings.policy;
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "db-insight-mcp".to_owned(),
                title: Some("DB Insight MCP".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Read-only database introspection and analysis tools.\n\
                \n\
                ## Workflow\n\
                1. Call `list_connections` to get available database IDs\n\
                2. Use `list_tables` and `describe_table` to explore the schema\n\
                3. Use `sample_rows` or `query` to look at data, `explain` to check plans\n\
                4. Use `export_query` for result sets larger than one query may return\n\
                \n\
                ## Limits\n\
                - Statements must start with one of: {}\n\
                - At most {} rows per query; a LIMIT is added or lowered automatically\n\
                - Writes, DDL, and multiple statements are always rejected\n\
                - `export_query` needs a top-level ORDER BY\n\
                \n\
                ## Error: Missing connection_id\n\
                If you see \"connection_id is required\", call `list_connections` first.",
                policy.allowed_statement_prefixes().join(", "),
                policy.max_row_limit()
            )),
        }
    }
}
