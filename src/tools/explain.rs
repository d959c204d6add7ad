//! The `explain` tool.
//!
//! The statement goes through the same validator as `query`; the executor
//! then wraps it in the dialect's EXPLAIN. Plans are estimates only: no
//! `ANALYZE`, so the statement itself is never run.

use crate::context::CallContext;
use crate::db::{ConnectionManager, DbPool, PoolExecutor, QueryRunner};
use crate::error::{DbError, DbResult};
use crate::safety::SecurityPolicy;
use crate::safety::lexer::leading_keyword;
use crate::tools::ToolSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExplainInput {
    /// Database connection ID from list_connections
    pub connection_id: String,
    /// The read-only statement to explain, without a leading EXPLAIN
    pub sql: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExplainOutput {
    pub explained_sql: String,
    /// "json" for PostgreSQL plans, "text" for SQLite query plans
    pub plan_format: String,
    pub plan: String,
}

/// Validate a statement for EXPLAIN. Returns the normalized statement.
pub fn prepare_explain(policy: &SecurityPolicy, ctx: &CallContext, sql: &str) -> DbResult<String> {
    let outcome = policy.validate(sql);
    if !outcome.accepted {
        if let Some(reason) = outcome.reason.as_deref() {
            ctx.security_event(reason);
        }
    }
    let normalized = outcome.into_result()?;

    if leading_keyword(&normalized).is_some_and(|kw| kw.eq_ignore_ascii_case("EXPLAIN")) {
        return Err(DbError::invalid_input(
            "Pass the statement without a leading EXPLAIN; the tool adds it",
        ));
    }
    Ok(normalized)
}

pub struct ExplainToolHandler {
    connection_manager: Arc<ConnectionManager>,
    settings: Arc<ToolSettings>,
}

impl ExplainToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>, settings: Arc<ToolSettings>) -> Self {
        Self {
            connection_manager,
            settings,
        }
    }

    pub async fn explain(&self, ctx: &CallContext, input: ExplainInput) -> DbResult<ExplainOutput> {
        let sql = prepare_explain(&self.settings.policy, ctx, &input.sql)?;

        let pool = self.connection_manager.get_pool(&input.connection_id).await?;
        let plan_format = match pool {
            DbPool::Postgres(_) => "json",
            DbPool::SQLite(_) => "text",
        };
        let executor = PoolExecutor::new(pool, self.settings.query_timeout);
        let plan = executor.explain(&sql).await?;

        info!(plan_format, "Plan generated");
        Ok(ExplainOutput {
            explained_sql: sql,
            plan_format: plan_format.to_string(),
            plan,
        })
    }
}
