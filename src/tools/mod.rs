//! MCP tool handlers.
//!
//! - `query`: validated, row-bounded read query
//! - `explain`: execution plan for a validated statement
//! - `list_tables`, `describe_table`, `sample_rows`: catalog introspection
//! - `export_query`: paginated export of an ordered query to a file

pub mod explain;
pub mod export;
pub mod format;
pub mod query;
pub mod schema;

use crate::safety::SecurityPolicy;
use std::path::PathBuf;
use std::time::Duration;

pub use explain::{ExplainInput, ExplainOutput, ExplainToolHandler};
pub use export::{ExportQueryInput, ExportQueryOutput, ExportToolHandler};
pub use format::OutputFormat;
pub use query::{QueryInput, QueryOutput, QueryToolHandler};
pub use schema::{
    DescribeTableInput, DescribeTableOutput, ListTablesInput, ListTablesOutput, SampleRowsInput,
    SchemaToolHandler,
};

/// Read-only settings shared by every tool handler, built once at startup.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub policy: SecurityPolicy,
    pub query_timeout: Duration,
    pub export_dir: PathBuf,
    pub export_page_size: u64,
}

impl ToolSettings {
    pub fn new(policy: SecurityPolicy, query_timeout: Duration) -> Self {
        Self {
            policy,
            query_timeout,
            export_dir: PathBuf::from(crate::config::DEFAULT_EXPORT_DIR),
            export_page_size: crate::config::DEFAULT_EXPORT_PAGE_SIZE,
        }
    }

    pub fn with_export(mut self, export_dir: impl Into<PathBuf>, page_size: u64) -> Self {
        self.export_dir = export_dir.into();
        self.export_page_size = page_size;
        self
    }
}
