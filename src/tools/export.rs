//! The `export_query` tool: paginated export of an ordered query to a file
//! under the configured export directory.

use crate::context::CallContext;
use crate::db::{ConnectionManager, PoolExecutor};
use crate::error::{DbError, DbResult};
use crate::export::{BatchExporter, ExportFormat, ExportRequest, FileSink};
use crate::tools::ToolSettings;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

static FILE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9_.-]*$").expect("Invalid regex: export file name")
});

const MAX_FILE_NAME_LENGTH: usize = 255;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportQueryInput {
    /// Database connection ID from list_connections
    pub connection_id: String,
    /// Read-only query with a top-level ORDER BY on a unique key. Any LIMIT/OFFSET is replaced by pagination.
    pub sql: String,
    /// Output format: "json" (array), "jsonl" (one object per line) or "csv"
    #[serde(default)]
    pub format: ExportFormat,
    /// Plain file name (letters, digits, '_', '-', '.'). Default: export_<utc timestamp>.<ext>
    #[serde(default)]
    pub file_name: Option<String>,
    /// Rows fetched per batch. Default from server config, capped by the max row limit.
    #[serde(default)]
    pub page_size: Option<u64>,
    /// Stop after this many rows. Unlimited when omitted.
    #[serde(default)]
    pub max_rows: Option<u64>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExportQueryOutput {
    pub path: String,
    pub format: ExportFormat,
    pub total_rows: u64,
    pub batch_count: u64,
    pub duration_ms: u64,
    pub rows_per_second: f64,
    pub bytes_written: u64,
    /// Human-readable file size
    pub size: String,
}

/// Validate a caller-supplied file name, or generate a timestamped default.
pub fn resolve_file_name(requested: Option<&str>, format: ExportFormat) -> DbResult<String> {
    let Some(name) = requested else {
        return Ok(format!(
            "export_{}.{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
            format.extension()
        ));
    };

    if name.len() > MAX_FILE_NAME_LENGTH || !FILE_NAME_REGEX.is_match(name) {
        return Err(DbError::rejected(format!(
            "Invalid file_name '{}': use a plain file name of letters, digits, '_', '-' and '.', not starting with '.'",
            name
        )));
    }
    Ok(name.to_string())
}

/// Failures the engine raises before issuing any query.
fn rejected_before_start(error: &DbError) -> bool {
    error.is_rejection() || matches!(error, DbError::InvalidInput { .. })
}

pub struct ExportToolHandler {
    connection_manager: Arc<ConnectionManager>,
    settings: Arc<ToolSettings>,
}

impl ExportToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>, settings: Arc<ToolSettings>) -> Self {
        Self {
            connection_manager,
            settings,
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.settings.export_dir
    }

    pub async fn export_query(
        &self,
        ctx: &CallContext,
        input: ExportQueryInput,
    ) -> DbResult<ExportQueryOutput> {
        let file_name = match resolve_file_name(input.file_name.as_deref(), input.format) {
            Ok(name) => name,
            Err(e) => {
                ctx.security_event(&e.to_string());
                return Err(e);
            }
        };

        let pool = self.connection_manager.get_pool(&input.connection_id).await?;
        let executor = PoolExecutor::new(pool, self.settings.query_timeout);

        tokio::fs::create_dir_all(&self.settings.export_dir).await?;
        let path: PathBuf = self.settings.export_dir.join(&file_name);
        let mut sink = FileSink::create(&path).await?;
        let display_path = path.display().to_string();

        let request = ExportRequest {
            base_query: input.sql,
            page_size: input.page_size.unwrap_or(self.settings.export_page_size),
            row_cap: input.max_rows,
            format: input.format,
        };

        let exporter = BatchExporter::new(&self.settings.policy);
        match exporter.run(ctx, &executor, &mut sink, request).await {
            Ok(summary) => {
                info!(path = %display_path, rows = summary.total_rows, "Export written");
                Ok(ExportQueryOutput {
                    path: display_path,
                    format: input.format,
                    total_rows: summary.total_rows,
                    batch_count: summary.batch_count,
                    duration_ms: summary.duration_ms,
                    rows_per_second: summary.rows_per_second,
                    bytes_written: summary.bytes_written,
                    size: humansize::format_size(summary.bytes_written, humansize::DECIMAL),
                })
            }
            Err(failure) if rejected_before_start(&failure.error) => {
                // Nothing was queried; don't leave an empty file behind.
                drop(sink);
                discard_file(&path).await;
                Err(failure.error)
            }
            Err(failure) => Err(DbError::export_aborted(
                display_path,
                failure.progress.batches_written,
                failure.progress.rows_written,
                failure.error.to_string(),
            )),
        }
    }
}

/// Best-effort removal of an export file that never received data.
/// Returns whether the file was removed.
async fn discard_file(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove unused export file"
            );
            false
        }
    }
}
