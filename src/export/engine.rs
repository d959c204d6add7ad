//! Paginated bulk export.
//!
//! [`BatchExporter`] drives a sequence of `LIMIT/OFFSET` windows over one
//! ordered base query, encoding each batch and appending it to a sink. The
//! loop is strictly sequential: one query in flight, then one append.
//!
//! Offset pagination is only stable over a deterministic order, so the base
//! query must carry a top-level `ORDER BY`. That check and the statement
//! validation both run before the executor is touched.

use crate::context::CallContext;
use crate::db::QueryRunner;
use crate::error::{DbError, DbResult};
use crate::export::format::{ExportFormat, RowEncoder};
use crate::export::sink::ExportSink;
use crate::safety::SecurityPolicy;
use crate::safety::lexer::{
    has_line_comment, has_top_level_order_by, strip_top_level_limit_offset,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{Instrument, debug, info, warn};

/// Parameters of one export call.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub base_query: String,
    pub page_size: u64,
    pub row_cap: Option<u64>,
    pub format: ExportFormat,
}

/// Result of a completed export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub total_rows: u64,
    pub batch_count: u64,
    pub duration_ms: u64,
    pub bytes_written: u64,
    pub rows_per_second: f64,
}

/// How far an export got.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportProgress {
    pub batches_written: u64,
    pub rows_written: u64,
    pub bytes_written: u64,
}

/// An export that stopped early. Whatever was appended before the failure
/// stays in the sink.
#[derive(Debug)]
pub struct ExportFailure {
    pub progress: ExportProgress,
    pub error: DbError,
}

impl ExportFailure {
    fn before_start(error: DbError) -> Self {
        Self {
            progress: ExportProgress::default(),
            error,
        }
    }
}

impl std::fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (after {} batches, {} rows)",
            self.error, self.progress.batches_written, self.progress.rows_written
        )
    }
}

/// Per-call loop state. Never leaves `BatchExporter::run`.
struct ExportJobState {
    base_query: String,
    separator: &'static str,
    page_size: u64,
    row_cap: Option<u64>,
    offset: u64,
    total_rows_written: u64,
    batches_written: u64,
    bytes_written: u64,
    encoder: RowEncoder,
    started_at: Instant,
}

impl ExportJobState {
    /// Size of the next window, or `None` once the row cap is reached.
    fn next_batch_limit(&self) -> Option<u64> {
        let limit = match self.row_cap {
            Some(cap) => self.page_size.min(cap.saturating_sub(self.total_rows_written)),
            None => self.page_size,
        };
        (limit > 0).then_some(limit)
    }

    fn batch_sql(&self, limit: u64) -> String {
        format!(
            "{}{}LIMIT {} OFFSET {}",
            self.base_query, self.separator, limit, self.offset
        )
    }

    fn progress(&self) -> ExportProgress {
        ExportProgress {
            batches_written: self.batches_written,
            rows_written: self.total_rows_written,
            bytes_written: self.bytes_written,
        }
    }

    fn cap_reached(&self) -> bool {
        self.row_cap.is_some_and(|cap| self.total_rows_written >= cap)
    }
}

/// Paginated exporter bound to one security policy.
pub struct BatchExporter<'a> {
    policy: &'a SecurityPolicy,
}

impl<'a> BatchExporter<'a> {
    pub fn new(policy: &'a SecurityPolicy) -> Self {
        Self { policy }
    }

    /// Run one export to completion or first failure.
    ///
    /// Rejections (invalid statement, missing ordering, zero page size) are
    /// returned before any query is issued. Executor and sink errors stop the
    /// loop; the sink is flushed either way and the JSON closing bracket is
    /// only written on success.
    pub async fn run<R, S>(
        &self,
        ctx: &CallContext,
        runner: &R,
        sink: &mut S,
        request: ExportRequest,
    ) -> Result<ExportSummary, ExportFailure>
    where
        R: QueryRunner,
        S: ExportSink,
    {
        let mut state = self
            .prepare(ctx, request)
            .map_err(ExportFailure::before_start)?;

        let span = ctx.span().clone();
        async move {
            info!(
                page_size = state.page_size,
                row_cap = ?state.row_cap,
                format = %state.encoder.format(),
                "Starting export"
            );

            let outcome = drive(&mut state, runner, sink).await;
            let flushed = sink.flush().await;

            match outcome.and(flushed) {
                Ok(()) => {
                    let elapsed = state.started_at.elapsed();
                    let secs = elapsed.as_secs_f64();
                    let summary = ExportSummary {
                        total_rows: state.total_rows_written,
                        batch_count: state.batches_written,
                        duration_ms: elapsed.as_millis() as u64,
                        bytes_written: state.bytes_written,
                        rows_per_second: if secs > 0.0 {
                            state.total_rows_written as f64 / secs
                        } else {
                            0.0
                        },
                    };
                    info!(
                        total_rows = summary.total_rows,
                        batches = summary.batch_count,
                        duration_ms = summary.duration_ms,
                        "Export completed"
                    );
                    Ok(summary)
                }
                Err(error) => {
                    let progress = state.progress();
                    warn!(
                        batches = progress.batches_written,
                        rows = progress.rows_written,
                        error = %error,
                        "Export aborted"
                    );
                    Err(ExportFailure { progress, error })
                }
            }
        }
        .instrument(span)
        .await
    }

    fn prepare(&self, ctx: &CallContext, request: ExportRequest) -> DbResult<ExportJobState> {
        if request.page_size == 0 {
            return Err(DbError::invalid_input("page_size must be at least 1"));
        }

        let max = self.policy.max_row_limit();
        let page_size = if request.page_size > max {
            let _guard = ctx.span().enter();
            warn!(
                requested = request.page_size,
                max_row_limit = max,
                "Export page size clamped to max row limit"
            );
            max
        } else {
            request.page_size
        };

        let outcome = self.policy.validate(&request.base_query);
        if !outcome.accepted {
            if let Some(reason) = outcome.reason.as_deref() {
                ctx.security_event(reason);
            }
        }
        let normalized = outcome.into_result()?;

        if !has_top_level_order_by(&normalized) {
            return Err(DbError::OrderingRequired);
        }

        let base_query = strip_top_level_limit_offset(&normalized);
        let separator = if has_line_comment(&base_query) {
            "\n"
        } else {
            " "
        };

        Ok(ExportJobState {
            base_query,
            separator,
            page_size,
            row_cap: request.row_cap,
            offset: 0,
            total_rows_written: 0,
            batches_written: 0,
            bytes_written: 0,
            encoder: RowEncoder::new(request.format),
            started_at: Instant::now(),
        })
    }
}

async fn append<S: ExportSink>(
    state: &mut ExportJobState,
    sink: &mut S,
    bytes: &[u8],
) -> DbResult<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    sink.append(bytes).await?;
    state.bytes_written += bytes.len() as u64;
    Ok(())
}

async fn drive<R, S>(state: &mut ExportJobState, runner: &R, sink: &mut S) -> DbResult<()>
where
    R: QueryRunner,
    S: ExportSink,
{
    let opening = state.encoder.open();
    append(state, sink, opening).await?;

    while let Some(limit) = state.next_batch_limit() {
        let sql = state.batch_sql(limit);
        let batch = runner.query(&sql).await?;
        if batch.is_empty() {
            break;
        }

        let columns = batch.column_names();
        let bytes = state.encoder.encode_batch(&columns, &batch.rows);
        append(state, sink, &bytes).await?;

        let returned = batch.rows.len() as u64;
        state.offset += returned;
        state.total_rows_written += returned;
        state.batches_written += 1;
        debug!(
            batch = state.batches_written,
            rows = returned,
            offset = state.offset,
            "Export batch written"
        );

        if returned < limit || state.cap_reached() {
            break;
        }
    }

    let closing = state.encoder.close();
    append(state, sink, closing).await
}
