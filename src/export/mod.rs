//! Bulk export of ordered query results to files.

pub mod engine;
pub mod format;
pub mod sink;

pub use engine::{BatchExporter, ExportFailure, ExportProgress, ExportRequest, ExportSummary};
pub use format::{ExportFormat, RowEncoder};
pub use sink::{ExportSink, FileSink};
