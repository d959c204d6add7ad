//! Error types for the DB Insight MCP server.
//!
//! All errors use `thiserror`. Variants follow four kinds of failure: rejected
//! input (never reaches the database), missing ordering for exports, resource
//! limits, and execution failures raised by the database or the export sink.
//! Each variant carries a message an AI assistant can act on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Rejected input: {reason}")]
    Rejected { reason: String },

    #[error(
        "Export query must contain a top-level ORDER BY clause; offset pagination over an unordered result is not stable"
    )]
    OrderingRequired,

    #[error("Resource limit exceeded: {message}")]
    ResourceExceeded { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error(
        "Export aborted after {batches_written} batches ({rows_written} rows): {message}. Partial output left at {path}"
    )]
    ExportAborted {
        path: String,
        batches_written: u64,
        rows_written: u64,
        message: String,
    },

    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a rejected-input error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Create a resource-exceeded error.
    pub fn resource_exceeded(message: impl Into<String>) -> Self {
        Self::ResourceExceeded {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an export-aborted error carrying the progress made before failure.
    pub fn export_aborted(
        path: impl Into<String>,
        batches_written: u64,
        rows_written: u64,
        message: impl Into<String>,
    ) -> Self {
        Self::ExportAborted {
            path: path.into(),
            batches_written,
            rows_written,
            message: message.into(),
        }
    }

    /// Create a connection not found error.
    pub fn connection_not_found(connection_id: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            connection_id: connection_id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::OrderingRequired => {
                Some("Add an ORDER BY on a unique key (e.g. ORDER BY id) to the export query")
            }
            Self::ExportAborted { .. } => {
                Some("The partial file is kept; re-run the export to obtain the full result")
            }
            _ => None,
        }
    }

    /// True for failures that never reached the database.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::OrderingRequired | Self::ResourceExceeded { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Restart the server")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
/// Includes the suggestion field in the `data` object when available.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = suggestion_data(err.suggestion());
        match &err {
            DbError::Rejected { .. }
            | DbError::OrderingRequired
            | DbError::ResourceExceeded { .. }
            | DbError::InvalidInput { .. } => rmcp::ErrorData::invalid_params(err.to_string(), data),

            DbError::ConnectionNotFound { .. } => {
                rmcp::ErrorData::resource_not_found(err.to_string(), data)
            }

            // Database errors keep the SQLSTATE visible to the caller
            DbError::Database {
                message, sql_state, ..
            } => {
                let msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, data)
            }

            DbError::ExportAborted {
                path,
                batches_written,
                rows_written,
                ..
            } => rmcp::ErrorData::internal_error(
                err.to_string(),
                Some(serde_json::json!({
                    "path": path,
                    "batches_written": batches_written,
                    "rows_written": rows_written,
                    "suggestion": err.suggestion(),
                })),
            ),

            DbError::Connection { .. }
            | DbError::Timeout { .. }
            | DbError::Io { .. }
            | DbError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}
