//! Data models shared by the database layer and the tool handlers.

pub mod connection;
pub mod query;
pub mod schema;

pub use connection::{ConnectionConfig, ConnectionConfigError, ConnectionInfo, DatabaseType};
pub use query::{JsonRow, QueryBatch};
pub use schema::{ColumnDetail, ForeignKey, TableDescription, TableSummary, TableType};
