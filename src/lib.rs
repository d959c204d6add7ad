//! DB Insight MCP library.
//!
//! Read-only database introspection and analysis for AI assistants over
//! MCP. The `safety` module decides whether caller-supplied SQL and
//! identifiers may run and bounds how many rows they return; `export`
//! drives paginated bulk exports. PostgreSQL is the target dialect, SQLite
//! is supported for local files.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod export;
pub mod mcp;
pub mod models;
pub mod safety;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use context::CallContext;
pub use error::{DbError, DbResult};
pub use mcp::DbService;
