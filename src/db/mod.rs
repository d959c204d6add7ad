//! Database access layer.
//!
//! - Connection pool management (`pool`)
//! - Statement execution behind the `QueryRunner` capability (`executor`)
//! - Catalog introspection (`catalog`)
//! - Driver-specific value decoding (`types`)

pub mod catalog;
pub mod executor;
pub mod pool;
pub mod types;

pub use catalog::CatalogInspector;
pub use executor::{PoolExecutor, QueryRunner};
pub use pool::{ConnectionManager, DbPool};
