//! Query result models.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One JSON object per result row, keyed by column name.
pub type JsonRow = serde_json::Map<String, JsonValue>;

/// Rows returned by one executor call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryBatch {
    /// Column names in select order. Empty when no row came back.
    pub columns: Vec<String>,
    pub rows: Vec<JsonRow>,
    pub row_count: usize,
    pub duration_ms: u64,
}

impl QueryBatch {
    pub fn new(columns: Vec<String>, rows: Vec<JsonRow>, duration_ms: u64) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names, falling back to the first row's keys when the driver
    /// reported none.
    pub fn column_names(&self) -> Vec<String> {
        if !self.columns.is_empty() {
            return self.columns.clone();
        }
        self.rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }
}
