//! Catalog models returned by the introspection tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Type of database table object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Table,
    View,
    MaterializedView,
    ForeignTable,
}

impl TableType {
    /// Parse table type from catalog strings (`BASE TABLE`, `view`, ...).
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "view" => Self::View,
            "materialized view" | "matview" => Self::MaterializedView,
            "foreign" | "foreign table" => Self::ForeignTable,
            _ => Self::Table,
        }
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::View => write!(f, "view"),
            Self::MaterializedView => write!(f, "materialized_view"),
            Self::ForeignTable => write!(f, "foreign_table"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table_type: TableType,
    /// Planner estimate, not an exact count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_rows: Option<u64>,
    /// Bytes (data + indexes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableSummary {
    pub fn new(name: impl Into<String>, table_type: TableType) -> Self {
        Self {
            name: name.into(),
            schema: None,
            table_type,
            estimated_rows: None,
            total_size: None,
            comment: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDetail {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableDescription {
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    pub columns: Vec<ColumnDetail>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDescription {
    /// Build from columns, deriving the primary key from the column flags.
    pub fn new(
        table_name: impl Into<String>,
        schema_name: Option<String>,
        columns: Vec<ColumnDetail>,
        foreign_keys: Vec<ForeignKey>,
    ) -> Self {
        let primary_key = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
        Self {
            table_name: table_name.into(),
            schema_name,
            columns,
            primary_key,
            foreign_keys,
        }
    }
}
