//! Connection-related data models.

use crate::config::PoolOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Local files and tests
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for a database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub id: String,
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    pub database: Option<String>,
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl ConnectionConfig {
    pub fn new(
        id: impl Into<String>,
        connection_string: impl Into<String>,
        database: Option<String>,
        pool_options: PoolOptions,
    ) -> Result<Self, ConnectionConfigError> {
        let id = id.into();
        let connection_string = connection_string.into();

        if id.is_empty() {
            return Err(ConnectionConfigError::EmptyId);
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConnectionConfigError::InvalidId(id));
        }

        let db_type = DatabaseType::from_connection_string(&connection_string)
            .ok_or_else(|| ConnectionConfigError::UnknownDatabaseType(mask_url(&connection_string)))?;

        Ok(Self {
            id,
            db_type,
            connection_string,
            database,
            pool_options,
        })
    }

    /// Connection string with the password replaced by `****`.
    pub fn masked_connection_string(&self) -> String {
        mask_url(&self.connection_string)
    }
}

fn mask_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some("****")).is_ok() {
                url.to_string()
            } else {
                raw.to_string()
            }
        }
        _ => raw.to_string(),
    }
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    #[error("Connection ID cannot be empty")]
    EmptyId,

    #[error("Connection ID contains invalid characters: {0}")]
    InvalidId(String),

    #[error("Unknown database type in connection string: {0}")]
    UnknownDatabaseType(String),
}

/// Information about an active connection.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub database_type: DatabaseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Version string reported by the server when the pool was opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}
