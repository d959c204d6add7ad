//! Catalog introspection.
//!
//! Values (table and schema names) are always passed as bound parameters.
//! Callers validate identifiers before they get here; the binds keep the
//! catalog queries safe even if they did not.

use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDetail, ForeignKey, TableDescription, TableSummary, TableType};
use tracing::debug;

/// Default schema for PostgreSQL lookups when none is given.
pub const DEFAULT_PG_SCHEMA: &str = "public";

pub struct CatalogInspector;

impl CatalogInspector {
    /// List tables and views. `schema` is ignored for SQLite.
    pub async fn list_tables(pool: &DbPool, schema: Option<&str>) -> DbResult<Vec<TableSummary>> {
        match pool {
            DbPool::Postgres(p) => postgres::list_tables(p, schema).await,
            DbPool::SQLite(p) => sqlite::list_tables(p).await,
        }
    }

    /// Columns, primary key and foreign keys of one table.
    pub async fn describe_table(
        pool: &DbPool,
        table_name: &str,
        schema: Option<&str>,
    ) -> DbResult<TableDescription> {
        match pool {
            DbPool::Postgres(p) => postgres::describe_table(p, table_name, schema).await,
            DbPool::SQLite(p) => sqlite::describe_table(p, table_name).await,
        }
    }
}

fn table_not_found(table_name: &str) -> DbError {
    DbError::invalid_input(format!(
        "Table '{}' not found. Use list_tables to see available tables",
        table_name
    ))
}

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT
                t.table_name::text AS table_name,
                t.table_type::text AS table_type,
                CASE
                    WHEN t.table_type = 'BASE TABLE'
                    THEN pg_total_relation_size(quote_ident($1) || '.' || quote_ident(t.table_name))
                    ELSE NULL
                END AS total_size,
                s.n_live_tup AS row_count,
                obj_description((quote_ident($1) || '.' || quote_ident(t.table_name))::regclass) AS comment
            FROM information_schema.tables t
            LEFT JOIN pg_stat_user_tables s
                ON s.schemaname = t.table_schema AND s.relname = t.table_name
            WHERE t.table_schema = $1
            AND t.table_type IN ('BASE TABLE', 'VIEW', 'FOREIGN')
            ORDER BY t.table_name
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT
                c.column_name::text AS column_name,
                format_type(a.atttypid, a.atttypmod) AS column_type,
                c.is_nullable::text AS is_nullable,
                c.column_default::text AS column_default,
                (pk.column_name IS NOT NULL) AS is_primary_key
            FROM information_schema.columns c
            JOIN pg_class t ON t.relname = c.table_name
            JOIN pg_namespace n ON n.oid = t.relnamespace AND n.nspname = c.table_schema
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
            LEFT JOIN (
                SELECT kcu.column_name
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                WHERE tc.table_name = $1
                AND tc.table_schema = $2
                AND tc.constraint_type = 'PRIMARY KEY'
            ) pk ON c.column_name = pk.column_name
            WHERE c.table_name = $1 AND c.table_schema = $2
            ORDER BY c.ordinal_position
            "#;

        pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
            SELECT
                kcu.column_name::text AS column_name,
                ccu.table_name::text AS foreign_table_name,
                ccu.column_name::text AS foreign_column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.table_name = $1
            AND tc.table_schema = $2
            AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY kcu.ordinal_position
            "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name, type FROM sqlite_master
            WHERE type IN ('table', 'view')
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;

        pub const TABLE_INFO: &str = "SELECT * FROM pragma_table_info(?1)";

        pub const FOREIGN_KEY_LIST: &str = "SELECT * FROM pragma_foreign_key_list(?1)";
    }
}

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn list_tables(pool: &PgPool, schema: Option<&str>) -> DbResult<Vec<TableSummary>> {
        let schema_name = schema.unwrap_or(DEFAULT_PG_SCHEMA);
        let rows = sqlx::query(queries::postgres::LIST_TABLES)
            .bind(schema_name)
            .fetch_all(pool)
            .await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("table_name")?;
            let type_str: String = row.try_get("table_type")?;
            let mut table =
                TableSummary::new(name, TableType::parse(&type_str)).with_schema(schema_name);

            if let Ok(Some(size)) = row.try_get::<Option<i64>, _>("total_size") {
                table.total_size = Some(size.max(0) as u64);
            }
            if let Ok(Some(count)) = row.try_get::<Option<i64>, _>("row_count") {
                table.estimated_rows = Some(count.max(0) as u64);
            }
            if let Ok(Some(comment)) = row.try_get::<Option<String>, _>("comment") {
                if !comment.is_empty() {
                    table.comment = Some(comment);
                }
            }
            tables.push(table);
        }

        debug!(
            count = tables.len(),
            schema = schema_name,
            "Listed PostgreSQL tables"
        );
        Ok(tables)
    }

    pub async fn describe_table(
        pool: &PgPool,
        table_name: &str,
        schema: Option<&str>,
    ) -> DbResult<TableDescription> {
        let schema_name = schema.unwrap_or(DEFAULT_PG_SCHEMA);

        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(table_name)
            .bind(schema_name)
            .fetch_all(pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let nullable: String = row.try_get("is_nullable")?;
            columns.push(ColumnDetail {
                name: row.try_get("column_name")?,
                data_type: row.try_get("column_type")?,
                nullable: nullable == "YES",
                default_value: row.try_get("column_default").ok().flatten(),
                is_primary_key: row.try_get("is_primary_key").unwrap_or(false),
            });
        }
        if columns.is_empty() {
            return Err(table_not_found(table_name));
        }

        let fk_rows = sqlx::query(queries::postgres::DESCRIBE_FOREIGN_KEYS)
            .bind(table_name)
            .bind(schema_name)
            .fetch_all(pool)
            .await?;

        let mut foreign_keys = Vec::with_capacity(fk_rows.len());
        for row in &fk_rows {
            foreign_keys.push(ForeignKey {
                column: row.try_get("column_name")?,
                references_table: row.try_get("foreign_table_name")?,
                references_column: row.try_get("foreign_column_name")?,
            });
        }

        Ok(TableDescription::new(
            table_name,
            Some(schema_name.to_string()),
            columns,
            foreign_keys,
        ))
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn list_tables(pool: &SqlitePool) -> DbResult<Vec<TableSummary>> {
        let rows = sqlx::query(queries::sqlite::LIST_TABLES)
            .fetch_all(pool)
            .await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name")?;
            let type_str: String = row.try_get("type")?;
            tables.push(TableSummary::new(name, TableType::parse(&type_str)));
        }

        debug!(count = tables.len(), "Listed SQLite tables");
        Ok(tables)
    }

    pub async fn describe_table(
        pool: &SqlitePool,
        table_name: &str,
    ) -> DbResult<TableDescription> {
        let rows = sqlx::query(queries::sqlite::TABLE_INFO)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let notnull: i64 = row.try_get("notnull")?;
            let pk: i64 = row.try_get("pk")?;
            columns.push(ColumnDetail {
                name: row.try_get("name")?,
                data_type: row.try_get("type")?,
                nullable: notnull == 0,
                default_value: row.try_get("dflt_value").ok().flatten(),
                is_primary_key: pk > 0,
            });
        }
        if columns.is_empty() {
            return Err(table_not_found(table_name));
        }

        let fk_rows = sqlx::query(queries::sqlite::FOREIGN_KEY_LIST)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        let mut foreign_keys = Vec::with_capacity(fk_rows.len());
        for row in &fk_rows {
            // `to` is NULL when the reference targets the parent's primary key implicitly.
            let references_column: Option<String> = row.try_get("to").ok().flatten();
            foreign_keys.push(ForeignKey {
                column: row.try_get("from")?,
                references_table: row.try_get("table")?,
                references_column: references_column.unwrap_or_default(),
            });
        }

        Ok(TableDescription::new(table_name, None, columns, foreign_keys))
    }
}
