//! Identifier validation and quoting.
//!
//! Names that end up inside generated SQL (schema, table, and column names
//! passed to the catalog and sampling tools) are checked against a strict
//! grammar and then quoted at the point of SQL construction. Acceptance and
//! quoting are independent: a reserved word such as `order` is a valid
//! identifier and becomes harmless once quoted.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Longest identifier accepted, in characters.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex: identifier grammar")
});

/// Words that need quoting to be used as identifiers. Informational only.
const RESERVED_KEYWORDS: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CONSTRAINT",
    "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXCEPT",
    "FALSE", "FETCH", "FOR", "FOREIGN", "FROM", "FULL", "GRANT", "GROUP", "HAVING", "IN", "INNER",
    "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "LIMIT", "NOT", "NULL",
    "OFFSET", "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET",
    "TABLE", "THEN", "TO", "TRUE", "UNION", "UNIQUE", "UPDATE", "USER", "USING", "VALUES", "WHEN",
    "WHERE", "WINDOW", "WITH",
];

/// What an identifier names. Only affects rejection messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
    Schema,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Table => "table",
            IdentifierKind::Column => "column",
            IdentifierKind::Schema => "schema",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of validating one identifier.
///
/// `sanitized_name`, when present, matches the identifier grammar and is
/// unquoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierOutcome {
    pub accepted: bool,
    pub reason: Option<String>,
    pub sanitized_name: Option<String>,
}

impl IdentifierOutcome {
    fn accept(name: &str) -> Self {
        Self {
            accepted: true,
            reason: None,
            sanitized_name: Some(name.to_string()),
        }
    }

    fn reject(reason: String) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            sanitized_name: None,
        }
    }
}

/// Validate a single identifier. Never fails; the outcome carries the verdict.
pub fn validate_identifier(name: &str, kind: IdentifierKind) -> IdentifierOutcome {
    if name.is_empty() {
        return IdentifierOutcome::reject(format!("Invalid {} name: must not be empty", kind));
    }

    let len = name.chars().count();
    if len > MAX_IDENTIFIER_LENGTH {
        return IdentifierOutcome::reject(format!(
            "Invalid {} name: {} characters exceeds the maximum of {}",
            kind, len, MAX_IDENTIFIER_LENGTH
        ));
    }

    if !IDENTIFIER_REGEX.is_match(name) {
        return IdentifierOutcome::reject(format!(
            "Invalid {} name '{}': must start with a letter or underscore and contain only letters, digits, and underscores",
            kind, name
        ));
    }

    IdentifierOutcome::accept(name)
}

/// Validate every name, stopping at the first rejection.
///
/// Returns the sanitized names in input order, or the outcome of the first
/// name that failed. No partial list is ever returned.
pub fn validate_identifiers<S: AsRef<str>>(
    names: &[S],
    kind: IdentifierKind,
) -> Result<Vec<String>, IdentifierOutcome> {
    names
        .iter()
        .map(|name| {
            let outcome = validate_identifier(name.as_ref(), kind);
            match outcome.sanitized_name {
                Some(sanitized) => Ok(sanitized),
                None => Err(outcome),
            }
        })
        .collect()
}

/// Quote an identifier for interpolation into SQL.
///
/// Embedded `"` characters are doubled and the whole is wrapped in `"`.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote `table`, qualified by `schema` when given.
pub fn qualified_name(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(table)),
        None => quote_identifier(table),
    }
}

/// True if `name` is a reserved SQL keyword.
pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(name))
}
