//! Read-only statement classification.
//!
//! Decides, by lexical inspection, whether a caller-supplied SQL string may
//! run. The classifier works on a whitespace-collapsed copy of the input and
//! checks, in order: size, blocked keywords (whole words only), known
//! dangerous function/command patterns, statement separators, and finally the
//! leading keyword against the policy's allowed prefixes.
//!
//! This is a classifier, not a parser. Comments, unusual encodings, or
//! look-alike Unicode characters can hide a keyword from it; write protection
//! at the database-role level is the backstop for that.
//!
//! # Examples
//!
//! ```
//! use db_insight_mcp::safety::statement::validate_statement;
//!
//! let allowed = ["SELECT", "WITH"];
//! let ok = validate_statement("SELECT  deleted_at\n FROM events", &allowed);
//! assert!(ok.accepted);
//! assert_eq!(ok.normalized_statement.as_deref(), Some("SELECT deleted_at FROM events"));
//!
//! let blocked = validate_statement("update users set x=1", &allowed);
//! assert!(!blocked.accepted);
//! ```

use super::lexer::{self, Token, TokenKind};
use crate::error::{DbError, DbResult};
use regex::Regex;
use std::sync::LazyLock;

/// Longest statement accepted, in characters.
pub const MAX_STATEMENT_LENGTH: usize = 100_000;

/// Keywords rejected wherever they appear as a whole word.
pub const BLOCKED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "CREATE", "GRANT", "REVOKE",
    "EXECUTE", "CALL", "COPY", "VACUUM", "REINDEX", "CLUSTER", "COMMENT", "SECURITY", "OWNER",
    "SET ROLE", "RESET",
];

static BLOCKED_KEYWORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = BLOCKED_KEYWORDS
        .iter()
        .map(|k| k.replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
        .expect("Invalid regex: blocked keyword pattern")
});

/// Patterns rejected regardless of keyword matches, with a description used
/// in the rejection reason.
static DANGEROUS_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i);\s*(?:INSERT|UPDATE|DELETE|DROP|ALTER|TRUNCATE|CREATE|GRANT|REVOKE)\b")
                .expect("Invalid regex: statement injection pattern"),
            "statement separator followed by a write statement",
        ),
        (
            Regex::new(
                r"(?i)\b(?:pg_read_file|pg_read_binary_file|pg_ls_dir|pg_stat_file|pg_file_write|lo_import|lo_export)\s*\(",
            )
            .expect("Invalid regex: file access pattern"),
            "server file access function",
        ),
        (
            Regex::new(r"(?i)\b(?:pg_terminate_backend|pg_cancel_backend)\s*\(")
                .expect("Invalid regex: backend termination pattern"),
            "backend termination or cancel function",
        ),
        (
            Regex::new(r"(?i)\bCOPY\b.*\bTO\b").expect("Invalid regex: COPY TO pattern"),
            "COPY ... TO",
        ),
    ]
});

/// Why a statement was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    Empty,
    TooLong,
    BlockedKeyword,
    DangerousPattern,
    MultipleStatements,
    PrefixNotAllowed,
}

/// Result of classifying one statement. Produced fresh per call.
///
/// `accepted == false` implies `normalized_statement` is `None`;
/// `accepted == true` implies it is a non-empty, whitespace-collapsed
/// statement starting with an allowed keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub reason: Option<String>,
    pub normalized_statement: Option<String>,
    pub rejection: Option<RejectionKind>,
}

impl ValidationOutcome {
    fn accept(normalized: String) -> Self {
        Self {
            accepted: true,
            reason: None,
            normalized_statement: Some(normalized),
            rejection: None,
        }
    }

    fn reject(kind: RejectionKind, reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
            normalized_statement: None,
            rejection: Some(kind),
        }
    }

    /// Convert into a `Result`, mapping an oversized statement to
    /// `ResourceExceeded` and every other rejection to `Rejected`.
    pub fn into_result(self) -> DbResult<String> {
        match (self.normalized_statement, self.rejection) {
            (Some(sql), None) => Ok(sql),
            (_, kind) => {
                let reason = self
                    .reason
                    .unwrap_or_else(|| "Statement rejected".to_string());
                if kind == Some(RejectionKind::TooLong) {
                    Err(DbError::resource_exceeded(reason))
                } else {
                    Err(DbError::rejected(reason))
                }
            }
        }
    }
}

/// Trim and collapse every whitespace run between tokens to a single space.
///
/// The run that ends a `--` comment becomes a single newline instead, so the
/// code after it stays code. Quoted literals keep their text; block comments
/// are collapsed like everything else.
pub fn normalize_whitespace(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut prev: Option<Token> = None;

    for tok in lexer::tokenize(sql) {
        if let Some(p) = prev {
            if is_line_comment(&p, sql) {
                out.push('\n');
            } else if tok.start > p.end {
                out.push(' ');
            }
        }
        let text = tok.text(sql);
        match tok.kind {
            TokenKind::Comment if is_line_comment(&tok, sql) => out.push_str(text.trim_end()),
            TokenKind::Comment => out.push_str(&text.split_whitespace().collect::<Vec<_>>().join(" ")),
            _ => out.push_str(text),
        }
        prev = Some(tok);
    }

    out
}

fn is_line_comment(tok: &Token, sql: &str) -> bool {
    tok.kind == TokenKind::Comment && tok.text(sql).starts_with("--")
}

/// Classify `sql` against the allowed leading keywords.
///
/// Never fails; the outcome says whether the statement may run.
pub fn validate_statement<S: AsRef<str>>(sql: &str, allowed_prefixes: &[S]) -> ValidationOutcome {
    if sql.chars().count() > MAX_STATEMENT_LENGTH {
        return ValidationOutcome::reject(
            RejectionKind::TooLong,
            format!(
                "SQL statement exceeds maximum length of {} characters",
                MAX_STATEMENT_LENGTH
            ),
        );
    }

    let normalized = normalize_whitespace(sql);
    if normalized.is_empty() {
        return ValidationOutcome::reject(RejectionKind::Empty, "SQL statement is empty");
    }

    if let Some(found) = BLOCKED_KEYWORD_REGEX.find(&normalized) {
        let keyword = found.as_str().to_ascii_uppercase();
        return ValidationOutcome::reject(
            RejectionKind::BlockedKeyword,
            format!("Blocked keyword detected: {}", keyword),
        );
    }

    for (pattern, description) in DANGEROUS_PATTERNS.iter() {
        if pattern.is_match(&normalized) {
            return ValidationOutcome::reject(
                RejectionKind::DangerousPattern,
                format!("Dangerous pattern detected: {}", description),
            );
        }
    }

    let separators = normalized.matches(';').count();
    if separators > 1 || (separators == 1 && !normalized.ends_with(';')) {
        return ValidationOutcome::reject(
            RejectionKind::MultipleStatements,
            "Multiple statements are not allowed; only a single trailing ';' is tolerated",
        );
    }

    if !allowed_prefixes
        .iter()
        .any(|prefix| starts_with_keyword(&normalized, prefix.as_ref()))
    {
        let allowed = allowed_prefixes
            .iter()
            .map(|p| p.as_ref().to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(", ");
        return ValidationOutcome::reject(
            RejectionKind::PrefixNotAllowed,
            format!("Statement must begin with one of: {}", allowed),
        );
    }

    ValidationOutcome::accept(normalized)
}

/// Case-insensitive prefix match that ends on a word boundary, so `SELECT`
/// matches `SELECT 1` and `SELECT(1)` but not `SELECTED`.
fn starts_with_keyword(statement: &str, prefix: &str) -> bool {
    let prefix = prefix.trim();
    if prefix.is_empty() || statement.len() < prefix.len() {
        return false;
    }
    let Some(head) = statement.get(..prefix.len()) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(prefix) {
        return false;
    }
    statement[prefix.len()..]
        .chars()
        .next()
        .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
}
