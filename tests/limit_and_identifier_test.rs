//! Integration tests for row-limit enforcement and identifier handling.

use db_insight_mcp::safety::identifier::MAX_IDENTIFIER_LENGTH;
use db_insight_mcp::safety::{
    IdentifierKind, LimitDecision, SecurityPolicy, enforce_limit, enforce_with_report,
    qualified_name, quote_identifier, validate_identifier, validate_identifiers,
    validate_statement,
};

/// Validate then bound, the way the query tool does.
fn bound(sql: &str, max: u64) -> String {
    let normalized = validate_statement(sql, &["SELECT", "WITH", "EXPLAIN", "SHOW"])
        .into_result()
        .unwrap();
    enforce_limit(&normalized, max)
}

// =========================================================================
// Limit enforcement
// =========================================================================

#[test]
fn test_unbounded_select_gets_limit() {
    assert_eq!(
        bound("SELECT *\n  FROM users", 1000),
        "SELECT * FROM users LIMIT 1000"
    );
}

#[test]
fn test_large_limit_is_clamped() {
    let out = bound("SELECT * FROM orders ORDER BY id LIMIT 50000", 1000);
    assert_eq!(out, "SELECT * FROM orders ORDER BY id LIMIT 1000");
    assert!(!out.contains("50000"));
}

#[test]
fn test_small_limit_is_untouched() {
    let r = enforce_with_report("SELECT * FROM orders LIMIT 25", 1000);
    assert_eq!(r.sql, "SELECT * FROM orders LIMIT 25");
    assert_eq!(r.decision, LimitDecision::Unchanged);
    assert!(r.decision.warning(1000).is_none());
}

#[test]
fn test_with_statement_binds_final_select() {
    let out = bound(
        "WITH recent AS (SELECT * FROM orders) SELECT * FROM recent",
        100,
    );
    assert_eq!(
        out,
        "WITH recent AS (SELECT * FROM orders) SELECT * FROM recent LIMIT 100"
    );
    assert_eq!(out.matches("LIMIT").count(), 1);
}

#[test]
fn test_trailing_separator_removed_before_append() {
    assert_eq!(bound("SELECT 1;", 10), "SELECT 1 LIMIT 10");
}

#[test]
fn test_explain_and_show_never_get_limit() {
    assert_eq!(bound("EXPLAIN SELECT * FROM t", 10), "EXPLAIN SELECT * FROM t");
    assert_eq!(bound("SHOW server_version", 10), "SHOW server_version");
}

#[test]
fn test_limit_inside_postgres_string_forms_is_not_outer() {
    for sql in [
        "SELECT $$ LIMIT 1 $$ AS x FROM big_table",
        "SELECT $note$ it's LIMIT 1 $note$ AS x FROM big_table",
        r"SELECT E'\' LIMIT 1 --' AS x FROM big_table",
    ] {
        assert_eq!(bound(sql, 100), format!("{} LIMIT 100", sql), "unbounded: {}", sql);
    }
}

#[test]
fn test_line_comment_mid_statement_keeps_following_clause() {
    let out = bound("SELECT * FROM users -- only active\n  WHERE active = 1", 100);
    assert_eq!(out, "SELECT * FROM users -- only active\nWHERE active = 1\nLIMIT 100");
}

#[test]
fn test_limit_all_is_bounded() {
    let r = enforce_with_report("SELECT * FROM t LIMIT ALL", 500);
    assert_eq!(r.sql, "SELECT * FROM t LIMIT 500");
    assert_eq!(
        r.decision,
        LimitDecision::Clamped {
            from: "ALL".to_string()
        }
    );
}

#[test]
fn test_enforcement_is_idempotent() {
    for sql in [
        "SELECT * FROM t",
        "SELECT * FROM t LIMIT 99999",
        "WITH a AS (SELECT 1 LIMIT 5000) SELECT * FROM a",
        "SELECT * FROM (SELECT * FROM t LIMIT 5000) s",
        "SELECT 1;",
        "EXPLAIN SELECT 1",
    ] {
        let once = enforce_limit(sql, 100);
        let twice = enforce_with_report(&once, 100);
        assert_eq!(twice.sql, once, "not idempotent: {}", sql);
        assert_eq!(twice.decision, LimitDecision::Unchanged);
    }
}

#[test]
fn test_policy_bound_uses_max_row_limit() {
    let policy = SecurityPolicy::new(&["SELECT"], 20).unwrap();
    let normalized = policy.validate("select id from t").into_result().unwrap();
    let rewrite = policy.bound(&normalized);
    assert_eq!(rewrite.sql, "select id from t LIMIT 20");
    assert_eq!(
        rewrite.decision.warning(20).as_deref(),
        Some("No LIMIT clause found; results limited to 20 rows")
    );
}

// =========================================================================
// Identifiers
// =========================================================================

#[test]
fn test_identifier_grammar() {
    for name in ["users", "_private", "Order_Items2", "a"] {
        let outcome = validate_identifier(name, IdentifierKind::Table);
        assert!(outcome.accepted, "rejected {:?}", name);
        assert_eq!(outcome.sanitized_name.as_deref(), Some(name));
    }

    for name in ["1users", "users;", "us ers", "users--", "\"users\"", "ü", "a.b"] {
        let outcome = validate_identifier(name, IdentifierKind::Column);
        assert!(!outcome.accepted, "accepted {:?}", name);
        assert!(outcome.sanitized_name.is_none());
        assert!(outcome.reason.unwrap().contains("column"));
    }
}

#[test]
fn test_identifier_length_limit() {
    let max = "a".repeat(MAX_IDENTIFIER_LENGTH);
    assert!(validate_identifier(&max, IdentifierKind::Schema).accepted);

    let over = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
    let outcome = validate_identifier(&over, IdentifierKind::Schema);
    assert!(!outcome.accepted);
    assert!(outcome.reason.unwrap().contains("schema"));
}

#[test]
fn test_empty_identifier_names_kind() {
    let outcome = validate_identifier("", IdentifierKind::Table);
    assert_eq!(
        outcome.reason.as_deref(),
        Some("Invalid table name: must not be empty")
    );
}

#[test]
fn test_reserved_words_are_accepted_and_quoted() {
    let outcome = validate_identifier("order", IdentifierKind::Table);
    assert!(outcome.accepted);
    assert_eq!(quote_identifier("order"), "\"order\"");
}

#[test]
fn test_quote_doubles_embedded_quotes() {
    assert_eq!(quote_identifier(r#"He said "hi""#), r#""He said ""hi""""#);
    assert_eq!(
        qualified_name(Some("sales"), "orders"),
        "\"sales\".\"orders\""
    );
    assert_eq!(qualified_name(None, "orders"), "\"orders\"");
}

#[test]
fn test_validate_many_is_all_or_nothing() {
    let ok = validate_identifiers(&["id", "name", "created_at"], IdentifierKind::Column).unwrap();
    assert_eq!(ok, vec!["id", "name", "created_at"]);

    let err = validate_identifiers(&["id", "name; --", "bad name"], IdentifierKind::Column)
        .unwrap_err();
    assert!(err.reason.unwrap().contains("name; --"));
}
