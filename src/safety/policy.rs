//! Per-server security policy: which statements may run and how many rows
//! any one of them may return.

use super::limit::{self, LimitRewrite};
use super::statement::{self, ValidationOutcome};

/// Statement keywords allowed when none are configured.
pub const DEFAULT_ALLOWED_PREFIXES: &[&str] = &["SELECT", "WITH", "EXPLAIN", "SHOW"];

/// Row limit used when none is configured.
pub const DEFAULT_MAX_ROW_LIMIT: u64 = 1000;

/// Largest row limit the policy accepts.
pub const MAX_ROW_LIMIT_CEILING: u64 = 100_000;

/// Immutable once built; shared behind an `Arc` and read by every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    allowed_statement_prefixes: Vec<String>,
    max_row_limit: u64,
}

impl SecurityPolicy {
    /// Build a policy. Prefixes are trimmed, upper-cased, and de-duplicated.
    pub fn new<S: AsRef<str>>(prefixes: &[S], max_row_limit: u64) -> Result<Self, String> {
        let mut normalized: Vec<String> = Vec::new();
        for prefix in prefixes {
            let p = prefix.as_ref().trim().to_ascii_uppercase();
            if p.is_empty() {
                continue;
            }
            if !normalized.contains(&p) {
                normalized.push(p);
            }
        }

        if normalized.is_empty() {
            return Err("at least one allowed statement prefix is required".to_string());
        }
        if max_row_limit == 0 {
            return Err("max_row_limit must be greater than 0".to_string());
        }
        if max_row_limit > MAX_ROW_LIMIT_CEILING {
            return Err(format!(
                "max_row_limit ({}) must not exceed {}",
                max_row_limit, MAX_ROW_LIMIT_CEILING
            ));
        }

        Ok(Self {
            allowed_statement_prefixes: normalized,
            max_row_limit,
        })
    }

    pub fn allowed_statement_prefixes(&self) -> &[String] {
        &self.allowed_statement_prefixes
    }

    pub fn max_row_limit(&self) -> u64 {
        self.max_row_limit
    }

    /// Classify `sql` against this policy's prefixes.
    pub fn validate(&self, sql: &str) -> ValidationOutcome {
        statement::validate_statement(sql, &self.allowed_statement_prefixes)
    }

    /// Bound an accepted statement to this policy's row limit.
    pub fn bound(&self, normalized_sql: &str) -> LimitRewrite {
        limit::enforce_with_report(normalized_sql, self.max_row_limit)
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            allowed_statement_prefixes: DEFAULT_ALLOWED_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_row_limit: DEFAULT_MAX_ROW_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_prefixes() {
        let policy = SecurityPolicy::new(&["select", " Select ", "with", ""], 10).unwrap();
        assert_eq!(policy.allowed_statement_prefixes(), &["SELECT", "WITH"]);
    }

    #[test]
    fn test_rejects_empty_prefix_set() {
        let empty: [&str; 0] = [];
        assert!(SecurityPolicy::new(&empty, 10).is_err());
        assert!(SecurityPolicy::new(&["  "], 10).is_err());
    }

    #[test]
    fn test_rejects_bad_row_limit() {
        assert!(SecurityPolicy::new(&["SELECT"], 0).is_err());
        assert!(SecurityPolicy::new(&["SELECT"], MAX_ROW_LIMIT_CEILING + 1).is_err());
        assert!(SecurityPolicy::new(&["SELECT"], MAX_ROW_LIMIT_CEILING).is_ok());
    }

    #[test]
    fn test_default_policy() {
        let policy = SecurityPolicy::default();
        assert_eq!(policy.max_row_limit(), 1000);
        assert!(policy.validate("EXPLAIN SELECT 1").accepted);
        assert!(!policy.validate("VALUES (1)").accepted);
    }

    #[test]
    fn test_validate_then_bound() {
        let policy = SecurityPolicy::new(&["SELECT"], 25).unwrap();
        let sql = policy.validate("SELECT *\nFROM t").into_result().unwrap();
        assert_eq!(policy.bound(&sql).sql, "SELECT * FROM t LIMIT 25");
    }
}
