//! Row-limit enforcement for validated statements.
//!
//! Works on the scanner's tokens, so a `LIMIT` inside a string literal is
//! never touched and an outer `LIMIT` is told apart from one inside a CTE
//! body or subquery.

use super::lexer::{self, TokenKind};

/// What the rewriter did to the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitDecision {
    /// No outer limit existed; one was appended.
    Appended,
    /// An existing limit was lowered to the maximum. `from` is its original argument.
    Clamped { from: String },
    /// The statement was already bounded, or is EXPLAIN/SHOW.
    Unchanged,
}

impl LimitDecision {
    /// Caller-facing note about the rewrite, if any.
    pub fn warning(&self, max_limit: u64) -> Option<String> {
        match self {
            LimitDecision::Appended => Some(format!(
                "No LIMIT clause found; results limited to {} rows",
                max_limit
            )),
            LimitDecision::Clamped { from } => Some(format!(
                "LIMIT {} exceeds the maximum of {} rows and was reduced",
                from, max_limit
            )),
            LimitDecision::Unchanged => None,
        }
    }
}

/// Rewritten statement plus the decision that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitRewrite {
    pub sql: String,
    pub decision: LimitDecision,
}

/// Bound `normalized_sql` to at most `max_limit` rows.
///
/// `normalized_sql` must already be accepted by the statement validator.
pub fn enforce_limit(normalized_sql: &str, max_limit: u64) -> String {
    enforce_with_report(normalized_sql, max_limit).sql
}

/// Like [`enforce_limit`], also reporting what changed.
pub fn enforce_with_report(normalized_sql: &str, max_limit: u64) -> LimitRewrite {
    let sql = normalized_sql;
    let all_tokens = lexer::tokenize(sql);
    let tokens = lexer::significant(&all_tokens);

    let mut replacements: Vec<(usize, usize)> = Vec::new();
    let mut clamped_from: Option<String> = None;
    let mut has_outer_limit = false;

    for (idx, tok) in tokens.iter().enumerate() {
        if !tok.is_keyword(sql, "LIMIT") {
            continue;
        }
        if tok.depth == 0 {
            has_outer_limit = true;
        }
        let Some(arg) = tokens.get(idx + 1) else {
            continue;
        };

        let exceeds = match numeric_value(arg.text(sql), arg.kind) {
            Some(value) => value > max_limit,
            // Only the outer limit is forced; inner non-numeric limits are
            // already bounded by the outer one.
            None => tok.depth == 0,
        };
        if exceeds {
            let last = lexer::argument_end(sql, &tokens, idx + 1);
            let span = (arg.start, tokens[last].end);
            clamped_from.get_or_insert_with(|| sql[span.0..span.1].to_string());
            replacements.push(span);
        }
    }

    let bounded = if clamped_from.is_some() {
        let mut out = String::with_capacity(sql.len());
        let mut pos = 0;
        for (start, end) in replacements {
            out.push_str(&sql[pos..start]);
            out.push_str(&max_limit.to_string());
            pos = end;
        }
        out.push_str(&sql[pos..]);
        out
    } else {
        sql.to_string()
    };

    let unbounded_kind = lexer::leading_keyword(sql)
        .is_some_and(|k| k.eq_ignore_ascii_case("EXPLAIN") || k.eq_ignore_ascii_case("SHOW"));
    if has_outer_limit || unbounded_kind {
        let decision = match clamped_from {
            Some(from) => LimitDecision::Clamped { from },
            None => LimitDecision::Unchanged,
        };
        return LimitRewrite {
            sql: bounded,
            decision,
        };
    }

    // A clamped inner limit does not bound the outer statement.
    let appended = append_limit(&bounded, max_limit);
    let decision = match clamped_from {
        Some(from) => LimitDecision::Clamped { from },
        None => LimitDecision::Appended,
    };
    LimitRewrite {
        sql: appended,
        decision,
    }
}

/// Strip one trailing `;` and append `LIMIT <max_limit>`.
fn append_limit(sql: &str, max_limit: u64) -> String {
    let tokens = lexer::tokenize(sql);
    let body = match tokens.last() {
        Some(last) if last.is_punct(sql, ';') => sql[..last.start].trim_end(),
        _ => sql.trim_end(),
    };
    // A trailing `--` comment would swallow anything on the same line.
    let separator = if lexer::has_line_comment(body) { "\n" } else { " " };
    format!("{}{}LIMIT {}", body, separator, max_limit)
}

/// Integer value of a limit argument. Digit runs too large for `u64`
/// saturate rather than being treated as non-numeric.
fn numeric_value(text: &str, kind: TokenKind) -> Option<u64> {
    if kind != TokenKind::Number || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(text.parse::<u64>().unwrap_or(u64::MAX))
}
