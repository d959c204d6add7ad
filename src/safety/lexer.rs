//! Minimal SQL scanner.
//!
//! This is not a parser. It splits a statement into words, numbers, quoted
//! runs, comments, and punctuation, and records the parenthesis depth of each
//! token. That is enough to tell an outer `LIMIT` or `ORDER BY` apart from one
//! inside a CTE body, a subquery, or a window definition, and to keep the
//! contents of string literals from looking like keywords.

/// Kind of lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Keyword or bare identifier (also `$1` style parameters)
    Word,
    /// Unsigned numeric literal
    Number,
    /// String literal (`'...'`, `E'...'`, `$tag$...$tag$`) or quoted identifier
    Quoted,
    /// `-- ...` or `/* ... */`
    Comment,
    /// Any other single character, including parentheses
    Punct,
}

/// A token with its byte span in the source and its parenthesis depth.
///
/// Parentheses carry the depth of the context they open or close, so a
/// matching `(`/`)` pair always shares the same depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub depth: u32,
}

impl Token {
    /// Source text of this token.
    pub fn text<'a>(&self, sql: &'a str) -> &'a str {
        &sql[self.start..self.end]
    }

    /// Case-insensitive keyword comparison for word tokens.
    pub fn is_keyword(&self, sql: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(sql).eq_ignore_ascii_case(keyword)
    }

    pub(crate) fn is_punct(&self, sql: &str, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text(sql).starts_with(c)
    }
}

/// Split `sql` into tokens. Whitespace is dropped.
pub fn tokenize(sql: &str) -> Vec<Token> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut depth: u32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let start = i;

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let kind = match b {
            b'\'' | b'"' => {
                i = scan_quoted(bytes, i, b, false);
                TokenKind::Quoted
            }
            b'e' | b'E' if bytes.get(i + 1) == Some(&b'\'') => {
                i = scan_quoted(bytes, i + 1, b'\'', true);
                TokenKind::Quoted
            }
            b'$' if dollar_tag_len(&bytes[i..]).is_some() => {
                i = scan_dollar_quoted(bytes, i);
                TokenKind::Quoted
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&c| c == b'\n')
                    .map_or(bytes.len(), |p| i + p);
                TokenKind::Comment
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find_subslice(&bytes[i + 2..], b"*/").map_or(bytes.len(), |p| i + 2 + p + 2);
                TokenKind::Comment
            }
            b'0'..=b'9' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                TokenKind::Number
            }
            b'(' => {
                tokens.push(Token {
                    kind: TokenKind::Punct,
                    start,
                    end: i + 1,
                    depth,
                });
                depth += 1;
                i += 1;
                continue;
            }
            b')' => {
                depth = depth.saturating_sub(1);
                i += 1;
                TokenKind::Punct
            }
            c if is_word_byte(c) || c == b'$' || c >= 0x80 => {
                i += 1;
                while i < bytes.len() && (is_word_byte(bytes[i]) || bytes[i] == b'$' || bytes[i] >= 0x80)
                {
                    i += 1;
                }
                TokenKind::Word
            }
            _ => {
                i += 1;
                TokenKind::Punct
            }
        };

        tokens.push(Token {
            kind,
            start,
            end: i,
            depth,
        });
    }

    tokens
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Scan a quoted run starting at `start`; a doubled quote is an escape, and
/// so is a backslash when `backslash_escapes` is set (`E'...'` strings).
/// An unterminated run extends to the end of input.
fn scan_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if backslash_escapes && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Length of the `$tag$` opener at the start of `bytes`, if it is one.
/// `$1` style parameters are not openers.
fn dollar_tag_len(bytes: &[u8]) -> Option<usize> {
    let tag_len = bytes[1..]
        .iter()
        .position(|&b| !(is_word_byte(b) || b >= 0x80))
        .unwrap_or(bytes.len() - 1);
    let closes = bytes.get(1 + tag_len) == Some(&b'$');
    let starts_with_digit = bytes.get(1).is_some_and(|b| b.is_ascii_digit());
    (closes && !starts_with_digit).then_some(tag_len + 2)
}

/// Scan a dollar-quoted string up to its matching closing tag.
/// An unterminated run extends to the end of input.
fn scan_dollar_quoted(bytes: &[u8], start: usize) -> usize {
    let open_len = dollar_tag_len(&bytes[start..]).unwrap_or(2);
    let tag = &bytes[start..start + open_len];
    let body = start + open_len;
    find_subslice(&bytes[body..], tag).map_or(bytes.len(), |p| body + p + open_len)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Tokens with comments removed.
pub(crate) fn significant(tokens: &[Token]) -> Vec<Token> {
    tokens
        .iter()
        .copied()
        .filter(|t| t.kind != TokenKind::Comment)
        .collect()
}

/// True if the statement has an `ORDER BY` outside of any parentheses.
///
/// Orderings inside CTE bodies, subqueries, and `OVER (...)` windows do not
/// order the rows the statement returns, so they do not count.
pub fn has_top_level_order_by(sql: &str) -> bool {
    let tokens = significant(&tokenize(sql));
    tokens.windows(2).any(|pair| {
        pair[0].depth == 0
            && pair[1].depth == 0
            && pair[0].is_keyword(sql, "ORDER")
            && pair[1].is_keyword(sql, "BY")
    })
}

/// True if the statement contains a `--` comment, which swallows anything
/// appended to the same line.
pub fn has_line_comment(sql: &str) -> bool {
    tokenize(sql)
        .iter()
        .any(|t| t.kind == TokenKind::Comment && t.text(sql).starts_with("--"))
}

/// First word of the statement, if any.
pub fn leading_keyword(sql: &str) -> Option<&str> {
    tokenize(sql)
        .into_iter()
        .find(|t| t.kind != TokenKind::Comment)
        .filter(|t| t.kind == TokenKind::Word)
        .map(|t| t.text(sql))
}

/// Index (into `tokens`) of the last token making up the argument that
/// starts at `idx`. A parenthesized argument runs to its closing paren.
pub(crate) fn argument_end(sql: &str, tokens: &[Token], idx: usize) -> usize {
    let first = tokens[idx];
    if !first.is_punct(sql, '(') {
        return idx;
    }
    tokens[idx + 1..]
        .iter()
        .position(|t| t.depth == first.depth && t.is_punct(sql, ')'))
        .map_or(tokens.len() - 1, |p| idx + 1 + p)
}

/// Remove outer `LIMIT <arg>` and `OFFSET <arg> [ROW | ROWS]` clauses and a
/// trailing `;`, returning whitespace-collapsed text.
pub fn strip_top_level_limit_offset(sql: &str) -> String {
    let tokens = significant(&tokenize(sql));
    let mut cuts: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let tok = tokens[i];
        let is_clause = tok.depth == 0
            && (tok.is_keyword(sql, "LIMIT") || tok.is_keyword(sql, "OFFSET"))
            && i + 1 < tokens.len();
        if !is_clause {
            i += 1;
            continue;
        }

        let mut last = argument_end(sql, &tokens, i + 1);
        if tok.is_keyword(sql, "OFFSET")
            && tokens
                .get(last + 1)
                .is_some_and(|t| t.is_keyword(sql, "ROW") || t.is_keyword(sql, "ROWS"))
        {
            last += 1;
        }
        cuts.push((tok.start, tokens[last].end));
        i = last + 1;
    }

    let mut out = String::with_capacity(sql.len());
    let mut pos = 0;
    for (start, end) in cuts {
        out.push_str(&sql[pos..start]);
        pos = end;
    }
    out.push_str(&sql[pos..]);

    let collapsed = super::statement::normalize_whitespace(&out);
    collapsed
        .strip_suffix(';')
        .map(|s| s.trim_end().to_string())
        .unwrap_or(collapsed)
}
