//! Tokenizing helpers for the SQL subset. Everything here is pure text
//! processing; nothing touches a table.

use crate::{
    db::{predicate::Operator, sql::SqlError},
    value::Value,
};

const COMMANDS: [&str; 3] = ["SELECT", "UPDATE", "DELETE"];

// Two-character operators come first so `>=` never parses as `>`.
const BINARY_OPERATORS: [(&str, Operator); 7] = [
    ("!=", Operator::Ne),
    (">=", Operator::Gte),
    ("<=", Operator::Lte),
    ("=", Operator::Eq),
    (">", Operator::Gt),
    ("<", Operator::Lt),
    ("LIKE", Operator::Like),
];

///
/// ParsedCondition
///

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ParsedCondition {
    pub(crate) field: String,
    pub(crate) op: Operator,
    pub(crate) value: Value,
}

/// Trim and collapse every whitespace run to a single space.
pub(crate) fn normalize(command: &str) -> String {
    command.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Statement keyword: a supported command matched by case-insensitive
/// prefix, so `SELECT*FROM t` dispatches too. Otherwise the first word,
/// upper-cased.
pub(crate) fn leading_keyword(sql: &str) -> String {
    COMMANDS
        .iter()
        .find(|kw| sql.get(..kw.len()).is_some_and(|head| head.eq_ignore_ascii_case(kw)))
        .map_or_else(
            || sql.split(' ').next().unwrap_or_default().to_ascii_uppercase(),
            |kw| (*kw).to_string(),
        )
}

/// Byte offsets of ASCII-case-insensitive matches of `needle` that sit
/// outside single or double quotes.
fn find_unquoted(haystack: &str, needle: &str) -> Vec<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    let mut hits = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < hay.len() {
        let b = hay[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None => {
                if hay.len() - i >= pat.len() && hay[i..i + pat.len()].eq_ignore_ascii_case(pat) {
                    hits.push(i);
                    i += pat.len();
                    continue;
                }
            }
        }
        i += 1;
    }

    hits
}

/// Split on every unquoted, case-insensitive occurrence of `separator`.
fn split_unquoted<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;

    for hit in find_unquoted(text, separator) {
        parts.push(&text[start..hit]);
        start = hit + separator.len();
    }
    parts.push(&text[start..]);

    parts
}

/// Text after the first unquoted `start` keyword, up to the nearest
/// terminator (or a `;`, or the end of input).
pub(crate) fn clause<'a>(sql: &'a str, start: &str, terminators: &[&str]) -> Option<&'a str> {
    let begin = find_unquoted(sql, start).first()? + start.len();
    let rest = &sql[begin..];

    let end = terminators
        .iter()
        .chain(std::iter::once(&";"))
        .filter_map(|t| find_unquoted(rest, t).first().copied())
        .min()
        .unwrap_or(rest.len());

    let text = rest[..end].trim();
    (!text.is_empty()).then_some(text)
}

/// Reject parenthesized groups; only `IN (...)` lists may use parentheses.
pub(crate) fn check_groups(where_clause: &str) -> Result<(), SqlError> {
    for open in find_unquoted(where_clause, "(") {
        let mut words = where_clause[..open].split_whitespace().rev();
        let is_in_list = words.next().is_some_and(|w| w.eq_ignore_ascii_case("IN"))
            && words.next().is_some();

        if !is_in_list {
            return Err(SqlError::NestedGroup {
                clause: where_clause.to_string(),
            });
        }
    }

    Ok(())
}

/// Split a WHERE clause into its flat groups: the first OR-segment's
/// conditions, then one list per later OR-segment.
///
/// `BETWEEN a AND b` is stitched back together after splitting on AND.
pub(crate) fn split_where(where_clause: &str) -> Vec<Vec<String>> {
    split_unquoted(where_clause, " OR ")
        .into_iter()
        .map(|segment| {
            let mut conds: Vec<String> = Vec::new();
            let mut pending_between = false;

            for part in split_unquoted(segment, " AND ") {
                let part = part.trim();
                if pending_between && let Some(last) = conds.last_mut() {
                    last.push_str(" AND ");
                    last.push_str(part);
                    pending_between = false;
                    continue;
                }

                pending_between = !find_unquoted(part, " BETWEEN ").is_empty();
                conds.push(part.to_string());
            }

            conds.retain(|c| !c.is_empty());
            conds
        })
        .collect()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$')
}

/// Leading identifier and the remainder, or `None` if there is no
/// identifier.
fn split_ident(cond: &str) -> Option<(&str, &str)> {
    let end = cond.find(|c: char| !is_ident_char(c)).unwrap_or(cond.len());
    (end > 0).then(|| (&cond[..end], &cond[end..]))
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    head.eq_ignore_ascii_case(keyword)
        .then(|| &text[keyword.len()..])
}

/// Tokenize one condition. Unrecognized shapes return `None`.
pub(crate) fn parse_condition(cond: &str) -> Option<ParsedCondition> {
    let (field, rest) = split_ident(cond.trim())?;
    let field = field.to_string();
    let spaced = rest.starts_with(' ');
    let rest = rest.trim_start();

    // field IN (a, b, c)
    if spaced && let Some(after) = strip_keyword(rest, "IN") {
        let after = after.trim_start();
        if let Some(inner) = after.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            let items = split_unquoted(inner, ",")
                .into_iter()
                .map(|item| parse_value(item.trim()))
                .collect();

            return Some(ParsedCondition {
                field,
                op: Operator::In,
                value: Value::List(items),
            });
        }
    }

    // field BETWEEN a AND b
    if spaced && let Some(after) = strip_keyword(rest, "BETWEEN ") {
        let split = find_unquoted(after, " AND ");
        if let Some(&at) = split.last() {
            let low = after[..at].trim();
            let high = after[at + " AND ".len()..].trim();
            if !low.is_empty() && !high.is_empty() {
                return Some(ParsedCondition {
                    field,
                    op: Operator::Between,
                    value: Value::List(vec![parse_value(low), parse_value(high)]),
                });
            }
        }
    }

    // field IS [NOT] NULL
    if spaced {
        if rest.eq_ignore_ascii_case("IS NULL") {
            return Some(ParsedCondition {
                field,
                op: Operator::IsNull,
                value: Value::Null,
            });
        }
        if rest.eq_ignore_ascii_case("IS NOT NULL") {
            return Some(ParsedCondition {
                field,
                op: Operator::IsNotNull,
                value: Value::Null,
            });
        }
    }

    // field op value
    for (token, op) in BINARY_OPERATORS {
        if let Some(after) = strip_keyword(rest, token) {
            let value = after.trim();
            if value.is_empty() {
                return None;
            }

            return Some(ParsedCondition {
                field,
                op,
                value: parse_value(value),
            });
        }
    }

    None
}

/// Parse a literal: quoted text is unquoted, numbers become `Int`/`Float`,
/// `NULL`/`TRUE`/`FALSE` are typed, and anything else stays text.
pub(crate) fn parse_value(token: &str) -> Value {
    let token = token.trim();

    for quote in ['\'', '"'] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return Value::Text(token[1..token.len() - 1].to_string());
        }
    }

    if let Some(number) = parse_number(token) {
        return number;
    }

    match token.to_ascii_uppercase().as_str() {
        "NULL" => Value::Null,
        "TRUE" => Value::Bool(true),
        "FALSE" => Value::Bool(false),
        _ => Value::Text(token.to_string()),
    }
}

// Decimal literals only; words like `inf` or `NaN` stay text.
fn parse_number(token: &str) -> Option<Value> {
    let numeric_shape = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && token.chars().any(|c| c.is_ascii_digit());

    if !numeric_shape {
        return None;
    }

    if let Ok(i) = token.parse::<i64>() {
        return Some(Value::Int(i));
    }

    token
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

/// Parse `a = 1, b = 'x'` into field/value pairs. Pairs without `=` are
/// skipped.
pub(crate) fn parse_assignments(set_clause: &str) -> Vec<(String, Value)> {
    split_unquoted(set_clause, ",")
        .into_iter()
        .filter_map(|pair| {
            let (field, value) = pair.split_once('=')?;
            let field = field.trim();
            (!field.is_empty()).then(|| (field.to_string(), parse_value(value)))
        })
        .collect()
}

/// `field [ASC|DESC]` from an ORDER BY clause.
pub(crate) fn parse_order(order_clause: &str) -> Option<(String, String)> {
    let mut words = order_clause.split(' ');
    let field = words.next().filter(|f| !f.is_empty())?;
    let direction = words.next().unwrap_or("asc");

    Some((field.to_string(), direction.to_string()))
}

/// Non-negative integer from a LIMIT clause.
pub(crate) fn parse_limit(limit_clause: &str) -> Option<usize> {
    let text = limit_clause.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    text.parse().ok()
}
