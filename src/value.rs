//! Value preparation.
//!
//! Turns a JSON value into a SQL literal ready for interpolation, driven by
//! the target column's [`TypeCategory`]. Integer-classified columns coerce
//! their input to an integer first; everything else is escaped for the
//! backend and single-quoted. A leading `&` on a string marks the remainder
//! as a raw SQL expression that passes through untouched.

use crate::db::pool::Backend;
use crate::db::types::TypeCategory;
use crate::error::{DbError, DbResult};
use serde_json::Value as JsonValue;

/// Marker prefix for raw SQL expressions.
pub const RAW_MARKER: char = '&';

/// Escape a string for inclusion in a single-quoted SQL literal.
///
/// MySQL treats backslash as an escape character inside literals, so it must
/// be doubled before quote doubling. SQLite follows the SQL standard where
/// backslash has no special meaning.
pub fn escape_literal(backend: Backend, s: &str) -> String {
    match backend {
        Backend::MySql => s.replace('\\', "\\\\").replace('\'', "''"),
        Backend::Sqlite => s.replace('\'', "''"),
    }
}

/// Escape and single-quote a string literal.
pub fn quote_literal(backend: Backend, s: &str) -> String {
    format!("'{}'", escape_literal(backend, s))
}

/// Coerce a string to an integer literal the way a loose cast would:
/// a clean integer parses directly, a float string truncates toward zero,
/// anything else becomes 0. Leading zeros are dropped ("007" is 7).
fn coerce_integer_str(s: &str) -> i64 {
    let trimmed = s.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return n;
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return f.trunc() as i64;
    }
    0
}

/// Prepare a JSON value as a SQL literal for a column of the given category.
///
/// Arrays and objects are rejected: only scalars have a literal form here,
/// and silently serializing a structure would hide a caller bug.
pub fn prepare_value(
    category: TypeCategory,
    backend: Backend,
    value: &JsonValue,
) -> DbResult<String> {
    // Raw expressions bypass coercion and escaping entirely
    if let JsonValue::String(s) = value {
        if let Some(raw) = s.strip_prefix(RAW_MARKER) {
            return Ok(raw.to_string());
        }
    }

    match value {
        JsonValue::Null => Ok("NULL".to_string()),
        JsonValue::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        JsonValue::Number(n) => {
            if category == TypeCategory::Integer {
                if let Some(i) = n.as_i64() {
                    Ok(i.to_string())
                } else if let Some(f) = n.as_f64() {
                    Ok((f.trunc() as i64).to_string())
                } else {
                    // u64 beyond i64 range; keep the digits as-is
                    Ok(n.to_string())
                }
            } else {
                Ok(n.to_string())
            }
        }
        JsonValue::String(s) => {
            if category == TypeCategory::Integer {
                Ok(coerce_integer_str(s).to_string())
            } else {
                Ok(quote_literal(backend, s))
            }
        }
        JsonValue::Array(_) | JsonValue::Object(_) => Err(DbError::validation(
            "cannot prepare an array or object as a column value",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_coercion() {
        let prep = |v: &JsonValue| {
            prepare_value(TypeCategory::Integer, Backend::MySql, v).unwrap()
        };
        assert_eq!(prep(&json!("007")), "7");
        assert_eq!(prep(&json!("12.9")), "12");
        assert_eq!(prep(&json!("abc")), "0");
        assert_eq!(prep(&json!(42)), "42");
        assert_eq!(prep(&json!(true)), "1");
    }

    #[test]
    fn test_raw_marker_passthrough() {
        let out = prepare_value(TypeCategory::Text, Backend::MySql, &json!("&NOW()")).unwrap();
        assert_eq!(out, "NOW()");
        // Raw wins even on integer columns
        let out =
            prepare_value(TypeCategory::Integer, Backend::MySql, &json!("&LAST_INSERT_ID()"))
                .unwrap();
        assert_eq!(out, "LAST_INSERT_ID()");
    }

    #[test]
    fn test_text_quoting_per_backend() {
        let out =
            prepare_value(TypeCategory::Text, Backend::MySql, &json!(r"O'Brien\x")).unwrap();
        assert_eq!(out, r"'O''Brien\\x'");
        let out =
            prepare_value(TypeCategory::Text, Backend::Sqlite, &json!(r"O'Brien\x")).unwrap();
        assert_eq!(out, r"'O''Brien\x'");
    }

    #[test]
    fn test_null_and_structures() {
        assert_eq!(
            prepare_value(TypeCategory::Text, Backend::Sqlite, &JsonValue::Null).unwrap(),
            "NULL"
        );
        assert!(matches!(
            prepare_value(TypeCategory::Text, Backend::Sqlite, &json!([1, 2])),
            Err(DbError::Validation { .. })
        ));
        assert!(matches!(
            prepare_value(TypeCategory::Text, Backend::Sqlite, &json!({"a": 1})),
            Err(DbError::Validation { .. })
        ));
    }
}
