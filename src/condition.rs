//! Condition DSL and compiler.
//!
//! A [`Condition`] is a nested filter description compiled into a
//! `WHERE`/`ORDER BY`/`LIMIT` fragment. Keys name fields, or the grouping
//! words `AND`/`OR`; values are scalar match expressions or nested groups.
//! Scalar expressions carry an optional comparison prefix (`=`, `!=`/`!`,
//! `>`, `>=`, `<`, `<=`), optional wildcard markers (`%` or `*` at either
//! end, turning the match into `LIKE`/`NOT LIKE`), or a leading `&` marking
//! the remainder as a raw SQL fragment. The words `asc`/`desc`/`ASC`/`DESC`
//! (as key or value) request ordering and the key `LIMIT` caps the row
//! count; neither produces a `WHERE` clause.
//!
//! Entries at one level conjoin with `AND` unless grouped under `OR`; a
//! positional list under a field key reads as that field matching any of
//! the listed values.

use crate::db::pool::Backend;
use crate::error::{DbError, DbResult};
use crate::value::{escape_literal, quote_literal};
use serde_json::Value as JsonValue;

/// Field names quoted with backticks when they appear as keys.
const RESERVED_WORDS: &[&str] = &[
    "type", "asc", "desc", "value", "left", "join", "inner", "outer", "user",
];

/// Keys or whole values routed to ORDER BY / LIMIT instead of WHERE.
const SPECIAL_WORDS: &[&str] = &["asc", "desc", "ASC", "DESC", "LIMIT"];

// =============================================================================
// Condition Model
// =============================================================================

/// Ordered field→value entries of one nesting level.
pub type ConditionMap = Vec<(String, CondValue)>;

/// One value inside a condition level.
#[derive(Debug, Clone, PartialEq)]
pub enum CondValue {
    /// A scalar match expression, parsed by the compiler's grammar.
    Expr(String),
    /// A numeric literal, matched by equality without quoting.
    Number(i64),
    /// A nested group of keyed entries.
    Map(ConditionMap),
    /// A positional list; under a field key it means "any of these values",
    /// at the top of a group it reads as an OR-set of alternatives.
    List(Vec<CondValue>),
}

impl CondValue {
    /// Build a value from JSON. Strings become match expressions, integers
    /// numeric literals, objects and arrays nested groups.
    pub fn from_json(value: &JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::String(s) => Ok(CondValue::Expr(s.clone())),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(CondValue::Number(i)),
                None => Ok(CondValue::Expr(n.to_string())),
            },
            JsonValue::Bool(b) => Ok(CondValue::Number(if *b { 1 } else { 0 })),
            JsonValue::Object(map) => {
                let mut entries = ConditionMap::new();
                for (k, v) in map {
                    entries.push((k.clone(), CondValue::from_json(v)?));
                }
                Ok(CondValue::Map(entries))
            }
            JsonValue::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(CondValue::from_json(item)?);
                }
                Ok(CondValue::List(list))
            }
            JsonValue::Null => Err(DbError::validation(
                "null is not a valid condition value; omit the field instead",
            )),
        }
    }
}

/// A complete filter description for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Shorthand: equality on the owning table's primary key.
    Key(i64),
    /// A full nested condition.
    Where(ConditionMap),
}

impl Condition {
    /// Primary-key shorthand.
    pub fn key(id: i64) -> Self {
        Condition::Key(id)
    }

    /// Single field match.
    pub fn field(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Condition::Where(vec![(name.into(), CondValue::Expr(expr.into()))])
    }

    /// Build a condition from JSON: an integer is primary-key shorthand, an
    /// object is a nested condition.
    pub fn from_json(value: &JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Number(n) => n.as_i64().map(Condition::Key).ok_or_else(|| {
                DbError::validation("primary-key shorthand must be an integer")
            }),
            JsonValue::Object(_) => match CondValue::from_json(value)? {
                CondValue::Map(entries) => Ok(Condition::Where(entries)),
                _ => unreachable!("objects build maps"),
            },
            other => Err(DbError::validation(format!(
                "a condition must be an integer key or an object, got: {other}"
            ))),
        }
    }
}

// =============================================================================
// Compiled Output
// =============================================================================

/// Compiler output: AND-joined WHERE clauses plus ordering and limit parts.
#[derive(Debug, Clone, Default)]
pub struct CompiledCondition {
    pub clauses: Vec<String>,
    pub order_terms: Vec<String>,
    pub limit: Option<String>,
}

impl CompiledCondition {
    /// Render the ` WHERE ... ORDER BY ... LIMIT ...` fragment, each part
    /// present only when populated. The leading space makes the fragment
    /// directly appendable to a statement.
    pub fn fragment(&self) -> String {
        let mut out = String::new();
        if !self.clauses.is_empty() {
            out.push_str(" WHERE ");
            out.push_str(&self.clauses.join(" AND "));
        }
        if !self.order_terms.is_empty() {
            out.push_str(" ORDER BY ");
            out.push_str(&self.order_terms.join(", "));
        }
        if let Some(limit) = &self.limit {
            out.push_str(" LIMIT ");
            out.push_str(limit);
        }
        out
    }
}

/// Compile a condition against a table whose primary key (if any) resolves
/// the integer shorthand.
pub fn compile(
    condition: &Condition,
    primary_key: Option<&str>,
    backend: Backend,
) -> DbResult<CompiledCondition> {
    match condition {
        Condition::Key(id) => {
            let pk = primary_key.ok_or_else(|| {
                DbError::validation("primary-key shorthand used on a table without a primary key")
            })?;
            Ok(CompiledCondition {
                clauses: vec![format!("{} = {}", quote_field(pk), id)],
                ..Default::default()
            })
        }
        Condition::Where(entries) => {
            let mut compiler = Compiler {
                backend,
                order_terms: Vec::new(),
                limit: None,
            };
            let borrowed: Vec<(&str, &CondValue)> =
                entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
            let clauses = compiler.walk(&borrowed, None)?;
            Ok(CompiledCondition {
                clauses,
                order_terms: compiler.order_terms,
                limit: compiler.limit,
            })
        }
    }
}

// =============================================================================
// Compiler
// =============================================================================

struct Compiler {
    backend: Backend,
    order_terms: Vec<String>,
    limit: Option<String>,
}

impl Compiler {
    /// Walk one nesting level. `forced` is a key from the level above applied
    /// to every entry here (the `{field: [v1, v2]}` spelling), except that a
    /// forced `AND` lets each entry keep its own key.
    fn walk(
        &mut self,
        entries: &[(&str, &CondValue)],
        forced: Option<&str>,
    ) -> DbResult<Vec<String>> {
        let mut clauses = Vec::new();

        for &(local_key, value) in entries {
            let key = match forced {
                Some(f) if f != "AND" => f,
                _ => local_key,
            };

            match children_of(value) {
                Some(children) => {
                    let borrowed: Vec<(&str, &CondValue)> =
                        children.iter().map(|(k, v)| (k.as_str(), *v)).collect();

                    let (joiner, inner) = if forced == Some("AND") {
                        ("AND", self.walk(&borrowed, Some(key))?)
                    } else {
                        match key {
                            "AND" => ("AND", self.walk(&borrowed, Some("AND"))?),
                            "OR" => ("OR", self.walk(&borrowed, None)?),
                            k if is_positional(k) => ("OR", self.walk(&borrowed, None)?),
                            k => ("OR", self.walk(&borrowed, Some(k))?),
                        }
                    };

                    // Empty groups are vacuously true and emit nothing
                    if !inner.is_empty() {
                        clauses.push(format!("({})", inner.join(&format!(" {joiner} "))));
                    }
                }
                None => {
                    let scalar = match value {
                        CondValue::Expr(s) => s.clone(),
                        CondValue::Number(n) => n.to_string(),
                        _ => unreachable!("maps and lists have children"),
                    };
                    if let Some(clause) = self.scalar_clause(key, &scalar)? {
                        clauses.push(clause);
                    }
                }
            }
        }
        Ok(clauses)
    }

    /// Compile one `key: scalar` pair, routing ordering/limit words aside.
    /// Returns None when the pair fed ORDER BY or LIMIT instead of WHERE.
    fn scalar_clause(&mut self, key: &str, value: &str) -> DbResult<Option<String>> {
        let key_special = SPECIAL_WORDS.contains(&key);
        if key_special || SPECIAL_WORDS.contains(&value) {
            let (word, operand) = if key_special {
                (key, value)
            } else {
                (value, key)
            };
            let operand = quote_field(&escape_literal(self.backend, operand));
            match word {
                "LIMIT" => self.limit = Some(operand),
                _ => self.order_terms.push(format!("{operand} {word}")),
            }
            return Ok(None);
        }

        let parsed = parse_expr(value)?;

        // Field names that collide with reserved words get backticks, unless
        // the value is itself a reserved word (a column compared to another
        // reserved-named column reads better bare on both sides).
        let field = if (RESERVED_WORDS.contains(&key) && !RESERVED_WORDS.contains(&value))
            || key.contains(' ')
        {
            format!("`{key}`")
        } else {
            key.to_string()
        };

        if parsed.raw {
            if parsed.op.is_some() || parsed.lead_wild || parsed.trail_wild {
                return Err(DbError::validation(format!(
                    "raw marker cannot combine with an operator or wildcard: {value}"
                )));
            }
            return Ok(Some(format!("{field} = {}", parsed.payload)));
        }

        if parsed.lead_wild || parsed.trail_wild {
            let operator = if parsed.op == Some("!=") {
                "NOT LIKE"
            } else {
                "LIKE"
            };
            let mut pattern = String::new();
            if parsed.lead_wild {
                pattern.push('%');
            }
            pattern.push_str(parsed.payload);
            if parsed.trail_wild {
                pattern.push('%');
            }
            return Ok(Some(format!(
                "{field} {operator} {}",
                quote_literal(self.backend, &pattern)
            )));
        }

        let operator = parsed.op.unwrap_or("=");
        let literal = if is_numeric(parsed.payload) {
            parsed.payload.to_string()
        } else {
            quote_literal(self.backend, parsed.payload)
        };
        Ok(Some(format!("{field} {operator} {literal}")))
    }
}

/// Borrowed (key, value) pairs of a nested group; None for scalars. List
/// elements get positional keys, matching how a bare list reads as an
/// OR-set of alternatives.
fn children_of(value: &CondValue) -> Option<Vec<(String, &CondValue)>> {
    match value {
        CondValue::Map(entries) => Some(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), v))
                .collect(),
        ),
        CondValue::List(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
        ),
        _ => None,
    }
}

fn is_positional(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty()
        && s.parse::<f64>().is_ok()
        && s.bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}

/// Backtick-quote a field name when it collides with a reserved word or
/// contains whitespace.
pub(crate) fn quote_field(name: &str) -> String {
    if RESERVED_WORDS.contains(&name) || name.contains(' ') {
        format!("`{name}`")
    } else {
        name.to_string()
    }
}

// =============================================================================
// Scalar Expression Grammar
// =============================================================================

struct ParsedExpr<'a> {
    op: Option<&'static str>,
    raw: bool,
    lead_wild: bool,
    payload: &'a str,
    trail_wild: bool,
}

/// Split a scalar match expression into operator prefix, raw/wildcard
/// markers, and payload.
fn parse_expr(s: &str) -> DbResult<ParsedExpr<'_>> {
    let mut rest = s;
    let mut op = None;
    for (prefix, normalized) in [
        (">=", ">="),
        ("<=", "<="),
        ("!=", "!="),
        (">", ">"),
        ("<", "<"),
        ("!", "!="),
        ("=", "="),
    ] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            op = Some(normalized);
            rest = stripped;
            break;
        }
    }

    let mut raw = false;
    let mut lead_wild = false;
    if let Some(stripped) = rest.strip_prefix('&') {
        raw = true;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix(['%', '*']) {
        lead_wild = true;
        rest = stripped;
    }

    let mut trail_wild = false;
    if rest.len() > 1 && (rest.ends_with('%') || rest.ends_with('*')) {
        trail_wild = true;
        rest = &rest[..rest.len() - 1];
    }

    if rest.is_empty() && (op.is_some() || raw || lead_wild) {
        return Err(DbError::validation(format!(
            "match expression has markers but no payload: {s}"
        )));
    }

    Ok(ParsedExpr {
        op,
        raw,
        lead_wild,
        payload: rest,
        trail_wild,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clauses(json: serde_json::Value) -> Vec<String> {
        let cond = Condition::from_json(&json).unwrap();
        compile(&cond, Some("id"), Backend::MySql).unwrap().clauses
    }

    fn fragment(json: serde_json::Value) -> String {
        let cond = Condition::from_json(&json).unwrap();
        compile(&cond, Some("id"), Backend::MySql)
            .unwrap()
            .fragment()
    }

    #[test]
    fn test_scalar_equality() {
        assert_eq!(clauses(json!({"name": "Ada"})), vec!["name = 'Ada'"]);
        assert_eq!(clauses(json!({"name": "!Ada"})), vec!["name != 'Ada'"]);
        assert_eq!(clauses(json!({"age": 30})), vec!["age = 30"]);
        assert_eq!(clauses(json!({"age": ">30"})), vec!["age > 30"]);
        assert_eq!(clauses(json!({"age": ">=30"})), vec!["age >= 30"]);
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(
            clauses(json!({"name": "%ada%"})),
            vec!["name LIKE '%ada%'"]
        );
        // '*' normalizes to '%'
        assert_eq!(clauses(json!({"name": "*ada"})), vec!["name LIKE '%ada'"]);
        assert_eq!(
            clauses(json!({"name": "!%ada%"})),
            vec!["name NOT LIKE '%ada%'"]
        );
    }

    #[test]
    fn test_raw_values() {
        assert_eq!(
            clauses(json!({"created": "&NOW()"})),
            vec!["created = NOW()"]
        );
        let cond = Condition::from_json(&json!({"created": ">&NOW()"})).unwrap();
        assert!(matches!(
            compile(&cond, None, Backend::MySql),
            Err(DbError::Validation { .. })
        ));
    }

    #[test]
    fn test_ordering_and_limit() {
        assert_eq!(
            fragment(json!({"ASC": "name", "LIMIT": "5"})),
            " ORDER BY name ASC LIMIT 5"
        );
        // ordering word on the value side
        assert_eq!(fragment(json!({"name": "asc"})), " ORDER BY name asc");
        // ordering mixes with filters, WHERE comes first
        assert_eq!(
            fragment(json!({"status": "open", "DESC": "created"})),
            " WHERE status = 'open' ORDER BY created DESC"
        );
    }

    #[test]
    fn test_grouping() {
        assert_eq!(
            clauses(json!({"OR": {"a": "1", "b": "2"}})),
            vec!["(a = 1 OR b = 2)"]
        );
        assert_eq!(
            clauses(json!({"AND": {"a": "1", "b": "2"}})),
            vec!["(a = 1 AND b = 2)"]
        );
        // a field key over a list fans out to an OR over that field
        assert_eq!(
            clauses(json!({"status": ["open", "stale"]})),
            vec!["(status = 'open' OR status = 'stale')"]
        );
        // empty groups vanish
        assert_eq!(clauses(json!({"OR": {}})), Vec::<String>::new());
    }

    #[test]
    fn test_reserved_words_and_whitespace() {
        assert_eq!(clauses(json!({"type": "page"})), vec!["`type` = 'page'"]);
        assert_eq!(
            clauses(json!({"field one": "x"})),
            vec!["`field one` = 'x'"]
        );
    }

    #[test]
    fn test_primary_key_shorthand() {
        let compiled = compile(&Condition::key(7), Some("nid"), Backend::MySql).unwrap();
        assert_eq!(compiled.fragment(), " WHERE nid = 7");
        assert!(matches!(
            compile(&Condition::key(7), None, Backend::MySql),
            Err(DbError::Validation { .. })
        ));
    }

    #[test]
    fn test_escaping_flows_through() {
        assert_eq!(
            clauses(json!({"name": "O'Brien"})),
            vec![r"name = 'O''Brien'"]
        );
    }

    #[test]
    fn test_from_json_rejects_scalars() {
        assert!(Condition::from_json(&json!("name")).is_err());
        assert!(matches!(
            Condition::from_json(&json!(42)),
            Ok(Condition::Key(42))
        ));
    }
}
