use serde_json::Value;

use crate::{path, MappingError};

/// A parsed rule condition.
///
/// The grammar is deliberately tiny:
///
/// - `exists(a.b)` / `!exists(a.b)` — presence check
/// - `non_empty(a.b)` — present and not `null`/`""`/`[]`/`{}`
/// - `a.b == <literal>` / `a.b != <literal>` — equality against a JSON
///   literal (`"text"`, `42`, `true`, `false`, `null`; bare words compare
///   as strings)
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Exists(String),
    NotExists(String),
    NonEmpty(String),
    Eq(String, Value),
    Ne(String, Value),
}

impl Condition {
    pub fn parse(expr: &str) -> Result<Self, MappingError> {
        let trimmed = expr.trim();
        let invalid = |reason: &str| MappingError::InvalidCondition {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        if let Some(inner) = call_argument(trimmed, "exists") {
            path::parse(inner).map_err(|_| invalid("bad path"))?;
            return Ok(Condition::Exists(inner.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix('!') {
            let inner = call_argument(rest.trim(), "exists").ok_or_else(|| invalid("expected !exists(path)"))?;
            path::parse(inner).map_err(|_| invalid("bad path"))?;
            return Ok(Condition::NotExists(inner.to_string()));
        }
        if let Some(inner) = call_argument(trimmed, "non_empty") {
            path::parse(inner).map_err(|_| invalid("bad path"))?;
            return Ok(Condition::NonEmpty(inner.to_string()));
        }

        for (op, ne) in [("!=", true), ("==", false)] {
            if let Some(pos) = trimmed.find(op) {
                let lhs = trimmed[..pos].trim();
                let rhs = trimmed[pos + op.len()..].trim();
                path::parse(lhs).map_err(|_| invalid("bad path"))?;
                let literal = parse_literal(rhs).ok_or_else(|| invalid("bad literal"))?;
                return Ok(if ne {
                    Condition::Ne(lhs.to_string(), literal)
                } else {
                    Condition::Eq(lhs.to_string(), literal)
                });
            }
        }

        Err(invalid("unrecognized expression"))
    }

    /// Evaluate against the source payload.
    pub fn holds(&self, payload: &Value) -> bool {
        match self {
            Condition::Exists(p) => path::lookup(payload, p).is_some(),
            Condition::NotExists(p) => path::lookup(payload, p).is_none(),
            Condition::NonEmpty(p) => match path::lookup(payload, p) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.is_empty(),
                Some(Value::Array(a)) => !a.is_empty(),
                Some(Value::Object(o)) => !o.is_empty(),
                Some(_) => true,
            },
            Condition::Eq(p, literal) => path::lookup(payload, p) == Some(literal),
            Condition::Ne(p, literal) => path::lookup(payload, p) != Some(literal),
        }
    }
}

fn call_argument<'a>(expr: &'a str, name: &str) -> Option<&'a str> {
    let rest = expr.strip_prefix(name)?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.trim())
}

fn parse_literal(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return Some(v);
    }
    // Bare words compare as strings.
    if raw.chars().all(|c| c.is_alphanumeric() || "_-+.@".contains(c)) {
        return Some(Value::String(raw.to_string()));
    }
    None
}
